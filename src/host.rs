use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(target_os = "macos")]
const OPENER: &str = "open";
#[cfg(not(target_os = "macos"))]
const OPENER: &str = "xdg-open";

/// What the engine asks of the surrounding desktop: reopen a tab's URL and
/// tell the user about it. Open failures surface to the caller; notification
/// delivery is best effort.
pub trait TabHost: Send + Sync {
    fn open_tab(&self, url: &str) -> Result<()>;
    fn notify(&self, summary: &str, body: &str);
}

pub struct SystemHost;

impl TabHost for SystemHost {
    fn open_tab(&self, url: &str) -> Result<()> {
        Command::new(OPENER)
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning {OPENER} for {url}"))?;
        Ok(())
    }

    fn notify(&self, summary: &str, body: &str) {
        let _ = Command::new("notify-send")
            .arg(summary)
            .arg(body)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
    }
}

/// Ephemeral once-per-process flag gating the startup firings. Constructed
/// in `main`, so it survives manager re-initialization within a session but
/// not a process restart.
#[derive(Clone, Default)]
pub struct Session {
    startup_fired: Arc<AtomicBool>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per session.
    pub fn claim_startup(&self) -> bool {
        !self.startup_fired.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
pub use recording::RecordingHost;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_startup_is_claimed_once() {
        let session = Session::new();
        assert!(session.claim_startup());
        assert!(!session.claim_startup());
        // A clone shares the same session lifetime.
        let clone = session.clone();
        assert!(!clone.claim_startup());
        // A fresh session starts over.
        assert!(Session::new().claim_startup());
    }
}
