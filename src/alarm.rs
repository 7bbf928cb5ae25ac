use crate::bus::{Event, EventBus};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::{self, Duration};

/// Wake-up names carry this prefix; fired names without it belong to someone
/// else and are ignored.
pub const ALARM_PREFIX: &str = "tabnap:";

pub fn alarm_name(id: &str) -> String {
    format!("{ALARM_PREFIX}{id}")
}

/// The host wake-up facility: named one-shot or periodic timers. Registering
/// a name that already exists replaces the prior registration, so a name can
/// never fire twice for one schedule.
pub trait AlarmHost: Send + Sync {
    fn register(&self, name: &str, at_ms: i64, period_minutes: Option<u32>) -> Result<()>;
    fn clear(&self, name: &str);
}

#[derive(Debug, Clone)]
struct AlarmEntry {
    at_ms: i64,
    period_minutes: Option<u32>,
}

struct AlarmInner {
    entries: Mutex<HashMap<String, AlarmEntry>>,
    notify: Notify,
}

/// In-process implementation of the wake-up facility. A single loop sleeps
/// until the earliest registration and publishes fired names onto the bus.
/// Periodic entries advance in place; one-shots are dropped on fire.
#[derive(Clone)]
pub struct AlarmService {
    inner: Arc<AlarmInner>,
}

impl AlarmService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AlarmInner {
                entries: Mutex::new(HashMap::new()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn start(&self, bus: EventBus) {
        let service = self.clone();
        tokio::spawn(async move {
            // Delivery is minute-granular; the capped sleep also keeps the
            // loop honest across clock jumps.
            const MAX_SLEEP: Duration = Duration::from_secs(60);
            loop {
                let next_wake = {
                    let entries = service.inner.entries.lock().unwrap();
                    entries.values().map(|e| e.at_ms).min()
                };

                let now = Utc::now().timestamp_millis();
                let raw_sleep = match next_wake {
                    Some(at) if at > now => Duration::from_millis((at - now) as u64),
                    Some(_) => Duration::ZERO,
                    None => MAX_SLEEP,
                };
                let sleep = std::cmp::min(raw_sleep, MAX_SLEEP);

                tokio::select! {
                    _ = service.inner.notify.notified() => {
                        // Registrations changed; recompute the next wake.
                    }
                    _ = time::sleep(sleep) => {
                        if next_wake.is_some() {
                            service.fire_due(&bus).await;
                        }
                    }
                }
            }
        });
    }

    async fn fire_due(&self, bus: &EventBus) {
        let now = Utc::now().timestamp_millis();
        let mut fired = Vec::new();
        {
            let mut entries = self.inner.entries.lock().unwrap();
            let due: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.at_ms <= now)
                .map(|(name, _)| name.clone())
                .collect();
            for name in due {
                if let Some(entry) = entries.get_mut(&name) {
                    match entry.period_minutes {
                        Some(period) => {
                            // Periods are at least a minute.
                            let step = (i64::from(period) * 60_000).max(60_000);
                            while entry.at_ms <= now {
                                entry.at_ms += step;
                            }
                        }
                        None => {
                            entries.remove(&name);
                        }
                    }
                }
                fired.push(name);
            }
        }
        for name in fired {
            bus.publish(Event::AlarmFired { name }).await;
        }
    }
}

impl Default for AlarmService {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmHost for AlarmService {
    fn register(&self, name: &str, at_ms: i64, period_minutes: Option<u32>) -> Result<()> {
        let mut entries = self.inner.entries.lock().unwrap();
        entries.insert(
            name.to_string(),
            AlarmEntry {
                at_ms,
                period_minutes,
            },
        );
        drop(entries);
        self.inner.notify.notify_one();
        Ok(())
    }

    fn clear(&self, name: &str) {
        let mut entries = self.inner.entries.lock().unwrap();
        entries.remove(name);
        drop(entries);
        self.inner.notify.notify_one();
    }
}

#[cfg(test)]
pub use fake::FakeAlarms;
