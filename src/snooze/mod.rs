pub mod store;
pub mod types;

use crate::alarm::{alarm_name, AlarmHost, ALARM_PREFIX};
use crate::host::{Session, TabHost};
use crate::protocol::{Request, Response, TabRef};
use crate::schedule::{compute_schedule, next_occurrence, RepeatRule, Schedule, SnoozeChoice};
use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use types::SnoozedTab;
use url::Url;

// Locator schemes that never get snoozed.
const INTERNAL_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "about",
    "moz-extension",
    "edge",
    "brave",
    "devtools",
    "view-source",
];

/// Owns the store and is its only writer. All operations run on one event
/// loop, so no handler ever observes another handler mid-mutation.
pub struct SnoozeManager {
    store: store::SnoozeStore,
    alarms: Arc<dyn AlarmHost>,
    host: Arc<dyn TabHost>,
    session: Session,
}

impl SnoozeManager {
    pub fn new(
        store_path: PathBuf,
        alarms: Arc<dyn AlarmHost>,
        host: Arc<dyn TabHost>,
        session: Session,
    ) -> Self {
        Self {
            store: store::SnoozeStore::new(store_path),
            alarms,
            host,
            session,
        }
    }

    pub fn load(&mut self) -> Result<()> {
        self.store.load()
    }

    /// Cold-start (and periodic resync) pass: reload the store, sweep
    /// one-shots missed while the process was down, re-arm every pending
    /// wake-up, and fire startup records once per session.
    pub fn reconcile(&mut self, now_ms: i64) -> Result<()> {
        self.store.load()?;
        let host = Arc::clone(&self.host);

        let missed: Vec<String> = self
            .store
            .tabs
            .iter()
            .filter(|t| {
                t.is_one_shot() && !t.at_startup && t.wake_up_time_ms.is_some_and(|at| at <= now_ms)
            })
            .map(|t| t.id.clone())
            .collect();
        for id in &missed {
            if let Some(tab) = self.store.get(id) {
                info!("Waking tab missed while down: {} ({})", tab.title, tab.id);
                wake_tab(&*host, tab);
            }
            self.remove_record(id);
        }

        // Refresh stale cached occurrences of clock-driven repeat rules.
        // An unexpired cache is kept as is, so repeated passes re-arm the
        // same fire time instead of pushing it out by the resync interval.
        for tab in &mut self.store.tabs {
            if let Some(rule) = &tab.repeat {
                if !matches!(rule, RepeatRule::Startup) {
                    let stale = tab.wake_up_time_ms.is_none_or(|at| at <= now_ms);
                    if stale {
                        tab.wake_up_time_ms = Some(next_occurrence(rule, now_ms));
                    }
                }
            }
        }

        for tab in &self.store.tabs {
            self.arm(tab, now_ms);
        }

        if self.session.claim_startup() {
            let startup: Vec<(String, bool)> = self
                .store
                .tabs
                .iter()
                .filter_map(|t| {
                    if t.at_startup && t.is_one_shot() {
                        Some((t.id.clone(), true))
                    } else if matches!(t.repeat, Some(RepeatRule::Startup)) {
                        Some((t.id.clone(), false))
                    } else {
                        None
                    }
                })
                .collect();
            for (id, one_shot) in startup {
                if let Some(tab) = self.store.get(&id) {
                    wake_tab(&*host, tab);
                }
                if one_shot {
                    self.remove_record(&id);
                }
            }
        }

        self.store.save()?;
        debug!("Reconciled {} snoozed tabs", self.store.tabs.len());
        Ok(())
    }

    /// Snoozes a batch. Tabs with empty or internal-scheme URLs are skipped
    /// silently; the store is persisted once at the end, and only that
    /// persistence failure fails the batch.
    pub fn snooze(
        &mut self,
        tabs: &[TabRef],
        choice: SnoozeChoice,
        repeat: bool,
        now_ms: i64,
    ) -> Result<usize> {
        let schedule = compute_schedule(choice, repeat, now_ms);
        let mut snoozed = 0;
        for tab_ref in tabs {
            if !snoozable_url(&tab_ref.url) {
                info!("Skipping non-snoozable tab: {:?}", tab_ref.url);
                continue;
            }
            let mut tab = SnoozedTab {
                id: new_tab_id(now_ms),
                url: tab_ref.url.clone(),
                title: tab_ref.title.clone(),
                created_at_ms: now_ms,
                wake_up_time_ms: None,
                at_startup: false,
                repeat: None,
            };
            match schedule {
                Schedule::At(at) => tab.wake_up_time_ms = Some(at),
                Schedule::AtStartup => tab.at_startup = true,
                Schedule::Repeat(rule) => {
                    tab.repeat = Some(rule);
                    if !matches!(rule, RepeatRule::Startup) {
                        tab.wake_up_time_ms = Some(next_occurrence(&rule, now_ms));
                    }
                }
            }
            self.arm(&tab, now_ms);
            self.store.tabs.push(tab);
            snoozed += 1;
        }
        self.store.save()?;
        Ok(snoozed)
    }

    pub fn list(&self) -> Vec<SnoozedTab> {
        self.store.tabs.clone()
    }

    /// Reopens the tab now and drops its record, whatever its schedule.
    /// Removal is already decided when the open runs: an open failure is
    /// logged, not retried.
    pub fn restore(&mut self, id: &str) -> Result<bool> {
        let Some(tab) = self.store.get(id) else {
            return Ok(false);
        };
        let host = Arc::clone(&self.host);
        wake_tab(&*host, tab);
        self.remove_record(id);
        self.store.save()?;
        Ok(true)
    }

    /// Drops the record and its wake-up without reopening anything.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if !self.remove_record(id) {
            return Ok(false);
        }
        self.store.save()?;
        Ok(true)
    }

    /// Handles a fired wake-up. Names without our prefix and ids without a
    /// record are no-ops (the record may have been deleted since).
    pub fn on_alarm(&mut self, name: &str, now_ms: i64) -> Result<()> {
        let Some(id) = name.strip_prefix(ALARM_PREFIX) else {
            return Ok(());
        };
        let id = id.to_string();
        let Some(tab) = self.store.get(&id) else {
            return Ok(());
        };
        let repeat = tab.repeat;
        let host = Arc::clone(&self.host);
        wake_tab(&*host, tab);

        match repeat {
            Some(rule @ RepeatRule::Monthly { .. }) => {
                // No uniform period: cache the next occurrence and arm a
                // fresh one-shot.
                let next = next_occurrence(&rule, now_ms);
                if let Some(tab) = self.store.get_mut(&id) {
                    tab.wake_up_time_ms = Some(next);
                }
                let name = alarm_name(&id);
                self.alarms.clear(&name);
                if let Err(e) = self.alarms.register(&name, next, None) {
                    error!("Failed to re-register wake-up for {}: {}", id, e);
                }
                self.store.save()?;
            }
            Some(RepeatRule::Startup) => {}
            Some(rule) => {
                // Fixed-period rules re-fire at the host level on their own;
                // keep the cached occurrence in step so the next reconcile
                // re-arms the live fire time, not a stale one.
                let next = next_occurrence(&rule, now_ms);
                if let Some(tab) = self.store.get_mut(&id) {
                    tab.wake_up_time_ms = Some(next);
                }
                self.store.save()?;
            }
            None => {
                self.remove_record(&id);
                self.store.save()?;
            }
        }
        Ok(())
    }

    pub fn handle_request(&mut self, request: Request) -> Response {
        let now_ms = Local::now().timestamp_millis();
        match request {
            Request::SnoozeTabs { value, repeat, tabs } => {
                match self.snooze(&tabs, value, repeat, now_ms) {
                    Ok(count) => {
                        info!("Snoozed {} of {} tabs", count, tabs.len());
                        Response::ok()
                    }
                    Err(e) => Response::failure(format!("Failed to persist snoozed tabs: {e}")),
                }
            }
            Request::GetSnoozedTabs => Response::with_items(self.list()),
            Request::RestoreTab { tab_id } => match self.restore(&tab_id) {
                Ok(true) => Response::ok(),
                Ok(false) => Response::failure("No snoozed tab with that id"),
                Err(e) => Response::failure(e.to_string()),
            },
            Request::DeleteTab { tab_id } => match self.delete(&tab_id) {
                Ok(true) => Response::ok(),
                Ok(false) => Response::failure("No snoozed tab with that id"),
                Err(e) => Response::failure(e.to_string()),
            },
        }
    }

    /// Registers the wake-up a record calls for, clearing any stale
    /// registration of the same name first. Registration failures are logged
    /// and never abort the surrounding batch.
    fn arm(&self, tab: &SnoozedTab, now_ms: i64) {
        let name = alarm_name(&tab.id);
        self.alarms.clear(&name);
        let registration = match &tab.repeat {
            Some(RepeatRule::Startup) => None,
            Some(rule) => {
                // Always from the cached occurrence: recomputing here would
                // push a relative rule like hourly out on every re-arm.
                let at = tab
                    .wake_up_time_ms
                    .unwrap_or_else(|| next_occurrence(rule, now_ms));
                Some((at, rule.period_minutes()))
            }
            None => tab.wake_up_time_ms.map(|at| (at, None)),
        };
        if let Some((at, period)) = registration {
            if let Err(e) = self.alarms.register(&name, at, period) {
                error!("Failed to register wake-up for {}: {}", tab.id, e);
            }
        }
    }

    fn remove_record(&mut self, id: &str) -> bool {
        self.alarms.clear(&alarm_name(id));
        self.store.remove(id)
    }
}

fn wake_tab(host: &dyn TabHost, tab: &SnoozedTab) {
    if let Err(e) = host.open_tab(&tab.url) {
        error!("Failed to reopen tab {} ({}): {}", tab.id, tab.url, e);
    }
    host.notify("Tab restored", &tab.title);
}

fn snoozable_url(raw: &str) -> bool {
    if raw.trim().is_empty() {
        return false;
    }
    match Url::parse(raw) {
        Ok(url) => !INTERNAL_SCHEMES.contains(&url.scheme()),
        Err(_) => false,
    }
}

fn new_tab_id(now_ms: i64) -> String {
    // Millisecond timestamp plus a random fragment, so two tabs snoozed in
    // the same instant still get distinct ids.
    let suffix = uuid::Uuid::new_v4().to_string();
    format!("{}-{}", now_ms, &suffix[..8])
}
