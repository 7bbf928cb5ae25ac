use crate::snooze::types::{SnoozedTab, StoreData};
use anyhow::Result;
use std::fs;
use std::path::PathBuf;

/// The persisted snoozed-tab records, one JSON document holding the full
/// array. Mutators only touch memory; the manager calls `save` once per
/// batch of changes.
pub struct SnoozeStore {
    path: PathBuf,
    pub tabs: Vec<SnoozedTab>,
}

impl SnoozeStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            tabs: Vec::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            let data: StoreData = serde_json::from_str(&content)?;
            self.tabs = data.tabs;
        } else {
            self.tabs = Vec::new();
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let data = StoreData {
            version: 1,
            tabs: self.tabs.clone(),
        };
        let content = serde_json::to_string_pretty(&data)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SnoozedTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SnoozedTab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let len_before = self.tabs.len();
        self.tabs.retain(|t| t.id != id);
        self.tabs.len() < len_before
    }
}
