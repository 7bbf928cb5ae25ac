use crate::schedule::RepeatRule;
use serde::{Deserialize, Serialize};

/// One deferred tab. Either one-shot (`wake_up_time_ms` or `at_startup` set,
/// no `repeat`) or recurring (`repeat` set). A clock-driven recurring record
/// also carries `wake_up_time_ms` as a cache of its next computed occurrence;
/// re-arming registers the cached time rather than recomputing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnoozedTab {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(rename = "createdAt")]
    pub created_at_ms: i64,
    #[serde(rename = "wakeUpTime", default, skip_serializing_if = "Option::is_none")]
    pub wake_up_time_ms: Option<i64>,
    #[serde(rename = "atStartup", default)]
    pub at_startup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatRule>,
}

impl SnoozedTab {
    pub fn is_one_shot(&self) -> bool {
        self.repeat.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreData {
    pub version: i32,
    pub tabs: Vec<SnoozedTab>,
}
