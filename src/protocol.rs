use crate::schedule::SnoozeChoice;
use crate::snooze::types::SnoozedTab;
use serde::{Deserialize, Serialize};

/// Requests accepted on the control socket, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    SnoozeTabs {
        value: SnoozeChoice,
        #[serde(default)]
        repeat: bool,
        tabs: Vec<TabRef>,
    },
    GetSnoozedTabs,
    #[serde(rename_all = "camelCase")]
    RestoreTab { tab_id: String },
    #[serde(rename_all = "camelCase")]
    DeleteTab { tab_id: String },
}

/// A tab as described by the requesting side. `id` is the browser-side tab
/// id; the requester closes that tab itself after a successful snooze.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRef {
    #[serde(default)]
    pub id: Option<i64>,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<SnoozedTab>>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            items: None,
        }
    }

    pub fn with_items(items: Vec<SnoozedTab>) -> Self {
        Self {
            success: true,
            error: None,
            items: Some(items),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            items: None,
        }
    }

    pub fn unknown_action() -> Self {
        Self::failure("Unknown action")
    }
}
