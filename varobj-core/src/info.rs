//! Serializable snapshots
//!
//! Plain data records describing objects and update results, for the command
//! layer that sits above the store and talks to a front end.

use serde::{Deserialize, Serialize};

use crate::format::DisplayFormat;
use crate::lang::Language;
use crate::store::VarobjStore;
use crate::update::{TypeChange, UpdateStatus};
use crate::varobj::VarobjId;

/// Everything a front end shows about one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarobjInfo {
    /// Registered name, if any
    pub name: Option<String>,
    /// Expression text of a root, accessor name of a child
    pub expression: String,
    pub path_expression: String,
    /// `None` when the count is unknown
    pub num_children: Option<usize>,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub dynamic_type: String,
    pub format: DisplayFormat,
    pub language: Language,
    pub in_scope: bool,
    pub editable: bool,
    pub error: bool,
}

impl VarobjInfo {
    pub fn collect(store: &VarobjStore, id: VarobjId) -> Self {
        Self {
            name: store.get_objname(id).map(str::to_string),
            expression: store.get_expression(id).to_string(),
            path_expression: store.path_expr(id),
            num_children: store.peek_num_children(id),
            value: store.get_value(id),
            type_name: store.get_type(id),
            dynamic_type: store.get_dynamic_type(id),
            format: store.format(id),
            language: store.get_language(id),
            in_scope: store.in_scope(id),
            editable: store.editable(id),
            error: store.get(id).error(),
        }
    }
}

/// Scope state reported with a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeState {
    True,
    False,
}

/// One entry of an update result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub name: Option<String>,
    pub in_scope: ScopeState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    pub type_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_num_children: Option<usize>,
}

impl ChangeRecord {
    /// Records for an update result of `root`.
    pub fn from_status(store: &VarobjStore, root: VarobjId, status: &UpdateStatus) -> Vec<Self> {
        let changes = match status {
            UpdateStatus::NoChange => return Vec::new(),
            UpdateStatus::ScopeExit => {
                return vec![ChangeRecord {
                    name: store.get_objname(root).map(str::to_string),
                    in_scope: ScopeState::False,
                    value: None,
                    type_changed: false,
                    new_type: None,
                    new_num_children: None,
                }]
            }
            UpdateStatus::Changed(changes) | UpdateStatus::TypeChanged(changes) => changes,
        };
        changes
            .iter()
            .map(|entry| {
                let type_changed = entry.type_change != TypeChange::Unchanged;
                ChangeRecord {
                    name: store.get_objname(entry.id).map(str::to_string),
                    in_scope: ScopeState::True,
                    value: store.get_value(entry.id),
                    type_changed,
                    new_type: if type_changed {
                        store.get_type(entry.id)
                    } else {
                        None
                    },
                    new_num_children: if type_changed {
                        store.peek_num_children(entry.id)
                    } else {
                        None
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_record_serialize() {
        let record = ChangeRecord {
            name: Some("var1.a".to_string()),
            in_scope: ScopeState::True,
            value: Some("5".to_string()),
            type_changed: false,
            new_type: None,
            new_num_children: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"in_scope\":\"true\""));
        assert!(json.contains("\"value\":\"5\""));
        assert!(!json.contains("new_type"));
    }

    #[test]
    fn test_scope_state_roundtrip() {
        let state: ScopeState = serde_json::from_str("\"false\"").unwrap();
        assert_eq!(state, ScopeState::False);
    }
}
