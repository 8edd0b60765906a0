//! Trigger diffing.
//!
//! Triggers gate the primary value: a `StatefulString` only takes a newly
//! requested `string` when at least one trigger was added, removed or changed.
//! Without a trigger change the requested `string` is ignored and the old one
//! is kept. This is surprising, but it is the behavior hosts rely on to keep a
//! value stable until something explicitly asks for it to be recomputed.

use std::collections::BTreeMap;

use statefulstring_resource::schema::v0::DiffKind;

use crate::resource::{trigger_path, StatefulStringArgs, StatefulStringState, STRING_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

impl From<ChangeKind> for DiffKind {
    fn from(kind: ChangeKind) -> DiffKind {
        match kind {
            ChangeKind::Added => DiffKind::Add,
            ChangeKind::Updated => DiffKind::Update,
            ChangeKind::Removed => DiffKind::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// `string` or `triggers.<key>`
    pub path: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffVerdict {
    pub any_trigger_changed: bool,
    /// At most one record per path. The order carries no meaning.
    pub changes: Vec<ChangeRecord>,
    /// The inputs the resource ends up with.
    pub resulting_input: StatefulStringArgs,
}

impl DiffVerdict {
    /// The changes keyed by diff path.
    pub fn detailed_diff(&self) -> BTreeMap<String, ChangeKind> {
        self.changes
            .iter()
            .map(|c| (c.path.clone(), c.kind))
            .collect()
    }
}

pub fn compute_diff(old: &StatefulStringState, new: &StatefulStringArgs) -> DiffVerdict {
    let old = &old.args;
    let mut changes = Vec::new();

    for (key, new_value) in &new.triggers {
        let kind = match old.triggers.get(key) {
            None => ChangeKind::Added,
            Some(old_value) if old_value != new_value => ChangeKind::Updated,
            Some(_) => continue,
        };
        tracing::trace!(trigger = %key, ?kind, "trigger changed");
        changes.push(ChangeRecord {
            path: trigger_path(key),
            kind,
        });
    }

    for key in old.triggers.keys() {
        if !new.triggers.contains_key(key) {
            tracing::trace!(trigger = %key, kind = ?ChangeKind::Removed, "trigger changed");
            changes.push(ChangeRecord {
                path: trigger_path(key),
                kind: ChangeKind::Removed,
            });
        }
    }

    let any_trigger_changed = !changes.is_empty();

    let resulting_input = if any_trigger_changed {
        if new.string != old.string {
            changes.push(ChangeRecord {
                path: STRING_PATH.to_string(),
                kind: ChangeKind::Updated,
            });
        }
        new.clone()
    } else {
        if new.string != old.string {
            tracing::debug!("no trigger changed, keeping the previous string");
        }
        StatefulStringArgs {
            string: old.string.clone(),
            triggers: new.triggers.clone(),
        }
    };

    tracing::debug!(any_trigger_changed, changes = changes.len(), "computed diff");

    DiffVerdict {
        any_trigger_changed,
        changes,
        resulting_input,
    }
}
