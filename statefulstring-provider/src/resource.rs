//! The typed model of a `StatefulString` resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reasons to recompute, attached to a resource. Opaque to the provider.
pub type TriggerMap = BTreeMap<String, String>;

/// Diff path of the primary value.
pub const STRING_PATH: &str = "string";

/// Diff path of the trigger `key`.
pub fn trigger_path(key: &str) -> String {
    format!("triggers.{}", key)
}

/// The inputs of a `StatefulString`: what the host asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatefulStringArgs {
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub triggers: TriggerMap,
}

/// The persisted state of a `StatefulString`: the last applied inputs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatefulStringState {
    #[serde(flatten)]
    pub args: StatefulStringArgs,
}

#[cfg(test)]
impl StatefulStringState {
    pub fn as_input(&self) -> StatefulStringArgs {
        self.args.clone()
    }
}

impl From<StatefulStringArgs> for StatefulStringState {
    fn from(args: StatefulStringArgs) -> Self {
        StatefulStringState { args }
    }
}

#[cfg(test)]
pub(crate) fn args(string: &str, triggers: &[(&str, &str)]) -> StatefulStringArgs {
    StatefulStringArgs {
        string: string.to_string(),
        triggers: triggers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}
