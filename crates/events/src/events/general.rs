use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// General utility events for warnings and debug output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneralEvent {
    Warning {
        message: String,
        context: Option<String>,
    },

    DebugLog {
        message: String,
        context: BTreeMap<String, String>,
    },
}

impl GeneralEvent {
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: None,
        }
    }

    pub fn warning_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::DebugLog {
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn debug_with_context(
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> Self {
        Self::DebugLog {
            message: message.into(),
            context,
        }
    }
}
