use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eval::ActionCreators;

/// Devtools configuration for one engine
#[derive(Debug, Clone)]
pub struct DevtoolsConfig<A> {
    pub name: Option<String>,
    pub instance_id: Option<String>,
    pub action_creators: Option<ActionCreators<A>>,
    pub should_record_changes: bool,
    pub should_start_locked: bool,
    pub features: Features,
}

impl<A> Default for DevtoolsConfig<A> {
    fn default() -> Self {
        Self {
            name: None,
            instance_id: None,
            action_creators: None,
            should_record_changes: true,
            should_start_locked: false,
            features: Features::default(),
        }
    }
}

impl<A> DevtoolsConfig<A> {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: bool| -> Result<bool> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be true or false", key)),
                None => Ok(default),
            }
        };

        Ok(Self {
            name: lookup("REWIND_NAME"),
            instance_id: lookup("REWIND_INSTANCE_ID"),
            action_creators: None,
            should_record_changes: flag("REWIND_RECORD_CHANGES", true)?,
            should_start_locked: flag("REWIND_START_LOCKED", false)?,
            features: Features::default(),
        })
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    pub fn action_creators(mut self, creators: ActionCreators<A>) -> Self {
        self.action_creators = Some(creators);
        self
    }

    pub fn record_changes(mut self, record: bool) -> Self {
        self.should_record_changes = record;
        self
    }

    pub fn start_locked(mut self, locked: bool) -> Self {
        self.should_start_locked = locked;
        self
    }

    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }
}

/// Console capabilities advertised on connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    /// Start/pause recording of dispatched actions
    pub pause: bool,
    /// Lock/unlock dispatching actions
    pub lock: bool,
    /// Persist states on page reloading
    pub persist: bool,
    /// Export history of actions to a file
    pub export: bool,
    /// Import history from a file: `"custom"` or a boolean
    pub import: Value,
    /// Jump back and forth
    pub jump: bool,
    /// Skip (cancel) actions
    pub skip: bool,
    /// Drag and drop actions in the history list
    pub reorder: bool,
    /// Dispatch custom actions or action creators
    pub dispatch: bool,
    /// Generate tests for the selected actions
    pub test: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            pause: true,
            lock: true,
            persist: true,
            export: true,
            import: Value::String("custom".to_string()),
            jump: true,
            skip: true,
            reorder: false,
            dispatch: true,
            test: false,
        }
    }
}
