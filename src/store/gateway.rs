//! Typed access to agents, runs and settings.
//!
//! Record lists are stored as JSON arrays; settings as bare strings. A list
//! whose stored JSON no longer parses reads as empty.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{KeyValueStore, StoreError};
use crate::agent::Agent;
use crate::simulation::TestRun;

const AGENTS_KEY: &str = "agent_architect_agents";
const RUNS_KEY: &str = "agent_architect_runs";
const THEME_KEY: &str = "app_theme";
const API_KEY_KEY: &str = "gemini_api_key";

/// UI theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light.
    Light,
    /// Dark (default).
    #[default]
    Dark,
}

impl Theme {
    /// Stored form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme '{other}', expected light or dark")),
        }
    }
}

/// The only writer of persisted state.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn KeyValueStore>,
}

impl Gateway {
    /// Wrap a backing store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Agent records.
    pub fn agents(&self) -> Agents<'_> {
        Agents { gateway: self }
    }

    /// Test runs.
    pub fn runs(&self) -> Runs<'_> {
        Runs { gateway: self }
    }

    /// Settings.
    pub fn settings(&self) -> Settings<'_> {
        Settings { gateway: self }
    }

    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(key, error = %e, "stored list is corrupt, reading as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write_list<T: Serialize>(&self, key: &str, list: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(list)?;
        self.store.set(key, &raw).await
    }
}

/// Agent collection.
pub struct Agents<'a> {
    gateway: &'a Gateway,
}

impl Agents<'_> {
    /// All agents in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn list(&self) -> Result<Vec<Agent>, StoreError> {
        self.gateway.read_list(AGENTS_KEY).await
    }

    /// Agent by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn get(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.list().await?.into_iter().find(|a| a.id == id))
    }

    /// Append an agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn add(&self, agent: &Agent) -> Result<(), StoreError> {
        let mut list = self.list().await?;
        list.push(agent.clone());
        self.gateway.write_list(AGENTS_KEY, &list).await
    }

    /// Replace the agent with the same id. Returns `false` when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn update(&self, agent: &Agent) -> Result<bool, StoreError> {
        let mut list = self.list().await?;
        let Some(slot) = list.iter_mut().find(|a| a.id == agent.id) else {
            return Ok(false);
        };
        *slot = agent.clone();
        self.gateway.write_list(AGENTS_KEY, &list).await?;
        Ok(true)
    }

    /// Delete by id. Returns `false` when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut list = self.list().await?;
        let before = list.len();
        list.retain(|a| a.id != id);
        if list.len() == before {
            return Ok(false);
        }
        self.gateway.write_list(AGENTS_KEY, &list).await?;
        Ok(true)
    }
}

/// Test-run collection. Newest first.
pub struct Runs<'a> {
    gateway: &'a Gateway,
}

impl Runs<'_> {
    /// All runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn list(&self) -> Result<Vec<TestRun>, StoreError> {
        self.gateway.read_list(RUNS_KEY).await
    }

    /// Store a run at the front of the list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn add(&self, run: &TestRun) -> Result<(), StoreError> {
        let mut list = self.list().await?;
        list.insert(0, run.clone());
        self.gateway.write_list(RUNS_KEY, &list).await
    }

    /// Runs for one agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn get_by_agent(&self, agent_id: &str) -> Result<Vec<TestRun>, StoreError> {
        let mut list = self.list().await?;
        list.retain(|r| r.agent_id == agent_id);
        Ok(list)
    }

    /// Run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn get(&self, id: &str) -> Result<Option<TestRun>, StoreError> {
        Ok(self.list().await?.into_iter().find(|r| r.id == id))
    }
}

/// Settings.
pub struct Settings<'a> {
    gateway: &'a Gateway,
}

impl Settings<'_> {
    /// The stored API key, if any and non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn api_key(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .gateway
            .store
            .get(API_KEY_KEY)
            .await?
            .filter(|k| !k.trim().is_empty()))
    }

    /// Store the API key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn set_api_key(&self, key: &str) -> Result<(), StoreError> {
        self.gateway.store.set(API_KEY_KEY, key.trim()).await
    }

    /// The theme; dark when unset or unrecognized.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn theme(&self) -> Result<Theme, StoreError> {
        Ok(self
            .gateway
            .store
            .get(THEME_KEY)
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }

    /// Store the theme.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.gateway.store.set(THEME_KEY, theme.as_str()).await
    }
}
