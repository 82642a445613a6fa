//! Optional TOML settings file for engine tuning.
//!
//! ```toml
//! [engine]
//! workers = 16
//! batch_size = 100
//! queue_cap = 1000
//! progress_interval_secs = 5
//!
//! [notify]
//! payload = "move"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub queue_cap: Option<usize>,
    pub progress_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifySettings {
    pub payload: Option<String>,
}

impl Settings {
    /// Load a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("bad settings {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Engine configuration with file values laid over the defaults.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::default();
        let engine = &self.engine;

        if let Some(workers) = engine.workers {
            config.workers = positive("engine.workers", workers)?;
        }
        if let Some(batch_size) = engine.batch_size {
            config.batch_size = positive("engine.batch_size", batch_size)?;
        }
        if let Some(queue_cap) = engine.queue_cap {
            config.queue_cap = positive("engine.queue_cap", queue_cap)?;
        }
        if let Some(secs) = engine.progress_interval_secs {
            config.progress_interval = Duration::from_secs(secs);
        }
        if let Some(ref payload) = self.notify.payload {
            if payload.is_empty() {
                return Err(Error::Config("notify.payload must not be empty".to_string()));
            }
            config.notify_payload = payload.clone();
        }
        Ok(config)
    }
}

fn positive(name: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(Error::Config(format!("{name} must be greater than zero")));
    }
    Ok(value)
}
