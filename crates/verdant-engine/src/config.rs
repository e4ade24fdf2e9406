use serde::Deserialize;
use verdant_notify::dispatcher::DispatcherConfig;

/// Engine configuration, loaded from TOML by the host application.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Milliseconds between rule cache refreshes from the store.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Delivery gateway settings for the dispatcher.
    #[serde(default)]
    pub dispatch: DispatcherConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            dispatch: DispatcherConfig::default(),
        }
    }
}

fn default_refresh_interval_ms() -> u64 {
    60_000
}

impl EngineConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh_interval_ms)
    }
}
