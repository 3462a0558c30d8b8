use {
    anyhow::{Context, Result},
    serde::Deserialize,
};

/// Gateway settings loaded from a TOML file, with CLI flags layered on
/// top by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// SQLite connection string.
    pub database_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8090".to_string(),
            database_url: "sqlite://omnidesk.db?mode=rwc".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}
