//! State file and configuration loading

use anyhow::{bail, Context};
use claimpool_core::{ClaimPool, InMemoryLedger, PoolConfig, PoolState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `CLAIMPOOL__PENALTY_BPS=300`
pub const ENV_PREFIX: &str = "CLAIMPOOL";

/// Everything persisted between invocations
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    pub state: PoolState,
    pub ledger: InMemoryLedger,
}

impl StateFile {
    pub fn new(config: PoolConfig) -> Self {
        Self { state: PoolState::new(config), ledger: InMemoryLedger::new() }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!("reading state file {:?} (run `claimpool init` first)", path)
        })?;
        let file: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {:?}", path))?;
        Ok(file)
    }

    /// Write atomically: temp file in the same directory, then rename
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path).with_context(|| format!("writing state file {:?}", path))?;
        Ok(())
    }

    pub fn into_pool(self) -> ClaimPool<InMemoryLedger> {
        ClaimPool::new(self.state, self.ledger)
    }

    pub fn from_pool(pool: ClaimPool<InMemoryLedger>) -> Self {
        let (state, ledger) = pool.into_parts();
        Self { state, ledger }
    }
}

/// Layer an optional TOML file and `CLAIMPOOL__*` environment variables over
/// the defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PoolConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        if !path.exists() {
            bail!("config file not found: {:?}", path);
        }
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .context("loading configuration")?;

    let pool_config: PoolConfig = settings
        .try_deserialize()
        .context("invalid configuration")?;
    pool_config.validate()?;
    Ok(pool_config)
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
