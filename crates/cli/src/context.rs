//! Application context - wires the engine to the data directory

use anyhow::Context;
use secops_core::{Address, Bytes32};
use secops_engine::{
    Engine, EngineConfig, Host, InMemoryRail, InvocationFailure, SystemClock, TargetInvoker,
};
use secops_journal::JournalWriter;
use secops_store::StateStore;
use std::path::{Path, PathBuf};

/// Invoker for the command line: nothing is executed, the call is logged
/// and answered with the digest of its call data
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInvoker;

impl TargetInvoker for LoggingInvoker {
    fn invoke(
        &mut self,
        target: Address,
        value: u128,
        gas_limit: u64,
        call_data: &[u8],
    ) -> Result<Vec<u8>, InvocationFailure> {
        let digest = Bytes32::digest(call_data);
        tracing::info!(
            %target,
            value,
            gas_limit,
            call_data = %hex::encode(call_data),
            result = %digest,
            "Invoking target"
        );
        Ok(digest.as_bytes().to_vec())
    }
}

/// Application context - one engine instance per data directory
pub struct AppContext {
    config: EngineConfig,
    db_path: PathBuf,
    journal_path: PathBuf,
    engine: Option<Engine>,
}

impl AppContext {
    /// Open the data directory, loading the engine if it was initialized
    ///
    /// `config_path` defaults to `<data>/secops.json` when that file exists.
    pub fn new(data_path: impl AsRef<Path>, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let data_path = data_path.as_ref();
        std::fs::create_dir_all(data_path)
            .with_context(|| format!("Cannot create data directory {}", data_path.display()))?;

        let default_config = data_path.join("secops.json");
        let config = match config_path {
            Some(path) => EngineConfig::from_file(path)?,
            None if default_config.exists() => EngineConfig::from_file(&default_config)?,
            None => EngineConfig::default(),
        }
        .apply_env()?;

        let mut ctx = Self {
            config,
            db_path: data_path.join("secops.db"),
            journal_path: data_path.join("journal"),
            engine: None,
        };

        let store = StateStore::new(&ctx.db_path)?;
        if store.is_initialized()? {
            ctx.engine = Some(Engine::open(store, ctx.host()?)?);
        }

        Ok(ctx)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Create the instance with its protected roles
    pub fn initialize(
        &mut self,
        owner: Address,
        broadcaster: Address,
        recovery: Address,
    ) -> anyhow::Result<&mut Engine> {
        if self.engine.is_some() {
            anyhow::bail!("Engine already initialized in {}", self.db_path.display());
        }

        let store = StateStore::new(&self.db_path)?;
        let engine = Engine::initialize(store, self.host()?, &self.config, owner, broadcaster, recovery)?;
        Ok(self.engine.insert(engine))
    }

    pub fn engine(&self) -> anyhow::Result<&Engine> {
        self.engine
            .as_ref()
            .context("Engine not initialized, run `secops init` first")
    }

    pub fn engine_mut(&mut self) -> anyhow::Result<&mut Engine> {
        self.engine
            .as_mut()
            .context("Engine not initialized, run `secops init` first")
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    fn host(&self) -> anyhow::Result<Host> {
        let host = Host::new(SystemClock, LoggingInvoker, InMemoryRail::new());
        if !self.config.journal_enabled {
            return Ok(host);
        }
        Ok(host.with_journal(JournalWriter::new(&self.journal_path)?))
    }
}
