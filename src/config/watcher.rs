//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{read_config, validate, ConfigError};
use crate::config::schema::GateConfig;

type Overrides = Arc<dyn Fn(&mut GateConfig) + Send + Sync>;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GateConfig>,
    overrides: Overrides,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
                overrides: Arc::new(|_| {}),
            },
            update_rx,
        )
    }

    /// Apply `overrides` to every reloaded file before validation, so values
    /// supplied on the command line or environment survive a reload.
    pub fn with_overrides(
        mut self,
        overrides: impl Fn(&mut GateConfig) + Send + Sync + 'static,
    ) -> Self {
        self.overrides = Arc::new(overrides);
        self
    }

    /// Read, override and validate the file once.
    pub fn reload(&self) -> Result<GateConfig, ConfigError> {
        reload_from(&self.path, &*self.overrides)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let overrides = self.overrides;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        match reload_from(&path, &*overrides) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "Failed to reload config, keeping current configuration"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload_from(
    path: &Path,
    overrides: &(dyn Fn(&mut GateConfig) + Send + Sync),
) -> Result<GateConfig, ConfigError> {
    let mut config = read_config(path)?;
    overrides(&mut config);
    validate(config)
}
