use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    advertised_uuid_for, DEFAULT_LINK_POLL_INTERVAL_MS, UUID_BOILER_CONTROLLER_SERVICE,
};
use crate::utils::ensure_directory_exists;

/// Link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// UUID of the boiler controller service
    pub service_uuid: Uuid,
    /// Identifier to scan for. Derived from `service_uuid` when absent.
    pub advertised_uuid: Option<Uuid>,
    /// Start scanning whenever discovery becomes idle
    pub auto_scan: bool,
    /// Connect as soon as a peripheral is discovered
    pub auto_connect: bool,
    /// How often a connected device is checked for link loss
    pub link_poll_interval_ms: u64,
    /// Default log level, overridden by `RUST_LOG`
    pub log_level: String,
    /// Step of `target +` and `target -`, in degrees
    pub target_step: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            service_uuid: UUID_BOILER_CONTROLLER_SERVICE,
            advertised_uuid: None,
            auto_scan: true,
            auto_connect: true,
            link_poll_interval_ms: DEFAULT_LINK_POLL_INTERVAL_MS,
            log_level: "info".to_string(),
            target_step: 1.0,
        }
    }
}

impl LinkConfig {
    pub fn advertised_uuid(&self) -> Uuid {
        self.advertised_uuid
            .unwrap_or_else(|| advertised_uuid_for(self.service_uuid))
    }

    pub fn link_poll_interval(&self) -> Duration {
        Duration::from_millis(self.link_poll_interval_ms.max(1))
    }

    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!(
                "Config file not found at {:?}, using default.",
                file_path
            );
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path)
            .await
            .with_context(|| format!("reading {:?}", file_path))?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("parsing {:?}", file_path))?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(dir) = file_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            ensure_directory_exists(dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize link config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;

        info!("Link config saved to {:?}.", file_path);
        Ok(())
    }
}
