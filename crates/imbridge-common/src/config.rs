// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bridge configuration, layering `base.yaml` with an
//! environment-specific overlay.

use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// The runtime environment, selected via `APP_ENVIRONMENT` (default `local`).
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENVIRONMENT").ok().as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTimeouts {
    pub metadata_secs: u64,
    pub download_secs: u64,
    pub control_secs: u64,
    pub attachment_download_secs: u64,
}

impl HttpTimeouts {
    pub fn metadata(&self) -> Duration {
        Duration::from_secs(self.metadata_secs)
    }
    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }
    pub fn control(&self) -> Duration {
        Duration::from_secs(self.control_secs)
    }
    pub fn attachment_download(&self) -> Duration {
        Duration::from_secs(self.attachment_download_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            metadata_secs: 5,
            download_secs: 10,
            control_secs: 60,
            attachment_download_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Initial backfill window in days when no anchor is given.
    pub initial_sync_days: u32,
    /// Template with fields FirstName, LastName, Nickname, Phone, Email, ID.
    pub displayname_template: String,
    /// Path to the local shadow store's SQLite database file.
    pub database_path: String,
    /// Directory backing the attachment cache.
    pub attachment_cache_dir: String,
    /// `RUST_LOG`-style filter, defaulted if unset.
    pub log_filter: String,
    pub http_timeouts: HttpTimeouts,
    /// Minutes between proactive PET refreshes.
    pub pet_refresh_interval_minutes: u64,
    /// Minutes between service-delegate refreshes.
    pub delegate_refresh_interval_minutes: u64,
    /// Minutes between periodic state persistence.
    pub state_persist_interval_minutes: u64,
    /// Max concurrent attachment hydration downloads.
    pub attachment_hydration_concurrency: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            initial_sync_days: 365,
            displayname_template: "{{FirstName}} {{LastName}}".to_string(),
            database_path: "bridge.db".to_string(),
            attachment_cache_dir: "attachments".to_string(),
            log_filter: "info".to_string(),
            http_timeouts: HttpTimeouts::default(),
            pet_refresh_interval_minutes: 60,
            delegate_refresh_interval_minutes: 120,
            state_persist_interval_minutes: 5,
            attachment_hydration_concurrency: 32,
        }
    }
}

/// Load configuration from `{dir}/base.yaml` layered with
/// `{dir}/{environment}.yaml`.
pub fn get_configuration(dir: impl AsRef<Path>) -> Result<BridgeConfig, ConfigError> {
    let dir = dir.as_ref();
    let environment = Environment::from_env();
    let builder = Config::builder()
        .add_source(File::from(dir.join("base")).required(true))
        .add_source(File::from(dir.join(environment.as_str())).required(false));
    builder.build()?.try_deserialize()
}
