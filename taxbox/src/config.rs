// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::item::ContentItemRef;
use crate::registry::SessionSettings;
use crate::term::{FLAT_POPULAR_LIMIT, HIERARCHICAL_POPULAR_LIMIT};
use crate::view::cloud::{DEFAULT_LARGEST, DEFAULT_SMALLEST, DEFAULT_UNIT};
use crate::view::{CloudScale, ViewSettings};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub application_password: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

fn default_namespace() -> String {
    "wp/v2".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// The content item being edited. `id: 0` is an unsaved item.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ItemConfig {
    #[serde(default)]
    pub id: u64,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default = "default_item_rest_base")]
    pub rest_base: String,
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self {
            id: 0,
            post_type: default_post_type(),
            rest_base: default_item_rest_base(),
        }
    }
}

fn default_post_type() -> String {
    "post".to_string()
}

fn default_item_rest_base() -> String {
    "posts".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(self.level.trim()).unwrap_or(LevelFilter::Info)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    #[serde(default = "default_cloud_smallest")]
    pub smallest: f64,
    #[serde(default = "default_cloud_largest")]
    pub largest: f64,
    #[serde(default = "default_cloud_unit")]
    pub unit: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            smallest: default_cloud_smallest(),
            largest: default_cloud_largest(),
            unit: default_cloud_unit(),
        }
    }
}

fn default_cloud_smallest() -> f64 {
    DEFAULT_SMALLEST
}

fn default_cloud_largest() -> f64 {
    DEFAULT_LARGEST
}

fn default_cloud_unit() -> String {
    DEFAULT_UNIT.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PopularConfig {
    #[serde(default = "default_hierarchical_limit")]
    pub hierarchical_limit: usize,
    #[serde(default = "default_flat_limit")]
    pub flat_limit: usize,
}

impl Default for PopularConfig {
    fn default() -> Self {
        Self {
            hierarchical_limit: default_hierarchical_limit(),
            flat_limit: default_flat_limit(),
        }
    }
}

fn default_hierarchical_limit() -> usize {
    HIERARCHICAL_POPULAR_LIMIT
}

fn default_flat_limit() -> usize {
    FLAT_POPULAR_LIMIT
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub item: ItemConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub popular: PopularConfig,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join("config.yaml");
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&config_content).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to parse config file '{}': {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Loads and validates configuration at startup. A config that fails
    /// validation must not be used to open a session.
    pub fn load_and_validate(root: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(root)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::validate_api(&self.api)?;
        Self::validate_item(&self.item)?;
        Self::validate_logging(&self.logging)?;
        Self::validate_cloud(&self.cloud)?;
        Self::validate_popular(&self.popular)?;
        Ok(())
    }

    fn validate_api(api: &ApiConfig) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(api.base_url.trim()).map_err(|e| {
            ConfigError::ValidationError(format!(
                "api.base_url '{}' is not a valid URL: {}",
                api.base_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must use http or https, got: {}",
                url.scheme()
            )));
        }
        if api.namespace.trim_matches('/').is_empty() {
            return Err(ConfigError::ValidationError(
                "api.namespace cannot be empty".to_string(),
            ));
        }
        if !(1..=300).contains(&api.timeout_seconds) {
            return Err(ConfigError::ValidationError(format!(
                "api.timeout_seconds must be between 1 and 300, got: {}",
                api.timeout_seconds
            )));
        }
        if api.username.is_some() != api.application_password.is_some() {
            return Err(ConfigError::ValidationError(
                "api.username and api.application_password must be set together".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_item(item: &ItemConfig) -> Result<(), ConfigError> {
        if item.post_type.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "item.post_type cannot be empty".to_string(),
            ));
        }
        if item.rest_base.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "item.rest_base cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        LevelFilter::from_str(logging.level.trim()).map_err(|_| {
            ConfigError::ValidationError(format!(
                "logging.level must be one of off, error, warn, info, debug, trace; got: {}",
                logging.level
            ))
        })?;
        Ok(())
    }

    fn validate_cloud(cloud: &CloudConfig) -> Result<(), ConfigError> {
        if !(cloud.smallest > 0.0 && cloud.smallest <= cloud.largest) {
            return Err(ConfigError::ValidationError(format!(
                "cloud sizes must satisfy 0 < smallest <= largest, got: {} and {}",
                cloud.smallest, cloud.largest
            )));
        }
        if !cloud.largest.is_finite() {
            return Err(ConfigError::ValidationError(
                "cloud.largest must be finite".to_string(),
            ));
        }
        if cloud.unit.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "cloud.unit cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_popular(popular: &PopularConfig) -> Result<(), ConfigError> {
        if popular.hierarchical_limit < 1 || popular.flat_limit < 1 {
            return Err(ConfigError::ValidationError(format!(
                "popular limits must be at least 1, got: {} and {}",
                popular.hierarchical_limit, popular.flat_limit
            )));
        }
        Ok(())
    }

    pub fn item_ref(&self) -> ContentItemRef {
        ContentItemRef::new(self.item.id, &self.item.post_type, &self.item.rest_base)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            view: ViewSettings {
                cloud: CloudScale {
                    smallest: self.cloud.smallest,
                    largest: self.cloud.largest,
                    unit: self.cloud.unit.clone(),
                },
            },
            hierarchical_popular_limit: self.popular.hierarchical_limit,
            flat_popular_limit: self.popular.flat_limit,
        }
    }
}
