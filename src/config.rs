// mqa-rest - CLI tools for the MQ Appliance REST management interface
// Copyright (C) 2024 mqa-rest contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// REST management interface port used by the appliance out of the box.
pub const DEFAULT_REST_PORT: u16 = 5554;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const ENV_HOST: &str = "APPLIANCENAME";
pub const ENV_USER: &str = "APPLIANCEUSER";
pub const ENV_PASSWORD: &str = "APPLIANCEPASS";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub appliance: Option<ApplianceConfig>,
    pub verify_tls: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ApplianceConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error(
        "appliance {0} is required; pass --{0}, set {1}, or store it with `mqstatus configure`"
    )]
    MissingApplianceField(&'static str, &'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub verify_tls: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplianceTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".mqa-rest.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var("MQA_REST_CONFIG_DIR") {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("mqa-rest").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

/// Transport settings from config files, with `--insecure` and `--timeout`
/// taking precedence.
pub fn resolve_transport(
    cwd: &Path,
    insecure: bool,
    timeout_override: Option<u64>,
) -> Result<TransportConfig> {
    let merged = load(cwd)?;
    Ok(transport_from(&merged, insecure, timeout_override))
}

fn transport_from(config: &Config, insecure: bool, timeout_override: Option<u64>) -> TransportConfig {
    let timeout = timeout_override
        .or(config.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let connect_timeout = config
        .connect_timeout_secs
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
        .min(timeout);

    TransportConfig {
        verify_tls: !insecure && config.verify_tls.unwrap_or(true),
        timeout: Duration::from_secs(timeout),
        connect_timeout: Duration::from_secs(connect_timeout),
    }
}

/// Appliance connection settings: files, then environment, then `overrides`.
pub fn resolve_appliance(cwd: &Path, overrides: ApplianceConfig) -> Result<ApplianceTarget> {
    let merged = load(cwd)?;
    let from_env = ApplianceConfig {
        host: env::var(ENV_HOST).ok(),
        port: None,
        user: env::var(ENV_USER).ok(),
        password: env::var(ENV_PASSWORD).ok(),
    };
    let appliance = merge_appliance(
        merge_appliance(merged.appliance.unwrap_or_default(), from_env),
        overrides,
    );

    Ok(ApplianceTarget {
        host: appliance
            .host
            .ok_or(ConfigError::MissingApplianceField("host", ENV_HOST))?,
        port: appliance.port.unwrap_or(DEFAULT_REST_PORT),
        user: appliance
            .user
            .ok_or(ConfigError::MissingApplianceField("user", ENV_USER))?,
        password: appliance
            .password
            .ok_or(ConfigError::MissingApplianceField("password", ENV_PASSWORD))?,
    })
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

fn merge(user: Config, local: Config) -> Config {
    Config {
        appliance: match (user.appliance, local.appliance) {
            (Some(u), Some(l)) => Some(merge_appliance(u, l)),
            (Some(u), None) => Some(u),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        },
        verify_tls: local.verify_tls.or(user.verify_tls),
        timeout_secs: local.timeout_secs.or(user.timeout_secs),
        connect_timeout_secs: local.connect_timeout_secs.or(user.connect_timeout_secs),
    }
}

fn merge_appliance(base: ApplianceConfig, over: ApplianceConfig) -> ApplianceConfig {
    ApplianceConfig {
        host: over.host.or(base.host),
        port: over.port.or(base.port),
        user: over.user.or(base.user),
        password: over.password.or(base.password),
    }
}
