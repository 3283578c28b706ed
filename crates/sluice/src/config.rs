// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Engine settings, read once at startup and passed down from there.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SluiceConfig {
    pub repository: RepositoryConfigSection,
    pub registry: RegistryConfigSection,
    pub logging: LoggingConfigSection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RepositoryConfigSection {
    /// Live conversations kept before the oldest unlocked one is evicted.
    /// Shared by every caller of the repository. 0 disables the limit.
    pub max_conversations: usize,
    /// Snapshots kept per conversation. 0 disables the limit.
    pub max_snapshots: usize,
    pub lock_timeout_ms: u64,
    /// Idle time after which a conversation expires. 0 disables expiry.
    pub conversation_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RegistryConfigSection {
    pub refresh_on_change: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfigSection {
    pub filter: String,
}

impl Default for RepositoryConfigSection {
    fn default() -> Self {
        Self {
            max_conversations: 0,
            max_snapshots: 30,
            lock_timeout_ms: 30_000,
            conversation_timeout_secs: 1_800,
        }
    }
}

impl Default for RegistryConfigSection {
    fn default() -> Self {
        Self {
            refresh_on_change: true,
        }
    }
}

impl Default for LoggingConfigSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl RepositoryConfigSection {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
    pub fn conversation_timeout(&self) -> Option<Duration> {
        (self.conversation_timeout_secs > 0)
            .then(|| Duration::from_secs(self.conversation_timeout_secs))
    }
}

impl SluiceConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: SluiceConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded sluice config");
        Ok(config)
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config").join("sluice.toml")
    }

    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let path = path
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or_else(Self::default_config_path);
        if !path.exists() {
            debug!(path = %path.display(), "No sluice config found, using defaults");
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Falling back to default sluice config");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: SluiceConfig = toml::from_str(
            r#"
            [repository]
            max_snapshots = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.repository.max_snapshots, 3);
        assert_eq!(config.repository.max_conversations, 0);
        assert_eq!(config.repository.lock_timeout(), Duration::from_secs(30));
        assert!(config.registry.refresh_on_change);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn zero_timeout_disables_expiry() {
        let section = RepositoryConfigSection {
            conversation_timeout_secs: 0,
            ..RepositoryConfigSection::default()
        };
        assert!(section.conversation_timeout().is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SluiceConfig::load_or_default(Some("does/not/exist.toml"));
        assert_eq!(config, SluiceConfig::default());
    }
}
