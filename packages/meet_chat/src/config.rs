use anyhow::{Context, Result};
use assistant_session::SessionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [reconnect]
//                    enabled = true
//
//   env var:         MEET_CHAT_RECONNECT__ENABLED=true   (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub session: SessionFileConfig,
    #[serde(default)]
    pub reconnect: ReconnectFileConfig,
}

/// Where the assistant service lives (under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_url")]
    pub url: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

/// Session buffering (under `[session]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionFileConfig {
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SessionFileConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

/// Supervisor policy after a dropped connection (under `[reconnect]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconnectFileConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_reconnect_delay_secs")]
    pub delay_secs: u64,
    #[serde(default = "default_reconnect_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_secs: default_reconnect_delay_secs(),
            max_attempts: default_reconnect_max_attempts(),
        }
    }
}

fn default_url() -> String {
    "ws://localhost:8000/ws".to_string()
}
fn default_event_buffer() -> usize {
    64
}
fn default_reconnect_delay_secs() -> u64 {
    2
}
fn default_reconnect_max_attempts() -> u32 {
    5
}

/// Build a figment that layers: defaults → config.toml → MEET_CHAT_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `MEET_CHAT_SERVER__URL=wss://host/ws`  →  `server.url = "wss://host/ws"`
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_dir.join("config.toml")))
        .merge(Env::prefixed("MEET_CHAT_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig + CLI overrides)
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub delay: Duration,
    pub max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub url: String,
    pub session: SessionOptions,
    pub reconnect: ReconnectPolicy,
}

impl ChatConfig {
    /// `url_override` and `force_reconnect` come from the command line and
    /// beat every file/env layer.
    pub fn from_file(
        fc: &FileConfig,
        url_override: Option<&str>,
        force_reconnect: bool,
    ) -> Result<Self> {
        let url = url_override.unwrap_or(&fc.server.url).to_string();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            anyhow::bail!("server url must start with ws:// or wss://, got {url:?}");
        }

        Ok(Self {
            url,
            session: SessionOptions {
                event_capacity: fc.session.event_buffer.max(1),
                ..Default::default()
            },
            reconnect: ReconnectPolicy {
                enabled: fc.reconnect.enabled || force_reconnect,
                delay: Duration::from_secs(fc.reconnect.delay_secs),
                max_attempts: fc.reconnect.max_attempts,
            },
        })
    }
}

// =============================================================================
// Directory layout (derived from --config-dir, not tunable via figment)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ClientDirs {
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ClientDirs {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".meet-chat"),
        };

        let logs_dir = config_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        info!("Config directory: {}", config_dir.display());

        Ok(Self {
            config_dir,
            logs_dir,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join("meet-chat.log")
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}
