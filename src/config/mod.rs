//! Configuration management
//!
//! Layers, lowest first: built-in defaults, `<config_dir>/config.{toml,json,yaml}`,
//! `VSB_*` environment variables (`__` separates nested keys, e.g.
//! `VSB_MQTT__HOST`), then the plain `SERVER_URL` / `SERVER_PORT` overrides.

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::BridgeOptions;
use crate::channel::ReconnectPolicy;
use crate::protocol::DEFAULT_PORT;

const APP_DIR_NAME: &str = "volumio-speakers-bridge";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address of the Volumio device that serves the multiroom roster
    #[serde(default, alias = "serverURL", alias = "serverurl")]
    pub server_url: Option<String>,

    /// Websocket port for the roster and for every zone
    #[serde(default = "default_server_port", alias = "serverPort", alias = "serverport")]
    pub server_port: u16,

    /// Publish a contact sensor per zone that is closed while playing
    #[serde(default, alias = "playbackSensor", alias = "playbacksensor")]
    pub playback_sensor: bool,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,
}

fn default_server_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            server_port: DEFAULT_PORT,
            playback_sensor: false,
            reconnect: ReconnectConfig::default(),
            mqtt: MqttConfig::default(),
        }
    }
}

impl Config {
    /// Roster server address, if set to something non-blank
    pub fn server_url(&self) -> Option<&str> {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            server_url: self.server_url().map(str::to_string),
            server_port: self.server_port,
            playback_sensor: self.playback_sensor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Unlimited when absent
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        let initial = Duration::from_millis(self.initial_delay_ms.max(1));
        let max = Duration::from_millis(self.max_delay_ms).max(initial);
        ReconnectPolicy::new(initial, max, self.max_attempts)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker host; MQTT stays off without it
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "volumio-speakers".to_string()
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_mqtt_port(),
            username: None,
            password: None,
            topic_prefix: default_topic_prefix(),
        }
    }
}

/// Get config directory (VSB_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VSB_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library/Application Support")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (VSB_SERVER_URL, VSB_MQTT__HOST, etc.)
        .add_source(
            ::config::Environment::with_prefix("VSB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Plain SERVER_URL / SERVER_PORT win over everything (container setups)
    if let Ok(url) = std::env::var("SERVER_URL") {
        builder = builder.set_override("server_url", url)?;
    }
    if let Ok(port) = std::env::var("SERVER_PORT") {
        match port.parse::<u16>() {
            Ok(port_num) => builder = builder.set_override("server_port", port_num as i64)?,
            Err(_) => tracing::warn!("Ignoring invalid SERVER_PORT: {}", port),
        }
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
