//! Configuration loading and typed config structures for the anchor hub.
//!
//! The canonical configuration lives in `meshwatch-config.yaml` in the
//! working directory. Every field has a default, so an empty or missing
//! file yields a working hub on the standard ports.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level anchor configuration.
///
/// Mirrors the structure of `meshwatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnchorConfig {
    /// Listening addresses for reporters and viewers.
    #[serde(default)]
    pub listen: ListenConfig,

    /// Hub buffer and framing limits.
    #[serde(default)]
    pub hub: HubSettings,

    /// Alarm store settings.
    #[serde(default)]
    pub alarms: AlarmConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AnchorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment overrides are not applied; see
    /// [`AnchorConfig::apply_env_overrides`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override selected values with environment variables when set:
    /// - `ALARM_STORE_URL` overrides `alarms.store_url`
    /// - `REPORTER_PORT` overrides `listen.reporter_port`
    /// - `VIEWER_PORT` overrides `listen.viewer_port`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ALARM_STORE_URL") {
            self.alarms.store_url = val;
        }
        if let Some(port) = port_from_env("REPORTER_PORT") {
            self.listen.reporter_port = port;
        }
        if let Some(port) = port_from_env("VIEWER_PORT") {
            self.listen.viewer_port = port;
        }
    }
}

fn port_from_env(name: &str) -> Option<u16> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u16>() {
        Ok(port) => Some(port),
        Err(e) => {
            tracing::warn!(var = name, value = %raw, error = %e, "ignoring invalid port override");
            None
        }
    }
}

/// Listening addresses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// Interface the reporter listener binds to.
    #[serde(default = "default_host")]
    pub reporter_host: String,

    /// TCP port for reporter links.
    #[serde(default = "default_reporter_port")]
    pub reporter_port: u16,

    /// Interface the viewer server binds to.
    #[serde(default = "default_host")]
    pub viewer_host: String,

    /// HTTP/WebSocket port for viewers.
    #[serde(default = "default_viewer_port")]
    pub viewer_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            reporter_host: default_host(),
            reporter_port: default_reporter_port(),
            viewer_host: default_host(),
            viewer_port: default_viewer_port(),
        }
    }
}

/// Buffering and framing limits of the hub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubSettings {
    /// Outbound queue length per viewer. A viewer whose queue is full
    /// when an event is fanned out is disconnected.
    #[serde(default = "default_viewer_buffer")]
    pub viewer_buffer: usize,

    /// Queued console commands per reporter link.
    #[serde(default = "default_reporter_command_buffer")]
    pub reporter_command_buffer: usize,

    /// Largest accepted reporter frame body in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Whether reporter ids include the remote port (`addr:port`) or
    /// only the remote address.
    #[serde(default = "default_true")]
    pub reporter_id_includes_port: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            viewer_buffer: default_viewer_buffer(),
            reporter_command_buffer: default_reporter_command_buffer(),
            max_frame_bytes: default_max_frame_bytes(),
            reporter_id_includes_port: true,
        }
    }
}

/// Alarm store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlarmConfig {
    /// Whether alarms are written to the external store.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redis/Dragonfly URL of the alarm store.
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Channel on which new alarm keys are published.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Prefix of generated alarm ids (`<prefix>_<unix seconds>`).
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Source label written into every record.
    #[serde(default = "default_source")]
    pub source: String,

    /// `subject` hash field written next to the payload.
    #[serde(default = "default_subject")]
    pub subject: String,

    /// `unmarshaller` hash field written next to the payload.
    #[serde(default = "default_unmarshaller")]
    pub unmarshaller: String,

    /// Description used for `crit` alarms.
    #[serde(default = "default_critical_description")]
    pub critical_description: String,

    /// Description used for `evt` alarms.
    #[serde(default = "default_event_description")]
    pub event_description: String,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_url: default_store_url(),
            channel: default_channel(),
            id_prefix: default_id_prefix(),
            source: default_source(),
            subject: default_subject(),
            unmarshaller: default_unmarshaller(),
            critical_description: default_critical_description(),
            event_description: default_event_description(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
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

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_reporter_port() -> u16 {
    23511
}

const fn default_viewer_port() -> u16 {
    12345
}

const fn default_viewer_buffer() -> usize {
    256
}

const fn default_reporter_command_buffer() -> usize {
    32
}

const fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_store_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_channel() -> String {
    "input".to_owned()
}

fn default_id_prefix() -> String {
    "fence01".to_owned()
}

fn default_source() -> String {
    "fnode_023".to_owned()
}

fn default_subject() -> String {
    "safest".to_owned()
}

fn default_unmarshaller() -> String {
    "de.fraunhofer.fokus.safest.model.SafestEntityUnmarshaller".to_owned()
}

fn default_critical_description() -> String {
    "Intrusion Alert".to_owned()
}

fn default_event_description() -> String {
    "Warning, possible security breach".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AnchorConfig::default();
        assert_eq!(config.listen.reporter_port, 23511);
        assert_eq!(config.listen.viewer_port, 12345);
        assert_eq!(config.hub.viewer_buffer, 256);
        assert!(config.hub.reporter_id_includes_port);
        assert_eq!(config.alarms.channel, "input");
        assert_eq!(config.alarms.id_prefix, "fence01");
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
listen:
  reporter_host: "127.0.0.1"
  reporter_port: 4000
  viewer_host: "127.0.0.1"
  viewer_port: 4001

hub:
  viewer_buffer: 8
  reporter_command_buffer: 4
  max_frame_bytes: 1024
  reporter_id_includes_port: false

alarms:
  enabled: false
  channel: "alarms"
  id_prefix: "gate02"
  source: "fnode_100"
  critical_description: "Fence cut"

logging:
  level: "debug"
"#;

        let config = AnchorConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.listen.reporter_host, "127.0.0.1");
        assert_eq!(config.listen.reporter_port, 4000);
        assert_eq!(config.listen.viewer_port, 4001);
        assert_eq!(config.alarms.store_url, "redis://localhost:6379");
        assert_eq!(config.hub.viewer_buffer, 8);
        assert_eq!(config.hub.max_frame_bytes, 1024);
        assert!(!config.hub.reporter_id_includes_port);
        assert!(!config.alarms.enabled);
        assert_eq!(config.alarms.channel, "alarms");
        assert_eq!(config.alarms.critical_description, "Fence cut");
        // Unset alarm fields keep their defaults.
        assert_eq!(config.alarms.subject, "safest");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "hub:\n  viewer_buffer: 3\n";
        let config = AnchorConfig::parse(yaml).ok().unwrap_or_default();
        assert_eq!(config.hub.viewer_buffer, 3);
        assert_eq!(config.hub.reporter_command_buffer, 32);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(AnchorConfig::parse("").is_ok());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("meshwatch-config.yaml");
        if path.exists() {
            let config = AnchorConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
