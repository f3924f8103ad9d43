//! TOML configuration.
//!
//! Keys follow the original deployment's camelCase layout:
//!
//! ```toml
//! [network]
//! interface = "eth0"
//! snaplen = 1600
//! serverIP = "10.0.0.1"
//!
//! [network.portRange]
//! start = 9000
//! end = 9600
//!
//! [protocol]
//! xorKey = "8f1c02a7..."
//! xorLimit = 350
//! commands = "commands.json"
//!
//! [protocol.log]
//! client = true
//! server = false
//! ```
//!
//! Unknown sections are ignored, so configs from deployments that still
//! carry retired blocks (the old embedded UI, for one) load unchanged.

use std::{net::IpAddr, path::{Path, PathBuf}};

use serde::Deserialize;
use shine_capture::{CaptureConfig, CaptureFilter};
use shine_flow::FlowConfig;
use shine_proto::{CommandSchema, ProtoError, SERVICE_PORTS, Service, ServiceMap, XorTable};
use tracing::warn;

/// Configuration file errors; all fatal at boot.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path:?}: {source}")]
    Read {
        /// Configured path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or misses required keys.
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        /// Configured path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Capture interface and filter settings.
    pub network: NetworkConfig,
    /// Protocol and decoding settings.
    pub protocol: ProtocolConfig,
}

/// `[network]` section.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Capture interface name.
    pub interface: String,
    /// Capture read buffer size.
    #[serde(default = "default_snaplen")]
    pub snaplen: usize,
    /// Game server address used in the capture filter.
    #[serde(rename = "serverIP")]
    pub server_ip: IpAddr,
    /// Service port range used in the capture filter.
    pub port_range: PortRangeConfig,
}

/// `[network.portRange]` section.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRangeConfig {
    /// First service port, inclusive.
    pub start: u16,
    /// Last service port, inclusive.
    pub end: u16,
}

/// `[protocol]` section.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolConfig {
    /// Service list overriding the stock deployment layout.
    #[serde(default)]
    pub services: Option<Vec<ServiceConfig>>,
    /// Keystream key table as hex.
    pub xor_key: String,
    /// Keystream period.
    pub xor_limit: u16,
    /// Path to the command schema file.
    #[serde(default)]
    pub commands: Option<PathBuf>,
    /// Per-direction verbose message logging.
    #[serde(default)]
    pub log: LogConfig,
}

/// One `[[protocol.services]]` entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Service port.
    pub port: u16,
    /// Service name.
    pub name: String,
}

/// `[protocol.log]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// Log every decoded client→server message.
    #[serde(default)]
    pub client: bool,
    /// Log every decoded server→client message.
    #[serde(default)]
    pub server: bool,
}

fn default_snaplen() -> usize {
    65536
}

impl Config {
    /// Load and parse a config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Parse a config from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Service map from the config, or the stock layout when absent.
    ///
    /// Entries outside the conventional service range still register (the
    /// capture filter decides what is actually seen) but get a warning
    /// since they usually mean a typo.
    pub fn service_map(&self) -> ServiceMap {
        match &self.protocol.services {
            None => ServiceMap::default(),
            Some(entries) => {
                for entry in entries {
                    if !SERVICE_PORTS.contains(&entry.port) {
                        warn!(
                            port = entry.port,
                            name = %entry.name,
                            "service port outside the conventional range"
                        );
                    }
                }
                ServiceMap::new(
                    entries.iter().map(|entry| Service::new(entry.port, entry.name.clone())),
                )
            },
        }
    }

    /// Build the validated keystream table.
    pub fn xor_table(&self) -> Result<XorTable, ProtoError> {
        XorTable::from_hex(&self.protocol.xor_key, self.protocol.xor_limit)
    }

    /// Load the command schema when one is configured.
    pub fn command_schema(&self) -> Result<Option<CommandSchema>, ProtoError> {
        self.protocol.commands.as_deref().map(CommandSchema::from_path).transpose()
    }

    /// Capture driver configuration.
    pub fn capture_config(&self) -> CaptureConfig {
        let network = &self.network;
        CaptureConfig {
            interface: network.interface.clone(),
            snaplen: network.snaplen,
            filter: CaptureFilter::new(
                network.server_ip,
                network.port_range.start..=network.port_range.end,
            ),
        }
    }

    /// Flow factory configuration.
    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            log_client: self.protocol.log.client,
            log_server: self.protocol.log.server,
            ..FlowConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [network]
        interface = "eth0"
        snaplen = 1600
        serverIP = "10.0.0.1"

        [network.portRange]
        start = 9000
        end = 9600

        [protocol]
        xorKey = "000102030405060708090a0b0c0d0e0f"
        xorLimit = 16
        commands = "commands.json"

        [[protocol.services]]
        port = 9000
        name = "Account"

        [[protocol.services]]
        port = 9010
        name = "Login"

        [protocol.log]
        client = true
        server = false
    "#;

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml(FULL).unwrap();

        assert_eq!(config.network.interface, "eth0");
        assert_eq!(config.network.snaplen, 1600);
        assert_eq!(config.network.server_ip, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(config.network.port_range.start, 9000);
        assert_eq!(config.network.port_range.end, 9600);
        assert_eq!(config.protocol.xor_limit, 16);
        assert_eq!(config.protocol.commands.as_deref(), Some(Path::new("commands.json")));
        assert!(config.protocol.log.client);
        assert!(!config.protocol.log.server);

        let services = config.service_map();
        assert_eq!(services.len(), 2);
        assert_eq!(services.name(9010).as_deref(), Some("Login"));

        assert_eq!(config.xor_table().unwrap().limit(), 16);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [network]
            interface = "eth0"
            serverIP = "10.0.0.1"
            portRange = { start = 9000, end = 9600 }

            [protocol]
            xorKey = "00010203"
            xorLimit = 4
        "#,
        )
        .unwrap();

        assert_eq!(config.network.snaplen, 65536);
        assert!(config.protocol.commands.is_none());
        assert!(!config.protocol.log.client);
        assert_eq!(config.service_map().len(), 11, "stock service layout applies");
    }

    #[test]
    fn retired_sections_are_ignored() {
        let config = Config::from_toml(
            r#"
            [network]
            interface = "eth0"
            serverIP = "10.0.0.1"
            portRange = { start = 9000, end = 9600 }

            [protocol]
            xorKey = "00010203"
            xorLimit = 4

            [ui]
            port = 8080
        "#,
        );

        assert!(config.is_ok());
    }

    #[test]
    fn bad_keystream_config_is_fatal() {
        let config = Config::from_toml(
            r#"
            [network]
            interface = "eth0"
            serverIP = "10.0.0.1"
            portRange = { start = 9000, end = 9600 }

            [protocol]
            xorKey = "not hex"
            xorLimit = 4
        "#,
        )
        .unwrap();

        assert!(config.xor_table().is_err());
    }

    #[test]
    fn missing_required_key_fails_to_parse() {
        assert!(Config::from_toml("[network]\ninterface = \"eth0\"").is_err());
    }

    #[test]
    fn capture_config_mirrors_the_filter() {
        let config = Config::from_toml(FULL).unwrap();
        let capture = config.capture_config();

        assert_eq!(capture.interface, "eth0");
        assert_eq!(capture.snaplen, 1600);
        assert!(capture.filter.expression().contains("portrange 9000-9600"));
        assert!(capture.filter.expression().contains("10.0.0.1"));
    }
}
