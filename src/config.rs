//! Configuration surface (C9/C12): broker config plus one YAML file per AGV.

use std::path::Path;

use config_file::FromConfigFile;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::protocol::vda5050::factsheet::{PhysicalParameters, ProtocolFeatures, ProtocolLimits, TypeSpecification};

#[derive(Deserialize, Clone, Debug)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub keepalive_secs: u64,
    pub client_id_prefix: Option<String>,
}

impl BrokerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_config_file(path).map_err(|e| ConfigError::from_parse(path, e.to_string()))
    }

    pub fn server_uri(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    /// A random suffix is appended to the configured prefix to avoid client-id
    /// collisions across bridge instances, mirroring the teacher's bare-UUID client id.
    pub fn client_id(&self) -> String {
        let prefix = self.client_id_prefix.as_deref().unwrap_or("vda5050-bridge");
        format!("{prefix}-{}", Uuid::new_v4())
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct RobotInfo {
    pub serial_number: String,
    pub manufacturer: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NetworkConfig {
    pub ip_address: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct TcpPorts {
    pub state_push: u16,
    pub movement: u16,
    pub relocation: u16,
    pub authority: u16,
    pub safety: u16,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct PublishIntervalsMs {
    pub state: Option<u64>,
    pub visualization: Option<u64>,
    pub connection: Option<u64>,
    pub factsheet: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AgvConfig {
    pub robot_info: RobotInfo,
    pub network: NetworkConfig,
    pub tcp_ports: TcpPorts,
    #[serde(default)]
    pub physical_parameters: Option<PhysicalParameters>,
    #[serde(default)]
    pub type_spec: Option<TypeSpecification>,
    #[serde(default)]
    pub protocol_limits: Option<ProtocolLimits>,
    #[serde(default)]
    pub protocol_features: Option<ProtocolFeatures>,
    #[serde(default)]
    pub publish_intervals_ms: PublishIntervalsMs,
    /// Identifier sent in the `grabAuthority` preemption packet (§4.7); defaults to the
    /// serial number when unset.
    #[serde(default)]
    pub authority_nickname: Option<String>,
}

impl AgvConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_config_file(path).map_err(|e| ConfigError::from_parse(path, e.to_string()))
    }

    pub fn authority_nickname(&self) -> &str {
        self.authority_nickname
            .as_deref()
            .unwrap_or(&self.robot_info.serial_number)
    }
}

/// Scans a directory for `*.yaml`/`*.yml` files, each parsed as an `AgvConfig`. Any
/// parse failure is fatal at startup, per spec.md §7 ("config-malformed is fatal").
pub fn load_agv_configs(dir: &Path) -> Result<Vec<AgvConfig>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut configs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if !path.is_file() || !is_yaml {
            continue;
        }
        info!(path = %path.display(), "loading AGV config");
        configs.push(AgvConfig::load(&path)?);
    }

    if configs.is_empty() {
        return Err(ConfigError::NoAgvConfigs(dir.display().to_string()));
    }

    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_nickname_defaults_to_serial() {
        let cfg = AgvConfig {
            robot_info: RobotInfo {
                serial_number: "agv-1".to_string(),
                manufacturer: "acme".to_string(),
            },
            network: NetworkConfig {
                ip_address: "127.0.0.1".to_string(),
            },
            tcp_ports: TcpPorts::default(),
            physical_parameters: None,
            type_spec: None,
            protocol_limits: None,
            protocol_features: None,
            publish_intervals_ms: PublishIntervalsMs::default(),
            authority_nickname: None,
        };
        assert_eq!(cfg.authority_nickname(), "agv-1");
    }

    #[test]
    fn broker_client_id_includes_prefix() {
        let cfg = BrokerConfig {
            host: "localhost".to_string(),
            port: 1883,
            keepalive_secs: 30,
            client_id_prefix: Some("bridge".to_string()),
        };
        assert!(cfg.client_id().starts_with("bridge-"));
    }

    #[test]
    fn missing_directory_is_a_config_error() {
        let result = load_agv_configs(Path::new("/nonexistent/path/for/test"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn serde_missing_field_message_becomes_missing_field_variant() {
        let err = crate::error::ConfigError::from_parse(
            Path::new("agv.yaml"),
            "robot_info: missing field `serialNumber` at line 2 column 3".to_string(),
        );
        match err {
            crate::error::ConfigError::MissingField { field, .. } => assert_eq!(field, "serialNumber"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn other_parse_failures_stay_generic() {
        let err = crate::error::ConfigError::from_parse(Path::new("agv.yaml"), "invalid YAML syntax".to_string());
        assert!(matches!(err, crate::error::ConfigError::Parse { .. }));
    }
}
