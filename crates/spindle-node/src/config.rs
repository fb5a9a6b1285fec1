//! Node configuration.
//!
//! Values are layered: built-in defaults, then an optional file (any format
//! the `config` crate recognises by extension), then `SPINDLE_*` environment
//! variables. Nested keys use `__`, e.g. `SPINDLE_PEERS__CAR2=10.0.0.2:7400`.
//! Command-line flags are applied on top by the binary.

use crate::error::{NodeError, Result};
use crate::observability::LogFormat;
use serde::{Deserialize, Serialize};
use spindle_gossip::EngineConfig;
use spindle_types::NodeId;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default gossip listen port.
pub const DEFAULT_PORT: u16 = 7400;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SPINDLE";

/// Configuration for a Spindle node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's identity.
    pub node_id: String,
    /// TCP listen address.
    pub listen_addr: SocketAddr,
    /// Known peers, by node id.
    pub peers: BTreeMap<String, SocketAddr>,
    /// Raise the lead request at startup.
    pub lead: bool,
    /// Idle wait of the engine run loop, in milliseconds.
    pub idle_poll_ms: u64,
    /// Interval between store summaries in the log, in seconds. Zero disables.
    pub report_interval_secs: u64,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (pretty or json).
    pub log_format: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            peers: BTreeMap::new(),
            lead: false,
            idle_poll_ms: 50,
            report_interval_secs: 10,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from defaults, an optional file and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`NodeConfig::load`], reading variables from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&NodeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Checks that the configuration describes a runnable node.
    pub fn validate(&self) -> Result<()> {
        let local = self.local_id();
        if local.is_empty() {
            return Err(NodeError::InvalidConfig("node_id must not be empty".into()));
        }

        for id in self.peers.keys() {
            let peer = NodeId::new(id);
            if peer.is_empty() {
                return Err(NodeError::InvalidConfig("peer id must not be empty".into()));
            }
            if peer == local {
                return Err(NodeError::InvalidConfig(format!(
                    "peer {peer} is the local node"
                )));
            }
        }

        self.engine_config().validate()?;
        Ok(())
    }

    /// Returns the normalised local identity.
    pub fn local_id(&self) -> NodeId {
        NodeId::new(&self.node_id)
    }

    /// Returns the peers with normalised identities.
    pub fn peer_addrs(&self) -> Vec<(NodeId, SocketAddr)> {
        self.peers
            .iter()
            .map(|(id, addr)| (NodeId::new(id), *addr))
            .collect()
    }

    /// Returns the engine configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_idle_poll(Duration::from_millis(self.idle_poll_ms))
    }

    /// Returns the parsed log format.
    pub fn log_format(&self) -> LogFormat {
        LogFormat::parse(&self.log_format)
    }
}

/// Parses a `--peer` value of the form `id=host:port`.
pub fn parse_peer(s: &str) -> std::result::Result<(String, SocketAddr), String> {
    let (id, addr) = s
        .split_once('=')
        .ok_or_else(|| format!("expected id=addr, got `{s}`"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing peer id in `{s}`"));
    }
    let addr = addr
        .trim()
        .parse::<SocketAddr>()
        .map_err(|e| format!("invalid address in `{s}`: {e}"))?;
    Ok((id.to_string(), addr))
}

/// Parses a `--set` value of the form `key=value`.
pub fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("missing key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_gossip::GossipError;
    use std::io::Write;

    fn valid() -> NodeConfig {
        NodeConfig {
            node_id: "car-1".into(),
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = NodeConfig::load_with_env(None, Some(HashMap::new())).unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
node_id = "car-1"
listen_addr = "127.0.0.1:7500"
lead = true
idle_poll_ms = 20

[peers]
car-2 = "127.0.0.1:7501"
"#
        )
        .unwrap();

        let config = NodeConfig::load_with_env(Some(file.path()), Some(HashMap::new())).unwrap();

        assert_eq!(config.node_id, "car-1");
        assert_eq!(config.listen_addr, "127.0.0.1:7500".parse().unwrap());
        assert!(config.lead);
        assert_eq!(config.idle_poll_ms, 20);
        assert_eq!(
            config.peer_addrs(),
            vec![(NodeId::new("car-2"), "127.0.0.1:7501".parse().unwrap())]
        );
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "node_id = \"car-1\"\nidle_poll_ms = 20").unwrap();

        let env = HashMap::from([
            ("SPINDLE_IDLE_POLL_MS".to_string(), "75".to_string()),
            ("SPINDLE_LOG_FORMAT".to_string(), "json".to_string()),
        ]);
        let config = NodeConfig::load_with_env(Some(file.path()), Some(env)).unwrap();

        assert_eq!(config.node_id, "car-1");
        assert_eq!(config.idle_poll_ms, 75);
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = NodeConfig::load_with_env(
            Some(Path::new("/nonexistent/spindle.toml")),
            Some(HashMap::new()),
        );
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        assert!(matches!(
            NodeConfig::default().validate(),
            Err(NodeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_self_as_peer() {
        let mut config = valid();
        config
            .peers
            .insert("CAR-1".into(), "127.0.0.1:7401".parse().unwrap());
        assert!(matches!(
            config.validate(),
            Err(NodeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_poll() {
        let config = NodeConfig {
            idle_poll_ms: 0,
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(NodeError::Gossip(GossipError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_parse_peer() {
        assert_eq!(
            parse_peer("car-2=127.0.0.1:7401").unwrap(),
            ("car-2".to_string(), "127.0.0.1:7401".parse().unwrap())
        );
        assert!(parse_peer("car-2").is_err());
        assert!(parse_peer("=127.0.0.1:7401").is_err());
        assert!(parse_peer("car-2=nowhere").is_err());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("speed=42=fast").unwrap(),
            ("speed".to_string(), "42=fast".to_string())
        );
        assert!(parse_key_value("speed").is_err());
    }
}
