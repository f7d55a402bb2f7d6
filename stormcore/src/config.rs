use serde_derive::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_local_as() -> u32 {
    crate::bgp::DEFAULT_AS
}

fn default_hold_time() -> u16 {
    crate::bgp::DEFAULT_HOLD_TIME
}

fn default_teardown_time() -> u16 {
    crate::bgp::DEFAULT_TEARDOWN_TIME
}

fn default_keepalive_time() -> u16 {
    crate::ldp::DEFAULT_KEEPALIVE_TIME
}

fn default_csnp_interval() -> u64 {
    crate::isis::DEFAULT_CSNP_INTERVAL
}

fn default_lsp_tx_interval_ms() -> u64 {
    crate::isis::DEFAULT_LSP_TX_INTERVAL_MS
}

fn default_lsp_retry_interval() -> u64 {
    crate::isis::DEFAULT_LSP_RETRY_INTERVAL
}

fn default_lsp_tx_window_size() -> u16 {
    crate::isis::DEFAULT_LSP_TX_WINDOW_SIZE
}

fn default_hello_interval() -> u64 {
    crate::isis::DEFAULT_HELLO_INTERVAL
}

fn default_level() -> u8 {
    3
}

fn default_priority() -> u8 {
    64
}

fn default_metric() -> u32 {
    10
}

/// One configured BGP neighbor.
#[derive(Serialize, Deserialize, Clone)]
pub struct BgpPeerConfig {
    pub interface: String,
    pub local_address: IpAddr,
    pub peer_address: IpAddr,
    #[serde(default = "default_local_as")]
    pub local_as: u32,
    #[serde(default)]
    pub peer_as: u32,
    /// Router-id sent in the OPEN message; zero derives it from the local
    /// IPv4 address.
    #[serde(default)]
    pub router_id: u32,
    #[serde(default = "default_hold_time")]
    pub hold_time: u16,
    #[serde(default = "default_teardown_time")]
    pub teardown_time: u16,
    #[serde(default)]
    pub tos: u8,
    #[serde(default)]
    pub raw_update_file: Option<String>,
    #[serde(default = "default_true")]
    pub reconnect: bool,
}

impl Default for BgpPeerConfig {
    fn default() -> BgpPeerConfig {
        BgpPeerConfig {
            interface: String::new(),
            local_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            peer_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            local_as: default_local_as(),
            peer_as: 0,
            router_id: 0,
            hold_time: default_hold_time(),
            teardown_time: default_teardown_time(),
            tos: 0,
            raw_update_file: None,
            reconnect: true,
        }
    }
}

/// The LDP instance. Sessions hang off discovery hellos, so only speaker
/// identity and session parameters live here.
#[derive(Serialize, Deserialize, Clone)]
pub struct LdpConfig {
    pub lsr_id: Ipv4Addr,
    pub ipv4_transport_address: Ipv4Addr,
    #[serde(default)]
    pub ipv6_transport_address: Option<Ipv6Addr>,
    #[serde(default = "default_keepalive_time")]
    pub keepalive_time: u16,
    #[serde(default)]
    pub tos: u8,
    #[serde(default)]
    pub raw_update_file: Option<String>,
}

impl Default for LdpConfig {
    fn default() -> LdpConfig {
        LdpConfig {
            lsr_id: Ipv4Addr::UNSPECIFIED,
            ipv4_transport_address: Ipv4Addr::UNSPECIFIED,
            ipv6_transport_address: None,
            keepalive_time: default_keepalive_time(),
            tos: 0,
            raw_update_file: None,
        }
    }
}

/// One interface attached to the IS-IS instance.
#[derive(Serialize, Deserialize, Clone)]
pub struct IsisInterfaceConfig {
    pub name: String,
    /// Level mask: 1, 2 or 3 (both).
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default = "default_true")]
    pub p2p: bool,
    #[serde(default = "default_priority")]
    pub l1_priority: u8,
    #[serde(default = "default_priority")]
    pub l2_priority: u8,
    #[serde(default = "default_metric")]
    pub l1_metric: u32,
    #[serde(default = "default_metric")]
    pub l2_metric: u32,
    #[serde(default)]
    pub adjacency_sid: u32,
}

impl Default for IsisInterfaceConfig {
    fn default() -> IsisInterfaceConfig {
        IsisInterfaceConfig {
            name: String::new(),
            level: default_level(),
            p2p: true,
            l1_priority: default_priority(),
            l2_priority: default_priority(),
            l1_metric: default_metric(),
            l2_metric: default_metric(),
            adjacency_sid: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct IsisConfig {
    #[serde(default)]
    pub instance_id: u16,
    #[serde(default = "default_csnp_interval")]
    pub csnp_interval: u64,
    #[serde(default = "default_lsp_tx_interval_ms")]
    pub lsp_tx_interval_ms: u64,
    #[serde(default = "default_lsp_retry_interval")]
    pub lsp_retry_interval: u64,
    #[serde(default = "default_lsp_tx_window_size")]
    pub lsp_tx_window_size: u16,
    #[serde(default = "default_hello_interval")]
    pub hello_interval: u64,
    #[serde(default)]
    pub interfaces: Vec<IsisInterfaceConfig>,
}

impl Default for IsisConfig {
    fn default() -> IsisConfig {
        IsisConfig {
            instance_id: 0,
            csnp_interval: default_csnp_interval(),
            lsp_tx_interval_ms: default_lsp_tx_interval_ms(),
            lsp_retry_interval: default_lsp_retry_interval(),
            lsp_tx_window_size: default_lsp_tx_window_size(),
            hello_interval: default_hello_interval(),
            interfaces: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CoreConfig {
    #[serde(default)]
    pub bgp: Vec<BgpPeerConfig>,
    #[serde(default)]
    pub ldp: Option<LdpConfig>,
    #[serde(default)]
    pub isis: Option<IsisConfig>,
}

impl CoreConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<CoreConfig, String> {
        serdeconv::from_toml_file(path).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[bgp]]
interface = "eth0"
local_address = "10.0.0.1"
peer_address = "10.0.0.2"
local_as = 65001
raw_update_file = "updates.bin"

[ldp]
lsr_id = "10.10.10.10"
ipv4_transport_address = "10.0.0.1"
keepalive_time = 15

[isis]
csnp_interval = 10

[[isis.interfaces]]
name = "eth1"
level = 2
p2p = false
"#;

    #[test]
    fn test_parse_sample() {
        let config: CoreConfig = serdeconv::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.bgp.len(), 1);
        let bgp = &config.bgp[0];
        assert_eq!(bgp.local_as, 65001);
        assert_eq!(bgp.peer_as, 0);
        assert_eq!(bgp.hold_time, crate::bgp::DEFAULT_HOLD_TIME);
        assert_eq!(bgp.raw_update_file.as_deref(), Some("updates.bin"));
        assert!(bgp.reconnect);

        let ldp = config.ldp.unwrap();
        assert_eq!(ldp.keepalive_time, 15);
        assert_eq!(ldp.lsr_id, Ipv4Addr::new(10, 10, 10, 10));

        let isis = config.isis.unwrap();
        assert_eq!(isis.csnp_interval, 10);
        assert_eq!(isis.lsp_tx_window_size, crate::isis::DEFAULT_LSP_TX_WINDOW_SIZE);
        assert_eq!(isis.interfaces[0].level, 2);
        assert!(!isis.interfaces[0].p2p);
    }

    #[test]
    fn test_empty_config() {
        let config: CoreConfig = serdeconv::from_toml_str("").unwrap();
        assert!(config.bgp.is_empty());
        assert!(config.ldp.is_none());
        assert!(config.isis.is_none());
    }
}
