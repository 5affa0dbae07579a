//! Listener descriptor consumed by the proxy engine

use serde::{Deserialize, Serialize};

/// Inclusive port range of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniffingConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConfig {
    pub accept_proxy_protocol: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub network: String,
    pub tcp: TcpConfig,
}

/// Everything the engine needs to open one inbound listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerDescriptor {
    pub tag: String,
    pub protocol: String,
    pub port_range: PortRange,
    pub sniffing: SniffingConfig,
    /// Protocol specific settings, already serialized
    pub settings: serde_json::Value,
    pub stream_settings: StreamConfig,
}

/// Account entry inside shadowsocks inbound settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksClient {
    pub cipher: String,
    pub password: String,
    pub level: u32,
}

/// Protocol settings of a shadowsocks inbound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksSettings {
    pub clients: Vec<ShadowsocksClient>,
    pub network: String,
}
