//! Inbound descriptor builder

use crate::business::api::NodeInfo;
use crate::core::descriptor::{
    PortRange, ShadowsocksClient, ShadowsocksSettings, SniffingConfig, StreamConfig, TcpConfig,
};
use crate::core::{ListenerDescriptor, SHADOWSOCKS};
use crate::error::{NodeError, Result};

const TCP: &str = "tcp";
const UDP: &str = "udp";

/// Listener tag, also the namespace prefix of every user key and counter
pub fn listener_tag(port: u16) -> String {
    format!("{}_{}", SHADOWSOCKS, port)
}

/// Build the inbound listener for a node.
///
/// The listener gets a single throwaway client with a random password since
/// the engine refuses a shadowsocks inbound without accounts. Real users are
/// added through the reconciler right after.
pub fn build_inbound(node: &NodeInfo) -> Result<ListenerDescriptor> {
    let settings = ShadowsocksSettings {
        clients: vec![ShadowsocksClient {
            cipher: node.cipher.clone(),
            password: uuid::Uuid::new_v4().to_string(),
            level: 0,
        }],
        network: format!("{},{}", TCP, UDP),
    };

    let settings = serde_json::to_value(&settings).map_err(|e| {
        NodeError::Build(format!("marshal proxy {} config failed: {}", SHADOWSOCKS, e))
    })?;

    Ok(ListenerDescriptor {
        tag: listener_tag(node.server_port),
        protocol: SHADOWSOCKS.to_string(),
        port_range: PortRange::single(node.server_port),
        sniffing: SniffingConfig { enabled: false },
        settings,
        stream_settings: StreamConfig {
            network: TCP.to_string(),
            tcp: TcpConfig {
                accept_proxy_protocol: false,
            },
        },
    })
}
