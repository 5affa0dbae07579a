//! HTTP API client for remote panel communication

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::models::{push_body, NodeInfo, UserInfo, UserTraffic, UsersResponse};
use crate::config::CliArgs;
use crate::core::SHADOWSOCKS;
use crate::error::{NodeError, Result};
use crate::logger::log;

/// Operations the node needs from the remote panel
#[async_trait]
pub trait PanelApi: Send + Sync {
    /// Fetch port and cipher of this node
    async fn fetch_node_info(&self) -> Result<NodeInfo>;
    /// Fetch the full authorized user list
    async fn fetch_users(&self) -> Result<Vec<UserInfo>>;
    /// Report per-user traffic
    async fn report_traffic(&self, data: &[UserTraffic]) -> Result<()>;
}

/// Configuration for the panel client
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Panel base URL (e.g., "https://panel.example.com")
    pub api_host: String,
    /// Panel API token
    pub token: String,
    /// Node ID for this server
    pub node_id: u32,
    /// API request timeout
    pub api_timeout: Duration,
}

impl PanelConfig {
    /// Create PanelConfig from CLI args
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self {
            api_host: cli.api.clone(),
            token: cli.token.clone(),
            node_id: cli.node,
            api_timeout: cli.api_timeout,
        }
    }
}

/// API manager for all remote panel operations over HTTP
pub struct ApiManager {
    client: Client,
    config: PanelConfig,
}

impl ApiManager {
    /// Create a new API manager
    pub fn new(config: PanelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.api_timeout)
            .connect_timeout(config.api_timeout)
            .build()
            .map_err(|e| NodeError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, action: &str) -> String {
        format!(
            "{}/api/v1/server/UniProxy/{}",
            self.config.api_host.trim_end_matches('/'),
            action
        )
    }

    fn query(&self) -> [(&'static str, String); 3] {
        [
            ("node_type", SHADOWSOCKS.to_string()),
            ("node_id", self.config.node_id.to_string()),
            ("token", self.config.token.clone()),
        ]
    }

    async fn get<T: DeserializeOwned>(&self, action: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(action))
            .query(&self.query())
            .send()
            .await
            .map_err(|e| NodeError::Api(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| NodeError::Api(format!("{} response read failed: {}", action, e)))?;

        if !status.is_success() {
            return Err(NodeError::Api(format!(
                "{} returned HTTP {}: {}",
                action,
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }

        log::debug!(action = action, raw_data = %String::from_utf8_lossy(&body), "Raw panel response");

        serde_json::from_slice(&body).map_err(|e| {
            NodeError::Api(format!(
                "failed to parse {} response: {} - raw_data: {}",
                action,
                e,
                String::from_utf8_lossy(&body)
            ))
        })
    }

    /// Get panel config
    pub fn panel_config(&self) -> &PanelConfig {
        &self.config
    }
}

#[async_trait]
impl PanelApi for ApiManager {
    async fn fetch_node_info(&self) -> Result<NodeInfo> {
        let node: NodeInfo = self.get("config").await?;
        log::info!(
            node_id = self.config.node_id,
            port = node.server_port,
            cipher = %node.cipher,
            "Configuration fetched"
        );
        Ok(node)
    }

    async fn fetch_users(&self) -> Result<Vec<UserInfo>> {
        let response: UsersResponse = self.get("user").await?;
        log::debug!(count = response.users.len(), "Users fetched");
        Ok(response.users)
    }

    async fn report_traffic(&self, data: &[UserTraffic]) -> Result<()> {
        if data.is_empty() {
            log::debug!("No traffic to submit");
            return Ok(());
        }

        let response = self
            .client
            .post(self.url("push"))
            .query(&self.query())
            .json(&push_body(data))
            .send()
            .await
            .map_err(|e| NodeError::Api(format!("push request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::Api(format!(
                "push returned HTTP {}",
                status.as_u16()
            )));
        }

        log::debug!(count = data.len(), "Traffic submitted successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let lower = l.to_ascii_lowercase();
                lower
                    .strip_prefix("content-length:")
                    .and_then(|v| v.trim().parse::<usize>().ok())
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn manager(api_host: String) -> ApiManager {
        ApiManager::new(PanelConfig {
            api_host,
            token: "tok".to_string(),
            node_id: 9,
            api_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let api = manager("https://panel.example.com/".to_string());
        assert_eq!(
            api.url("user"),
            "https://panel.example.com/api/v1/server/UniProxy/user"
        );
    }

    #[tokio::test]
    async fn test_fetch_node_info() {
        let (base, server) =
            serve_once("200 OK", r#"{"server_port":8388,"cipher":"aes-128-gcm"}"#).await;
        let node = manager(base).fetch_node_info().await.unwrap();
        assert_eq!(node.server_port, 8388);
        assert_eq!(node.cipher, "aes-128-gcm");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v1/server/UniProxy/config?"));
        assert!(request.contains("node_type=shadowsocks"));
        assert!(request.contains("node_id=9"));
        assert!(request.contains("token=tok"));
    }

    #[tokio::test]
    async fn test_fetch_users() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"users":[{"id":1,"uuid":"a"},{"id":2,"uuid":"b"}]}"#,
        )
        .await;
        let users = manager(base).fetch_users().await.unwrap();
        assert_eq!(
            users,
            vec![
                UserInfo { id: 1, uuid: "a".to_string() },
                UserInfo { id: 2, uuid: "b".to_string() },
            ]
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_users_http_error() {
        let (base, server) = serve_once("500 Internal Server Error", "oops").await;
        let err = manager(base).fetch_users().await.unwrap_err();
        assert!(matches!(err, NodeError::Api(_)));
        assert!(err.to_string().contains("HTTP 500"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_users_malformed_body() {
        let (base, server) = serve_once("200 OK", "not json").await;
        let err = manager(base).fetch_users().await.unwrap_err();
        assert!(err.to_string().contains("failed to parse user response"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_users_error_reply_with_success_status() {
        let (base, server) = serve_once("200 OK", r#"{"message":"token is error"}"#).await;
        let err = manager(base).fetch_users().await.unwrap_err();
        assert!(matches!(err, NodeError::Api(_)));
        assert!(err.to_string().contains("failed to parse user response"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_report_traffic_posts_push_body() {
        let (base, server) = serve_once("200 OK", r#"{"data":true}"#).await;
        manager(base)
            .report_traffic(&[UserTraffic::new(1, 100, 50)])
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/v1/server/UniProxy/push?"));
        assert!(request.ends_with(r#"{"1":[100,50]}"#));
    }

    #[tokio::test]
    async fn test_report_empty_traffic_is_noop() {
        // Nothing listens here; an attempted request would fail
        let api = manager("http://127.0.0.1:1".to_string());
        assert!(api.report_traffic(&[]).await.is_ok());
    }
}
