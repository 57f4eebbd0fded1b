//! Agent clients used by the broker.
//!
//! [`HttpAgentClient`] speaks the agent HTTP protocol over a fresh hyper
//! HTTP/1 connection per call; [`LocalAgentClient`] calls an in-process
//! agent directly. Neither applies a timeout: the broker owns deadlines so
//! that timeouts stay distinguishable from agent-side errors.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fog_core::{AgentSampleRequest, AgentStatus, SamplingResponse};
use http_body_util::{BodyExt, Full};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::agent::RegionAgent;
use crate::error::AgentError;
use crate::server::ApiResponse;

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Region served by the agent behind this client.
    fn region(&self) -> &str;

    async fn sample(&self, strategy: &str, request: &AgentSampleRequest) -> Result<SamplingResponse, AgentError>;
}

// ── In-process ─────────────────────────────────────────────────

pub struct LocalAgentClient {
    agent: Arc<RegionAgent>,
}

impl LocalAgentClient {
    pub fn new(agent: Arc<RegionAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl AgentClient for LocalAgentClient {
    fn region(&self) -> &str {
        self.agent.region()
    }

    async fn sample(&self, strategy: &str, request: &AgentSampleRequest) -> Result<SamplingResponse, AgentError> {
        self.agent
            .sample(strategy, request)
            .map_err(|e| AgentError::Rejected {
                region: self.agent.region().to_string(),
                kind: e.kind().to_string(),
                message: e.to_string(),
            })
    }
}

// ── HTTP ───────────────────────────────────────────────────────

pub struct HttpAgentClient {
    region: String,
    address: String,
}

impl HttpAgentClient {
    /// `address` is the agent's `host:port`.
    pub fn new(region: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// GET /samples/status
    pub async fn status(&self) -> Result<AgentStatus, AgentError> {
        self.call("GET", "/samples/status", Bytes::new()).await
    }

    fn unavailable(&self, reason: impl ToString) -> AgentError {
        AgentError::Unavailable {
            region: self.region.clone(),
            reason: reason.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, path: &str, body: Bytes) -> Result<T, AgentError> {
        let uri = format!("http://{}{path}", self.address);

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| self.unavailable(e))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| self.unavailable(e))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method(method)
            .uri(&uri)
            .header("host", &self.address)
            .header("content-type", "application/json")
            .header("user-agent", "foggrid-broker/0.1")
            .body(Full::new(body))
            .map_err(|e| self.unavailable(e))?;

        let resp = sender.send_request(req).await.map_err(|e| self.unavailable(e))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| self.unavailable(e))?
            .to_bytes();

        let parsed: ApiResponse<T> = serde_json::from_slice(&bytes).map_err(|e| {
            debug!(%uri, %status, error = %e, "undecodable agent response");
            AgentError::Rejected {
                region: self.region.clone(),
                kind: "bad_response".to_string(),
                message: format!("HTTP {status}: {e}"),
            }
        })?;

        match (parsed.success, parsed.data, parsed.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(err)) => Err(AgentError::Rejected {
                region: self.region.clone(),
                kind: err.kind,
                message: err.message,
            }),
            _ => Err(AgentError::Rejected {
                region: self.region.clone(),
                kind: "bad_response".to_string(),
                message: format!("HTTP {status} without data"),
            }),
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn sample(&self, strategy: &str, request: &AgentSampleRequest) -> Result<SamplingResponse, AgentError> {
        let body = serde_json::to_vec(request).map_err(|e| self.unavailable(e))?;
        self.call("POST", &format!("/samples/{strategy}"), Bytes::from(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::agent_router;
    use crate::store::NodeStore;
    use crate::strategy::StrategyRegistry;
    use fog_core::{NodeInfo, Resources, SampleFilter};

    fn test_agent() -> Arc<RegionAgent> {
        let nodes = (0..6)
            .map(|i| NodeInfo::new(format!("n{i}"), "eu", Resources::new().with("cpu", 500)))
            .collect();
        let strategies = StrategyRegistry::with_defaults()
            .build(&["random".to_string()])
            .unwrap();
        Arc::new(RegionAgent::new("eu", NodeStore::with_nodes(nodes), strategies))
    }

    async fn serve(agent: Arc<RegionAgent>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, agent_router(agent)).await.unwrap();
        });
        addr.to_string()
    }

    fn request(bp: u32) -> AgentSampleRequest {
        AgentSampleRequest {
            basis_points: bp,
            filter: SampleFilter::default(),
        }
    }

    #[tokio::test]
    async fn http_sample_roundtrip() {
        let addr = serve(test_agent()).await;
        let client = HttpAgentClient::new("eu", addr);

        let resp = client.sample("random", &request(5000)).await.unwrap();
        assert_eq!(resp.nodes.len(), 3);
        assert_eq!(resp.region, "eu");

        let status = client.status().await.unwrap();
        assert_eq!(status.nodes, 6);
    }

    #[tokio::test]
    async fn http_agent_error_is_rejected() {
        let addr = serve(test_agent()).await;
        let client = HttpAgentClient::new("eu", addr);

        let err = client.sample("nearest", &request(100)).await.unwrap_err();
        assert!(matches!(err, AgentError::Rejected { ref kind, .. } if kind == "unknown_strategy"));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn http_connection_refused_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = HttpAgentClient::new("eu", addr);
        let err = client.sample("random", &request(100)).await.unwrap_err();
        assert!(matches!(err, AgentError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn local_client() {
        let client = LocalAgentClient::new(test_agent());
        assert_eq!(client.region(), "eu");
        assert_eq!(client.sample("random", &request(10_000)).await.unwrap().nodes.len(), 6);
        assert!(matches!(
            client.sample("round-robin", &request(1)).await,
            Err(AgentError::Rejected { .. })
        ));
    }
}
