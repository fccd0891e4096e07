//! HTTP/TCP transport against real nodes.
//!
//! # Responsibilities
//! - Consensus tier: etcd v2-style `/health`, `/v2/stats/self`, `/v2/keys`
//! - Serving tier: status agent `/liveness`, `/status`, `/records`
//! - Router tier: TCP passthrough connect, optional stats page
//!
//! # Design Decisions
//! - A fresh client with no idle pool per call, so no connection crosses
//!   probe boundaries and one slow node cannot hold another's socket
//! - Non-2xx answers are `ProbeError::Status`, undecodable bodies `Malformed`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::net::TcpStream;

use crate::probe::transport::{ConsensusSelf, NodeTransport, ServingStatus};
use crate::probe::ProbeError;
use crate::topology::{NodeDescriptor, TierKind};

const LEADER_STATE: &str = "StateLeader";

#[derive(Debug, Deserialize)]
struct SelfStats {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: String,
    state: String,
    #[serde(rename = "leaderInfo", default)]
    leader_info: Option<LeaderInfo>,
}

#[derive(Debug, Deserialize)]
struct LeaderInfo {
    #[serde(default)]
    leader: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyResponse {
    node: KeyNode,
}

#[derive(Debug, Deserialize)]
struct KeyNode {
    value: Option<String>,
}

/// Transport speaking to real nodes over the network.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    fn client(&self) -> Result<reqwest::Client, ProbeError> {
        reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .timeout(self.request_timeout)
            .user_agent("cluster-sentinel")
            .build()
            .map_err(|e| ProbeError::Connection(format!("client setup failed: {}", e)))
    }

    fn url(node: &NodeDescriptor, path: &str) -> Result<reqwest::Url, ProbeError> {
        node.api_url(path)
            .map_err(|e| ProbeError::Malformed(format!("bad url for {}: {}", node.name, e)))
    }

    fn map_error(&self, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout(self.request_timeout)
        } else if e.is_decode() {
            ProbeError::Malformed(e.to_string())
        } else {
            ProbeError::Connection(e.to_string())
        }
    }

    async fn get(&self, url: reqwest::Url) -> Result<reqwest::Response, ProbeError> {
        self.client()?.get(url).send().await.map_err(|e| self.map_error(e))
    }

    async fn expect_success(&self, url: reqwest::Url) -> Result<reqwest::Response, ProbeError> {
        let response = self.get(url.clone()).await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn liveness(&self, node: &NodeDescriptor) -> Result<(), ProbeError> {
        match node.kind() {
            TierKind::Serving => {
                self.expect_success(Self::url(node, "liveness")?).await?;
                Ok(())
            }
            TierKind::Consensus => {
                let response = self.expect_success(Self::url(node, "health")?).await?;
                let body: serde_json::Value = response.json().await.map_err(|e| self.map_error(e))?;
                let healthy = match body.get("health") {
                    Some(serde_json::Value::String(s)) => s == "true",
                    Some(serde_json::Value::Bool(b)) => *b,
                    _ => false,
                };
                if healthy {
                    Ok(())
                } else {
                    Err(ProbeError::Malformed(format!("health endpoint reported {}", body)))
                }
            }
            TierKind::Router => {
                let stream = TcpStream::connect(node.address())
                    .await
                    .map_err(|e| ProbeError::Connection(e.to_string()))?;
                drop(stream);
                Ok(())
            }
        }
    }

    async fn serving_status(&self, node: &NodeDescriptor) -> Result<ServingStatus, ProbeError> {
        let response = self.expect_success(Self::url(node, "status")?).await?;
        response.json::<ServingStatus>().await.map_err(|e| self.map_error(e))
    }

    async fn consensus_self(&self, node: &NodeDescriptor) -> Result<ConsensusSelf, ProbeError> {
        let response = self.expect_success(Self::url(node, "v2/stats/self")?).await?;
        let stats: SelfStats = response.json().await.map_err(|e| self.map_error(e))?;
        let leader_id = stats
            .leader_info
            .and_then(|info| info.leader)
            .filter(|leader| !leader.is_empty());

        Ok(ConsensusSelf {
            name: stats.name,
            is_leader: stats.state == LEADER_STATE,
            state: stats.state,
            member_id: stats.id,
            leader_id,
        })
    }

    async fn router_stats(&self, node: &NodeDescriptor) -> Result<(), ProbeError> {
        let url = node
            .stats_url
            .clone()
            .ok_or_else(|| ProbeError::Unsupported(format!("{} has no stats page", node.name)))?;
        self.expect_success(url).await?;
        Ok(())
    }

    async fn write(&self, node: &NodeDescriptor, key: &str, value: &str) -> Result<(), ProbeError> {
        let request = match node.kind() {
            TierKind::Consensus => self
                .client()?
                .put(Self::url(node, &format!("v2/keys/{}", key))?)
                .form(&[("value", value)]),
            TierKind::Serving => self
                .client()?
                .put(Self::url(node, &format!("records/{}", key))?)
                .body(value.to_string()),
            TierKind::Router => {
                return Err(ProbeError::Unsupported("routers do not accept writes".into()));
            }
        };

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(ProbeError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            }),
        }
    }

    async fn read(&self, node: &NodeDescriptor, key: &str) -> Result<Option<String>, ProbeError> {
        let url = match node.kind() {
            TierKind::Consensus => Self::url(node, &format!("v2/keys/{}?quorum=false", key))?,
            TierKind::Serving => Self::url(node, &format!("records/{}", key))?,
            TierKind::Router => {
                return Err(ProbeError::Unsupported("routers do not serve reads".into()));
            }
        };

        let response = self.get(url.clone()).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProbeError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        match node.kind() {
            TierKind::Consensus => {
                let body: KeyResponse = response.json().await.map_err(|e| self.map_error(e))?;
                Ok(body.node.value)
            }
            _ => response.text().await.map(Some).map_err(|e| self.map_error(e)),
        }
    }
}
