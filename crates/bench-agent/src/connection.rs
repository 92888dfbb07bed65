//! Stateful client for one `(job, endpoint)` pair (spec.md §4.4).
//!
//! Modeled as a narrow async trait (fan-out friendly: the engine spawns one
//! task per endpoint and waits on all, never failing fast) backed by a
//! timeout-bounded `reqwest::Client`, following the same
//! `Client::builder().timeout(..)` / status-check-then-error shape used to
//! probe a remote service elsewhere in this codebase's HTTP clients.

use crate::error::{AgentError, Result};
use crate::protocol::{AgentInfo, JobSnapshot, JobState};
use crate::queue::MeasurementQueue;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(10);

/// The ten operations a `(job, endpoint)` connection supports. A trait so
/// the execution engine can be exercised against a fake agent in tests
/// without depending on `reqwest` directly.
#[async_trait]
pub trait JobConnectionOps: Send + Sync {
    fn endpoint(&self) -> &str;
    fn queue(&self) -> &MeasurementQueue;

    async fn preflight(&self) -> Result<()>;
    async fn start(&self, job_name: &str, template: &serde_json::Value) -> Result<()>;
    async fn get_state(&self) -> Result<JobState>;
    async fn try_update(&self) -> Result<JobSnapshot>;
    async fn clear_measurements(&self) -> Result<()>;
    async fn flush_measurements(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn download_assets(&self, job_name: &str, dest_dir: &Path) -> Result<()>;
    async fn download_dotnet_trace(&self, dest_path: &Path) -> Result<()>;
    async fn delete(&self) -> Result<()>;
    async fn get_info(&self) -> Result<AgentInfo>;
}

pub struct JobConnection {
    client: reqwest::Client,
    endpoint: String,
    job_id: Mutex<Option<String>>,
    info: OnceCell<AgentInfo>,
    queue: MeasurementQueue,
}

impl JobConnection {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            job_id: Mutex::new(None),
            info: OnceCell::new(),
            queue: MeasurementQueue::new(),
        }
    }

    /// Build a client matching the agent protocol's TLS allowance: HTTPS
    /// is permitted with self-signed certificates.
    pub fn build_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .build()
            .expect("reqwest client builds with default TLS backend")
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn job_id(&self) -> Result<String> {
        self.job_id
            .lock()
            .expect("job id mutex poisoned")
            .clone()
            .ok_or_else(|| AgentError::UnexpectedStatus {
                endpoint: self.endpoint.clone(),
                status: 0,
            })
    }

    async fn transport_get(&self, path: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })
    }

    async fn transport_post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })
    }

    fn check_status(&self, response: &reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AgentError::UnexpectedStatus {
                endpoint: self.endpoint.clone(),
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl JobConnectionOps for JobConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn queue(&self) -> &MeasurementQueue {
        &self.queue
    }

    async fn preflight(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("health"))
            .timeout(PREFLIGHT_TIMEOUT)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        self.check_status(&response)
    }

    async fn start(&self, job_name: &str, template: &serde_json::Value) -> Result<()> {
        let body = serde_json::json!({ "name": job_name, "template": template });
        let response = self
            .client
            .post(self.url("jobs"))
            .json(&body)
            .send()
            .await
            .map_err(|source| AgentError::StartFailed {
                job: job_name.to_string(),
                endpoint: self.endpoint.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(AgentError::UnexpectedStatus {
                endpoint: self.endpoint.clone(),
                status: response.status().as_u16(),
            });
        }
        #[derive(serde::Deserialize)]
        struct StartResponse {
            id: String,
        }
        let parsed: StartResponse = response.json().await.map_err(|source| AgentError::StartFailed {
            job: job_name.to_string(),
            endpoint: self.endpoint.clone(),
            source,
        })?;
        debug!(job = job_name, id = %parsed.id, endpoint = %self.endpoint, "job started");
        *self.job_id.lock().expect("job id mutex poisoned") = Some(parsed.id);
        Ok(())
    }

    async fn get_state(&self) -> Result<JobState> {
        let id = self.job_id()?;
        let response = self.transport_get(&format!("jobs/{id}/state")).await?;
        self.check_status(&response)?;
        response
            .json()
            .await
            .map_err(|source| AgentError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })
    }

    async fn try_update(&self) -> Result<JobSnapshot> {
        let id = self.job_id()?;
        let response = self.transport_get(&format!("jobs/{id}")).await?;
        self.check_status(&response)?;
        let snapshot: JobSnapshot = response.json().await.map_err(|source| AgentError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        self.queue.append(snapshot.measurements.clone());
        Ok(snapshot)
    }

    async fn clear_measurements(&self) -> Result<()> {
        let id = self.job_id()?;
        let response = self
            .transport_post(&format!("jobs/{id}/clear"), &serde_json::json!({}))
            .await?;
        self.check_status(&response)?;
        self.queue.clear();
        Ok(())
    }

    async fn flush_measurements(&self) -> Result<()> {
        let id = self.job_id()?;
        let response = self
            .transport_post(&format!("jobs/{id}/flush"), &serde_json::json!({}))
            .await?;
        self.check_status(&response)
    }

    async fn stop(&self) -> Result<()> {
        let id = self.job_id()?;
        let response = self
            .transport_post(&format!("jobs/{id}/stop"), &serde_json::json!({}))
            .await?;
        self.check_status(&response)
    }

    async fn download_assets(&self, job_name: &str, dest_dir: &Path) -> Result<()> {
        let id = self.job_id()?;
        match self.transport_get(&format!("jobs/{id}/assets")).await {
            Ok(response) if response.status().is_success() => {
                let bytes = response.bytes().await.map_err(|source| AgentError::Transport {
                    endpoint: self.endpoint.clone(),
                    source,
                })?;
                std::fs::create_dir_all(dest_dir)?;
                std::fs::write(dest_dir.join(format!("{job_name}.assets")), bytes)?;
                Ok(())
            }
            Ok(response) => {
                warn!(job = job_name, status = %response.status(), "asset download failed, continuing");
                Ok(())
            }
            Err(source) => {
                warn!(job = job_name, error = %source, "asset download transport error, continuing");
                Ok(())
            }
        }
    }

    async fn download_dotnet_trace(&self, dest_path: &Path) -> Result<()> {
        let id = self.job_id()?;
        let response = self
            .client
            .get(self.url(&format!("jobs/{id}/trace")))
            .send()
            .await
            .map_err(|source| AgentError::TraceFailed {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(AgentError::UnexpectedStatus {
                endpoint: self.endpoint.clone(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|source| AgentError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        let tmp_path = dest_path.with_extension("part");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, dest_path)?;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let id = self.job_id()?;
        let response = self
            .client
            .delete(self.url(&format!("jobs/{id}")))
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        self.check_status(&response)
    }

    async fn get_info(&self) -> Result<AgentInfo> {
        if let Some(cached) = self.info.get() {
            return Ok(cached.clone());
        }
        let response = self.transport_get("info").await?;
        self.check_status(&response)?;
        let info: AgentInfo = response.json().await.map_err(|source| AgentError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        let _ = self.info.set(info.clone());
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_endpoint_and_path_without_doubling_slashes() {
        let client = JobConnection::build_client();
        let conn = JobConnection::new(client, "http://a.example/");
        assert_eq!(conn.url("jobs"), "http://a.example/jobs");
        assert_eq!(conn.url("/jobs"), "http://a.example/jobs");
    }

    #[test]
    fn job_id_is_unset_until_started() {
        let client = JobConnection::build_client();
        let conn = JobConnection::new(client, "http://a.example/");
        assert!(conn.job_id().is_err());
    }
}
