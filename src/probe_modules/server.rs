//! Selection of the test server used for a whole run.
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::error::ProbeError;
use super::record::{resource_dir, strip_port, ServerDescriptor};

/// Latency charged for a probe sample that failed, matching the long-standing speedtest convention.
const FAILED_SAMPLE_PENALTY_MS: f64 = 3_600_000.0;

#[async_trait]
pub trait ServerSelector: Send + Sync {
    async fn best_server(&self) -> Result<ServerDescriptor, ProbeError>;
}

/// One entry of the Speedtest.net server list.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub url: String,
    pub name: String,
    pub country: String,
    pub sponsor: String,
    pub host: String,
}

impl ServerEntry {
    fn into_descriptor(self, latency_ms: f64) -> ServerDescriptor {
        ServerDescriptor {
            host: strip_port(&self.host).to_string(),
            name: self.name,
            country: self.country,
            sponsor: self.sponsor,
            url: self.url,
            latency_ms,
        }
    }
}

/// Picks the server with the lowest mean HTTP latency from the public server list.
pub struct SpeedtestServerSelector {
    client: reqwest::Client,
    list_url: String,
    candidates: usize,
    samples: u32,
}

impl SpeedtestServerSelector {
    pub fn new(
        list_url: impl Into<String>,
        candidates: usize,
        samples: u32,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            list_url: list_url.into(),
            candidates: candidates.max(1),
            samples: samples.max(1),
        })
    }

    async fn fetch_servers(&self) -> Result<Vec<ServerEntry>, ProbeError> {
        let response = self.client.get(&self.list_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: self.list_url.clone(),
                status,
            });
        }
        let body = response.text().await?;
        let servers: Vec<ServerEntry> = serde_json::from_str(&body)?;
        debug!(count = servers.len(), "Fetched server list.");
        Ok(servers)
    }

    /// Mean round trip to the server's `latency.txt`, in milliseconds.
    async fn probe_latency(&self, entry: &ServerEntry) -> f64 {
        let mut total_ms = 0.0;
        for _ in 0..self.samples {
            let url = format!("{}/latency.txt?x={}", resource_dir(&entry.url), rand::random::<u64>());
            let start = Instant::now();
            let sample = match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(body) if body.trim() == "test=test" => {
                        start.elapsed().as_secs_f64() * 1000.0
                    }
                    _ => FAILED_SAMPLE_PENALTY_MS,
                },
                Ok(response) => {
                    debug!(url = %url, status = %response.status(), "Latency probe rejected.");
                    FAILED_SAMPLE_PENALTY_MS
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Latency probe failed.");
                    FAILED_SAMPLE_PENALTY_MS
                }
            };
            total_ms += sample;
        }
        total_ms / f64::from(self.samples)
    }
}

#[async_trait]
impl ServerSelector for SpeedtestServerSelector {
    async fn best_server(&self) -> Result<ServerDescriptor, ProbeError> {
        let servers = self.fetch_servers().await?;

        let mut best: Option<(ServerEntry, f64)> = None;
        for entry in servers.into_iter().take(self.candidates) {
            let latency_ms = self.probe_latency(&entry).await;
            debug!(server = %entry.name, sponsor = %entry.sponsor, latency_ms, "Probed server.");
            if latency_ms >= FAILED_SAMPLE_PENALTY_MS {
                warn!(server = %entry.name, host = %entry.host, "Server did not answer latency probes.");
                continue;
            }
            if best.as_ref().map_or(true, |(_, current)| latency_ms < *current) {
                best = Some((entry, latency_ms));
            }
        }

        let (entry, latency_ms) = best.ok_or(ProbeError::NoServers)?;
        info!(
            server = %entry.name,
            country = %entry.country,
            sponsor = %entry.sponsor,
            host = %entry.host,
            latency_ms,
            "Selected best server."
        );
        Ok(entry.into_descriptor(latency_ms))
    }
}
