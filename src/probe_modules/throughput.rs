//! Download/upload throughput measurement against a Speedtest.net style server.
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::error::ProbeError;
use super::record::ServerDescriptor;

/// Filler repeated to build upload bodies.
const UPLOAD_FILLER: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[async_trait]
pub trait ThroughputMeter: Send + Sync {
    /// Achieved download rate in bits per second.
    async fn download(&self, server: &ServerDescriptor) -> Result<f64, ProbeError>;
    /// Achieved upload rate in bits per second.
    async fn upload(&self, server: &ServerDescriptor) -> Result<f64, ProbeError>;
}

pub struct HttpThroughputMeter {
    client: reqwest::Client,
    download_sizes: Vec<u32>,
    upload_sizes: Vec<usize>,
}

impl HttpThroughputMeter {
    pub fn new(
        download_sizes: Vec<u32>,
        upload_sizes: Vec<usize>,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            download_sizes,
            upload_sizes,
        })
    }

    async fn fetch_counting(&self, url: &str) -> Result<u64, ProbeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status,
            });
        }

        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            received += chunk?.len() as u64;
        }
        Ok(received)
    }

    async fn post_payload(&self, url: &str, size: usize) -> Result<u64, ProbeError> {
        let body = upload_body(size);
        let sent = body.len() as u64;
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status,
            });
        }
        // Drain the reply so the connection is released.
        let _ = response.bytes().await?;
        Ok(sent)
    }
}

/// Builds a `content1=` form body of exactly `size` bytes (or the prefix alone when smaller).
pub(crate) fn upload_body(size: usize) -> Vec<u8> {
    const PREFIX: &[u8] = b"content1=";
    let mut body = Vec::with_capacity(size.max(PREFIX.len()));
    body.extend_from_slice(PREFIX);
    while body.len() < size {
        let remaining = size - body.len();
        let take = remaining.min(UPLOAD_FILLER.len());
        body.extend_from_slice(&UPLOAD_FILLER[..take]);
    }
    body
}

fn bits_per_second(bytes: u64, elapsed: Duration) -> Result<f64, ProbeError> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return Err(ProbeError::InvalidMeasurement(
            "transfer completed too fast to measure".to_string(),
        ));
    }
    Ok(bytes as f64 * 8.0 / secs)
}

#[async_trait]
impl ThroughputMeter for HttpThroughputMeter {
    async fn download(&self, server: &ServerDescriptor) -> Result<f64, ProbeError> {
        let start = Instant::now();
        let mut total_bytes: u64 = 0;
        for size in &self.download_sizes {
            let url = format!(
                "{}/random{size}x{size}.jpg?x={}",
                server.base_url(),
                rand::random::<u64>()
            );
            let bytes = self.fetch_counting(&url).await?;
            debug!(url = %url, bytes, "Download chunk finished.");
            total_bytes += bytes;
        }
        let rate = bits_per_second(total_bytes, start.elapsed())?;
        info!(bytes = total_bytes, mbps = rate / 1_000_000.0, "Download measurement complete.");
        Ok(rate)
    }

    async fn upload(&self, server: &ServerDescriptor) -> Result<f64, ProbeError> {
        let url = format!("{}?x={}", server.url, rand::random::<u64>());
        let start = Instant::now();
        let mut total_bytes: u64 = 0;
        for size in &self.upload_sizes {
            let bytes = self.post_payload(&url, *size).await?;
            debug!(url = %url, bytes, "Upload chunk finished.");
            total_bytes += bytes;
        }
        let rate = bits_per_second(total_bytes, start.elapsed())?;
        info!(bytes = total_bytes, mbps = rate / 1_000_000.0, "Upload measurement complete.");
        Ok(rate)
    }
}
