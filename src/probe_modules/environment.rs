//! Resolution of the client side of a run: its ISP and how it is connected.
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::ProbeError;
use super::record::{ConnectionMethod, UserIsp};

#[async_trait]
pub trait IspResolver: Send + Sync {
    /// Never fails; lookup problems resolve to [`UserIsp::Unknown`].
    async fn resolve(&self) -> UserIsp;
}

pub trait InterfaceSource: Send + Sync {
    fn interface_names(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    org: Option<String>,
}

/// Looks up the caller's organization through an ipinfo.io compatible endpoint.
pub struct IpInfoResolver {
    client: reqwest::Client,
    url: String,
}

impl IpInfoResolver {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn lookup(&self) -> Result<Option<String>, ProbeError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: self.url.clone(),
                status,
            });
        }
        let info: IpInfoResponse = response.json().await?;
        Ok(info.org.filter(|org| !org.trim().is_empty()))
    }
}

#[async_trait]
impl IspResolver for IpInfoResolver {
    async fn resolve(&self) -> UserIsp {
        match self.lookup().await {
            Ok(Some(org)) => {
                info!(isp = %org, "Resolved user ISP.");
                UserIsp::Resolved(org)
            }
            Ok(None) => {
                warn!(url = %self.url, "IP info response carried no organization.");
                UserIsp::Unknown
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Error in getting ISP information.");
                UserIsp::Unknown
            }
        }
    }
}

/// Reads the local interface list, including Windows friendly names such as "Wi-Fi".
pub struct NetdevInterfaces;

impl InterfaceSource for NetdevInterfaces {
    fn interface_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for iface in netdev::get_interfaces() {
            if let Some(friendly) = iface.friendly_name {
                names.push(friendly);
            }
            names.push(iface.name);
        }
        debug!(interfaces = ?names, "Enumerated network interfaces.");
        names
    }
}

/// Substring patterns per method, checked against lowercased interface names.
const METHOD_PATTERNS: &[(ConnectionMethod, &[&str])] = &[
    (ConnectionMethod::WiFi, &["wi-fi", "wifi", "wlan", "wlp"]),
    (ConnectionMethod::FourG, &["4g", "lte"]),
    (ConnectionMethod::FiveG, &["5g"]),
    (ConnectionMethod::MobileData, &["mobile"]),
    (ConnectionMethod::Hotspot, &["hotspot"]),
    (ConnectionMethod::Tethering, &["tether"]),
    (ConnectionMethod::Ethernet, &["ethernet", "eth", "enp", "eno", "ens"]),
];

/// Returns the highest-priority method matched by any of the interface names.
///
/// Ranking is by method, not by the order interfaces are enumerated, so the
/// result does not change when the OS lists the same interfaces differently.
pub fn detect_connection_method<S: AsRef<str>>(interface_names: &[S]) -> ConnectionMethod {
    let lowered: Vec<String> = interface_names
        .iter()
        .map(|name| name.as_ref().to_lowercase())
        .collect();

    METHOD_PATTERNS
        .iter()
        .find(|(_, patterns)| {
            lowered
                .iter()
                .any(|name| patterns.iter().any(|pattern| name.contains(pattern)))
        })
        .map(|(method, _)| *method)
        .unwrap_or(ConnectionMethod::Unknown)
}
