//! Measurement data carried through a run.
use std::fmt;

use super::error::ProbeError;

/// The test server picked once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDescriptor {
    pub name: String,
    pub country: String,
    /// Organization operating the server.
    pub sponsor: String,
    /// Host name or address, without a port.
    pub host: String,
    /// Upload endpoint; the other endpoints live in the same directory.
    pub url: String,
    pub latency_ms: f64,
}

impl ServerDescriptor {
    /// URL of the directory holding the server's test resources, without a trailing slash.
    pub fn base_url(&self) -> &str {
        resource_dir(&self.url)
    }
}

/// Directory part of an endpoint URL, without a trailing slash.
pub fn resource_dir(url: &str) -> &str {
    let path_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[path_start..].rfind('/') {
        Some(idx) => &url[..path_start + idx],
        None => url,
    }
}

/// Strips a trailing `:port` from a `host:port` string. Bracketed IPv6 hosts keep their address.
pub fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIsp {
    Resolved(String),
    /// The lookup failed or the response carried no organization.
    Unknown,
}

impl fmt::Display for UserIsp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserIsp::Resolved(org) => f.write_str(org),
            UserIsp::Unknown => f.write_str("Unknown ISP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMethod {
    WiFi,
    FourG,
    FiveG,
    MobileData,
    Hotspot,
    Tethering,
    Ethernet,
    Unknown,
}

impl fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionMethod::WiFi => "Wi-Fi",
            ConnectionMethod::FourG => "4G",
            ConnectionMethod::FiveG => "5G",
            ConnectionMethod::MobileData => "Mobile Data",
            ConnectionMethod::Hotspot => "Hotspot",
            ConnectionMethod::Tethering => "Tethering",
            ConnectionMethod::Ethernet => "Ethernet",
            ConnectionMethod::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTrace {
    Hops(Vec<String>),
    /// The tracer could not run or exited with a failure; holds its error text.
    Failed(String),
}

impl RouteTrace {
    pub fn lines(&self) -> Vec<String> {
        match self {
            RouteTrace::Hops(hops) => hops.clone(),
            RouteTrace::Failed(message) => vec![format!("Error: {message}")],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RouteTrace::Failed(_))
    }
}

/// One completed measurement trial.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub server_name: String,
    pub server_host: String,
    pub country: String,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub latency_ms: f64,
    pub server_isp: String,
    pub user_isp: UserIsp,
    pub connection_method: ConnectionMethod,
    pub duration_secs: f64,
    pub route: RouteTrace,
}

/// Measured values of a single iteration, before they are joined with the run context.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub duration_secs: f64,
    pub route: RouteTrace,
}

impl IterationRecord {
    pub fn new(
        server: &ServerDescriptor,
        user_isp: &UserIsp,
        connection_method: ConnectionMethod,
        measurement: Measurement,
    ) -> Result<Self, ProbeError> {
        check_quantity("download", measurement.download_mbps)?;
        check_quantity("upload", measurement.upload_mbps)?;
        check_quantity("latency", server.latency_ms)?;
        check_quantity("duration", measurement.duration_secs)?;

        Ok(Self {
            server_name: server.name.clone(),
            server_host: server.host.clone(),
            country: server.country.clone(),
            download_mbps: measurement.download_mbps,
            upload_mbps: measurement.upload_mbps,
            latency_ms: server.latency_ms,
            server_isp: server.sponsor.clone(),
            user_isp: user_isp.clone(),
            connection_method,
            duration_secs: measurement.duration_secs,
            route: measurement.route,
        })
    }
}

fn check_quantity(name: &str, value: f64) -> Result<(), ProbeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ProbeError::InvalidMeasurement(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationFailure {
    /// 1-based iteration number.
    pub iteration: u32,
    pub reason: String,
}

/// All iterations of one invocation against a single selected server.
#[derive(Debug, Clone)]
pub struct Run {
    pub server: ServerDescriptor,
    pub user_isp: UserIsp,
    pub connection_method: ConnectionMethod,
    pub records: Vec<IterationRecord>,
    pub failures: Vec<IterationFailure>,
}
