use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Result store error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid config file: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Malformed server list: {0}")]
    ServerList(#[from] serde_json::Error),
    #[error("No reachable test server found")]
    NoServers,
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),
    #[error("Chart rendering failed: {0}")]
    Chart(String),
    #[error("Chart viewer failed: {0}")]
    Viewer(String),
}
