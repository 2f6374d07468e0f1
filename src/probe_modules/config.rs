use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{fs, io::ErrorKind, path::Path, path::PathBuf};
use tracing::{error, info};

use super::error::ProbeError;
use crate::version::VERSION;

pub const DEFAULT_ITERATIONS: u32 = 3;
pub const DEFAULT_CONFIG_PATH: &str = "speedtrack.toml";

/// Repeated network speed test with route tracing, CSV history and charts.
#[derive(Parser, Debug, Clone)]
#[command(name = "speedtrack", version = VERSION)]
pub struct Cli {
    /// Number of measurement iterations to run.
    #[arg(default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: u32,

    /// Optional TOML settings file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub measurement: MeasurementSettings,
    pub environment: EnvironmentSettings,
    pub trace: TraceSettings,
    pub output: OutputSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MeasurementSettings {
    pub server_list_url: String,
    /// How many servers from the list get a latency probe.
    pub candidate_servers: usize,
    pub latency_samples: u32,
    /// Edge lengths of the `random{N}x{N}.jpg` images fetched for download.
    pub download_sizes: Vec<u32>,
    /// Payload sizes in bytes posted for upload.
    pub upload_sizes: Vec<usize>,
    pub request_timeout_secs: u64,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            server_list_url:
                "https://www.speedtest.net/api/js/servers?engine=js&https_functional=true&limit=10"
                    .to_string(),
            candidate_servers: 5,
            latency_samples: 3,
            download_sizes: vec![350, 500, 750, 1000, 1500, 2000],
            upload_sizes: vec![250_000, 500_000, 1_000_000, 2_000_000],
            request_timeout_secs: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub ipinfo_url: String,
    pub lookup_timeout_secs: u64,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            ipinfo_url: "https://ipinfo.io/json".to_string(),
            lookup_timeout_secs: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TraceSettings {
    pub program: String,
    /// Arguments placed before the target host.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for TraceSettings {
    fn default() -> Self {
        let program = if cfg!(windows) { "tracert" } else { "traceroute" };
        Self {
            program: program.to_string(),
            args: Vec::new(),
            timeout_secs: 120,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub store_path: PathBuf,
    pub chart_path: PathBuf,
    /// Open the written chart in the system viewer when the run ends.
    pub open_chart: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("speedtestdata.csv"),
            chart_path: PathBuf::from("speedtestdata.svg"),
            open_chart: true,
        }
    }
}

/// Loads settings from `config_path`. A missing file yields the defaults.
pub fn load_settings(config_path: &Path) -> Result<Settings, ProbeError> {
    // Attempt to get absolute path for logging, but don't fail if it can't be canonicalized
    let absolute_path_display = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    info!(path = ?absolute_path_display, "Attempting to load settings.");

    let config_str = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = ?config_path, "No settings file found, using defaults.");
            return Ok(Settings::default());
        }
        Err(e) => {
            error!(path = ?config_path, error = %e, "Failed to read settings file.");
            return Err(e.into());
        }
    };

    let settings: Settings = toml::from_str(&config_str).map_err(|e| {
        error!(path = ?config_path, error = %e, "Failed to parse settings file.");
        ProbeError::from(e)
    })?;

    info!(settings = ?settings, "Loaded settings successfully.");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.output.store_path, PathBuf::from("speedtestdata.csv"));
        assert!(settings.output.open_chart);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speedtrack.toml");
        fs::write(
            &path,
            "[output]\nstore_path = \"runs.csv\"\nopen_chart = false\n\n[trace]\nprogram = \"mtr\"\nargs = [\"-r\"]\n",
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.output.store_path, PathBuf::from("runs.csv"));
        assert_eq!(settings.output.chart_path, PathBuf::from("speedtestdata.svg"));
        assert!(!settings.output.open_chart);
        assert_eq!(settings.trace.program, "mtr");
        assert_eq!(settings.trace.args, vec!["-r".to_string()]);
        assert_eq!(settings.trace.timeout_secs, 120);
        assert_eq!(settings.measurement, MeasurementSettings::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speedtrack.toml");
        fs::write(&path, "[output\nstore_path = ").unwrap();

        let result = load_settings(&path);
        assert!(matches!(result, Err(ProbeError::Config(_))));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_example_file_matches_defaults() {
        let settings: Settings =
            toml::from_str(include_str!("../../speedtrack.example.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["speedtrack"]);
        assert_eq!(cli.iterations, DEFAULT_ITERATIONS);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));

        let cli = Cli::parse_from(["speedtrack", "7", "--config", "other.toml"]);
        assert_eq!(cli.iterations, 7);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }
}
