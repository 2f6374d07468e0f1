use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use speedtrack::probe_modules::chart::ChartRenderer;
use speedtrack::probe_modules::config::{load_settings, Cli, Settings};
use speedtrack::probe_modules::environment::{IpInfoResolver, NetdevInterfaces};
use speedtrack::probe_modules::error::ProbeError;
use speedtrack::probe_modules::runner::{MeasurementLoop, Probes};
use speedtrack::probe_modules::server::SpeedtestServerSelector;
use speedtrack::probe_modules::sink::ResultSink;
use speedtrack::probe_modules::store::CsvStore;
use speedtrack::probe_modules::throughput::HttpThroughputMeter;
use speedtrack::probe_modules::traceroute::SystemRouteTracer;
use speedtrack::version::VERSION;

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "speedtrack.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Diagnostics go to stderr so stdout carries only the measurement report.
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

fn build_probes(settings: &Settings) -> Result<Probes, ProbeError> {
    let measurement = &settings.measurement;
    let request_timeout = Duration::from_secs(measurement.request_timeout_secs.max(1));

    Ok(Probes {
        selector: Box::new(SpeedtestServerSelector::new(
            measurement.server_list_url.clone(),
            measurement.candidate_servers,
            measurement.latency_samples,
            request_timeout,
        )?),
        meter: Box::new(HttpThroughputMeter::new(
            measurement.download_sizes.clone(),
            measurement.upload_sizes.clone(),
            request_timeout,
        )?),
        tracer: Box::new(SystemRouteTracer::new(
            settings.trace.program.clone(),
            settings.trace.args.clone(),
            Duration::from_secs(settings.trace.timeout_secs.max(1)),
        )),
        isp: Box::new(IpInfoResolver::new(
            settings.environment.ipinfo_url.clone(),
            Duration::from_secs(settings.environment.lookup_timeout_secs.max(1)),
        )?),
        interfaces: Box::new(NetdevInterfaces),
    })
}

async fn run(cli: Cli) -> Result<(), ProbeError> {
    let settings = load_settings(&cli.config)?;
    let probes = build_probes(&settings)?;

    let run = MeasurementLoop::new(probes).run(cli.iterations).await?;

    let sink = ResultSink::new(
        CsvStore::new(settings.output.store_path.clone()),
        ChartRenderer::new(settings.output.chart_path.clone()),
    );
    let rows = sink.consume(&run)?;
    println!(
        "\nSaved {rows} result(s) to {} and chart to {}",
        settings.output.store_path.display(),
        settings.output.chart_path.display()
    );
    if settings.output.open_chart {
        sink.show_chart().await;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging();
    info!(version = VERSION, iterations = cli.iterations, "Starting speedtrack...");

    match run(cli).await {
        Ok(()) => {
            info!("Speed test run finished.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Speed test run failed.");
            ExitCode::FAILURE
        }
    }
}
