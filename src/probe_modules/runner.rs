//! The repeated measurement loop.
//!
//! A run selects its server and resolves the client environment once, then
//! executes the requested number of iterations strictly one after another.
//! A failed iteration is reported and skipped; it never stops the run.
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::environment::{detect_connection_method, InterfaceSource, IspResolver};
use super::error::ProbeError;
use super::record::{
    ConnectionMethod, IterationFailure, IterationRecord, Measurement, Run, ServerDescriptor,
    UserIsp,
};
use super::report::format_iteration;
use super::server::ServerSelector;
use super::throughput::ThroughputMeter;
use super::traceroute::RouteTracer;

/// Pause between iterations, giving the test server a rest.
pub const ITERATION_DELAY: Duration = Duration::from_secs(2);

const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// The external capabilities a run depends on.
pub struct Probes {
    pub selector: Box<dyn ServerSelector>,
    pub meter: Box<dyn ThroughputMeter>,
    pub tracer: Box<dyn RouteTracer>,
    pub isp: Box<dyn IspResolver>,
    pub interfaces: Box<dyn InterfaceSource>,
}

pub struct MeasurementLoop {
    probes: Probes,
    console: Box<dyn Write + Send>,
}

impl MeasurementLoop {
    /// Creates a loop that prints its reports to stdout.
    pub fn new(probes: Probes) -> Self {
        Self {
            probes,
            console: Box::new(std::io::stdout()),
        }
    }

    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = console;
        self
    }

    /// Runs `iterations` measurements against the best available server.
    ///
    /// Only server selection can fail the whole run; iteration failures are
    /// collected in [`Run::failures`].
    pub async fn run(&mut self, iterations: u32) -> Result<Run, ProbeError> {
        self.say("Finding the best server...");
        let server = self.probes.selector.best_server().await?;
        let interface_names = self.probes.interfaces.interface_names();
        let connection_method = detect_connection_method(interface_names.as_slice());
        let user_isp = self.probes.isp.resolve().await;
        info!(
            server = %server.name,
            host = %server.host,
            user_isp = %user_isp,
            connection_method = %connection_method,
            iterations,
            "Run context resolved."
        );

        let mut run = Run {
            server,
            user_isp,
            connection_method,
            records: Vec::new(),
            failures: Vec::new(),
        };

        for iteration in 1..=iterations {
            self.say(&format!("\nIteration {iteration} of {iterations}:"));
            match self
                .run_iteration(&run.server, &run.user_isp, run.connection_method)
                .await
            {
                Ok(record) => run.records.push(record),
                Err(e) => {
                    error!(iteration, error = %e, "Iteration failed.");
                    self.say(&format!("An error occurred: {e}"));
                    run.failures.push(IterationFailure {
                        iteration,
                        reason: e.to_string(),
                    });
                }
            }
            tokio::time::sleep(ITERATION_DELAY).await;
        }

        info!(
            completed = run.records.len(),
            failed = run.failures.len(),
            "Measurement loop finished."
        );
        Ok(run)
    }

    async fn run_iteration(
        &mut self,
        server: &ServerDescriptor,
        user_isp: &UserIsp,
        connection_method: ConnectionMethod,
    ) -> Result<IterationRecord, ProbeError> {
        let start = Instant::now();

        let download_mbps = self.probes.meter.download(server).await? / BITS_PER_MEGABIT;
        let upload_mbps = self.probes.meter.upload(server).await? / BITS_PER_MEGABIT;
        let route = self.probes.tracer.trace(&server.host).await;
        let duration_secs = start.elapsed().as_secs_f64();

        let record = IterationRecord::new(
            server,
            user_isp,
            connection_method,
            Measurement {
                download_mbps,
                upload_mbps,
                duration_secs,
                route,
            },
        )?;

        self.console.write_all(format_iteration(&record).as_bytes())?;
        self.console.flush()?;
        Ok(record)
    }

    fn say(&mut self, line: &str) {
        if let Err(e) = writeln!(self.console, "{line}") {
            warn!(error = %e, "Failed to write to console.");
        }
    }
}
