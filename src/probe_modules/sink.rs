use tracing::error;

use super::chart::ChartRenderer;
use super::error::ProbeError;
use super::record::Run;
use super::store::CsvStore;

/// Consumes a finished run: appends it to the store, then charts it.
pub struct ResultSink {
    store: CsvStore,
    chart: ChartRenderer,
}

impl ResultSink {
    pub fn new(store: CsvStore, chart: ChartRenderer) -> Self {
        Self { store, chart }
    }

    #[cfg(test)]
    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    #[cfg(test)]
    pub fn chart(&self) -> &ChartRenderer {
        &self.chart
    }

    /// Both outputs are always attempted; the first failure is returned afterwards.
    pub fn consume(&self, run: &Run) -> Result<usize, ProbeError> {
        let stored = self.store.append(&run.records).inspect_err(|e| {
            error!(path = ?self.store.path(), error = %e, "Failed to persist results.");
        });
        let charted = self.chart.render(&run.records).inspect_err(|e| {
            error!(path = ?self.chart.path(), error = %e, "Failed to render chart.");
        });

        let rows = stored?;
        charted?;
        Ok(rows)
    }

    pub async fn show_chart(&self) {
        self.chart.open().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe_modules::record::{RouteTrace, UserIsp};
    use crate::probe_modules::runner::fakes::{probes, FixedMeter, SharedConsole};
    use crate::probe_modules::runner::MeasurementLoop;
    use std::fs;

    fn sink_in(dir: &std::path::Path) -> ResultSink {
        ResultSink::new(
            CsvStore::new(dir.join("speedtestdata.csv")),
            ChartRenderer::new(dir.join("speedtestdata.svg")),
        )
    }

    async fn measured_run(iterations: u32, fail_on: Option<usize>, trace: RouteTrace) -> Run {
        let mut meter = FixedMeter::new(55_000_000.0, 7_500_000.0);
        meter.fail_on = fail_on;
        MeasurementLoop::new(probes(meter, trace, UserIsp::Unknown))
            .with_console(Box::new(SharedConsole::default()))
            .run(iterations)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_gains_one_row_per_successful_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());

        let run = measured_run(3, None, RouteTrace::Hops(vec![" 1  gw".to_string()])).await;
        assert_eq!(sink.consume(&run).unwrap(), 3);

        let run = measured_run(3, Some(1), RouteTrace::Hops(Vec::new())).await;
        assert_eq!(run.records.len(), 2);
        assert_eq!(sink.consume(&run).unwrap(), 2);

        let rows = sink.store().load().unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.download_mbps == 55.0 && row.upload_mbps == 7.5));
        assert!(fs::read_to_string(sink.chart().path()).unwrap().contains("<svg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trace_is_still_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());

        let run = measured_run(2, None, RouteTrace::Failed("exit status 1".to_string())).await;
        assert_eq!(sink.consume(&run).unwrap(), 2);

        let rows = sink.store().load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_isp, "Unknown ISP");
        assert_eq!(rows[0].connection_method, "Ethernet");
    }

    #[tokio::test(start_paused = true)]
    async fn test_chart_is_rendered_when_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(
            CsvStore::new(dir.path().join("missing-dir").join("speedtestdata.csv")),
            ChartRenderer::new(dir.path().join("speedtestdata.svg")),
        );

        let run = measured_run(1, None, RouteTrace::Hops(Vec::new())).await;
        assert!(matches!(sink.consume(&run), Err(ProbeError::Io(_))));
        assert!(dir.path().join("speedtestdata.svg").exists());
    }
}
