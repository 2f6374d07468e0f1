//! Per-iteration charts of a run, rendered as a stacked SVG figure.
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tracing::{info, warn};

use super::error::ProbeError;
use super::record::IterationRecord;

const FIGURE_SIZE: (u32, u32) = (1200, 800);
const ORANGE: RGBColor = RGBColor(255, 165, 0);

struct Series {
    label: &'static str,
    color: RGBColor,
    values: Vec<f64>,
}

struct Panel {
    title: &'static str,
    y_label: &'static str,
    series: Vec<Series>,
}

fn panels(records: &[IterationRecord]) -> [Panel; 3] {
    let field = |f: fn(&IterationRecord) -> f64| records.iter().map(f).collect::<Vec<f64>>();
    [
        Panel {
            title: "Download and Upload Speeds Over Iterations",
            y_label: "Speed (Mbps)",
            series: vec![
                Series {
                    label: "Download Speed (Mbps)",
                    color: BLUE,
                    values: field(|r| r.download_mbps),
                },
                Series {
                    label: "Upload Speed (Mbps)",
                    color: ORANGE,
                    values: field(|r| r.upload_mbps),
                },
            ],
        },
        Panel {
            title: "Ping Over Iterations",
            y_label: "Ping (ms)",
            series: vec![Series {
                label: "Ping (ms)",
                color: GREEN,
                values: field(|r| r.latency_ms),
            }],
        },
        Panel {
            title: "Test Duration Over Iterations",
            y_label: "Duration (s)",
            series: vec![Series {
                label: "Test Duration (s)",
                color: RED,
                values: field(|r| r.duration_secs),
            }],
        },
    ]
}

pub struct ChartRenderer {
    path: PathBuf,
}

impl ChartRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Draws download/upload, ping and duration panels indexed by 1-based iteration.
    pub fn render(&self, records: &[IterationRecord]) -> Result<(), ProbeError> {
        let root = SVGBackend::new(&self.path, FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let areas = root.split_evenly((3, 1));
        let panel_specs = panels(records);
        for (area, panel) in areas.iter().zip(panel_specs.iter()) {
            draw_panel(area, panel).map_err(chart_error)?;
        }
        root.present().map_err(chart_error)?;

        info!(path = ?self.path, iterations = records.len(), "Rendered result chart.");
        Ok(())
    }

    /// Hands the written chart to the desktop's default viewer. Failures are only logged.
    pub async fn open(&self) {
        let (program, args) = viewer_command(&self.path);
        match launch_viewer(program, &args).await {
            Ok(()) => info!(path = ?self.path, viewer = program, "Opened chart."),
            Err(e) => warn!(path = ?self.path, viewer = program, error = %e, "Could not open chart."),
        }
    }
}

fn viewer_command(path: &Path) -> (&'static str, Vec<OsString>) {
    if cfg!(windows) {
        // `start` treats its first quoted argument as the window title.
        let args = vec!["/C".into(), "start".into(), "".into(), path.into()];
        ("cmd", args)
    } else if cfg!(target_os = "macos") {
        ("open", vec![path.into()])
    } else {
        ("xdg-open", vec![path.into()])
    }
}

async fn launch_viewer(program: &str, args: &[OsString]) -> Result<(), ProbeError> {
    let status = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| ProbeError::Viewer(format!("failed to launch {program}: {e}")))?;
    if !status.success() {
        return Err(ProbeError::Viewer(format!("{program} exited with {status}")));
    }
    Ok(())
}

fn chart_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> ProbeError {
    ProbeError::Chart(e.to_string())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let count = panel
        .series
        .iter()
        .map(|s| s.values.len())
        .max()
        .unwrap_or(0);
    let peak = panel
        .series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(0.0_f64, f64::max);
    let y_max = if peak > 0.0 { peak * 1.1 } else { 1.0 };
    let x_max = count.max(1) as f64 + 0.5;

    let mut chart = ChartBuilder::on(area)
        .caption(panel.title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(0.5_f64..x_max, 0.0_f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Iteration")
        .y_desc(panel.y_label)
        .x_labels(count.max(1))
        .x_label_formatter(&|x: &f64| format!("{x:.0}"))
        .draw()?;

    for series in &panel.series {
        let color = series.color;
        let points: Vec<(f64, f64)> = series
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| ((i + 1) as f64, *v))
            .collect();

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(series.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))?;
    }

    if panel.series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}
