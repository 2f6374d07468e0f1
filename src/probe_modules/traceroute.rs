use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tracing::{info, warn};

use super::encoding::decode_output;
use super::record::RouteTrace;

#[async_trait]
pub trait RouteTracer: Send + Sync {
    /// Never fails; problems running the tracer become [`RouteTrace::Failed`].
    async fn trace(&self, host: &str) -> RouteTrace;
}

/// Runs the operating system's route tracing utility.
pub struct SystemRouteTracer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SystemRouteTracer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl RouteTracer for SystemRouteTracer {
    async fn trace(&self, host: &str) -> RouteTrace {
        let mut command = TokioCommand::new(&self.program);
        command
            .args(&self.args)
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child is killed if the timeout drops the pending output future.
            .kill_on_drop(true);

        info!(program = %self.program, host = %host, "Tracing route.");
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(program = %self.program, error = %e, "Failed to launch route tracer.");
                return RouteTrace::Failed(format!("failed to launch {}: {e}", self.program));
            }
            Err(_) => {
                warn!(program = %self.program, host = %host, "Route trace timed out.");
                return RouteTrace::Failed(format!(
                    "route trace timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        if output.status.success() {
            let stdout = decode_output(&output.stdout);
            RouteTrace::Hops(stdout.lines().map(str::to_string).collect())
        } else {
            let stderr = decode_output(&output.stderr);
            warn!(status = ?output.status, "Route tracer exited with failure.");
            RouteTrace::Failed(stderr.trim_end().to_string())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> SystemRouteTracer {
        // `sh -c script host` exposes the host as $0.
        SystemRouteTracer::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_success_returns_stdout_lines() {
        let tracer = shell("echo \" 1  gateway\"; echo \" 2  $0\"");
        let trace = tracer.trace("203.0.113.9").await;
        assert_eq!(
            trace,
            RouteTrace::Hops(vec![" 1  gateway".to_string(), " 2  203.0.113.9".to_string()])
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_returns_stderr() {
        let tracer = shell("echo \"unknown host $0\" >&2; exit 2");
        let trace = tracer.trace("nowhere.invalid").await;
        assert_eq!(trace, RouteTrace::Failed("unknown host nowhere.invalid".to_string()));
        assert_eq!(trace.lines(), vec!["Error: unknown host nowhere.invalid".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_failed_trace() {
        let tracer = SystemRouteTracer::new("/nonexistent/traceroute", vec![], Duration::from_secs(5));
        let trace = tracer.trace("203.0.113.9").await;
        assert!(trace.is_failed());
        assert_eq!(trace.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_trace() {
        let tracer = SystemRouteTracer::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(100),
        );
        let trace = tracer.trace("203.0.113.9").await;
        assert!(matches!(trace, RouteTrace::Failed(ref msg) if msg.contains("timed out")));
    }
}
