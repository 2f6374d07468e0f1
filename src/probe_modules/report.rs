use std::fmt::Write;

use super::classify::classify;
use super::record::IterationRecord;

/// Human-readable summary of one iteration, including use-case guidance and the raw route trace.
pub fn format_iteration(record: &IterationRecord) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Download Speed: {:.2} Mbps", record.download_mbps);
    let _ = writeln!(out, "Upload Speed: {:.2} Mbps", record.upload_mbps);
    let _ = writeln!(out, "Ping: {:.2} ms", record.latency_ms);
    let _ = writeln!(out, "Server ISP: {}", record.server_isp);
    let _ = writeln!(out, "User ISP: {}", record.user_isp);
    let _ = writeln!(out, "Connection Method: {}", record.connection_method);
    let _ = writeln!(out, "Test Duration: {:.2} seconds", record.duration_secs);

    let _ = writeln!(out, "\nSuitable Uses for This Speed Test:");
    let _ = writeln!(out, "{}", classify(record.download_mbps, record.upload_mbps));

    let _ = writeln!(out, "\nTraceroute:");
    for hop in record.route.lines() {
        let _ = writeln!(out, "{hop}");
    }
    out
}
