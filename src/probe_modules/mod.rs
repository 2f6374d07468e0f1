pub mod chart;
pub mod classify;
pub mod config;
pub mod encoding;
pub mod environment;
pub mod error;
pub mod record;
pub mod report;
pub mod runner;
pub mod server;
pub mod sink;
pub mod store;
pub mod throughput;
pub mod traceroute;

#[cfg(test)]
pub(crate) mod test_support;
