pub mod probe_modules;
pub mod version;
