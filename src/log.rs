//! # Logging
//!
//! [`ConversionLogger`] is the logging handle passed into every conversion
//! call. It forwards records to any [`log::Log`] sink, by default the
//! process-wide logger installed by the binary.
//!
//! The `show_*` helpers print the console banners of the command-line tool.

use crate::input::JobConfig;
use log::{Level, Log, Record};
use std::fmt;
use std::time::Duration;

/// Target used for every record emitted by the conversion core.
pub const LOG_TARGET: &str = "net2cog";

/// Injected logging handle.
#[derive(Clone, Copy)]
pub struct ConversionLogger<'a> {
    sink: &'a dyn Log,
}

impl<'a> ConversionLogger<'a> {
    pub fn new(sink: &'a dyn Log) -> Self {
        ConversionLogger { sink }
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let record = Record::builder()
            .args(args)
            .level(level)
            .target(LOG_TARGET)
            .module_path_static(Some(module_path!()))
            .build();
        if self.sink.enabled(record.metadata()) {
            self.sink.log(&record);
        }
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

impl Default for ConversionLogger<'static> {
    fn default() -> Self {
        ConversionLogger::new(log::logger())
    }
}

impl fmt::Debug for ConversionLogger<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionLogger")
            .field("target", &LOG_TARGET)
            .finish()
    }
}

pub fn show_greeting(config_source: &str) {
    println!("=== NetCDF to COG Converter ===");
    println!("Configuration from: {}", config_source);
}

pub fn config_echo(config: &JobConfig) {
    println!("\nConfiguration:");
    println!("  Input NetCDF: {}", config.input);
    println!("  Output directory: {}", config.output_dir);
    if config.variables.is_empty() {
        println!("  Variables: all data variables");
    } else {
        println!("  Variables: {}", config.variables.join(", "));
    }
    println!(
        "  Profile: {} compression, {}px tiles, overviews {}",
        config.profile.compression,
        config.profile.blocksize,
        if config.profile.overviews { "on" } else { "off" }
    );
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    println!(
        "\n=== Conversion completed in {:.2}s ===",
        elapsed.as_secs_f64()
    );
}

#[cfg(test)]
pub(crate) mod capture {
    use log::{Log, Metadata, Record};
    use std::sync::Mutex;

    /// Sink that keeps every record for later assertions.
    #[derive(Default)]
    pub struct CaptureLog {
        pub records: Mutex<Vec<(log::Level, String)>>,
    }

    impl CaptureLog {
        pub fn messages(&self) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|(_, msg)| msg.clone())
                .collect()
        }
    }

    impl Log for CaptureLog {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::capture::CaptureLog;
    use super::*;

    #[test]
    fn test_records_reach_injected_sink() {
        let sink = CaptureLog::default();
        let logger = ConversionLogger::new(&sink);
        logger.info(format_args!("Reading {}", "granule.nc"));
        logger.debug(format_args!("NetCDF Var: {}", "sss"));

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (Level::Info, "Reading granule.nc".to_string()));
        assert_eq!(records[1].0, Level::Debug);
    }
}
