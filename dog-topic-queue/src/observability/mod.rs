pub mod stats;
pub mod rolling;

#[cfg(feature = "tracing-basic")]
pub mod logging;

pub use stats::StatsTracker;
pub use rolling::RollingFileWriter;

#[cfg(feature = "tracing-basic")]
pub use logging::init_logging;
