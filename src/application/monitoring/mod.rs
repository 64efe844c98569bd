// Regression monitoring over recorded performance snapshots
pub mod regression_monitor;

pub use regression_monitor::RegressionMonitor;
