// Store wiring
pub mod bootstrap;

// Regression monitoring
pub mod monitoring;

// Optimization orchestration
pub mod optimization;
