// Shared value types
pub mod types;

// Domain-specific error types
pub mod errors;

// A/B experiments
pub mod experiment;

// Optimization domain
pub mod optimization;

// Performance tracking domain
pub mod performance;

// Port interfaces
pub mod ports;

// Versioned module registry
pub mod registry;

// Store traits
pub mod repositories;
