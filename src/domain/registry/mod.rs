// Versioned module artifacts
pub mod model_version;

pub use model_version::{ModelSelector, ModelVersion, NewModelVersion};
