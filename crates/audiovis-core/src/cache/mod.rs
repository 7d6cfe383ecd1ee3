//! Persistent image cache for rendered visualizations.

pub mod paths;
pub mod placeholder;
pub mod service;

pub use paths::{cache_path, flatten_key, placeholder_path};
pub use placeholder::{ensure_placeholder, is_png, render_placeholder, PNG_SIGNATURE};
pub use service::VisualizationCache;
