//! Visual/audio detection correlation.

mod engine;
mod fusion;
mod metrics;
mod window;

pub use engine::CorrelationEngine;
pub use fusion::FusionPolicy;
pub use metrics::CorrelationMetrics;
pub use window::Resolution;
