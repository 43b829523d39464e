pub mod controller;
pub mod exporter;
pub mod manager;
pub mod telemetry;
pub mod tracer_cache;

pub use controller::SpanController;
pub use manager::Manager;
pub use tracer_cache::TracerCache;
