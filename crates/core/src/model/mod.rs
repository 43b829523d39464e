pub mod event;
pub mod span;
pub mod tracer;
