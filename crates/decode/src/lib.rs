pub mod error;
pub mod http;
pub mod net;
pub mod resp;

pub use error::DecodeError;
