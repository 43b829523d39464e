//! net/http client and server probes.

pub mod client;
pub mod server;

pub use client::HttpClientEvent;
pub use server::{HttpServerEvent, PatternRequest, ServerRequest};
