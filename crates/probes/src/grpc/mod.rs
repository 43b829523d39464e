//! google.golang.org/grpc client and server probes.

pub mod client;
pub mod server;

pub use client::GrpcClientEvent;
pub use server::GrpcServerEvent;

const RPC_SYSTEM: &str = "grpc";
