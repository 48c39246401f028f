//! Operational surface
//!
//! Liveness/readiness state and the HTTP server that exposes it alongside
//! service metadata and metrics.

mod config;
mod server;
mod status;

pub use config::{OperationalServerConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use server::{OperationalServer, ServerState, ROUTES};
pub use status::{ProbeStatus, Status};
