//! HTTP surface for the rank-tracking core.
//!
//! A thin facade over the pool and bulk executor: requests are
//! normalized (single vs. bulk, geographic defaults), dispatched, and
//! replies are shaped with a pool snapshot plus a human-readable
//! insight line. Credential management and pool statistics are exposed
//! under `/api/v1/pool/*`.

pub mod config;
pub mod error;
pub mod facade;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::start_server;
pub use state::AppState;
