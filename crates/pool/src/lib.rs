//! Search-API credential pool and lookup execution.
//!
//! The [`SearchPool`] is the process-wide coordinator: it owns a dynamic
//! set of provider credentials with daily/monthly quotas and health
//! state, picks one per outbound request according to the configured
//! rotation strategy, executes the lookup with retry and rate-limit
//! semantics, and hands the provider body to the parser. It is built
//! explicitly via [`SearchPool::init`] and injected wherever needed — no
//! hidden globals.
//!
//! Failure handling is a result-returning loop: each attempt yields a
//! typed outcome and the loop rotates, surfaces, or stops based on the
//! [`ErrorKind`] tag.

mod config;
mod error;
mod manager;
mod provider;
mod stats;
mod transport;

pub use config::{
    is_placeholder_secret, validate_secret, CredentialSeed, PoolConfig, RotationStrategy,
    MIN_NATIVE_SECRET_LEN,
};
pub use error::{classify_response, ErrorKind, TrackError};
pub use manager::{CredentialLimits, SearchPool};
pub use provider::{
    build_custom_params, build_location, build_native_params, country_name,
    harvest_usage_headers, UsageHeaders,
};
pub use stats::{CredentialStatsEntry, PoolStats};
pub use transport::{
    HttpTransport, ProviderRequest, ProviderResponse, SearchTransport, TransportError,
};
