//! Credential entities and the persistence seam.
//!
//! The pool owns the authoritative in-memory credential list; this crate
//! defines the [`Credential`] entity itself, the async storage traits the
//! pool and scheduler write through, and an in-memory backend used by
//! default. Lookups never block on write durability — see the trait docs.

mod credential;
mod memory;
mod repository;

pub use credential::{
    Credential, CredentialHealth, CredentialOrigin, CredentialStatus, UsagePatch,
};
pub use memory::MemoryStore;
pub use repository::{CredentialStore, RankingStore, StoreError};
