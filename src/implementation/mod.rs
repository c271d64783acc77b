//! Reference [`CacheStore`](crate::store::CacheStore) implementations.
//!
//! The policy itself only ever depends on the trait; this module supplies a
//! process-local backing store so the crate is runnable standalone, the way
//! the Moka integration is supplied as a separable, feature-gated piece
//! alongside the policy it serves.

#[cfg(feature = "moka")]
pub mod moka;
