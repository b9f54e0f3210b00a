//! RSPP Retention Storage
//!
//! Tenant-scoped ledger of replay artifacts with retention sweeps,
//! hard and cryptographic deletion, and layered retention policy resolution.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ledger;
pub mod policy;

pub use ledger::{ArtifactLedger, RetentionError, fingerprint};
pub use policy::{
    BackendRetentionPolicyResolver, FileRetentionPolicyResolver, PolicyLoadError,
    RetentionPolicyResolver, StaticRetentionPolicyResolver,
};
