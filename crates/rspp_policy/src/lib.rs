//! RSPP Replay Access Policy
//!
//! Deny-by-default access decisions for replay evidence, payload redaction,
//! and fail-closed audit over file and HTTP backends.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod audit;
pub mod file;
pub mod http;
pub mod redact;
pub mod service;

pub use access::{DenyReason, REPLAY_ACCESS_POLICY_VERSION, ReplayAccessPolicy, authorize_replay_access};
pub use audit::{
    AuditError, FallbackAuditSink, ImmutableReplayAuditBackendResolver, ReplayAuditSink,
    StaticAuditBackendResolver,
};
pub use file::{JsonlAuditConfig, JsonlFileAuditSink, tenant_file_stem};
pub use http::{AuditHttpRequest, AuditTransport, HttpAuditConfig, HttpAuditSink, Sleeper, UreqTransport};
pub use redact::{REDACTION_MASK, default_redaction_action, redact_payload};
pub use service::{AccessService, AuditFailure};
