//! Retention policy resolution.
//!
//! Resolvers are tried as an ordered list of tiers. The backend chain ends
//! in a conservative built-in policy, so resolution always yields something
//! that is valid for the requested tenant.

use rspp_core::{RetentionPolicy, ValidationError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Policy loading error with a machine-readable code
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    /// Policy file could not be read
    #[error("failed to read retention policy {path}: {source}")]
    Read {
        /// Policy file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Policy file is not valid JSON
    #[error("failed to decode retention policy {path}: {source}")]
    Decode {
        /// Policy file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
    /// Policy failed validation
    #[error("retention policy for tenant {tenant_id:?} is invalid: {source}")]
    Invalid {
        /// Requested tenant
        tenant_id: String,
        /// Underlying error
        #[source]
        source: ValidationError,
    },
    /// Policy belongs to another tenant
    #[error("retention policy tenant mismatch: requested {requested:?}, got {actual:?}")]
    TenantMismatch {
        /// Requested tenant
        requested: String,
        /// Tenant on the policy
        actual: String,
    },
    /// No policy for the tenant
    #[error("no retention policy for tenant {tenant_id:?}")]
    NotFound {
        /// Requested tenant
        tenant_id: String,
    },
}

impl PolicyLoadError {
    /// Stable code for operational tooling
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "retention_policy_read_failed",
            Self::Decode { .. } => "retention_policy_decode_failed",
            Self::Invalid { .. } => "retention_policy_invalid",
            Self::TenantMismatch { .. } => "retention_policy_tenant_mismatch",
            Self::NotFound { .. } => "retention_policy_not_found",
        }
    }
}

/// Resolves the retention policy for a tenant
pub trait RetentionPolicyResolver: Send + Sync {
    /// Policy for `tenant_id`
    ///
    /// # Errors
    ///
    /// Returns error when no usable policy exists
    fn resolve_policy(&self, tenant_id: &str) -> Result<RetentionPolicy, PolicyLoadError>;
}

/// Resolver over a fixed tenant map
#[derive(Debug, Clone, Default)]
pub struct StaticRetentionPolicyResolver {
    policies: HashMap<String, RetentionPolicy>,
}

impl StaticRetentionPolicyResolver {
    /// Empty resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy under its own tenant id
    #[must_use]
    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policies.insert(policy.tenant_id.clone(), policy);
        self
    }
}

impl RetentionPolicyResolver for StaticRetentionPolicyResolver {
    fn resolve_policy(&self, tenant_id: &str) -> Result<RetentionPolicy, PolicyLoadError> {
        self.policies
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| PolicyLoadError::NotFound {
                tenant_id: tenant_id.to_string(),
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyDocument {
    Many(Vec<RetentionPolicy>),
    One(Box<RetentionPolicy>),
}

/// Resolver reading a JSON policy artifact on every call.
///
/// The file holds either one policy object or an array of policies. A single
/// object naming another tenant is a mismatch, not a miss.
#[derive(Debug, Clone)]
pub struct FileRetentionPolicyResolver {
    path: PathBuf,
}

impl FileRetentionPolicyResolver {
    /// Resolve from `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Policy artifact path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RetentionPolicyResolver for FileRetentionPolicyResolver {
    fn resolve_policy(&self, tenant_id: &str) -> Result<RetentionPolicy, PolicyLoadError> {
        let bytes = std::fs::read(&self.path).map_err(|source| PolicyLoadError::Read {
            path: self.path.clone(),
            source,
        })?;
        let document: PolicyDocument =
            serde_json::from_slice(&bytes).map_err(|source| PolicyLoadError::Decode {
                path: self.path.clone(),
                source,
            })?;

        let policy = match document {
            PolicyDocument::One(policy) => {
                if !policy.tenant_id.is_empty() && policy.tenant_id != tenant_id {
                    return Err(PolicyLoadError::TenantMismatch {
                        requested: tenant_id.to_string(),
                        actual: policy.tenant_id,
                    });
                }
                *policy
            }
            PolicyDocument::Many(policies) => policies
                .into_iter()
                .find(|p| p.tenant_id == tenant_id)
                .ok_or_else(|| PolicyLoadError::NotFound {
                    tenant_id: tenant_id.to_string(),
                })?,
        };
        align(policy, tenant_id)
    }
}

/// Ordered resolver tiers ending in the conservative default
#[derive(Clone, Default)]
pub struct BackendRetentionPolicyResolver {
    tiers: Vec<Arc<dyn RetentionPolicyResolver>>,
}

impl BackendRetentionPolicyResolver {
    /// No tiers; every tenant gets the conservative default
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend first, then a static resolver
    #[must_use]
    pub fn backend_then_static(
        backend: Arc<dyn RetentionPolicyResolver>,
        fallback: StaticRetentionPolicyResolver,
    ) -> Self {
        Self::new().with_tier(backend).with_tier(Arc::new(fallback))
    }

    /// Append a tier
    #[must_use]
    pub fn with_tier(mut self, tier: Arc<dyn RetentionPolicyResolver>) -> Self {
        self.tiers.push(tier);
        self
    }
}

impl RetentionPolicyResolver for BackendRetentionPolicyResolver {
    fn resolve_policy(&self, tenant_id: &str) -> Result<RetentionPolicy, PolicyLoadError> {
        if tenant_id.trim().is_empty() {
            return Err(PolicyLoadError::Invalid {
                tenant_id: tenant_id.to_string(),
                source: ValidationError::missing("retention_policy", "tenant_id"),
            });
        }

        for (tier, resolver) in self.tiers.iter().enumerate() {
            match resolver
                .resolve_policy(tenant_id)
                .and_then(|policy| align(policy, tenant_id))
            {
                Ok(policy) => {
                    debug!(tenant_id, tier, "retention policy resolved");
                    return Ok(policy);
                }
                Err(PolicyLoadError::NotFound { .. }) => {
                    debug!(tenant_id, tier, "no retention policy in tier");
                }
                Err(err) => {
                    warn!(tenant_id, tier, code = err.code(), error = %err, "retention policy tier rejected");
                }
            }
        }

        debug!(tenant_id, "using conservative retention policy");
        align(RetentionPolicy::conservative(tenant_id), tenant_id)
    }
}

/// Force the policy onto `tenant_id` and re-validate it
fn align(mut policy: RetentionPolicy, tenant_id: &str) -> Result<RetentionPolicy, PolicyLoadError> {
    if policy.tenant_id.is_empty() {
        policy.tenant_id = tenant_id.to_string();
    } else if policy.tenant_id != tenant_id {
        return Err(PolicyLoadError::TenantMismatch {
            requested: tenant_id.to_string(),
            actual: policy.tenant_id,
        });
    }
    policy.validate().map_err(|source| PolicyLoadError::Invalid {
        tenant_id: tenant_id.to_string(),
        source,
    })?;
    Ok(policy)
}
