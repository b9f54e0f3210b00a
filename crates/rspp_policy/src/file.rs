//! JSONL file audit backend.
//!
//! One file per tenant under a root directory, one JSON object per line.
//! Files are only ever opened in append mode.

use crate::audit::{AuditError, ReplayAuditSink};
use rspp_core::ReplayAuditEvent;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Audit file suffix
pub const AUDIT_FILE_SUFFIX: &str = ".replay-audit.jsonl";

/// JSONL backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlAuditConfig {
    /// Root directory
    pub dir: PathBuf,
    /// Directory permission bits
    pub dir_mode: u32,
    /// File permission bits
    pub file_mode: u32,
}

impl Default for JsonlAuditConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("replay-audit"),
            dir_mode: 0o755,
            file_mode: 0o600,
        }
    }
}

impl JsonlAuditConfig {
    /// Default modes under `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }
}

/// Sanitize a tenant id into a file stem.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`; leading and trailing
/// underscores are trimmed. Returns `None` if nothing usable remains.
#[must_use]
pub fn tenant_file_stem(tenant_id: &str) -> Option<String> {
    let mapped: String = tenant_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = mapped.trim_matches('_');
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Append-only JSONL audit sink
#[derive(Debug)]
pub struct JsonlFileAuditSink {
    config: JsonlAuditConfig,
    write_lock: Mutex<()>,
}

impl JsonlFileAuditSink {
    /// Create a sink; directories are created on first write
    #[must_use]
    pub fn new(config: JsonlAuditConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &JsonlAuditConfig {
        &self.config
    }

    /// Audit file for `tenant_id`
    ///
    /// # Errors
    ///
    /// Returns error if the tenant id has no usable characters
    pub fn path_for(&self, tenant_id: &str) -> Result<PathBuf, AuditError> {
        let stem = tenant_file_stem(tenant_id).ok_or_else(|| AuditError::InvalidTenant {
            tenant_id: tenant_id.to_string(),
        })?;
        Ok(self.config.dir.join(format!("{stem}{AUDIT_FILE_SUFFIX}")))
    }

    fn ensure_dir(&self) -> Result<(), AuditError> {
        let dir = &self.config.dir;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.config.dir_mode);
        }
        builder.create(dir).map_err(|source| io_error(dir, source))
    }
}

impl ReplayAuditSink for JsonlFileAuditSink {
    fn append(&self, event: &ReplayAuditEvent) -> Result<(), AuditError> {
        event.validate()?;
        let path = self.path_for(event.tenant_id())?;

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_dir()?;

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.config.file_mode);
        }
        let mut file = options.open(&path).map_err(|source| io_error(&path, source))?;
        file.write_all(&line).map_err(|source| io_error(&path, source))?;
        file.flush().map_err(|source| io_error(&path, source))?;

        debug!(tenant_id = event.tenant_id(), path = %path.display(), "replay audit event appended");
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::tests::audit_event;
    use rspp_core::{ReplayAccessDecision, ReplayAuditEvent};

    #[test]
    fn test_tenant_file_stem() {
        assert_eq!(tenant_file_stem("tenant-a").as_deref(), Some("tenant-a"));
        assert_eq!(tenant_file_stem("acme/../eu").as_deref(), Some("acme____eu"));
        assert_eq!(tenant_file_stem("  tenant a  ").as_deref(), Some("tenant_a"));
        assert_eq!(tenant_file_stem("__x__").as_deref(), Some("x"));
        assert_eq!(tenant_file_stem("///"), None);
    }

    #[test]
    fn test_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileAuditSink::new(JsonlAuditConfig::new(dir.path().join("audit")));

        let first = audit_event();
        let mut request = first.request().clone();
        request.principal_id = "bob".to_string();
        let second =
            ReplayAuditEvent::new(7, request, ReplayAccessDecision::allow(Vec::new())).unwrap();

        sink.append(&first).unwrap();
        sink.append(&second).unwrap();

        let path = sink.path_for("tenant-a").unwrap();
        assert!(path.ends_with("tenant-a.replay-audit.jsonl"));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let decoded: ReplayAuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(decoded, first);
        let decoded: ReplayAuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(decoded.request().principal_id, "bob");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileAuditSink::new(JsonlAuditConfig::new(dir.path()));
        sink.append(&audit_event()).unwrap();

        let meta = std::fs::metadata(sink.path_for("tenant-a").unwrap()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_default_dir_mode() {
        use std::os::unix::fs::PermissionsExt;

        assert_eq!(JsonlAuditConfig::default().dir_mode, 0o755);
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("audit");
        let sink = JsonlFileAuditSink::new(JsonlAuditConfig::new(&root));
        sink.append(&audit_event()).unwrap();

        let meta = std::fs::metadata(&root).unwrap();
        assert!(meta.is_dir());
        // umask can only clear bits
        assert_eq!(meta.permissions().mode() & 0o777 & !0o755, 0);
        assert_ne!(meta.permissions().mode() & 0o700, 0);
    }

    #[test]
    fn test_concurrent_appends_stay_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileAuditSink::new(JsonlAuditConfig::new(dir.path()));
        let base = audit_event();

        std::thread::scope(|s| {
            for worker in 0..4 {
                let sink = &sink;
                let base = &base;
                s.spawn(move || {
                    for i in 0..25 {
                        let mut request = base.request().clone();
                        request.principal_id = format!("principal-{worker}-{i}");
                        let event = ReplayAuditEvent::new(
                            base.timestamp_ms() + i,
                            request,
                            base.decision().clone(),
                        )
                        .unwrap();
                        sink.append(&event).unwrap();
                    }
                });
            }
        });

        let content = std::fs::read_to_string(sink.path_for("tenant-a").unwrap()).unwrap();
        let principals: std::collections::HashSet<String> = content
            .lines()
            .map(|line| {
                let event: ReplayAuditEvent = serde_json::from_str(line).unwrap();
                event.request().principal_id.clone()
            })
            .collect();
        assert_eq!(content.lines().count(), 100);
        assert_eq!(principals.len(), 100);
    }

    #[test]
    fn test_unusable_tenant_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileAuditSink::new(JsonlAuditConfig::new(dir.path()));
        let mut request = audit_event().request().clone();
        request.tenant_id = "...".to_string();
        let event = ReplayAuditEvent::new(1, request, ReplayAccessDecision::deny("x")).unwrap();

        assert!(matches!(
            sink.append(&event),
            Err(AuditError::InvalidTenant { .. })
        ));
    }
}
