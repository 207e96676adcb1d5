//! ---
//! tg_section: "04-security-access-control"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Role assignments, principals, and protected-entity rules."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tiergate_common::{PrincipalId, TenantId};

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One administrative mutation recorded in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// When the mutation was applied.
    pub timestamp: DateTime<Utc>,
    /// Principal that performed the mutation.
    pub actor: PrincipalId,
    /// Tenant the mutation applies to, if any.
    pub tenant: Option<TenantId>,
    /// Mutation kind (e.g. `role.update`, `principal.delete`).
    pub event: String,
    /// Entity the mutation targeted.
    pub target: String,
    /// Mutation details.
    pub metadata: serde_json::Value,
    /// SHA-256 over the entry contents and `previous_hash`.
    pub hash: String,
    /// Hash of the preceding entry.
    pub previous_hash: String,
}

impl AuditEntry {
    fn compute_hash(
        timestamp: DateTime<Utc>,
        actor: &PrincipalId,
        tenant: Option<&TenantId>,
        event: &str,
        target: &str,
        metadata: &serde_json::Value,
        previous_hash: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            timestamp
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_be_bytes(),
        );
        for field in [
            actor.as_str(),
            tenant.map(TenantId::as_str).unwrap_or_default(),
            event,
            target,
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(metadata.to_string().as_bytes());
        hasher.update(previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn expected_hash(&self, previous_hash: &str) -> String {
        Self::compute_hash(
            self.timestamp,
            &self.actor,
            self.tenant.as_ref(),
            &self.event,
            &self.target,
            &self.metadata,
            previous_hash,
        )
    }
}

/// Append-only, hash-chained audit trail stored as newline-delimited JSON.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    last_hash: Mutex<String>,
}

impl AuditLog {
    /// Open (or prepare) the log at `path`; existing entries set the chain head.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let last_hash = read_entries(&path)?
            .last()
            .map(|entry| entry.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_owned());
        Ok(Self {
            path,
            last_hash: Mutex::new(last_hash),
        })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry and advance the chain head.
    pub fn append(
        &self,
        actor: &PrincipalId,
        tenant: Option<&TenantId>,
        event: &str,
        target: &str,
        metadata: serde_json::Value,
    ) -> Result<AuditEntry> {
        let mut last_hash = self.last_hash.lock();
        let timestamp = Utc::now();
        let hash = AuditEntry::compute_hash(
            timestamp, actor, tenant, event, target, &metadata, &last_hash,
        );
        let entry = AuditEntry {
            timestamp,
            actor: actor.clone(),
            tenant: tenant.cloned(),
            event: event.to_owned(),
            target: target.to_owned(),
            metadata,
            hash: hash.clone(),
            previous_hash: last_hash.clone(),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("unable to open audit log {}", self.path.display()))?;
        file.write_all(serde_json::to_string(&entry)?.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        *last_hash = hash;
        Ok(entry)
    }

    /// Every entry currently on disk.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        read_entries(&self.path)
    }

    /// Walk the chain; false when any entry was altered, removed or reordered.
    pub fn verify(&self) -> Result<bool> {
        let mut previous = GENESIS_HASH.to_owned();
        for entry in read_entries(&self.path)? {
            if entry.previous_hash != previous || entry.expected_hash(&previous) != entry.hash {
                return Ok(false);
            }
            previous = entry.hash;
        }
        Ok(true)
    }
}

fn read_entries(path: &Path) -> Result<Vec<AuditEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path)
        .with_context(|| format!("unable to read audit log {}", path.display()))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(
            serde_json::from_str(&line)
                .with_context(|| format!("corrupt audit entry in {}", path.display()))?,
        );
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn chain_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::open(&path).unwrap();
        let first = log
            .append(
                &"root".into(),
                None,
                "role.delete",
                "emp",
                serde_json::json!({"name": "Employee"}),
            )
            .unwrap();
        assert_eq!(first.previous_hash, GENESIS_HASH);

        let reopened = AuditLog::open(&path).unwrap();
        let second = reopened
            .append(
                &"root".into(),
                Some(&"acme".into()),
                "principal.delete",
                "bob",
                serde_json::Value::Null,
            )
            .unwrap();
        assert_eq!(second.previous_hash, first.hash);
        assert!(reopened.verify().unwrap());
        assert_eq!(reopened.entries().unwrap().len(), 2);
    }

    #[test]
    fn tampering_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::open(&path).unwrap();
        for target in ["alice", "bob"] {
            log.append(
                &"root".into(),
                Some(&"acme".into()),
                "role.grant",
                target,
                serde_json::json!({"role": "emp"}),
            )
            .unwrap();
        }
        assert!(log.verify().unwrap());

        let contents = fs::read_to_string(&path).unwrap();
        let tampered = contents.replacen("\"bob\"", "\"eve\"", 1);
        fs::write(&path, tampered).unwrap();
        assert!(!AuditLog::open(&path).unwrap().verify().unwrap());
    }
}
