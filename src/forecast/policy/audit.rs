//! Audit records and content hashing.
//!
//! A record is created once per evaluation and never changes afterwards. The
//! state and catalog hashes are FNV-1a 32 over key-sorted JSON, so equal
//! logical inputs hash identically regardless of field order.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::catalog::ActionCatalog;
use super::mode::PolicyMode;
use super::state::PolicyState;
use crate::consts::{BUILD_ID, POLICY_VERSION};
use crate::prelude::Result;

/// Cap on justification strings per record.
pub const MAX_JUSTIFICATIONS: usize = 5;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a, 32-bit.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `fnv1a32(canonical_json(value))` as eight lowercase hex digits.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    Ok(format!("{:08x}", fnv1a32(canonical_json(&json).as_bytes())))
}

/// Everything needed to reproduce a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReproToken {
    pub build_id: String,
    pub seed: u32,
    pub state_hash: String,
    pub catalog_hash: String,
    pub policy_version: String,
}

/// One ranked candidate as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub rank: usize,
    pub action_id: String,
    pub score: f64,
    pub penalty: f64,
    pub fail_rate: f64,
}

/// Immutable record of one policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    token: ReproToken,
    mode: PolicyMode,
    fallback: bool,
    top_k: Vec<CandidateSummary>,
    justifications: Vec<String>,
}

impl AuditRecord {
    pub(crate) fn create(
        state: &PolicyState,
        catalog: &ActionCatalog,
        seed: u32,
        mode: PolicyMode,
        fallback: bool,
        top_k: Vec<CandidateSummary>,
        mut justifications: Vec<String>,
    ) -> Result<Self> {
        justifications.truncate(MAX_JUSTIFICATIONS);
        Ok(Self {
            token: ReproToken {
                build_id: BUILD_ID.to_string(),
                seed,
                state_hash: content_hash(state)?,
                catalog_hash: content_hash(catalog)?,
                policy_version: POLICY_VERSION.to_string(),
            },
            mode,
            fallback,
            top_k,
            justifications,
        })
    }

    pub fn token(&self) -> &ReproToken {
        &self.token
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn top_k(&self) -> &[CandidateSummary] {
        &self.top_k
    }

    pub fn justifications(&self) -> &[String] {
        &self.justifications
    }

    /// True when `state` and `catalog` hash to the recorded values.
    pub fn verify(&self, state: &PolicyState, catalog: &ActionCatalog) -> bool {
        let state_ok = content_hash(state).map_or(false, |h| h == self.token.state_hash);
        let catalog_ok = content_hash(catalog).map_or(false, |h| h == self.token.catalog_hash);
        state_ok && catalog_ok
    }
}

/// External store for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one record. Records are append-only.
    async fn persist(&self, record: &AuditRecord) -> Result<()>;

    /// Identifier for logs.
    fn sink_id(&self) -> &'static str;
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn persist(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    fn sink_id(&self) -> &'static str {
        "memory"
    }
}

/// A persisted record with its write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAudit {
    pub recorded_at: DateTime<Utc>,
    pub record: AuditRecord,
}

/// Append-only JSON-lines file sink.
#[derive(Debug, Clone)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
}

impl JsonLinesAuditSink {
    /// Create the sink, making the parent directory if needed.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record. A missing file reads as empty.
    pub fn load(&self) -> Result<Vec<StoredAudit>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn persist(&self, record: &AuditRecord) -> Result<()> {
        let stored = StoredAudit {
            recorded_at: Utc::now(),
            record: record.clone(),
        };
        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        info!(
            path = %self.path.display(),
            mode = %record.mode(),
            state_hash = %record.token().state_hash,
            "Audit record persisted"
        );
        debug!(bytes = line.len(), "Audit line written");
        Ok(())
    }

    fn sink_id(&self) -> &'static str {
        "jsonl"
    }
}
