use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Watermark kind for the comment stream.
pub const COMMENT_WATERMARK: &str = "comment";
/// Watermark kind for the contribution stream.
pub const CONTRIBUTION_WATERMARK: &str = "contribution";
/// Credential kinds.
pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";

/// One persisted record. Watermarks and markers carry a timestamp,
/// credentials carry a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    records: &'a [Record],
}

/// Flat record store persisted as a JSON document.
///
/// This is the only source of dedup truth across restarts. Every mutation
/// is written through to disk before returning. There is no locking: the
/// store is owned by a single poll loop.
pub struct StateStore {
    path: PathBuf,
    records: Vec<Record>,
}

impl StateStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is an error.
    pub fn open(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let doc: Document = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            doc.records
        } else {
            Vec::new()
        };
        debug!("Opened state store {} ({} records)", path.display(), records.len());
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    fn find(&self, kind: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.kind == kind)
    }

    // ── Watermarks ─────────────────────────────────────────────────

    /// Stored watermark for a stream, if initialized.
    pub fn watermark(&self, kind: &str) -> Option<i64> {
        self.find(kind).and_then(|r| r.timestamp)
    }

    /// Create the watermark at `ts` unless one already exists.
    /// Returns the effective watermark.
    pub fn init_watermark(&mut self, kind: &str, ts: i64) -> Result<i64> {
        if let Some(existing) = self.watermark(kind) {
            return Ok(existing);
        }
        self.set_watermark(kind, ts)?;
        Ok(ts)
    }

    /// Set (insert or overwrite) a stream watermark.
    pub fn set_watermark(&mut self, kind: &str, ts: i64) -> Result<()> {
        if self.watermark(kind) == Some(ts) {
            return Ok(());
        }
        self.update(kind, |record| record.timestamp = Some(ts))
    }

    // ── One-shot markers ───────────────────────────────────────────

    pub fn is_marked(&self, kind: &str) -> bool {
        self.find(kind).is_some()
    }

    /// Insert a marker unless present. Returns `true` if it was already
    /// marked, i.e. the caller must not notify.
    ///
    /// On error nothing is marked, in memory or on disk.
    pub fn ensure_marked(&mut self, kind: &str, now: i64) -> Result<bool> {
        if self.is_marked(kind) {
            return Ok(true);
        }
        self.update(kind, |record| record.timestamp = Some(now))?;
        Ok(false)
    }

    // ── Credentials ────────────────────────────────────────────────

    pub fn credential(&self, kind: &str) -> Option<&str> {
        self.find(kind).and_then(|r| r.value.as_deref())
    }

    pub fn set_credential(&mut self, kind: &str, value: &str) -> Result<()> {
        self.update(kind, |record| record.value = Some(value.to_string()))
    }

    /// Apply `change` to the record of `kind` (created if absent) on a copy
    /// of the records, write the copy to disk and only then adopt it. A
    /// failed write leaves memory matching the file.
    fn update(&mut self, kind: &str, change: impl FnOnce(&mut Record)) -> Result<()> {
        let mut records = self.records.clone();
        let idx = match records.iter().position(|r| r.kind == kind) {
            Some(idx) => idx,
            None => {
                records.push(Record {
                    kind: kind.to_string(),
                    timestamp: None,
                    value: None,
                });
                records.len() - 1
            }
        };
        change(&mut records[idx]);
        self.persist(&records)?;
        self.records = records;
        Ok(())
    }

    /// Write the document to a sibling temp file, then rename over the
    /// original so readers never observe a partial file.
    fn persist(&self, records: &[Record]) -> Result<()> {
        let doc = DocumentRef { records };
        let contents = serde_json::to_string_pretty(&doc).context("failed to serialize state")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
