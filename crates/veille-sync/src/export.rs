//! Append-only local export used when the spreadsheet stays unreachable.
//!
//! One JSON object per line. The file is never truncated or rewritten, and
//! each append is fsynced before it is reported as written.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::ExportError;
use crate::sink::SheetRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub exported_at: DateTime<Utc>,
    /// Why the batch was exported (the last sink error).
    pub reason: String,
    #[serde(flatten)]
    pub row: SheetRow,
}

#[derive(Debug, Clone)]
pub struct LocalExport {
    path: PathBuf,
}

impl LocalExport {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `rows` and fsync. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the file cannot be opened, written or
    /// synced. Nothing is reported written unless the sync succeeded.
    pub async fn append(
        &self,
        rows: &[SheetRow],
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<usize, ExportError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut buf = Vec::new();
        for row in rows {
            let record = ExportRecord {
                exported_at: at,
                reason: reason.to_string(),
                row: row.clone(),
            };
            serde_json::to_writer(&mut buf, &record)?;
            buf.push(b'\n');
        }

        let io_err = |source| ExportError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(&buf).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        Ok(rows.len())
    }

    /// Read every record back, oldest first. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on I/O failure or a malformed line.
    pub async fn read_all(&self) -> Result<Vec<ExportRecord>, ExportError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ExportError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(ExportError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fp: &str) -> SheetRow {
        SheetRow {
            date: "2025-10-14 08:30".into(),
            platform: "google_news".into(),
            theme: "Santé".into(),
            title: "Titre".into(),
            content: "Contenu".into(),
            tonality: "Neutre".into(),
            url: "https://a.ne/1".into(),
            fingerprint: fp.into(),
        }
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("veille-export-{}", uuid::Uuid::new_v4()))
            .join("nested")
            .join("fallback.jsonl")
    }

    #[tokio::test]
    async fn appends_never_truncate() {
        let export = LocalExport::new(temp_path());
        let now = Utc::now();

        assert_eq!(export.append(&[row("a"), row("b")], "down", now).await.unwrap(), 2);
        assert_eq!(export.append(&[row("c")], "still down", now).await.unwrap(), 1);

        let records = export.read_all().await.unwrap();
        let fps: Vec<_> = records.iter().map(|r| r.row.fingerprint.as_str()).collect();
        assert_eq!(fps, vec!["a", "b", "c"]);
        assert_eq!(records[2].reason, "still down");
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let export = LocalExport::new(temp_path());
        assert!(export.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let path = temp_path();
        let export = LocalExport::new(&path);
        assert_eq!(export.append(&[], "down", Utc::now()).await.unwrap(), 0);
        assert!(!path.exists());
    }
}
