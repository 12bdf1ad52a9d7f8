//! Snapshot Persistence
//!
//! Writes the committed tables to a JSON file after each commit and reads
//! them back on open. The file is replaced atomically via rename.

use crate::error::Result;
use crate::store::tables::Tables;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name used inside the data directory
pub const SNAPSHOT_FILE: &str = "clusters.json";

/// Location of a snapshot on disk
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    /// Snapshot file inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SNAPSHOT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the tables, or empty tables when no snapshot exists yet
    pub async fn load(&self) -> Result<Tables> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                let tables: Tables = serde_json::from_slice(&bytes)?;
                info!(
                    "Loaded snapshot {} ({} rows)",
                    self.path.display(),
                    tables.total_rows()
                );
                Ok(tables)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", self.path.display());
                Ok(Tables::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the snapshot with `tables`
    pub async fn write(&self, tables: &Tables) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(tables)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Wrote snapshot {} ({} bytes)", self.path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{Record, RecordKind};
    use crate::model::Host;
    use crate::store::tables::WriteOp;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let tmp = TempDir::new().unwrap();
        let snapshot = Snapshot::in_dir(tmp.path());
        let tables = snapshot.load().await.unwrap();
        assert_eq!(tables.total_rows(), 0);
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let tmp = TempDir::new().unwrap();
        let snapshot = Snapshot::in_dir(tmp.path().join("nested"));

        let mut tables = Tables::default();
        let host = Host {
            id: "h-1".into(),
            ..Host::new("node-1", "10.0.0.1")
        };
        tables.apply(WriteOp::Create(Record::Host(host))).unwrap();
        snapshot.write(&tables).await.unwrap();

        let loaded = snapshot.load().await.unwrap();
        assert_eq!(loaded.len(RecordKind::Host), 1);
        assert_eq!(loaded.hosts()["h-1"].ip, "10.0.0.1");
    }
}
