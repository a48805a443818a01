use std::io;
use std::path::{Path, PathBuf};

use gramseva_core::model::LeakReport;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Header written at the top of a fresh leak report file.
///
/// Three comment lines plus a blank separator. Readers skip every blank or
/// `#` line, so older files with a shorter header still parse.
pub const HEADER: &str = "# GramSeva water leak reports\n\
# Format: id | location | description | status | createdAt | updatedAt\n\
# Appended by the API server; one report per line.\n\
\n";

/// Append-only flat file of leak reports.
///
/// Appends go through a single writer lock; the file itself is opened and
/// closed per operation.
pub struct LeakStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LeakStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every report in file order. Any read failure yields an empty list.
    pub async fn list_reports(&self) -> Vec<LeakReport> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "leak report file does not exist yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "failed to read leak reports");
                return Vec::new();
            }
        };

        parse_reports(&contents)
    }

    /// Builds a new pending report and appends it. Returns the report on success.
    pub async fn create_report(&self, location: &str, description: &str) -> Option<LeakReport> {
        let report = LeakReport::new(location, description);
        self.append_report(&report).await.then_some(report)
    }

    /// Appends one record, creating the file and header first if needed.
    ///
    /// Returns `false` on any I/O failure; the error is logged here.
    pub async fn append_report(&self, report: &LeakReport) -> bool {
        let _guard = self.write_lock.lock().await;
        match self.append_locked(report).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), id = %report.id, "failed to append leak report");
                false
            }
        }
    }

    async fn append_locked(&self, report: &LeakReport) -> io::Result<()> {
        self.ensure_header().await?;

        let mut line = report.to_record_line();
        line.push('\n');

        let mut f = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        f.write_all(line.as_bytes()).await?;
        f.flush().await?;
        Ok(())
    }

    async fn ensure_header(&self) -> io::Result<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.len() > 0 => return Ok(()),
            // Present but empty: header still missing.
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, HEADER).await
    }
}

fn parse_reports(contents: &str) -> Vec<LeakReport> {
    contents
        .lines()
        .filter(|line| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .filter_map(|line| {
            let parsed = LeakReport::from_record_line(line);
            if parsed.is_none() {
                warn!(line, "skipping leak record without id");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gramseva_core::model::LeakStatus;
    use tempfile::tempdir;

    fn data_lines(contents: &str) -> usize {
        contents
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .count()
    }

    #[tokio::test]
    async fn append_then_list_round_trips() {
        let dir = tempdir().unwrap();
        let store = LeakStore::new(dir.path().join("leaks.txt"));

        let report = LeakReport::new("Main St", "pipe burst");
        assert!(store.append_report(&report).await);

        let listed = store.list_reports().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, report.id);
        assert_eq!(listed[0].location, "Main St");
        assert_eq!(listed[0].description, "pipe burst");
        assert_eq!(listed[0].status, LeakStatus::Pending);
        assert_eq!(listed[0].created_at, report.created_at);
    }

    #[tokio::test]
    async fn header_is_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("leaks.txt");
        let store = LeakStore::new(path.clone());

        assert!(store.create_report("A", "one").await.is_some());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(HEADER));
        assert_eq!(data_lines(&contents), 1);

        assert!(store.create_report("B", "two").await.is_some());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("# GramSeva water leak reports").count(), 1);
        assert_eq!(data_lines(&contents), 2);
        assert_eq!(contents.lines().count(), 4 + 2);
    }

    #[tokio::test]
    async fn created_report_equals_listed_report() {
        let dir = tempdir().unwrap();
        let store = LeakStore::new(dir.path().join("leaks.txt"));

        let created = store
            .create_report("  Gate | 4 ", "water\nspraying | everywhere ")
            .await
            .unwrap();
        assert_eq!(created.location, "Gate / 4");

        let listed = store.list_reports().await;
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn empty_existing_file_gets_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leaks.txt");
        std::fs::write(&path, "").unwrap();

        let store = LeakStore::new(path.clone());
        assert!(store.create_report("Main St", "drip").await.is_some());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(HEADER));
        assert_eq!(data_lines(&contents), 1);
    }

    #[tokio::test]
    async fn missing_file_lists_empty() {
        let dir = tempdir().unwrap();
        let store = LeakStore::new(dir.path().join("absent.txt"));
        assert!(store.list_reports().await.is_empty());
    }

    #[tokio::test]
    async fn garbage_status_is_coerced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leaks.txt");
        std::fs::write(
            &path,
            format!("{HEADER}r1 | Well 3 | cracked pipe | banana | 2026-01-01T00:00:00Z | \n\nr2|Tank|overflow|resolved|2026-01-02T00:00:00Z|2026-01-03T00:00:00Z\n"),
        )
        .unwrap();

        let listed = LeakStore::new(path).list_reports().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].status, LeakStatus::Pending);
        assert_eq!(listed[1].status, LeakStatus::Resolved);
        assert_eq!(listed[1].updated_at.as_deref(), Some("2026-01-03T00:00:00Z"));
    }

    #[tokio::test]
    async fn unwritable_path_reports_false() {
        let dir = tempdir().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("leaks.txt");
        std::fs::create_dir(&path).unwrap();

        let store = LeakStore::new(path);
        assert!(!store.append_report(&LeakReport::new("x", "y")).await);
        assert!(store.list_reports().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_keep_whole_lines() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(LeakStore::new(dir.path().join("leaks.txt")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create_report(&format!("loc {i}"), "drip").await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_some());
        }

        assert_eq!(store.list_reports().await.len(), 16);
    }
}
