//! CSV-file ledger backend.
//!
//! Layout under the data directory, one pair per category:
//! `<category>.csv` (header `account,added_by,added_at`) and
//! `<category>_used.csv` (header `account,added_by,dispensed_at`).
//! Timestamps are RFC 3339 UTC.

use crate::error::{StorageError, StorageResult};
use crate::RecordLedger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credpool_types::{
    ArchivedRecord, CategoryId, DispenseIntent, PoolRecord, RecordText, ARCHIVE_SUFFIX,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const POOL_HEADER: [&str; 3] = ["account", "added_by", "added_at"];
const ARCHIVE_HEADER: [&str; 3] = ["account", "added_by", "dispensed_at"];
const INTENT_HEADER: [&str; 4] = ["account", "added_by", "added_at", "dispensed_at"];
const INTENT_EXTENSION: &str = "dispense";

/// File-backed ledger storing each category as a pair of CSV files.
pub struct CsvLedger {
    data_dir: PathBuf,
}

impl CsvLedger {
    /// Open a ledger rooted at `data_dir`, creating the directory if absent.
    pub fn open(data_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| StorageError::io(&data_dir, e))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn pool_path(&self, category: &CategoryId) -> PathBuf {
        self.data_dir.join(format!("{category}.csv"))
    }

    fn archive_path(&self, category: &CategoryId) -> PathBuf {
        self.data_dir.join(format!("{category}{ARCHIVE_SUFFIX}.csv"))
    }

    fn intent_path(&self, category: &CategoryId) -> PathBuf {
        self.data_dir.join(format!("{category}.{INTENT_EXTENSION}"))
    }

    /// Write a whole file through a temp file in the same directory and an
    /// atomic rename, so readers never observe a torn file.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        let mut tmp =
            NamedTempFile::new_in(&self.data_dir).map_err(|e| StorageError::io(path, e))?;
        tmp.write_all(bytes).map_err(|e| StorageError::io(path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::io(path, e))?;
        tmp.persist(path)
            .map_err(|e| StorageError::io(path, e.error))?;
        Ok(())
    }
}

#[async_trait]
impl RecordLedger for CsvLedger {
    async fn ensure_category(&self, category: &CategoryId) -> StorageResult<()> {
        ensure_file(&self.pool_path(category), &POOL_HEADER)?;
        ensure_file(&self.archive_path(category), &ARCHIVE_HEADER)?;
        Ok(())
    }

    async fn discover_categories(&self) -> StorageResult<Vec<CategoryId>> {
        let mut categories = Vec::new();
        let entries =
            std::fs::read_dir(&self.data_dir).map_err(|e| StorageError::io(&self.data_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.data_dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // Archive files carry the reserved suffix and stray files an
            // unaddressable name; neither parses as a category.
            if let Some(stem) = name.strip_suffix(".csv") {
                if let Ok(category) = CategoryId::parse(stem) {
                    categories.push(category);
                }
            }
        }
        categories.sort();
        Ok(categories)
    }

    async fn read_pool(&self, category: &CategoryId) -> StorageResult<Vec<PoolRecord>> {
        let path = self.pool_path(category);
        let rows = read_rows(&path, &POOL_HEADER)?;
        rows.into_iter()
            .map(|[account, added_by, added_at]| {
                Ok(PoolRecord {
                    account: parse_account(&path, &account)?,
                    added_by,
                    added_at: parse_timestamp(&path, &added_at)?,
                })
            })
            .collect()
    }

    async fn append_pool(&self, category: &CategoryId, record: &PoolRecord) -> StorageResult<()> {
        let path = self.pool_path(category);
        ensure_file(&path, &POOL_HEADER)?;
        let row = encode_row(&[
            record.account.as_str(),
            &record.added_by,
            &record.added_at.to_rfc3339(),
        ])?;
        append_bytes(&path, &row)?;
        debug!(category = %category, "pool append committed");
        Ok(())
    }

    async fn replace_pool(
        &self,
        category: &CategoryId,
        records: &[PoolRecord],
    ) -> StorageResult<()> {
        let path = self.pool_path(category);
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(POOL_HEADER)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        for record in records {
            writer
                .write_record([
                    record.account.as_str(),
                    &record.added_by,
                    &record.added_at.to_rfc3339(),
                ])
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        self.write_atomic(&path, &bytes)?;
        debug!(category = %category, records = records.len(), "pool rewritten");
        Ok(())
    }

    async fn read_archive(&self, category: &CategoryId) -> StorageResult<Vec<ArchivedRecord>> {
        let path = self.archive_path(category);
        let rows = read_rows(&path, &ARCHIVE_HEADER)?;
        rows.into_iter()
            .map(|[account, added_by, dispensed_at]| {
                Ok(ArchivedRecord {
                    account: parse_account(&path, &account)?,
                    added_by,
                    dispensed_at: parse_timestamp(&path, &dispensed_at)?,
                })
            })
            .collect()
    }

    async fn append_archive(
        &self,
        category: &CategoryId,
        record: &ArchivedRecord,
    ) -> StorageResult<()> {
        let path = self.archive_path(category);
        ensure_file(&path, &ARCHIVE_HEADER)?;
        let row = encode_row(&[
            record.account.as_str(),
            &record.added_by,
            &record.dispensed_at.to_rfc3339(),
        ])?;
        append_bytes(&path, &row)?;
        debug!(category = %category, "archive append committed");
        Ok(())
    }

    async fn record_dispense_intent(
        &self,
        category: &CategoryId,
        intent: &DispenseIntent,
    ) -> StorageResult<()> {
        let path = self.intent_path(category);
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(INTENT_HEADER)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        writer
            .write_record([
                intent.record.account.as_str(),
                &intent.record.added_by,
                &intent.record.added_at.to_rfc3339(),
                &intent.dispensed_at.to_rfc3339(),
            ])
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        self.write_atomic(&path, &bytes)?;
        debug!(category = %category, "dispense intent recorded");
        Ok(())
    }

    async fn dispense_intent(
        &self,
        category: &CategoryId,
    ) -> StorageResult<Option<DispenseIntent>> {
        let path = self.intent_path(category);
        match std::fs::metadata(&path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(&path, err)),
            Ok(_) => {}
        }

        let rows = read_rows(&path, &INTENT_HEADER)?;
        if rows.len() != 1 {
            return Err(StorageError::corrupt(
                &path,
                format!("expected 1 intent row, found {}", rows.len()),
            ));
        }
        let Some([account, added_by, added_at, dispensed_at]) = rows.into_iter().next() else {
            return Err(StorageError::corrupt(&path, "missing intent row"));
        };
        Ok(Some(DispenseIntent {
            record: PoolRecord {
                account: parse_account(&path, &account)?,
                added_by,
                added_at: parse_timestamp(&path, &added_at)?,
            },
            dispensed_at: parse_timestamp(&path, &dispensed_at)?,
        }))
    }

    async fn clear_dispense_intent(&self, category: &CategoryId) -> StorageResult<()> {
        let path = self.intent_path(category);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(&path, err)),
        }
    }
}

fn ensure_file<const N: usize>(path: &Path, header: &[&str; N]) -> StorageResult<()> {
    let needs_header = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
        Err(err) => return Err(StorageError::io(path, err)),
    };
    if !needs_header {
        return Ok(());
    }
    let row = encode_row(header)?;
    append_bytes(path, &row)
}

/// Serialize one CSV row into a standalone byte buffer.
fn encode_row<const N: usize>(fields: &[&str; N]) -> StorageResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| StorageError::Backend(e.to_string()))
}

/// Append a fully serialized row in a single write and fsync it.
///
/// The row is one `write_all` call, so a failed append leaves no partial
/// record behind.
fn append_bytes(path: &Path, row: &[u8]) -> StorageResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;
    file.write_all(row).map_err(|e| StorageError::io(path, e))?;
    file.sync_all().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

fn read_rows<const N: usize>(path: &Path, header: &[&str; N]) -> StorageResult<Vec<[String; N]>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| StorageError::io(path, e))?;

    let found = reader
        .headers()
        .map_err(|e| StorageError::corrupt(path, e.to_string()))?;
    if !found.iter().eq(header.iter().copied()) {
        return Err(StorageError::corrupt(
            path,
            format!("expected header {header:?}, found {found:?}"),
        ));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| StorageError::corrupt(path, e.to_string()))?;
        if record.len() != N {
            return Err(StorageError::corrupt(
                path,
                format!("expected {N} fields, found {}", record.len()),
            ));
        }
        let row: [String; N] = record
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| StorageError::corrupt(path, format!("expected {N} fields")))?;
        rows.push(row);
    }
    Ok(rows)
}

fn parse_account(path: &Path, raw: &str) -> StorageResult<RecordText> {
    RecordText::parse(raw).map_err(|e| StorageError::corrupt(path, format!("bad account: {e}")))
}

fn parse_timestamp(path: &Path, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::corrupt(path, format!("bad timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category() -> CategoryId {
        CategoryId::parse("netflix").unwrap()
    }

    fn record(account: &str) -> PoolRecord {
        PoolRecord::new(RecordText::parse(account).unwrap(), "alice", Utc::now())
    }

    #[tokio::test]
    async fn ensure_creates_header_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        ledger.ensure_category(&category()).await.unwrap();

        let pool = std::fs::read_to_string(dir.path().join("netflix.csv")).unwrap();
        assert_eq!(pool.trim(), "account,added_by,added_at");
        let used = std::fs::read_to_string(dir.path().join("netflix_used.csv")).unwrap();
        assert_eq!(used.trim(), "account,added_by,dispensed_at");

        assert!(ledger.read_pool(&category()).await.unwrap().is_empty());
        assert!(ledger.read_archive(&category()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        ledger.ensure_category(&category()).await.unwrap();
        ledger
            .append_pool(&category(), &record("a@x.com:pw1"))
            .await
            .unwrap();
        ledger.ensure_category(&category()).await.unwrap();
        assert_eq!(ledger.read_pool(&category()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_then_read_preserves_order_and_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        ledger.ensure_category(&category()).await.unwrap();

        ledger
            .append_pool(&category(), &record("a@x.com:pw1"))
            .await
            .unwrap();
        ledger
            .append_pool(&category(), &record("b@x.com:pw2"))
            .await
            .unwrap();

        let pool = ledger.read_pool(&category()).await.unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].account.as_str(), "a@x.com:pw1");
        assert_eq!(pool[1].account.as_str(), "b@x.com:pw2");
        assert_eq!(pool[0].added_by, "alice");
    }

    #[tokio::test]
    async fn replace_pool_rewrites_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        ledger.ensure_category(&category()).await.unwrap();

        let first = record("a@x.com:pw1");
        let second = record("b@x.com:pw2");
        ledger.append_pool(&category(), &first).await.unwrap();
        ledger.append_pool(&category(), &second).await.unwrap();

        ledger
            .replace_pool(&category(), std::slice::from_ref(&second))
            .await
            .unwrap();

        let pool = ledger.read_pool(&category()).await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].account.as_str(), "b@x.com:pw2");
    }

    #[tokio::test]
    async fn archive_append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ledger = CsvLedger::open(dir.path()).unwrap();
            ledger.ensure_category(&category()).await.unwrap();
            let archived = record("a@x.com:pw1").into_archived(Utc::now());
            ledger
                .append_archive(&category(), &archived)
                .await
                .unwrap();
        }
        let ledger = CsvLedger::open(dir.path()).unwrap();
        let archive = ledger.read_archive(&category()).await.unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive[0].account.as_str(), "a@x.com:pw1");
    }

    #[tokio::test]
    async fn discovery_skips_archive_intent_and_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        let spotify = CategoryId::parse("spotify").unwrap();
        ledger.ensure_category(&category()).await.unwrap();
        ledger.ensure_category(&spotify).await.unwrap();

        let intent = DispenseIntent::new(record("a@x.com:pw1"), Utc::now());
        ledger
            .record_dispense_intent(&category(), &intent)
            .await
            .unwrap();
        std::fs::write(dir.path().join("weird name.csv"), "junk").unwrap();

        let discovered = ledger.discover_categories().await.unwrap();
        assert_eq!(discovered, vec![category(), spotify]);
    }

    #[tokio::test]
    async fn dispense_intent_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        ledger.ensure_category(&category()).await.unwrap();
        assert!(ledger.dispense_intent(&category()).await.unwrap().is_none());

        let intent = DispenseIntent::new(record("a@x.com:pw1"), Utc::now());
        ledger
            .record_dispense_intent(&category(), &intent)
            .await
            .unwrap();
        let pending = ledger.dispense_intent(&category()).await.unwrap().unwrap();
        assert_eq!(pending, intent);

        ledger.clear_dispense_intent(&category()).await.unwrap();
        assert!(ledger.dispense_intent(&category()).await.unwrap().is_none());
        ledger.clear_dispense_intent(&category()).await.unwrap();
    }

    #[tokio::test]
    async fn hand_edited_garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        ledger.ensure_category(&category()).await.unwrap();

        std::fs::write(
            dir.path().join("netflix.csv"),
            "account,added_by,added_at\nno-separator-here,alice,2024-01-01T00:00:00+00:00\n",
        )
        .unwrap();

        let err = ledger.read_pool(&category()).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn wrong_header_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("netflix.csv"), "user,pass\n").unwrap();

        let err = ledger.read_pool(&category()).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn bad_timestamp_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CsvLedger::open(dir.path()).unwrap();
        std::fs::write(
            dir.path().join("netflix.csv"),
            "account,added_by,added_at\na@x.com:pw1,alice,yesterday\n",
        )
        .unwrap();

        let err = ledger.read_pool(&category()).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
