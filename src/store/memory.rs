use super::{RowStore, StoreError};
use crate::row::{header_row, Row};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

pub const MEMORY_SHEET_ID: i64 = 0;

pub struct MemorySheet {
    pub rows: Mutex<Vec<Row>>,
    pub fail_reads: AtomicBool,
    pub writes: AtomicU64,
}

impl Default for MemorySheet {
    fn default() -> Self {
        Self::with_rows(Vec::new())
    }
}

impl MemorySheet {
    /// A sheet holding the header followed by `rows`.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let mut all = vec![header_row()];
        all.extend(rows);
        MemorySheet {
            rows: Mutex::new(all),
            fail_reads: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RowStore for MemorySheet {
    async fn read_rows(&self) -> Result<Vec<Row>, StoreError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Decode("simulated read failure".to_string()));
        }
        Ok(self.rows.lock().await.clone())
    }

    async fn append_row(&self, row: Row) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.rows.lock().await.push(row);
        Ok(())
    }

    async fn write_row(&self, position: usize, row: Row) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let slot = rows
            .get_mut(position)
            .ok_or(StoreError::RowOutOfRange(position))?;
        *slot = row;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn sheet_id(&self) -> Result<i64, StoreError> {
        Ok(MEMORY_SHEET_ID)
    }

    async fn delete_row(&self, sheet_id: i64, position: usize) -> Result<(), StoreError> {
        if sheet_id != MEMORY_SHEET_ID {
            return Err(StoreError::SheetMissing(sheet_id.to_string()));
        }
        let mut rows = self.rows.lock().await;
        if position >= rows.len() {
            return Err(StoreError::RowOutOfRange(position));
        }
        rows.remove(position);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
