//! Positional row stores. Rows are addressed by their position in the
//! result of [`RowStore::read_rows`]; position 0 is the header row.

mod memory;
mod sheets;
mod yaml;

pub use memory::MemorySheet;
pub use sheets::{GoogleSheets, ServiceAccountKey};
pub use yaml::{init_project_sheet, locate_sheet, SheetLocation, SheetScope, YamlSheet};

use crate::row::Row;
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sheet not found: {0}")]
    SheetMissing(String),
    #[error("row {0} is out of range")]
    RowOutOfRange(usize),
    #[error("row store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("row store returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid credentials: {0}")]
    Credentials(String),
    #[error("signing token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("unexpected row store response: {0}")]
    Decode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("sheet file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Every row of the task range, header included.
    async fn read_rows(&self) -> Result<Vec<Row>, StoreError>;

    async fn append_row(&self, row: Row) -> Result<(), StoreError>;

    async fn write_row(&self, position: usize, row: Row) -> Result<(), StoreError>;

    /// Internal identifier of the sheet holding the task range.
    async fn sheet_id(&self) -> Result<i64, StoreError>;

    async fn delete_row(&self, sheet_id: i64, position: usize) -> Result<(), StoreError>;
}
