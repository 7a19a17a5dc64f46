use crate::ids::IdStrategy;
use crate::store::{
    locate_sheet, GoogleSheets, RowStore, ServiceAccountKey, SheetLocation, StoreError, YamlSheet,
};
use clap::{Args, ValueEnum};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_API_URL: &str = "http://localhost:10000/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Google Sheets, via a service account.
    Sheets,
    /// A local YAML sheet file.
    File,
}

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Row store backend
    #[arg(long, env = "TASKSHEET_BACKEND", value_enum, default_value_t = Backend::Sheets)]
    pub backend: Backend,
    /// Spreadsheet id (sheets backend)
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,
    /// Sheet (tab) holding the task rows
    #[arg(long, env = "SHEET_NAME", default_value = "Sheet1")]
    pub sheet_name: String,
    /// Service account key JSON (sheets backend)
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_KEY", hide_env_values = true)]
    pub credentials: Option<String>,
    /// Sheet file (file backend); defaults to the project or per-user sheet
    #[arg(long, env = "TASKSHEET_FILE")]
    pub sheet_file: Option<PathBuf>,
    /// Directory holding a built client (index.html and assets)
    #[arg(long, env = "STATIC_DIR", default_value = "dist")]
    pub static_dir: PathBuf,
    /// How new task ids are allocated; keep one strategy per sheet
    #[arg(long, value_enum, default_value_t = IdStrategy::Sequential)]
    pub id_strategy: IdStrategy,
}

impl ServeConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Opens the configured row store. Any failure here is fatal for `serve`.
    pub async fn open_store(&self) -> Result<Arc<dyn RowStore>, StoreError> {
        match self.backend {
            Backend::Sheets => {
                let spreadsheet_id = self
                    .spreadsheet_id
                    .clone()
                    .ok_or_else(|| StoreError::Credentials("SPREADSHEET_ID is not set".into()))?;
                let raw = self.credentials.as_deref().ok_or_else(|| {
                    StoreError::Credentials("GOOGLE_SERVICE_ACCOUNT_KEY is not set".into())
                })?;
                let key = ServiceAccountKey::from_json(raw)?;
                let sheets = GoogleSheets::new(key, spreadsheet_id, self.sheet_name.clone())
                    .connect()
                    .await?;
                let store: Arc<dyn RowStore> = Arc::new(sheets);
                Ok(store)
            }
            Backend::File => {
                let location = match &self.sheet_file {
                    Some(path) => SheetLocation::explicit(path.clone()),
                    None => locate_sheet(&std::env::current_dir()?)?,
                };
                let sheet = YamlSheet::open(location)?;
                info!(
                    path = %sheet.location().path.display(),
                    scope = ?sheet.location().scope,
                    "using sheet file"
                );
                let store: Arc<dyn RowStore> = Arc::new(sheet);
                Ok(store)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        serve: ServeConfig,
    }

    #[tokio::test]
    async fn file_backend_opens_explicit_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.yml");
        let harness = Harness::parse_from([
            "test",
            "--backend",
            "file",
            "--sheet-file",
            path.to_str().unwrap(),
            "--port",
            "8080",
        ]);
        assert_eq!(harness.serve.addr().port(), 8080);
        let store = harness.serve.open_store().await.unwrap();
        assert_eq!(store.read_rows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sheets_backend_requires_spreadsheet_id() {
        let mut harness = Harness::parse_from(["test", "--backend", "sheets"]);
        harness.serve.spreadsheet_id = None;
        assert!(matches!(
            harness.serve.open_store().await,
            Err(StoreError::Credentials(_))
        ));
    }
}
