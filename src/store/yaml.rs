use super::{RowStore, StoreError};
use crate::row::{header_row, Row};
use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

const PROJECT_DIR: &str = ".tasksheet";
const SHEET_FILE: &str = "sheet.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetScope {
    Project,
    Global,
    Explicit,
}

#[derive(Debug, Clone)]
pub struct SheetLocation {
    pub path: PathBuf,
    pub scope: SheetScope,
}

impl SheetLocation {
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        SheetLocation {
            path: path.into(),
            scope: SheetScope::Explicit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct SheetFile {
    title: String,
    sheet_id: i64,
    rows: Vec<Row>,
}

impl SheetFile {
    fn empty(title: impl Into<String>) -> Self {
        SheetFile {
            title: title.into(),
            sheet_id: 0,
            rows: vec![header_row()],
        }
    }
}

/// A sheet kept in a local YAML file, rewritten after every mutation.
pub struct YamlSheet {
    location: SheetLocation,
    sheet: Mutex<SheetFile>,
}

impl YamlSheet {
    /// Opens the sheet at `location`, creating it with a header row if missing.
    pub fn open(location: SheetLocation) -> Result<Self, StoreError> {
        let sheet = if location.path.exists() {
            let data = fs::read_to_string(&location.path)?;
            serde_yaml::from_str(&data)?
        } else {
            let sheet = SheetFile::empty(default_title(&location));
            save_sheet(&location.path, &sheet)?;
            sheet
        };
        Ok(YamlSheet {
            location,
            sheet: Mutex::new(sheet),
        })
    }

    pub fn location(&self) -> &SheetLocation {
        &self.location
    }

    /// Applies `change` to a copy and keeps it only once the file is saved.
    async fn commit<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SheetFile) -> Result<(), StoreError> + Send,
    {
        let mut sheet = self.sheet.lock().await;
        let mut next = sheet.clone();
        change(&mut next)?;
        save_sheet(&self.location.path, &next)?;
        *sheet = next;
        Ok(())
    }
}

#[async_trait]
impl RowStore for YamlSheet {
    async fn read_rows(&self) -> Result<Vec<Row>, StoreError> {
        Ok(self.sheet.lock().await.rows.clone())
    }

    async fn append_row(&self, row: Row) -> Result<(), StoreError> {
        self.commit(|sheet| {
            sheet.rows.push(row);
            Ok(())
        })
        .await
    }

    async fn write_row(&self, position: usize, row: Row) -> Result<(), StoreError> {
        self.commit(|sheet| {
            let slot = sheet
                .rows
                .get_mut(position)
                .ok_or(StoreError::RowOutOfRange(position))?;
            *slot = row;
            Ok(())
        })
        .await
    }

    async fn sheet_id(&self) -> Result<i64, StoreError> {
        Ok(self.sheet.lock().await.sheet_id)
    }

    async fn delete_row(&self, sheet_id: i64, position: usize) -> Result<(), StoreError> {
        self.commit(|sheet| {
            if sheet.sheet_id != sheet_id {
                return Err(StoreError::SheetMissing(sheet_id.to_string()));
            }
            if position >= sheet.rows.len() {
                return Err(StoreError::RowOutOfRange(position));
            }
            sheet.rows.remove(position);
            Ok(())
        })
        .await
    }
}

pub fn init_project_sheet(name: Option<String>) -> Result<SheetLocation, StoreError> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(SHEET_FILE);
    if !path.exists() {
        let title = name.unwrap_or_else(|| {
            cwd.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("tasks")
                .to_string()
        });
        save_sheet(&path, &SheetFile::empty(title))?;
    }
    Ok(SheetLocation {
        path,
        scope: SheetScope::Project,
    })
}

pub fn locate_sheet(start: &Path) -> Result<SheetLocation, StoreError> {
    if let Some(project_path) = find_project_sheet(start) {
        return Ok(SheetLocation {
            path: project_path,
            scope: SheetScope::Project,
        });
    }
    Ok(SheetLocation {
        path: global_sheet_path()?,
        scope: SheetScope::Global,
    })
}

/// Writes a sibling temp file and renames it over `path`.
fn save_sheet(path: &Path, sheet: &SheetFile) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let serialized = serde_yaml::to_string(sheet)?;
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(serialized.as_bytes())?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn default_title(location: &SheetLocation) -> String {
    match location.scope {
        SheetScope::Project => location
            .path
            .parent()
            .and_then(|p| p.parent())
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("tasks")
            .to_string(),
        SheetScope::Global | SheetScope::Explicit => "Sheet1".to_string(),
    }
}

fn find_project_sheet(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR).join(SHEET_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_sheet_path() -> Result<PathBuf, StoreError> {
    let dirs = ProjectDirs::from("", "", "tasksheet")
        .ok_or_else(|| StoreError::SheetMissing("no per-user data directory".to_string()))?;
    Ok(dirs.data_dir().join(SHEET_FILE))
}
