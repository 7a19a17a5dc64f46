use crate::ids::{self, IdStrategy};
use crate::model::{NewTask, Task, TaskError, TaskPatch};
use crate::row::{data_rows, find_row, SheetRow};
use crate::store::RowStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Task operations resolved against a positional row store.
///
/// Updates and deletes read the whole range, scan for the id and then write
/// in a second round trip. Nothing serializes two mutations of the same id.
#[derive(Clone)]
pub struct TaskSheet {
    store: Arc<dyn RowStore>,
    ids: IdStrategy,
}

impl TaskSheet {
    pub fn new(store: Arc<dyn RowStore>, ids: IdStrategy) -> Self {
        TaskSheet { store, ids }
    }

    pub async fn list(&self) -> Result<Vec<Task>, TaskError> {
        let rows = self.store.read_rows().await?;
        Ok(data_rows(&rows).map(|row| row.to_task()).collect())
    }

    pub async fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        match self.ids {
            IdStrategy::Random => {
                let mut rng = rand::thread_rng();
                ids::random_token(now, &mut rng)
            }
            IdStrategy::Sequential => match self.store.read_rows().await {
                Ok(rows) => ids::next_sequential(
                    rows.iter().skip(1).filter_map(|row| row.first()).map(String::as_str),
                ),
                Err(err) => {
                    let fallback = ids::timestamp_fallback(now);
                    warn!(error = %err, id = %fallback, "id allocation fell back to timestamp");
                    fallback
                }
            },
        }
    }

    pub async fn create(&self, new: NewTask) -> Result<Task, TaskError> {
        new.validated_title()?;
        let id = self.next_id().await;
        let row = SheetRow::new(id, &new);
        self.store.append_row(row.encode()).await?;
        info!(id = %row.id, "task created");
        Ok(row.to_task())
    }

    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, TaskError> {
        patch.validate()?;
        let rows = self.store.read_rows().await?;
        let position = find_row(&rows, id).ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        let mut row = SheetRow::decode(&rows[position]);
        row.apply(&patch);
        self.store.write_row(position, row.encode()).await?;
        info!(id, position, "task updated");
        Ok(row.to_task())
    }

    pub async fn delete(&self, id: &str) -> Result<(), TaskError> {
        let rows = self.store.read_rows().await?;
        let position = find_row(&rows, id).ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        let sheet_id = self.store.sheet_id().await?;
        self.store.delete_row(sheet_id, position).await?;
        info!(id, position, "task deleted");
        Ok(())
    }
}
