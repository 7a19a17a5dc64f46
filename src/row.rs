use crate::model::{is_truthy_text, NewTask, Priority, Task, TaskPatch};

pub type Row = Vec<String>;

pub const COLUMN_COUNT: usize = 9;
pub const LAST_COLUMN: char = 'I';
pub const HEADER: [&str; COLUMN_COUNT] = [
    "TaskId",
    "Title",
    "Content",
    "DueDate",
    "Completed",
    "Source",
    "EventId",
    "Category",
    "Priority",
];
pub const SOURCE_TAG: &str = "Web";

/// One task row, in sheet column order.
///
/// Cells are kept as stored, apart from the id (trimmed for matching) and the
/// completed flag, so writing an unpatched row back leaves its text untouched.
/// The priority cell stays raw text; [`SheetRow::priority`] decodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub due_date: String,
    pub completed: bool,
    pub source: String,
    pub event_id: String,
    pub category: String,
    pub priority: String,
}

impl SheetRow {
    pub fn new(id: String, task: &NewTask) -> Self {
        SheetRow {
            id,
            title: task.title.clone().unwrap_or_default(),
            content: task.content.clone().unwrap_or_default(),
            due_date: task.due_date.clone().unwrap_or_default(),
            completed: false,
            source: SOURCE_TAG.to_string(),
            event_id: String::new(),
            category: task.category.clone().unwrap_or_default(),
            priority: task.priority.unwrap_or_default().as_str().to_string(),
        }
    }

    /// Missing trailing cells take their defaults.
    pub fn decode(cells: &[String]) -> Self {
        let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or_default();
        SheetRow {
            id: cell(0).trim().to_string(),
            title: cell(1).to_string(),
            content: cell(2).to_string(),
            due_date: cell(3).to_string(),
            completed: is_truthy_text(cell(4)),
            source: cell(5).to_string(),
            event_id: cell(6).to_string(),
            category: cell(7).to_string(),
            priority: cell(8).to_string(),
        }
    }

    pub fn encode(&self) -> Row {
        vec![
            self.id.clone(),
            self.title.clone(),
            self.content.clone(),
            self.due_date.clone(),
            self.completed.to_string(),
            self.source.clone(),
            self.event_id.clone(),
            self.category.clone(),
            self.priority.clone(),
        ]
    }

    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(due) = &patch.due_date {
            self.due_date = due.clone();
        }
        if let Some(completed) = &patch.completed {
            self.completed = completed.is_true();
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority.as_str().to_string();
        }
    }

    /// Unknown or blank priority text reads as medium.
    pub fn priority(&self) -> Priority {
        Priority::parse(&self.priority).unwrap_or_default()
    }

    pub fn to_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            due_date: if self.due_date.trim().is_empty() {
                None
            } else {
                Some(self.due_date.clone())
            },
            completed: self.completed,
            category: self.category.clone(),
            priority: self.priority(),
        }
    }
}

pub fn header_row() -> Row {
    HEADER.iter().map(|h| h.to_string()).collect()
}

/// Position of the first data row holding `id`. Position 0 is the header.
pub fn find_row(rows: &[Row], id: &str) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| row.first().map(|c| c.trim()) == Some(id))
        .map(|(idx, _)| idx)
}

pub fn data_rows(rows: &[Row]) -> impl Iterator<Item = SheetRow> + '_ {
    rows.iter()
        .skip(1)
        .map(|cells| SheetRow::decode(cells))
        .filter(|row| !row.id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Flag;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn decode_fills_defaults_for_short_rows() {
        let decoded = SheetRow::decode(&row(&["004", "Buy milk"]));
        assert_eq!(decoded.id, "004");
        assert_eq!(decoded.content, "");
        assert!(!decoded.completed);
        assert_eq!(decoded.priority(), Priority::Medium);
        let task = decoded.to_task();
        assert_eq!(task.due_date, None);
        assert_eq!(task.category, "");
    }

    #[test]
    fn decode_coerces_completed_flag() {
        for raw in ["true", "TRUE", "1", "True"] {
            let cells = row(&["1", "t", "", "", raw]);
            assert!(SheetRow::decode(&cells).completed, "{raw}");
        }
        for raw in ["false", "", "0", "yes"] {
            let cells = row(&["1", "t", "", "", raw]);
            assert!(!SheetRow::decode(&cells).completed, "{raw}");
        }
    }

    #[test]
    fn unknown_priority_falls_back_to_medium() {
        let cells = row(&["1", "t", "", "", "false", "Web", "", "work", "urgent"]);
        let decoded = SheetRow::decode(&cells);
        assert_eq!(decoded.priority(), Priority::Medium);
        assert_eq!(decoded.encode()[8], "urgent");
    }

    #[test]
    fn new_rows_encode_in_column_order() {
        let task = NewTask {
            title: Some("Report".into()),
            due_date: Some("2024-05-01T10:00".into()),
            category: Some("work".into()),
            priority: Some(Priority::High),
            ..NewTask::default()
        };
        let encoded = SheetRow::new("007".into(), &task).encode();
        assert_eq!(
            encoded,
            row(&[
                "007",
                "Report",
                "",
                "2024-05-01T10:00",
                "false",
                "Web",
                "",
                "work",
                "high"
            ])
        );
        assert_eq!(encoded.len(), COLUMN_COUNT);
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let mut stored = SheetRow::decode(&row(&[
            "003", "Read", "ch. 4", "2024-06-01", "false", "Web", "evt", "study", "low",
        ]));
        stored.apply(&TaskPatch {
            completed: Some(Flag::Text("true".into())),
            ..TaskPatch::default()
        });
        assert!(stored.completed);
        assert_eq!(stored.title, "Read");
        assert_eq!(stored.content, "ch. 4");
        assert_eq!(stored.due_date, "2024-06-01");
        assert_eq!(stored.event_id, "evt");
        assert_eq!(stored.category, "study");
        assert_eq!(stored.priority(), Priority::Low);
    }

    #[test]
    fn unpatched_cells_encode_byte_for_byte() {
        let stored = row(&[
            "003",
            "  Read ",
            "  - step one\n  - step two\n",
            " 2024-06-01 ",
            "TRUE",
            "Web",
            "",
            " study",
            "High",
        ]);
        let mut decoded = SheetRow::decode(&stored);
        decoded.apply(&TaskPatch::completed(true));
        assert_eq!(decoded.encode(), {
            let mut expected = stored.clone();
            expected[4] = "true".into();
            expected
        });
        assert_eq!(decoded.priority(), Priority::High);
        assert_eq!(decoded.to_task().title, "  Read ");

        decoded.apply(&TaskPatch {
            priority: Some(Priority::Low),
            ..TaskPatch::default()
        });
        assert_eq!(decoded.encode()[8], "low");
    }

    #[test]
    fn find_row_skips_header() {
        let rows = vec![
            header_row(),
            row(&["001", "a"]),
            row(&["TaskId", "dup"]),
            row(&["002", "b"]),
            row(&["002", "c"]),
        ];
        assert_eq!(find_row(&rows, "TaskId"), Some(2));
        assert_eq!(find_row(&rows, "002"), Some(3));
        assert_eq!(find_row(&rows, "999"), None);
        assert_eq!(find_row(&rows, "001"), Some(1));
    }

    #[test]
    fn data_rows_skip_blank_ids() {
        let rows = vec![header_row(), row(&["001", "a"]), row(&[]), row(&["", "orphan"])];
        let ids: Vec<_> = data_rows(&rows).map(|r| r.id).collect();
        assert_eq!(ids, vec!["001"]);
    }
}
