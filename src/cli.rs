use crate::config::{ServeConfig, DEFAULT_API_URL};
use crate::model::Priority;
use crate::view::{SortKey, StatusFilter, ViewMode};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tasksheet", version, about = "Task tracker backed by a spreadsheet")]
pub struct Cli {
    /// Base URL of the task API
    #[arg(long, global = true, env = "TASKSHEET_API", default_value = DEFAULT_API_URL)]
    pub api: String,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the task API and client shell
    Serve(ServeConfig),
    /// Create a project sheet file in the current directory
    Init {
        /// Optional sheet title
        #[arg(long)]
        name: Option<String>,
    },
    /// List tasks
    List {
        /// Which view to derive
        #[arg(long, value_enum, default_value_t = ViewMode::List)]
        view: ViewMode,
        /// Completion filter
        #[arg(long, value_enum, default_value_t = StatusFilter::All)]
        filter: StatusFilter,
        /// Sort order
        #[arg(long, value_enum, default_value_t = SortKey::Date)]
        sort: SortKey,
        /// Category filter (list view), or "all"
        #[arg(long, default_value = "all")]
        category: String,
        /// Print the rendered HTML fragment instead of text
        #[arg(long)]
        html: bool,
    },
    /// Add a new task
    Add {
        /// Title of the task
        title: String,
        /// Optional details
        #[arg(long)]
        content: Option<String>,
        /// Due date (YYYY-MM-DDTHH:MM, YYYY-MM-DD or YYYY.MM.DD@hh:mm)
        #[arg(long)]
        due: Option<String>,
        /// Category, e.g. work, study, shopping
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    /// Edit an existing task
    Edit {
        /// Task id to edit
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New details
        #[arg(long)]
        content: Option<String>,
        /// New due date
        #[arg(long)]
        due: Option<String>,
        /// Clear the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
        /// New category
        #[arg(long)]
        category: Option<String>,
        /// New priority
        #[arg(long, value_enum)]
        priority: Option<Priority>,
    },
    /// Flip a task between active and completed
    Toggle {
        /// Task id
        id: String,
    },
    /// Delete a task (asks for confirmation)
    Delete {
        /// Task id
        id: String,
    },
    /// Launch the interactive TUI
    Tui,
}
