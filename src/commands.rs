use crate::client::{HttpTaskApi, Prompt, TaskBoard, TaskForm};
use crate::config::ServeConfig;
use crate::model::{Priority, Task};
use crate::render::{category_glyph, render_task_list};
use crate::server::{build_router, AppState, Shell};
use crate::service::TaskSheet;
use crate::store::init_project_sheet;
use crate::ui;
use crate::view::{format_due_date, normalize_due, today, SortKey, StatusFilter, ViewMode};
use anyhow::{anyhow, bail, Context, Result};
use std::io::{self, BufRead, Write};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tracing::info;

pub fn serve(config: ServeConfig) -> Result<()> {
    let rt = runtime()?;
    rt.block_on(async move {
        let store = config
            .open_store()
            .await
            .context("initializing row store")?;
        info!(backend = ?config.backend, "row store connected");
        let state = AppState::new(TaskSheet::new(store, config.id_strategy));
        let shell = Shell::detect(Some(config.static_dir.clone()));
        let app = build_router(state, shell);
        let addr = config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        info!(%addr, "server running");
        axum::serve(listener, app).await.context("serving")?;
        Ok(())
    })
}

pub fn init(name: Option<String>) -> Result<()> {
    let location = init_project_sheet(name)?;
    println!("Initialized sheet at {}", location.path.display());
    Ok(())
}

pub fn list(
    api: &str,
    view: ViewMode,
    filter: StatusFilter,
    sort: SortKey,
    category: String,
    html: bool,
) -> Result<()> {
    let rt = runtime()?;
    let mut board = connect(api)?;
    load(&rt, &mut board, api)?;
    board.set_mode(view);
    board.set_filter(filter);
    board.set_sort(sort);
    board.set_category(category.parse()?);
    let today = today();
    let items = board.view(today);
    if html {
        println!("{}", render_task_list(&items, today));
        return Ok(());
    }
    println!(
        "Tasks: {} view, {} / sorted by {} ({} shown)",
        view.label(),
        filter.label(),
        sort.label(),
        items.len()
    );
    if items.is_empty() {
        println!("  (no tasks)");
    }
    for task in items {
        print_task(task);
    }
    Ok(())
}

pub fn add(
    api: &str,
    title: String,
    content: Option<String>,
    due: Option<String>,
    category: Option<String>,
    priority: Priority,
) -> Result<()> {
    let rt = runtime()?;
    let mut board = connect(api)?;
    let form = TaskForm {
        title,
        content: content.unwrap_or_default(),
        due_date: parse_due_arg(due.as_deref())?.unwrap_or_default(),
        category: category.unwrap_or_default(),
        priority,
    };
    if !rt.block_on(board.submit(form)) {
        bail!("task was not added");
    }
    if let Some(task) = board.tasks().last() {
        println!("Added task {}", task.id);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    api: &str,
    id: String,
    title: Option<String>,
    content: Option<String>,
    due: Option<String>,
    clear_due: bool,
    category: Option<String>,
    priority: Option<Priority>,
) -> Result<()> {
    let rt = runtime()?;
    let mut board = connect(api)?;
    load(&rt, &mut board, api)?;
    let due = parse_due_arg(due.as_deref())?;
    let mut form = board
        .start_edit(&id)
        .ok_or_else(|| anyhow!("task {} not found", id))?;
    if let Some(t) = title {
        form.title = t;
    }
    if let Some(c) = content {
        form.content = c;
    }
    if clear_due {
        form.due_date.clear();
    }
    if let Some(d) = due {
        form.due_date = d;
    }
    if let Some(c) = category {
        form.category = c;
    }
    if let Some(p) = priority {
        form.priority = p;
    }
    if !rt.block_on(board.submit(form)) {
        bail!("task {} was not updated", id);
    }
    println!("Updated task {}", id);
    Ok(())
}

pub fn toggle(api: &str, id: String) -> Result<()> {
    let rt = runtime()?;
    let mut board = connect(api)?;
    load(&rt, &mut board, api)?;
    if board.task(&id).is_none() {
        bail!("task {} not found", id);
    }
    if !rt.block_on(board.toggle(&id)) {
        bail!("task {} was not toggled", id);
    }
    let state = match board.task(&id) {
        Some(task) if task.completed => "completed",
        _ => "active",
    };
    println!("Task {} is now {}", id, state);
    Ok(())
}

pub fn delete(api: &str, id: String) -> Result<()> {
    let rt = runtime()?;
    let mut board = connect(api)?;
    load(&rt, &mut board, api)?;
    if board.task(&id).is_none() {
        bail!("task {} not found", id);
    }
    if rt.block_on(board.delete(&id)) {
        println!("Deleted task {}", id);
    } else if board.task(&id).is_some() {
        println!("Kept task {}", id);
    }
    Ok(())
}

pub fn tui(api: &str) -> Result<()> {
    let rt = runtime()?;
    let api = HttpTaskApi::new(api)?;
    ui::run(rt, api)
}

/// Stdin/stderr prompt for one-shot commands.
pub struct StdioPrompt;

impl Prompt for StdioPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        print!("{} [y/N] ", message);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim(), "y" | "Y" | "yes" | "YES")
    }

    fn alert(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

fn connect(api: &str) -> Result<TaskBoard<HttpTaskApi>> {
    let api = HttpTaskApi::new(api)?;
    Ok(TaskBoard::new(api, Box::new(StdioPrompt)))
}

/// A failed load has already alerted; this turns it into the command's error.
fn load(rt: &Runtime, board: &mut TaskBoard<HttpTaskApi>, api: &str) -> Result<()> {
    if !rt.block_on(board.load()) {
        bail!("could not load tasks from {}", api);
    }
    Ok(())
}

fn runtime() -> Result<Runtime> {
    Runtime::new().context("starting async runtime")
}

fn parse_due_arg(input: Option<&str>) -> Result<Option<String>> {
    let raw = match input {
        Some(r) => r.trim(),
        None => return Ok(None),
    };
    if raw.is_empty() {
        return Ok(None);
    }
    normalize_due(raw)
        .map(Some)
        .ok_or_else(|| anyhow!("invalid date (use YYYY-MM-DDTHH:MM or YYYY.MM.DD@hh:mm): {}", raw))
}

fn print_task(task: &Task) {
    let check = if task.completed { "x" } else { " " };
    println!(
        "  [{}] {}: {}  ({} {})",
        check,
        task.id,
        task.title,
        category_glyph(&task.category),
        task.priority
    );
    if !task.content.is_empty() {
        println!("      {}", task.content);
    }
    if let Some(due) = format_due_date(task.due_date.as_deref(), today()) {
        println!("      due {} ({})", due, task.due_date.as_deref().unwrap_or_default());
    }
}
