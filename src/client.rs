use crate::model::{NewTask, Priority, Task, TaskId, TaskPatch};
use crate::view::{derive_view, CategoryFilter, SortKey, StatusFilter, ViewMode, ViewOptions};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::sync::mpsc;
use tracing::{error, info};

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("please enter a title")]
    EmptyTitle,
    #[error("invalid server url: {0}")]
    BadUrl(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Api { status: StatusCode, message: String },
}

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Task>, ClientError>;
    async fn create(&self, task: &NewTask) -> Result<Task, ClientError>;
    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Task, ClientError>;
    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// The REST surface served by `tasksheet serve`.
pub struct HttpTaskApi {
    base: Url,
    client: Client,
}

impl HttpTaskApi {
    /// `base` points at the `/api` root, e.g. `http://localhost:10000/api`.
    pub fn new(base: &str) -> Result<Self, ClientError> {
        let trimmed = base.trim_end_matches('/');
        let base = Url::parse(&format!("{trimmed}/"))
            .map_err(|e| ClientError::BadUrl(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::BadUrl(base.to_string()));
        }
        Ok(HttpTaskApi {
            base,
            client: Client::new(),
        })
    }

    fn url(&self, id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("tasks");
            if let Some(id) = id {
                path.push(id);
            }
        }
        url
    }

    fn create_request(&self, task: &NewTask) -> RequestBuilder {
        self.client.post(self.url(None)).json(task)
    }

    fn update_request(&self, id: &str, patch: &TaskPatch) -> RequestBuilder {
        self.client.put(self.url(Some(id))).json(patch)
    }

    /// Body serialization errors surface from `send` as `Network`.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => "request failed".to_string(),
        };
        Err(ClientError::Api { status, message })
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list(&self) -> Result<Vec<Task>, ClientError> {
        let resp = self.send(self.client.get(self.url(None))).await?;
        Ok(resp.json().await?)
    }

    async fn create(&self, task: &NewTask) -> Result<Task, ClientError> {
        let resp = self.send(self.create_request(task)).await?;
        Ok(resp.json().await?)
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Task, ClientError> {
        let resp = self.send(self.update_request(id, patch)).await?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.send(self.client.delete(self.url(Some(id)))).await?;
        Ok(())
    }
}

/// User-facing confirmation and error reporting.
pub trait Prompt: Send {
    fn confirm(&mut self, message: &str) -> bool;
    fn alert(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Loaded(usize),
    Added(TaskId),
    Updated(TaskId),
    Deleted(TaskId),
    EditStarted(TaskId),
    EditCanceled,
    ViewChanged,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub content: String,
    pub due_date: String,
    pub category: String,
    pub priority: Priority,
}

impl TaskForm {
    pub fn from_task(task: &Task) -> Self {
        TaskForm {
            title: task.title.clone(),
            content: task.content.clone(),
            due_date: task.due_date.clone().unwrap_or_default(),
            category: task.category.clone(),
            priority: task.priority,
        }
    }
}

/// Owns the cached task list and the view selections. The server copy is
/// authoritative: every mutation replaces the local entry with the response.
pub struct TaskBoard<A> {
    api: A,
    prompt: Box<dyn Prompt>,
    tasks: Vec<Task>,
    options: ViewOptions,
    editing: Option<TaskId>,
    listeners: Vec<mpsc::Sender<BoardEvent>>,
}

impl<A: TaskApi> TaskBoard<A> {
    pub fn new(api: A, prompt: Box<dyn Prompt>) -> Self {
        TaskBoard {
            api,
            prompt,
            tasks: Vec::new(),
            options: ViewOptions::default(),
            editing: None,
            listeners: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn view(&self, today: NaiveDate) -> Vec<&Task> {
        derive_view(&self.tasks, &self.options, today)
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<BoardEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    /// Replaces the local copy with the server's tasks. On failure the copy is
    /// emptied and `false` is returned.
    pub async fn load(&mut self) -> bool {
        match self.api.list().await {
            Ok(tasks) => {
                info!(count = tasks.len(), "tasks loaded");
                self.tasks = tasks;
                self.notify(BoardEvent::Loaded(self.tasks.len()));
                true
            }
            Err(err) => {
                self.tasks.clear();
                self.fail("loading tasks", &err);
                false
            }
        }
    }

    /// Creates a task, or updates the one being edited.
    pub async fn submit(&mut self, form: TaskForm) -> bool {
        let title = form.title.trim();
        if title.is_empty() {
            self.fail("saving task", &ClientError::EmptyTitle);
            return false;
        }
        let content = form.content.trim().to_string();
        let category = form.category.trim().to_string();
        let due = form.due_date.trim().to_string();

        if let Some(id) = self.editing.clone() {
            let patch = TaskPatch {
                title: Some(title.to_string()),
                content: Some(content),
                due_date: Some(due),
                completed: None,
                category: Some(category),
                priority: Some(form.priority),
            };
            match self.api.update(&id, &patch).await {
                Ok(task) => {
                    self.replace(task);
                    self.editing = None;
                    self.notify(BoardEvent::Updated(id));
                    true
                }
                Err(err) => {
                    self.fail("updating task", &err);
                    false
                }
            }
        } else {
            let new = NewTask {
                title: Some(title.to_string()),
                content: Some(content),
                due_date: if due.is_empty() { None } else { Some(due) },
                category: Some(category),
                priority: Some(form.priority),
            };
            match self.api.create(&new).await {
                Ok(task) => {
                    let id = task.id.clone();
                    self.tasks.push(task);
                    self.notify(BoardEvent::Added(id));
                    true
                }
                Err(err) => {
                    self.fail("adding task", &err);
                    false
                }
            }
        }
    }

    pub fn start_edit(&mut self, id: &str) -> Option<TaskForm> {
        let form = TaskForm::from_task(self.task(id)?);
        self.editing = Some(id.to_string());
        self.notify(BoardEvent::EditStarted(id.to_string()));
        Some(form)
    }

    pub fn cancel_edit(&mut self) {
        if self.editing.take().is_some() {
            self.notify(BoardEvent::EditCanceled);
        }
    }

    pub async fn toggle(&mut self, id: &str) -> bool {
        let Some(current) = self.task(id).map(|t| t.completed) else {
            return false;
        };
        match self.api.update(id, &TaskPatch::completed(!current)).await {
            Ok(task) => {
                self.replace(task);
                self.notify(BoardEvent::Updated(id.to_string()));
                true
            }
            Err(err) => {
                self.fail("toggling task", &err);
                false
            }
        }
    }

    pub async fn delete(&mut self, id: &str) -> bool {
        let title = self.task(id).map(|t| t.title.clone()).unwrap_or_else(|| id.to_string());
        if !self.prompt.confirm(&format!("Delete \"{}\"?", title)) {
            return false;
        }
        match self.api.delete(id).await {
            Ok(()) => {
                self.tasks.retain(|t| t.id != id);
                if self.editing.as_deref() == Some(id) {
                    self.editing = None;
                }
                self.notify(BoardEvent::Deleted(id.to_string()));
                true
            }
            Err(err) => {
                self.fail("deleting task", &err);
                false
            }
        }
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.options.filter = filter;
        self.notify(BoardEvent::ViewChanged);
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.options.sort = sort;
        self.notify(BoardEvent::ViewChanged);
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.options.category = category;
        self.notify(BoardEvent::ViewChanged);
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.options.mode = mode;
        self.notify(BoardEvent::ViewChanged);
    }

    /// Distinct categories in store order, for cycling the list filter.
    pub fn categories(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for task in &self.tasks {
            if !task.category.is_empty() && !seen.contains(&task.category) {
                seen.push(task.category.clone());
            }
        }
        seen
    }

    fn replace(&mut self, task: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        }
    }

    fn fail(&mut self, action: &str, err: &ClientError) {
        error!(error = %err, "{action} failed");
        let message = format!("Error {action}: {err}");
        self.prompt.alert(&message);
        self.notify(BoardEvent::Failed(message));
    }

    fn notify(&mut self, event: BoardEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdStrategy;
    use crate::model::TaskError;
    use crate::service::TaskSheet;
    use crate::store::MemorySheet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    struct SheetApi {
        sheet: TaskSheet,
        offline: Arc<AtomicBool>,
    }

    fn api_error(err: TaskError) -> ClientError {
        let status = match err {
            TaskError::MissingTitle => StatusCode::BAD_REQUEST,
            TaskError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ClientError::Api {
            status,
            message: err.to_string(),
        }
    }

    impl SheetApi {
        fn check(&self) -> Result<(), ClientError> {
            if self.offline.load(Ordering::Relaxed) {
                return Err(ClientError::Api {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "offline".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TaskApi for SheetApi {
        async fn list(&self) -> Result<Vec<Task>, ClientError> {
            self.check()?;
            self.sheet.list().await.map_err(api_error)
        }

        async fn create(&self, task: &NewTask) -> Result<Task, ClientError> {
            self.check()?;
            self.sheet.create(task.clone()).await.map_err(api_error)
        }

        async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Task, ClientError> {
            self.check()?;
            self.sheet.update(id, patch.clone()).await.map_err(api_error)
        }

        async fn delete(&self, id: &str) -> Result<(), ClientError> {
            self.check()?;
            self.sheet.delete(id).await.map_err(api_error)
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        answer: Arc<AtomicBool>,
        asked: Arc<Mutex<Vec<String>>>,
        alerts: Arc<Mutex<Vec<String>>>,
    }

    impl Prompt for Recorder {
        fn confirm(&mut self, message: &str) -> bool {
            self.asked.lock().unwrap().push(message.to_string());
            self.answer.load(Ordering::Relaxed)
        }

        fn alert(&mut self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }
    }

    fn board() -> (TaskBoard<SheetApi>, Recorder, Arc<AtomicBool>) {
        let offline = Arc::new(AtomicBool::new(false));
        let api = SheetApi {
            sheet: TaskSheet::new(Arc::new(MemorySheet::default()), IdStrategy::Sequential),
            offline: offline.clone(),
        };
        let prompt = Recorder::default();
        (TaskBoard::new(api, Box::new(prompt.clone())), prompt, offline)
    }

    fn form(title: &str) -> TaskForm {
        TaskForm {
            title: title.to_string(),
            ..TaskForm::default()
        }
    }

    #[tokio::test]
    async fn submit_creates_and_appends_server_copy() {
        let (mut board, _, _) = board();
        let events = board.subscribe();
        assert!(board.submit(form("  Buy milk  ")).await);
        assert_eq!(board.tasks().len(), 1);
        assert_eq!(board.tasks()[0].id, "001");
        assert_eq!(board.tasks()[0].title, "Buy milk");
        assert_eq!(events.try_recv().unwrap(), BoardEvent::Added("001".into()));
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_any_request() {
        let (mut board, prompt, offline) = board();
        offline.store(true, Ordering::Relaxed);
        assert!(!board.submit(form("   ")).await);
        let alerts = prompt.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("title"));
    }

    #[tokio::test]
    async fn editing_updates_in_place_and_clears_edit_state() {
        let (mut board, _, _) = board();
        board.submit(form("Draft")).await;
        board.submit(form("Other")).await;
        let mut edit = board.start_edit("001").unwrap();
        assert_eq!(board.editing(), Some("001"));
        edit.title = "Final".into();
        edit.priority = Priority::High;
        assert!(board.submit(edit).await);
        assert_eq!(board.editing(), None);
        assert_eq!(board.tasks().len(), 2);
        assert_eq!(board.tasks()[0].title, "Final");
        assert_eq!(board.tasks()[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn toggle_takes_server_state() {
        let (mut board, _, offline) = board();
        board.submit(form("Run")).await;
        assert!(board.toggle("001").await);
        assert!(board.tasks()[0].completed);

        offline.store(true, Ordering::Relaxed);
        assert!(!board.toggle("001").await);
        assert!(board.tasks()[0].completed);
    }

    #[tokio::test]
    async fn delete_always_asks_first() {
        let (mut board, prompt, _) = board();
        board.submit(form("Keep")).await;
        assert!(!board.delete("001").await);
        assert_eq!(board.tasks().len(), 1);
        assert_eq!(prompt.asked.lock().unwrap().as_slice(), ["Delete \"Keep\"?"]);

        prompt.answer.store(true, Ordering::Relaxed);
        assert!(board.delete("001").await);
        assert!(board.tasks().is_empty());
        assert!(board.load().await);
        assert!(board.tasks().is_empty());
    }

    #[tokio::test]
    async fn failed_load_resets_to_empty_and_alerts() {
        let (mut board, prompt, offline) = board();
        board.submit(form("One")).await;
        let events = board.subscribe();
        offline.store(true, Ordering::Relaxed);
        assert!(!board.load().await);
        assert!(board.tasks().is_empty());
        assert!(board.task("001").is_none());
        assert_eq!(prompt.alerts.lock().unwrap().len(), 1);
        assert!(matches!(events.try_recv().unwrap(), BoardEvent::Failed(_)));
    }

    #[tokio::test]
    async fn selectors_feed_the_derived_view() {
        let (mut board, _, _) = board();
        board.submit(form("No date")).await;
        let today = crate::view::today();
        assert!(board.view(today).is_empty());
        board.set_mode(ViewMode::List);
        assert_eq!(board.view(today).len(), 1);
        board.set_filter(StatusFilter::Completed);
        assert!(board.view(today).is_empty());
    }

    #[test]
    fn http_urls_append_task_paths() {
        let api = HttpTaskApi::new("http://localhost:10000/api/").unwrap();
        assert_eq!(api.url(None).as_str(), "http://localhost:10000/api/tasks");
        assert_eq!(
            api.url(Some("a b")).as_str(),
            "http://localhost:10000/api/tasks/a%20b"
        );
        assert!(HttpTaskApi::new("not a url").is_err());
    }

    #[test]
    fn request_bodies_carry_only_present_fields() {
        let api = HttpTaskApi::new("http://localhost:10000/api").unwrap();
        let request = api
            .update_request("004", &TaskPatch::completed(true))
            .build()
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::PUT);
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json, serde_json::json!({ "completed": true }));

        let new = NewTask {
            title: Some("Plan".into()),
            ..NewTask::default()
        };
        let request = api.create_request(&new).build().unwrap();
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Plan" }));
    }
}
