use crate::client::{BoardEvent, HttpTaskApi, Prompt, TaskBoard, TaskForm};
use crate::model::{Priority, Task};
use crate::render::category_glyph;
use crate::view::{format_due_date, normalize_due, today, CategoryFilter, DueBucket, ViewMode};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

pub fn run(rt: Runtime, api: HttpTaskApi) -> Result<()> {
    let prompt = ModalPrompt::default();
    let mut board = TaskBoard::new(api, Box::new(prompt.clone()));
    let events = board.subscribe();
    let mut app = App {
        rt,
        board,
        events,
        prompt,
        selected: 0,
        list_state: ListState::default(),
        last_load: Instant::now(),
        status: "Loading tasks...".into(),
        mode: Mode::Normal,
    };
    app.reload();
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

/// Answers the board's confirmation from the delete modal and collects alerts
/// for the status line.
#[derive(Clone, Default)]
struct ModalPrompt {
    shared: Arc<Mutex<PromptState>>,
}

#[derive(Default)]
struct PromptState {
    confirmed: bool,
    alerts: Vec<String>,
}

impl ModalPrompt {
    fn arm(&self) {
        if let Ok(mut state) = self.shared.lock() {
            state.confirmed = true;
        }
    }

    fn take_alerts(&self) -> Vec<String> {
        match self.shared.lock() {
            Ok(mut state) => std::mem::take(&mut state.alerts),
            Err(_) => Vec::new(),
        }
    }
}

impl Prompt for ModalPrompt {
    fn confirm(&mut self, _message: &str) -> bool {
        match self.shared.lock() {
            Ok(mut state) => std::mem::replace(&mut state.confirmed, false),
            Err(_) => false,
        }
    }

    fn alert(&mut self, message: &str) {
        if let Ok(mut state) = self.shared.lock() {
            state.alerts.push(message.to_string());
        }
    }
}

struct App {
    rt: Runtime,
    board: TaskBoard<HttpTaskApi>,
    events: mpsc::Receiver<BoardEvent>,
    prompt: ModalPrompt,
    selected: usize,
    list_state: ListState,
    last_load: Instant,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Creating(EntryForm),
    Editing(EntryForm),
    ConfirmDelete { task_id: String },
}

struct EntryForm {
    title: FieldValue,
    content: FieldValue,
    due: FieldValue,
    category: FieldValue,
    priority: Priority,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Title,
    Content,
    Due,
    Category,
    Priority,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl EntryForm {
    fn new() -> Self {
        EntryForm::from_form(&TaskForm::default())
    }

    fn from_form(form: &TaskForm) -> Self {
        EntryForm {
            title: FieldValue::new(&form.title),
            content: FieldValue::new(&form.content),
            due: FieldValue::new(&form.due_date),
            category: FieldValue::new(&form.category),
            priority: form.priority,
            field: FormField::Title,
        }
    }

    /// Due input accepts the same spellings as the CLI; empty clears it.
    fn to_form(&self) -> std::result::Result<TaskForm, String> {
        let raw = self.due.value.trim();
        let due_date = if raw.is_empty() {
            String::new()
        } else {
            normalize_due(raw).ok_or_else(|| format!("Invalid due date: {}", raw))?
        };
        Ok(TaskForm {
            title: self.title.value.clone(),
            content: self.content.value.clone(),
            due_date,
            category: self.category.value.clone(),
            priority: self.priority,
        })
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Content,
            FormField::Content => FormField::Due,
            FormField::Due => FormField::Category,
            FormField::Category => FormField::Priority,
            FormField::Priority => FormField::Title,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Priority,
            FormField::Content => FormField::Title,
            FormField::Due => FormField::Content,
            FormField::Category => FormField::Due,
            FormField::Priority => FormField::Category,
        };
    }

    fn active_field_mut(&mut self) -> Option<&mut FieldValue> {
        match self.field {
            FormField::Title => Some(&mut self.title),
            FormField::Content => Some(&mut self.content),
            FormField::Due => Some(&mut self.due),
            FormField::Category => Some(&mut self.category),
            FormField::Priority => None,
        }
    }
}

impl App {
    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.drain_events();
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Folds board notifications and prompt alerts into the status line.
    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.status = match event {
                BoardEvent::Loaded(count) => format!("Loaded {} tasks", count),
                BoardEvent::Added(id) => format!("Added {}", id),
                BoardEvent::Updated(id) => format!("Updated {}", id),
                BoardEvent::Deleted(id) => format!("Deleted {}", id),
                BoardEvent::EditStarted(id) => format!("Editing {}", id),
                BoardEvent::EditCanceled => "Edit canceled".into(),
                BoardEvent::ViewChanged => self.view_summary(),
                BoardEvent::Failed(message) => message,
            };
        }
        if let Some(alert) = self.prompt.take_alerts().pop() {
            self.status = alert;
        }
        self.clamp_selection();
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Creating(_) | Mode::Editing(_) => {
                self.handle_form_key(key);
                false
            }
            Mode::ConfirmDelete { .. } => {
                self.handle_confirm_key(key);
                false
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('1') => self.board.set_mode(ViewMode::Register),
            KeyCode::Char('2') => self.board.set_mode(ViewMode::List),
            KeyCode::Char('f') => {
                let next = self.board.options().filter.next();
                self.board.set_filter(next);
            }
            KeyCode::Char('s') => {
                let next = self.board.options().sort.toggle();
                self.board.set_sort(next);
            }
            KeyCode::Char('c') => self.cycle_category(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Down | KeyCode::Char('j') => self.selected = self.selected.saturating_add(1),
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Char('n') => {
                self.mode = Mode::Creating(EntryForm::new());
                self.status =
                    "New task (Tab/Shift-Tab move, Enter save, Esc cancel)".into();
            }
            KeyCode::Char('e') => match self.current_id() {
                Some(id) => {
                    if let Some(form) = self.board.start_edit(&id) {
                        self.mode = Mode::Editing(EntryForm::from_form(&form));
                    }
                }
                None => self.status = "No task selected to edit".into(),
            },
            KeyCode::Char(' ') | KeyCode::Char('x') => match self.current_id() {
                Some(id) => {
                    self.rt.block_on(self.board.toggle(&id));
                }
                None => self.status = "No task selected".into(),
            },
            KeyCode::Char('d') => match self.current_id() {
                Some(task_id) => {
                    self.status = format!("Delete {}? (y to confirm, n/Esc to cancel)", task_id);
                    self.mode = Mode::ConfirmDelete { task_id };
                }
                None => self.status = "No task selected to delete".into(),
            },
            _ => {}
        }
        false
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close = match &mut mode {
            Mode::Creating(form) | Mode::Editing(form) => self.process_form_key(form, key),
            _ => true,
        };
        if close {
            self.board.cancel_edit();
        } else {
            self.mode = mode;
        }
    }

    fn process_form_key(&mut self, form: &mut EntryForm, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return true;
            }
            KeyCode::Tab => form.next_field(),
            KeyCode::BackTab => form.prev_field(),
            KeyCode::Enter => return self.try_submit(form),
            KeyCode::Left if form.field == FormField::Priority => {
                form.priority = match form.priority {
                    Priority::High => Priority::Low,
                    Priority::Medium => Priority::High,
                    Priority::Low => Priority::Medium,
                }
            }
            KeyCode::Right | KeyCode::Char(' ') if form.field == FormField::Priority => {
                form.priority = form.priority.next()
            }
            KeyCode::Left => {
                if let Some(field) = form.active_field_mut() {
                    field.move_left();
                }
            }
            KeyCode::Right => {
                if let Some(field) = form.active_field_mut() {
                    field.move_right();
                }
            }
            KeyCode::Backspace => {
                if let Some(field) = form.active_field_mut() {
                    field.backspace();
                }
            }
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    if let Some(field) = form.active_field_mut() {
                        field.insert_char(c);
                    }
                }
            }
            _ => {}
        }
        false
    }

    fn try_submit(&mut self, form: &EntryForm) -> bool {
        match form.to_form() {
            Ok(entry) => self.rt.block_on(self.board.submit(entry)),
            Err(message) => {
                self.status = message;
                false
            }
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let task_id = match &self.mode {
            Mode::ConfirmDelete { task_id } => task_id.clone(),
            _ => return,
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.prompt.arm();
                self.rt.block_on(self.board.delete(&task_id));
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn reload(&mut self) {
        self.rt.block_on(self.board.load());
        self.last_load = Instant::now();
    }

    fn cycle_category(&mut self) {
        let categories = self.board.categories();
        let next = match &self.board.options().category {
            CategoryFilter::All => categories.first().cloned(),
            CategoryFilter::Only(current) => categories
                .iter()
                .position(|c| c == current)
                .and_then(|idx| categories.get(idx + 1))
                .cloned(),
        };
        self.board.set_category(match next {
            Some(category) => CategoryFilter::Only(category),
            None => CategoryFilter::All,
        });
    }

    fn current_id(&self) -> Option<String> {
        self.board
            .view(today())
            .get(self.selected)
            .map(|task| task.id.clone())
    }

    fn clamp_selection(&mut self) {
        let len = self.board.view(today()).len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn view_summary(&self) -> String {
        let options = self.board.options();
        format!(
            "{} view, {}, by {}, category {}",
            options.mode.label(),
            options.filter.label(),
            options.sort.label(),
            options.category
        )
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_tasks(f, layout[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Creating(form) => draw_form(f, "New Task", form),
            Mode::Editing(form) => draw_form(f, "Edit Task", form),
            Mode::ConfirmDelete { task_id } => self.draw_confirm(f, task_id),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let options = self.board.options();
        let title = Line::from(vec![
            Span::styled(
                "tasksheet ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                options.mode.label(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(options.filter.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("by {}", options.sort.label()),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("category {}", options.category),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("loaded {}", format_elapsed(self.last_load)),
                Style::default().fg(Color::Gray),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_tasks(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let today = today();
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = self
            .board
            .view(today)
            .into_iter()
            .map(|task| task_item(task, format_due_date(task.due_date.as_deref(), today), width))
            .collect();
        if items.is_empty() {
            let empty = Paragraph::new("No tasks. Press n to add one.")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray));
            f.render_widget(empty, area);
            return;
        }
        self.list_state.select(Some(self.selected));
        let list = List::new(items)
            .highlight_style(
                Style::default()
                    .bg(Color::Rgb(252, 214, 112))
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        f.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, rows[1]);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, task_id: &str) {
        let area = centered_rect(50, 30, f.size());
        let title = self
            .board
            .task(task_id)
            .map(|t| t.title.clone())
            .unwrap_or_else(|| task_id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", title),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn draw_form(f: &mut ratatui::Frame<'_>, title: &str, form: &EntryForm) {
    let area = centered_rect(70, 60, f.size());
    let mut fields = Vec::new();
    fields.push(field_line("Title", &form.title, form.field == FormField::Title));
    fields.push(field_line(
        "Details",
        &form.content,
        form.field == FormField::Content,
    ));
    fields.push(field_line(
        "Due (YYYY-MM-DDTHH:MM or YYYY.MM.DD@hh:mm)",
        &form.due,
        form.field == FormField::Due,
    ));
    fields.push(field_line(
        "Category",
        &form.category,
        form.field == FormField::Category,
    ));
    let active = form.field == FormField::Priority;
    fields.push(Line::from(vec![
        Span::styled(
            "Priority: ",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD | Modifier::DIM),
        ),
        Span::styled(
            if active {
                format!("< {} >", form.priority.label())
            } else {
                form.priority.label().to_string()
            },
            Style::default().fg(if active { Color::Cyan } else { Color::White }),
        ),
    ]));
    fields.push(Line::from(""));
    fields.push(Line::from(Span::styled(
        "Enter to save • Esc to cancel • Tab/Shift-Tab to move • ←/→ change priority",
        Style::default().fg(Color::Gray),
    )));
    let dialog = Paragraph::new(fields)
        .block(
            Block::default()
                .title(Span::styled(
                    title,
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn help_line() -> Line<'static> {
    Line::from(vec![
        Span::styled("1", Style::default().fg(Color::LightCyan)),
        Span::raw(" register  "),
        Span::styled("2", Style::default().fg(Color::LightCyan)),
        Span::raw(" list  "),
        Span::styled("↑↓ / j k", Style::default().fg(Color::LightCyan)),
        Span::raw(" move  "),
        Span::styled("f", Style::default().fg(Color::LightGreen)),
        Span::raw(" filter  "),
        Span::styled("s", Style::default().fg(Color::LightGreen)),
        Span::raw(" sort  "),
        Span::styled("c", Style::default().fg(Color::LightGreen)),
        Span::raw(" category  "),
        Span::styled("n", Style::default().fg(Color::LightMagenta)),
        Span::raw(" new  "),
        Span::styled("e", Style::default().fg(Color::LightYellow)),
        Span::raw(" edit  "),
        Span::styled("space", Style::default().fg(Color::LightYellow)),
        Span::raw(" toggle  "),
        Span::styled("d", Style::default().fg(Color::LightRed)),
        Span::raw(" delete  "),
        Span::styled("r", Style::default().fg(Color::LightCyan)),
        Span::raw(" reload  "),
        Span::styled("q", Style::default().fg(Color::LightRed)),
        Span::raw(" quit"),
    ])
}

fn task_item(task: &Task, due: Option<DueBucket>, width: usize) -> ListItem<'static> {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let title_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let mut spans = vec![
        Span::raw(format!("{} ", check)),
        Span::styled(format!("{} ", category_glyph(&task.category)), Style::default()),
        Span::styled(truncate_text(&task.title, width / 2), title_style),
        Span::raw("  "),
        Span::styled(
            task.priority.label().to_string(),
            Style::default().fg(priority_color(task.priority)),
        ),
    ];
    if let Some(due) = due {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(due.text(), Style::default().fg(due_color(&due))));
    }
    let mut lines = vec![Line::from(spans)];
    if !task.content.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("      {}", truncate_text(&task.content, width.saturating_sub(6))),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        )));
    }
    ListItem::new(lines)
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::LightRed,
        Priority::Medium => Color::LightYellow,
        Priority::Low => Color::LightGreen,
    }
}

fn due_color(due: &DueBucket) -> Color {
    match due {
        DueBucket::Overdue => Color::Red,
        DueBucket::Today => Color::LightRed,
        DueBucket::Tomorrow => Color::Yellow,
        DueBucket::InDays(_) => Color::Cyan,
        DueBucket::On(_) => Color::Gray,
    }
}

fn field_line(label: &str, field: &FieldValue, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(text, value_style),
    ])
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_editing_handles_multibyte_chars() {
        let mut field = FieldValue::new("café");
        field.backspace();
        assert_eq!(field.value, "caf");
        field.move_left();
        field.insert_char('é');
        assert_eq!(field.value, "caéf");
        field.move_right();
        field.move_right();
        assert_eq!(field.cursor, field.value.len());
    }

    #[test]
    fn entry_form_normalizes_due_input() {
        let mut form = EntryForm::new();
        form.title = FieldValue::new("Pay rent");
        form.due = FieldValue::new("2025.03.01@09:30");
        let entry = form.to_form().unwrap();
        assert_eq!(entry.due_date, "2025-03-01T09:30");
        assert_eq!(entry.priority, Priority::Medium);

        form.due = FieldValue::new("next week");
        assert!(form.to_form().is_err());

        form.due = FieldValue::new("  ");
        assert_eq!(form.to_form().unwrap().due_date, "");
    }

    #[test]
    fn form_fields_cycle_both_ways() {
        let mut form = EntryForm::new();
        form.prev_field();
        assert!(form.field == FormField::Priority);
        assert!(form.active_field_mut().is_none());
        form.next_field();
        assert!(form.field == FormField::Title);
    }

    #[test]
    fn modal_prompt_confirms_once_per_arm() {
        let prompt = ModalPrompt::default();
        let mut handle = prompt.clone();
        assert!(!handle.confirm("Delete?"));
        prompt.arm();
        assert!(handle.confirm("Delete?"));
        assert!(!handle.confirm("Delete?"));
        handle.alert("network error");
        assert_eq!(prompt.take_alerts(), vec!["network error".to_string()]);
        assert!(prompt.take_alerts().is_empty());
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a longer title", 8), "a lon...");
        assert_eq!(truncate_text("abcdef", 2), "ab");
    }
}
