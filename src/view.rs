//! Filtering, sorting and due-date bucketing of the cached task list.
//!
//! Everything here is pure: "today" is passed in, so the functions can be
//! exercised without a clock or a UI.

use crate::model::Task;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

pub const REGISTER_WINDOW_DAYS: i64 = 7;
pub const UPCOMING_DAYS: i64 = 7;

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];
const CLI_DUE_FORMAT: &str = "%Y.%m.%d@%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }

    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Completed,
            StatusFilter::Completed => StatusFilter::All,
        }
    }

    fn keeps(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortKey {
    #[default]
    Date,
    Priority,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Priority => "priority",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            SortKey::Date => SortKey::Priority,
            SortKey::Priority => SortKey::Date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ViewMode {
    /// Tasks due within a week either side of today.
    #[default]
    Register,
    /// Every task, narrowed by category.
    List,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Register => "register",
            ViewMode::List => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    fn keeps(&self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => task.category == *category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Only(raw.to_string()))
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(category) => f.write_str(category),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewOptions {
    pub mode: ViewMode,
    pub filter: StatusFilter,
    pub sort: SortKey,
    pub category: CategoryFilter,
}

/// Window, then completion filter, then sort. The order is fixed.
pub fn derive_view<'a>(tasks: &'a [Task], options: &ViewOptions, today: NaiveDate) -> Vec<&'a Task> {
    let mut items: Vec<&Task> = tasks.iter().collect();

    match options.mode {
        ViewMode::Register => items.retain(|task| {
            due_day(task)
                .map(|day| (day - today).num_days().abs() <= REGISTER_WINDOW_DAYS)
                .unwrap_or(false)
        }),
        ViewMode::List => items.retain(|task| options.category.keeps(task)),
    }

    items.retain(|task| options.filter.keeps(task));

    match options.sort {
        SortKey::Priority => items.sort_by_key(|task| task.priority.rank()),
        // `None` sorts after every dated task.
        SortKey::Date => items.sort_by_cached_key(|task| {
            let due = task.due_date.as_deref().and_then(parse_due);
            (due.is_none(), due)
        }),
    }

    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueBucket {
    Overdue,
    Today,
    Tomorrow,
    InDays(i64),
    On(NaiveDate),
}

impl DueBucket {
    pub fn text(&self) -> String {
        match self {
            DueBucket::Overdue => "overdue".to_string(),
            DueBucket::Today => "today".to_string(),
            DueBucket::Tomorrow => "tomorrow".to_string(),
            DueBucket::InDays(days) => format!("in {} days", days),
            DueBucket::On(date) => date.format("%Y/%-m/%-d").to_string(),
        }
    }

    /// Style class, empty for plain dates.
    pub fn class(&self) -> &'static str {
        match self {
            DueBucket::Overdue => "overdue",
            DueBucket::Today => "today",
            DueBucket::Tomorrow => "soon",
            DueBucket::InDays(_) => "upcoming",
            DueBucket::On(_) => "",
        }
    }
}

impl fmt::Display for DueBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

pub fn format_due_date(due: Option<&str>, today: NaiveDate) -> Option<DueBucket> {
    let date = parse_due(due?)?.date();
    let diff = (date - today).num_days();
    Some(match diff {
        d if d < 0 => DueBucket::Overdue,
        0 => DueBucket::Today,
        1 => DueBucket::Tomorrow,
        d if d <= UPCOMING_DAYS => DueBucket::InDays(d),
        _ => DueBucket::On(date),
    })
}

/// Local date/time of a stored due date. Date-only values mean local midnight.
pub fn parse_due(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .chain(std::iter::once(&CLI_DUE_FORMAT))
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Canonical form sent to the server for user-entered due dates.
pub fn normalize_due(raw: &str) -> Option<String> {
    parse_due(raw).map(|dt| dt.format("%Y-%m-%dT%H:%M").to_string())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn due_day(task: &Task) -> Option<NaiveDate> {
    task.due_date.as_deref().and_then(parse_due).map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::Duration;

    fn today_fixture() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn task(id: &str, due: Option<&str>, completed: bool, priority: Priority) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            content: String::new(),
            due_date: due.map(str::to_string),
            completed,
            category: String::new(),
            priority,
        }
    }

    fn ids(items: &[&Task]) -> Vec<String> {
        items.iter().map(|t| t.id.clone()).collect()
    }

    fn list_options(filter: StatusFilter, sort: SortKey) -> ViewOptions {
        ViewOptions {
            mode: ViewMode::List,
            filter,
            sort,
            category: CategoryFilter::All,
        }
    }

    fn mixed() -> Vec<Task> {
        vec![
            task("1", Some("2024-05-12"), false, Priority::Low),
            task("2", None, true, Priority::High),
            task("3", Some("2024-05-09T08:00"), true, Priority::Medium),
            task("4", None, false, Priority::Medium),
            task("5", Some("2024-05-09T07:00"), false, Priority::High),
        ]
    }

    #[test]
    fn completion_filters_partition_tasks() {
        let tasks = mixed();
        let active = derive_view(&tasks, &list_options(StatusFilter::Active, SortKey::Date), today_fixture());
        assert!(active.iter().all(|t| !t.completed));
        assert_eq!(active.len(), tasks.iter().filter(|t| !t.completed).count());

        let done = derive_view(&tasks, &list_options(StatusFilter::Completed, SortKey::Date), today_fixture());
        assert!(done.iter().all(|t| t.completed));
        assert_eq!(done.len(), tasks.iter().filter(|t| t.completed).count());

        let all = derive_view(&tasks, &list_options(StatusFilter::All, SortKey::Date), today_fixture());
        assert_eq!(all.len(), tasks.len());
    }

    #[test]
    fn priority_sort_is_ranked_and_stable() {
        let tasks = mixed();
        let view = derive_view(&tasks, &list_options(StatusFilter::All, SortKey::Priority), today_fixture());
        assert_eq!(ids(&view), vec!["2", "5", "3", "4", "1"]);
    }

    #[test]
    fn date_sort_puts_undated_last() {
        let tasks = mixed();
        let view = derive_view(&tasks, &list_options(StatusFilter::All, SortKey::Date), today_fixture());
        assert_eq!(ids(&view), vec!["5", "3", "1", "2", "4"]);
    }

    #[test]
    fn date_sort_keeps_sheet_order_for_equal_dates() {
        let tasks = vec![
            task("b", Some("2024-05-10T09:00"), false, Priority::Low),
            task("a", Some("2024-05-10T09:00"), false, Priority::High),
            task("c", Some("2024-05-08"), false, Priority::Medium),
            task("x", Some("not a date"), false, Priority::Medium),
            task("d", None, false, Priority::Medium),
        ];
        let view = derive_view(&tasks, &list_options(StatusFilter::All, SortKey::Date), today_fixture());
        assert_eq!(ids(&view), vec!["c", "b", "a", "x", "d"]);
    }

    #[test]
    fn register_mode_keeps_a_week_either_side() {
        let today = today_fixture();
        let day = |offset: i64| (today + Duration::days(offset)).format("%Y-%m-%d").to_string();
        let tasks = vec![
            task("minus8", Some(day(-8).as_str()), false, Priority::Medium),
            task("minus7", Some(day(-7).as_str()), false, Priority::Medium),
            task("zero", Some(day(0).as_str()), false, Priority::Medium),
            task("plus7", Some(format!("{}T23:59", day(7)).as_str()), false, Priority::Medium),
            task("plus8", Some(day(8).as_str()), false, Priority::Medium),
            task("undated", None, false, Priority::Medium),
        ];
        let options = ViewOptions::default();
        let view = derive_view(&tasks, &options, today);
        assert_eq!(ids(&view), vec!["minus7", "zero", "plus7"]);
    }

    #[test]
    fn register_window_applies_before_completion_filter() {
        let tasks = vec![
            task("old", Some("2024-04-01"), false, Priority::Medium),
            task("near", Some("2024-05-11"), true, Priority::Medium),
        ];
        let options = ViewOptions {
            filter: StatusFilter::Active,
            ..ViewOptions::default()
        };
        assert!(derive_view(&tasks, &options, today_fixture()).is_empty());
    }

    #[test]
    fn list_mode_filters_by_category() {
        let mut tasks = mixed();
        tasks[0].category = "work".into();
        tasks[3].category = "work".into();
        tasks[1].category = "shopping".into();
        let options = ViewOptions {
            mode: ViewMode::List,
            category: "work".parse().unwrap(),
            ..ViewOptions::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &options, today_fixture())), vec!["1", "4"]);
    }

    #[test]
    fn due_buckets_relative_to_today() {
        let today = today_fixture();
        let at = |offset: i64| (today + Duration::days(offset)).format("%Y-%m-%dT%H:%M").to_string();
        assert_eq!(format_due_date(Some(at(0).as_str()), today), Some(DueBucket::Today));
        assert_eq!(format_due_date(Some(at(1).as_str()), today), Some(DueBucket::Tomorrow));
        assert_eq!(format_due_date(Some(at(5).as_str()), today), Some(DueBucket::InDays(5)));
        assert_eq!(format_due_date(Some(at(7).as_str()), today), Some(DueBucket::InDays(7)));
        assert_eq!(format_due_date(Some(at(-1).as_str()), today), Some(DueBucket::Overdue));
        let far = format_due_date(Some(at(30).as_str()), today).unwrap();
        assert_eq!(far, DueBucket::On(NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()));
        assert_eq!(far.text(), "2024/6/9");
        assert_eq!(far.class(), "");
        assert_eq!(format_due_date(None, today), None);
        assert_eq!(format_due_date(Some("soon"), today), None);
    }

    #[test]
    fn bucket_text_and_classes() {
        assert_eq!(DueBucket::InDays(5).text(), "in 5 days");
        assert_eq!(DueBucket::Tomorrow.class(), "soon");
        assert_eq!(DueBucket::InDays(3).class(), "upcoming");
        assert_eq!(DueBucket::Overdue.class(), "overdue");
    }

    #[test]
    fn parses_supported_due_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_due("2024-05-01T14:30"), Some(expected));
        assert_eq!(parse_due("2024-05-01 14:30"), Some(expected));
        assert_eq!(parse_due("2024-05-01T14:30:00"), Some(expected));
        assert_eq!(parse_due("2024.05.01@14:30"), Some(expected));
        assert_eq!(
            parse_due("2024-05-01"),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert!(parse_due("2024-05-01T14:30:00Z").is_some());
        assert_eq!(parse_due(""), None);
        assert_eq!(normalize_due("2024.05.01@14:30").as_deref(), Some("2024-05-01T14:30"));
    }

    #[test]
    fn category_filter_parses_all() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!("".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "study".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only("study".into())
        );
    }
}
