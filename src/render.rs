use crate::model::Task;
use crate::view::{format_due_date, ViewOptions};
use chrono::NaiveDate;
use std::fmt::Write;

pub const EMPTY_STATE: &str = r#"<p class="empty-state">No tasks yet</p>"#;

pub fn category_glyph(category: &str) -> &'static str {
    match category {
        "work" => "💼",
        "study" => "📖",
        "shopping" => "🛒",
        _ => "📌",
    }
}

pub fn category_label(category: &str) -> &'static str {
    match category {
        "work" => "Work",
        "study" => "Study",
        "shopping" => "Shopping",
        _ => "",
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// The whole task list as an HTML fragment. Always rebuilt from scratch.
pub fn render_task_list(items: &[&Task], today: NaiveDate) -> String {
    if items.is_empty() {
        return EMPTY_STATE.to_string();
    }
    let mut html = String::new();
    for task in items {
        render_card(&mut html, task, today);
    }
    html
}

fn render_card(html: &mut String, task: &Task, today: NaiveDate) {
    let id = escape_html(&task.id);
    let category = escape_html(&task.category);
    let _ = writeln!(
        html,
        r#"<div class="task-card{}" data-id="{id}">"#,
        if task.completed { " completed" } else { "" }
    );
    let _ = writeln!(
        html,
        r#"  <input type="checkbox" data-action="toggle"{}>"#,
        if task.completed { " checked" } else { "" }
    );
    html.push_str("  <div class=\"task-content\">\n");
    let _ = writeln!(
        html,
        r#"    <div class="task-title">{}</div>"#,
        escape_html(&task.title)
    );
    if !task.content.is_empty() {
        let _ = writeln!(html, "    <div>{}</div>", escape_html(&task.content));
    }
    html.push_str("    <div class=\"task-meta\">\n");
    let _ = writeln!(
        html,
        r#"      <span class="category {category}">{} {}</span>"#,
        category_glyph(&task.category),
        category_label(&task.category)
    );
    let _ = writeln!(
        html,
        r#"      <span class="priority priority-{}">{}</span>"#,
        task.priority.as_str(),
        task.priority.label()
    );
    if let Some(due) = format_due_date(task.due_date.as_deref(), today) {
        let _ = writeln!(html, r#"      <span class="{}">{}</span>"#, due.class(), due);
    }
    html.push_str("    </div>\n  </div>\n");
    html.push_str("  <div class=\"task-actions\">\n");
    html.push_str("    <button data-action=\"edit\">Edit</button>\n");
    html.push_str("    <button data-action=\"delete\">Delete</button>\n");
    html.push_str("  </div>\n</div>\n");
}

/// Minimal standalone page around the list, used when no client build is
/// being served.
pub fn render_page(items: &[&Task], options: &ViewOptions, today: NaiveDate) -> String {
    let mut html = String::new();
    html.push_str("<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>tasksheet</title>\n</head>\n<body>\n");
    let _ = writeln!(
        html,
        r#"<header class="view-state" data-mode="{}" data-filter="{}" data-sort="{}" data-category="{}"></header>"#,
        options.mode.label(),
        options.filter.label(),
        options.sort.label(),
        escape_html(&options.category.to_string())
    );
    html.push_str("<main id=\"tasksList\">\n");
    html.push_str(&render_task_list(items, today));
    html.push_str("\n</main>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn task(title: &str) -> Task {
        Task {
            id: "001".into(),
            title: title.into(),
            content: String::new(),
            due_date: None,
            completed: false,
            category: String::new(),
            priority: Priority::Medium,
        }
    }

    #[test]
    fn empty_view_renders_placeholder_only() {
        assert_eq!(render_task_list(&[], today()), EMPTY_STATE);
    }

    #[test]
    fn user_text_is_escaped() {
        let mut t = task("<script>alert('x')</script>");
        t.content = "a & b \"quoted\"".into();
        t.category = "\"><img src=x>".into();
        let html = render_task_list(&[&t], today());
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(html.contains("a &amp; b &quot;quoted&quot;"));
    }

    #[test]
    fn card_shows_meta_and_due_bucket() {
        let mut t = task("Report");
        t.category = "work".into();
        t.priority = Priority::High;
        t.completed = true;
        t.due_date = Some("2024-05-11T09:00".into());
        let html = render_task_list(&[&t], today());
        assert!(html.contains(r#"class="task-card completed""#));
        assert!(html.contains(" checked"));
        assert!(html.contains("💼 Work"));
        assert!(html.contains(r#"<span class="priority priority-high">High</span>"#));
        assert!(html.contains(r#"<span class="soon">tomorrow</span>"#));
    }

    #[test]
    fn unknown_category_uses_default_glyph() {
        let mut t = task("Walk");
        t.category = "health".into();
        let html = render_task_list(&[&t], today());
        assert!(html.contains("📌 </span>"));
    }

    #[test]
    fn content_block_is_omitted_when_empty() {
        let html = render_task_list(&[&task("Plain")], today());
        assert!(!html.contains("    <div></div>"));
    }

    #[test]
    fn page_wraps_the_list() {
        let options = ViewOptions::default();
        let page = render_page(&[], &options, today());
        assert!(page.contains(r#"data-mode="register""#));
        assert!(page.contains(EMPTY_STATE));
    }
}
