//! Terminal rendering of the list and detail views.
//!
//! Templates are plain-text tera templates compiled into the binary. Content is
//! printed to a terminal, so nothing is HTML-escaped.

use std::collections::HashMap;

use chrono::Local;
use tera::{Context, Tera};

use crate::board::{timestamp, ComposeState, Message, MessageListModel, ReplyTree};
use crate::config::{
    UiConfig, DEFAULT_PREVIEW_LINES, PREVIEW_HARD_LIMIT, SECONDS_PER_DAY,
    SECONDS_PER_HOUR, SECONDS_PER_MINUTE, SECONDS_PER_MONTH, SECONDS_PER_YEAR,
};
use crate::error::AppError;

/// Spaces per reply nesting level
const INDENT_WIDTH: usize = 4;

/// Initialize the Tera template engine
pub fn init_templates() -> Result<Tera, AppError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("pagination.txt", include_str!("../templates/pagination.txt")),
        ("list.txt", include_str!("../templates/list.txt")),
        ("detail.txt", include_str!("../templates/detail.txt")),
    ])?;
    tera.autoescape_on(vec![]);

    tera.register_filter("timeago", timeago_filter);
    tera.register_filter("preview", preview_filter);
    tera.register_filter("has_more_lines", has_more_lines_filter);
    tera.register_filter("indent", indent_filter);

    Ok(tera)
}

/// Render the current page of the message list.
pub fn render_list(tera: &Tera, ui: &UiConfig, model: &MessageListModel) -> Result<String, AppError> {
    let view = model.page();

    let mut context = Context::new();
    context.insert("site_name", &ui.site_name);
    context.insert("version", &ui.version);
    context.insert("query", model.query());
    context.insert("sort", &model.sort().to_string());
    context.insert("preview_lines", &ui.preview_lines);
    context.insert("messages", &view.messages);
    context.insert("pagination", &view.pagination);

    Ok(tera.render("list.txt", &context)?)
}

/// Render one message with its reply tree and the reply prompt, if any.
pub fn render_detail(
    tera: &Tera,
    ui: &UiConfig,
    message: &Message,
    replies: &ReplyTree,
    compose: &ComposeState,
) -> Result<String, AppError> {
    let rows = replies.flatten(ui.reply_indent_cap);

    let mut context = Context::new();
    context.insert("site_name", &ui.site_name);
    context.insert("message", message);
    context.insert("replies", &rows);
    context.insert("reply_count", &replies.len());
    context.insert("prompt", &compose.prompt());

    Ok(tera.render("detail.txt", &context)?)
}

/// Human-readable age for a number of elapsed seconds
fn relative_time(seconds: i64) -> String {
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {} ago", unit)
        } else {
            format!("{} {}s ago", n, unit)
        }
    };

    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < SECONDS_PER_MINUTE {
        "just now".to_string()
    } else if seconds < SECONDS_PER_HOUR {
        plural(seconds / SECONDS_PER_MINUTE, "minute")
    } else if seconds < SECONDS_PER_DAY {
        plural(seconds / SECONDS_PER_HOUR, "hour")
    } else if seconds < SECONDS_PER_MONTH {
        plural(seconds / SECONDS_PER_DAY, "day")
    } else if seconds < SECONDS_PER_YEAR {
        plural(seconds / SECONDS_PER_MONTH, "month")
    } else {
        plural(seconds / SECONDS_PER_YEAR, "year")
    }
}

/// Convert an API timestamp to a relative time (e.g., "2 hours ago").
/// API timestamps carry no zone and are read as local time.
fn timeago_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let date_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("timeago filter expects a string"))?;

    match timestamp::parse(date_str) {
        Some(date) => {
            let seconds = Local::now()
                .naive_local()
                .signed_duration_since(date)
                .num_seconds();
            Ok(tera::Value::String(relative_time(seconds)))
        }
        // If parsing fails, return the original string
        None => Ok(tera::Value::String(date_str.to_string())),
    }
}

/// Cut `s` to at most `limit` bytes on a char boundary
fn truncate_at_boundary(s: &mut String, limit: usize) {
    if s.len() <= limit {
        return;
    }
    let mut cut = limit;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// First `max_lines` lines, continued to the end of the current paragraph,
/// with a hard limit of 1024 bytes.
fn preview(s: &str, max_lines: usize) -> String {
    let text = s.trim();
    let lines: Vec<&str> = text.lines().collect();

    let mut result = if lines.len() <= max_lines {
        text.to_string()
    } else {
        let mut head = lines[..max_lines].join("\n");
        for line in &lines[max_lines..] {
            if line.trim().is_empty() || head.len() >= PREVIEW_HARD_LIMIT {
                break;
            }
            head.push('\n');
            head.push_str(line);
        }
        head
    };

    truncate_at_boundary(&mut result, PREVIEW_HARD_LIMIT);
    result
}

fn preview_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("preview filter expects a string"))?;

    let max_lines = args
        .get("lines")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_PREVIEW_LINES as u64) as usize;

    Ok(tera::Value::String(preview(s, max_lines)))
}

/// Whether the preview hides part of the text
fn has_more_lines_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("has_more_lines filter expects a string"))?;

    let max_lines = args
        .get("lines")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_PREVIEW_LINES as u64) as usize;

    Ok(tera::Value::Bool(preview(s, max_lines).len() < s.trim().len()))
}

/// Leading whitespace for a reply at the given (already capped) indent level
fn indent_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let level = value
        .as_u64()
        .ok_or_else(|| tera::Error::msg("indent filter expects a number"))? as usize;

    Ok(tera::Value::String(" ".repeat(level * INDENT_WIDTH)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Id, Reply, ReplyTarget};
    use chrono::{Duration, NaiveDateTime};

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn message(id: u64, name: &str, content: &str) -> Message {
        Message {
            id: Id::from(id),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            content: content.to_string(),
            created_at: now() - Duration::hours(2),
            images: vec!["uploads/a.png".to_string()],
            video: None,
            files: Vec::new(),
        }
    }

    fn reply(id: u64, parent: Option<u64>, name: &str) -> Reply {
        Reply {
            id: Id::from(id),
            parent_id: parent.map(Id::from),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            content: format!("reply from {}", name),
            created_at: now() - Duration::minutes(5),
            image: None,
            video: None,
        }
    }

    #[test]
    fn test_relative_time_units() {
        assert_eq!(relative_time(-5), "in the future");
        assert_eq!(relative_time(10), "just now");
        assert_eq!(relative_time(60), "1 minute ago");
        assert_eq!(relative_time(7200), "2 hours ago");
        assert_eq!(relative_time(SECONDS_PER_DAY * 3), "3 days ago");
        assert_eq!(relative_time(SECONDS_PER_MONTH), "1 month ago");
        assert_eq!(relative_time(SECONDS_PER_YEAR * 2), "2 years ago");
    }

    #[test]
    fn test_timeago_passes_through_unparseable() {
        let out = timeago_filter(&tera::Value::String("sometime".into()), &HashMap::new()).unwrap();
        assert_eq!(out, tera::Value::String("sometime".into()));
    }

    #[test]
    fn test_preview_keeps_paragraph() {
        let text = "one\ntwo\nthree\nfour\n\nfive";
        assert_eq!(preview(text, 2), "one\ntwo\nthree\nfour");
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn test_preview_hard_limit_respects_char_boundary() {
        let text = "é".repeat(PREVIEW_HARD_LIMIT);
        let out = preview(&text, 10);
        assert!(out.len() <= PREVIEW_HARD_LIMIT);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_render_list_shows_page() {
        let tera = init_templates().unwrap();
        let ui = UiConfig::default();
        let mut model = MessageListModel::new();
        model.set_messages((1..=25).map(|i| message(i, "Anna", "hello there")).collect());

        let out = render_list(&tera, &ui, &model).unwrap();
        assert!(out.contains("== Guestbook =="));
        assert!(out.contains("25 of 25 messages"));
        assert!(out.contains("Page 1/3: [1] 2 3"));
        assert!(out.contains("2 hours ago"));
        assert!(out.contains("1 image(s)"));
        assert!(out.contains(&format!("guestbook v{}", ui.version)));
    }

    #[test]
    fn test_render_list_empty_search() {
        let tera = init_templates().unwrap();
        let mut model = MessageListModel::new();
        model.set_messages(vec![message(1, "Anna", "hi")]);
        model.search("zebra");

        let out = render_list(&tera, &UiConfig::default(), &model).unwrap();
        assert!(out.contains("No messages match \"zebra\"."));
        assert!(!out.contains("Page "));
    }

    #[test]
    fn test_render_detail_indents_replies() {
        let tera = init_templates().unwrap();
        let tree = ReplyTree::build(vec![
            reply(1, None, "Bob"),
            reply(2, Some(1), "Cleo"),
        ]);
        let mut compose = ComposeState::default();
        compose
            .begin(ReplyTarget::Reply {
                id: Id::from(2),
                author: "Cleo".to_string(),
            })
            .unwrap();

        let out = render_detail(&tera, &UiConfig::default(), &message(7, "Anna", "body"), &tree, &compose)
            .unwrap();
        assert!(out.contains("Replies (2)"));
        assert!(out.contains("#1 Bob - 5 minutes ago (+1)"));
        assert!(out.contains("    #2 Cleo"));
        assert!(out.contains("Replying to @Cleo"));
    }

    #[test]
    fn test_render_detail_shows_long_reply_in_full() {
        let tera = init_templates().unwrap();
        let long = (1..=80).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let tree = ReplyTree::build(vec![Reply {
            content: long.clone(),
            ..reply(1, None, "Bob")
        }]);

        let out = render_detail(
            &tera,
            &UiConfig::default(),
            &message(7, "Anna", "body"),
            &tree,
            &ComposeState::default(),
        )
        .unwrap();
        assert!(out.contains(&long));
        assert!(!out.contains("..."));
    }
}
