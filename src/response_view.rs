//! Text rendering of executor state and history for the terminal.

use std::fmt::Write as _;

use crate::code_formatter::pretty_body;
use crate::executor::ExecutorSnapshot;
use crate::types::{ApiResponse, HistoryItem, RequestStatus};

/// Coarse bucket used for the status badge.
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "informational",
        200..=299 => "success",
        300..=399 => "redirect",
        400..=499 => "client error",
        _ => "server error",
    }
}

/// `512 B`, `1.5 KB`, `2.0 MB`.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}

pub fn format_relative_time(timestamp: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(timestamp) {
        let now = chrono::Utc::now();
        let duration = now.signed_duration_since(dt);

        if duration.num_seconds() < 60 {
            "just now".to_string()
        } else if duration.num_minutes() < 60 {
            format!("{} min ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{} hours ago", duration.num_hours())
        } else {
            format!("{} days ago", duration.num_days())
        }
    } else {
        timestamp.to_string()
    }
}

/// One-line summary: `200 OK (success) · 35 ms · 1.2 KB`.
pub fn status_line(response: &ApiResponse) -> String {
    let mut line = format!("{}", response.status);
    if !response.status_text.is_empty() {
        line.push(' ');
        line.push_str(&response.status_text);
    }
    let _ = write!(line, " ({}) · {} ms", status_class(response.status), response.timing);
    if let Some(size) = response.size {
        let _ = write!(line, " · {}", format_size(size));
    }
    line
}

pub fn render_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_response(response: &ApiResponse, show_headers: bool) -> String {
    let mut out = status_line(response);
    if show_headers && !response.headers.is_empty() {
        out.push_str("\n\n");
        out.push_str(&render_headers(&response.headers));
    }
    let body = pretty_body(&response.body, response.header("content-type"));
    if !body.is_empty() {
        out.push_str("\n\n");
        out.push_str(&body);
    }
    out
}

/// What the response panel shows for the current executor state.
pub fn render_snapshot(snapshot: &ExecutorSnapshot, show_headers: bool) -> String {
    match snapshot.status {
        RequestStatus::Idle => "No response yet".to_string(),
        RequestStatus::Loading => "Sending request...".to_string(),
        RequestStatus::Success => match &snapshot.response {
            Some(response) => render_response(response, show_headers),
            None => "No response".to_string(),
        },
        RequestStatus::Error => format!(
            "Error: {}",
            snapshot.error.as_deref().unwrap_or("Request failed")
        ),
        RequestStatus::Cancelled => snapshot
            .error
            .clone()
            .unwrap_or_else(|| "Request cancelled".to_string()),
    }
}

pub fn render_history_item(item: &HistoryItem) -> String {
    let outcome = match &item.response {
        Some(response) => format!("{} · {} ms", response.status, response.timing),
        None => "no response".to_string(),
    };
    format!(
        "#{:<5} {:<24} {:<7} {}  [{}, {}]",
        item.id,
        item.title(),
        item.method.as_str(),
        item.url,
        outcome,
        format_relative_time(&item.timestamp)
    )
}
