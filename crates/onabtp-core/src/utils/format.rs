use chrono::NaiveDateTime;

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a date the French way (dd/mm/yyyy)
pub fn format_date_fr(date: Option<NaiveDateTime>, default: &str) -> String {
    match date {
        Some(dt) => dt.format("%d/%m/%Y").to_string(),
        None => default.to_string(),
    }
}

/// Hours as shown in task details, e.g. "12.5h"
pub fn format_hours(hours: f64) -> String {
    format!("{}h", hours)
}

/// Remove HTML tags and non-breaking space entities from rich text fields
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ").trim().to_string()
}
