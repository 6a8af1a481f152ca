//! Hydration helpers: raw Odoo values to clean display values.
//!
//! All functions here are pure; hydrating the same row twice gives the
//! same result.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::models::Many2One;

/// Placeholder shown for any missing text value.
pub const NOT_PROVIDED: &str = "Non renseigné";

/// Placeholder for a missing date.
pub const NOT_DEFINED: &str = "Non définie";

/// Placeholder for a task without a deadline.
pub const NO_DEADLINE: &str = "Aucune date limite";

/// Avatar used when the user has no picture.
pub const DEFAULT_AVATAR: &str = "assets/images/profile-avatar.png";

/// Id of a many2one pair, if set.
pub fn tuple_id(tuple: Option<&Many2One>) -> Option<i64> {
    tuple.map(|t| t.id)
}

/// Name of a many2one pair, or the placeholder.
pub fn tuple_name(tuple: Option<&Many2One>) -> String {
    match tuple {
        Some(t) if !t.name.trim().is_empty() => t.name.clone(),
        _ => NOT_PROVIDED.to_string(),
    }
}

/// Trimmed string, or `default` when missing or blank.
pub fn clean_string(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => default.to_string(),
    }
}

/// Number, or `default` when missing or NaN.
pub fn clean_number(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(n) if !n.is_nan() => n,
        _ => default,
    }
}

pub fn clean_count(value: Option<i64>) -> i64 {
    value.unwrap_or(0)
}

pub fn clean_bool(value: Option<bool>, default: bool) -> bool {
    value.unwrap_or(default)
}

/// Parse Odoo's `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` strings.
pub fn parse_odoo_date(value: Option<&str>) -> Option<NaiveDateTime> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    if parsed.is_none() {
        warn!(value = raw, "Unparsable date from Odoo");
    }
    parsed
}

/// Drop the ordering prefix Odoo puts on task states (`01_in_progress`).
pub fn clean_task_state(state: &str) -> String {
    let digits = state.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && state[digits..].starts_with('_') {
        state[digits + 1..].to_string()
    } else {
        state.to_string()
    }
}

pub fn project_state_label(state: &str) -> String {
    match state {
        "draft" => "Brouillon",
        "open" => "En cours",
        "pending" => "En attente",
        "close" => "Terminé",
        "cancelled" => "Annulé",
        other => other,
    }
    .to_string()
}

pub fn task_state_label(state: &str) -> String {
    match state {
        "draft" => "Brouillon",
        "open" => "Ouverte",
        "pending" => "En attente",
        "in_progress" => "En cours",
        "done" => "Terminée",
        "cancelled" => "Annulée",
        "closed" => "Fermée",
        other => other,
    }
    .to_string()
}

pub fn priority_label(priority: &str) -> &'static str {
    match priority {
        "1" => "Élevée",
        "2" => "Très élevée",
        _ => "Normale",
    }
}

pub fn construction_type_label(kind: Option<&str>) -> String {
    let Some(kind) = kind.filter(|k| !k.is_empty()) else {
        return NOT_PROVIDED.to_string();
    };
    match kind {
        "agricultural" => "Agricole",
        "residential" => "Résidentiel",
        "commercial" => "Commercial",
        "institutional" => "Institutionnel",
        "industrial" => "Industriel",
        "heavy_civil" => "Civil lourd",
        "environmental" => "Environnemental",
        "other" => "Autre",
        other => other,
    }
    .to_string()
}

pub fn language_label(lang: &str) -> String {
    match lang {
        "fr_FR" => "Français",
        "en_US" => "English",
        "es_ES" => "Español",
        "de_DE" => "Deutsch",
        other => other,
    }
    .to_string()
}

pub fn timezone_label(tz: &str) -> String {
    match tz {
        "Europe/Paris" => "Paris (UTC+1)",
        "Europe/London" => "Londres (UTC+0)",
        "America/New_York" => "New York (UTC-5)",
        "Africa/Dakar" => "Dakar (UTC+0)",
        other => other,
    }
    .to_string()
}

/// Data URI for a base64 avatar, or the bundled default picture.
pub fn avatar_uri(image: Option<&str>) -> String {
    match image.map(str::trim) {
        Some(data) if !data.is_empty() => format!("data:image/png;base64,{}", data),
        _ => DEFAULT_AVATAR.to_string(),
    }
}
