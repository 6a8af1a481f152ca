//! Construction projects (`project.project`).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::odoo::{falsy, many2one, Many2One};
use crate::hydration::{
    clean_bool, clean_count, clean_number, clean_string, construction_type_label,
    parse_odoo_date, project_state_label, tuple_id, tuple_name, NOT_DEFINED, NOT_PROVIDED,
};
use crate::utils::{format_date_fr, strip_html};

/// Odoo model name.
pub const PROJECT_MODEL: &str = "project.project";

/// Fields requested for project lists.
pub const PROJECT_LIST_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "display_name",
    "state",
    "active",
    "date_start",
    "date",
    "user_id",
    "partner_id",
    "task_count",
    "type_of_construction",
];

/// Fields requested for a single project.
pub const PROJECT_DETAIL_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "display_name",
    "state",
    "active",
    "date_start",
    "date",
    "email",
    "phone",
    "latitude",
    "longitude",
    "site_name",
    "site_area",
    "site_length",
    "site_width",
    "progressbar",
    "task_completion_percentage",
    "effective_hours",
    "task_count",
    "open_task_count",
    "closed_task_count",
    "collaborator_count",
    "type_of_construction",
    "create_date",
    "write_date",
    "user_id",
    "partner_id",
    "company_id",
    "stage_id",
];

/// A `project.project` row as Odoo sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectRow {
    #[serde(default, deserialize_with = "falsy")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub state: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "falsy")]
    pub date_start: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "many2one")]
    pub user_id: Option<Many2One>,
    #[serde(default, deserialize_with = "many2one")]
    pub partner_id: Option<Many2One>,
    #[serde(default, deserialize_with = "many2one")]
    pub company_id: Option<Many2One>,
    #[serde(default, deserialize_with = "many2one")]
    pub stage_id: Option<Many2One>,
    #[serde(default, deserialize_with = "falsy")]
    pub task_count: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub open_task_count: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub closed_task_count: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub collaborator_count: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub progressbar: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub task_completion_percentage: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub effective_hours: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub type_of_construction: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub site_name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub site_area: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub site_length: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub site_width: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub create_date: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub write_date: Option<String>,
}

/// A hydrated project, ready for display and caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub display_name: String,
    pub state: String,
    pub is_active: bool,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub manager_id: Option<i64>,
    pub manager_name: String,
    pub partner_id: Option<i64>,
    pub partner_name: String,
    pub company_id: Option<i64>,
    pub company_name: String,
    pub stage_id: Option<i64>,
    pub stage_name: String,
    pub task_count: i64,
    pub open_task_count: i64,
    pub closed_task_count: i64,
    pub collaborator_count: i64,
    pub progress: f64,
    pub task_completion_percentage: f64,
    pub effective_hours: f64,
    pub construction_type: Option<String>,
    pub email: String,
    pub phone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub site_name: String,
    pub site_area: Option<f64>,
    pub site_length: Option<f64>,
    pub site_width: Option<f64>,
    pub create_date: Option<NaiveDateTime>,
    pub write_date: Option<NaiveDateTime>,
}

impl Project {
    pub fn from_row(row: &ProjectRow) -> Self {
        let name = clean_string(row.name.as_deref(), NOT_PROVIDED);
        let display_name = row
            .display_name
            .as_deref()
            .or(row.name.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("")
            .to_string();
        let description = row.description.as_deref().map(strip_html);

        Self {
            id: row.id.unwrap_or(0),
            name,
            description: clean_string(description.as_deref(), NOT_PROVIDED),
            display_name,
            state: clean_string(row.state.as_deref(), "draft"),
            is_active: clean_bool(row.active, true),
            start_date: parse_odoo_date(row.date_start.as_deref()),
            end_date: parse_odoo_date(row.date.as_deref()),
            manager_id: tuple_id(row.user_id.as_ref()),
            manager_name: tuple_name(row.user_id.as_ref()),
            partner_id: tuple_id(row.partner_id.as_ref()),
            partner_name: tuple_name(row.partner_id.as_ref()),
            company_id: tuple_id(row.company_id.as_ref()),
            company_name: tuple_name(row.company_id.as_ref()),
            stage_id: tuple_id(row.stage_id.as_ref()),
            stage_name: tuple_name(row.stage_id.as_ref()),
            task_count: clean_count(row.task_count),
            open_task_count: clean_count(row.open_task_count),
            closed_task_count: clean_count(row.closed_task_count),
            collaborator_count: clean_count(row.collaborator_count),
            progress: clean_number(row.progressbar, 0.0),
            task_completion_percentage: clean_number(row.task_completion_percentage, 0.0),
            effective_hours: clean_number(row.effective_hours, 0.0),
            construction_type: row.type_of_construction.clone().filter(|t| !t.is_empty()),
            email: clean_string(row.email.as_deref(), ""),
            phone: clean_string(row.phone.as_deref(), ""),
            latitude: row.latitude,
            longitude: row.longitude,
            site_name: clean_string(row.site_name.as_deref(), ""),
            site_area: row.site_area,
            site_length: row.site_length,
            site_width: row.site_width,
            create_date: parse_odoo_date(row.create_date.as_deref()),
            write_date: parse_odoo_date(row.write_date.as_deref()),
        }
    }

    /// Projects carry their deadline in the end date field.
    pub fn deadline(&self) -> Option<NaiveDateTime> {
        self.end_date
    }

    pub fn state_label(&self) -> String {
        project_state_label(&self.state)
    }

    pub fn construction_type_label(&self) -> String {
        construction_type_label(self.construction_type.as_deref())
    }

    pub fn progress_display(&self) -> String {
        format!("{}%", self.progress.round())
    }

    pub fn formatted_start_date(&self) -> String {
        format_date_fr(self.start_date, NOT_DEFINED)
    }

    pub fn formatted_end_date(&self) -> String {
        format_date_fr(self.end_date, NOT_DEFINED)
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.deadline().map(|d| now > d).unwrap_or(false)
    }

    /// Whole days until the deadline, rounded up; 0 when there is none.
    pub fn days_remaining(&self, now: NaiveDateTime) -> i64 {
        match self.deadline() {
            Some(deadline) => ceil_days(deadline - now),
            None => 0,
        }
    }

    pub fn has_location(&self) -> bool {
        matches!((self.latitude, self.longitude), (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0)
    }

    pub fn site_dimensions(&self) -> String {
        match (self.site_length, self.site_width, self.site_area) {
            (Some(l), Some(w), _) if l > 0.0 && w > 0.0 => format!("{}m × {}m", l, w),
            (_, _, Some(area)) if area > 0.0 => format!("{}m²", area),
            _ => "Non renseignées".to_string(),
        }
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.id <= 0 {
            errors.push("ID invalide".to_string());
        }
        if self.display_name.trim().is_empty() {
            errors.push("Nom d'affichage requis".to_string());
        }
        if self.name.trim().is_empty() || self.name == NOT_PROVIDED {
            errors.push("Nom du projet requis".to_string());
        }
        if self.state.trim().is_empty() {
            errors.push("État du projet requis".to_string());
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }
}

/// Ceiling of a duration expressed in days.
pub(crate) fn ceil_days(delta: chrono::Duration) -> i64 {
    let secs = delta.num_seconds();
    let day = 86_400;
    if secs > 0 {
        (secs + day - 1) / day
    } else {
        secs / day
    }
}
