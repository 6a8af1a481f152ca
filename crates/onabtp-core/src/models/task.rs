//! Site tasks (`project.task`).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::odoo::{falsy, many2one, Many2One};
use super::project::ceil_days;
use crate::hydration::{
    clean_bool, clean_number, clean_string, clean_task_state, parse_odoo_date, priority_label,
    task_state_label, tuple_id, tuple_name, NOT_PROVIDED, NO_DEADLINE,
};
use crate::utils::{format_date_fr, format_hours, strip_html};

/// Odoo model name.
pub const TASK_MODEL: &str = "project.task";

/// Fields requested for task lists and details.
pub const TASK_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "project_id",
    "state",
    "progress",
    "date_deadline",
    "effective_hours",
    "remaining_hours",
    "total_hours_spent",
    "user_id",
    "stage_id",
    "priority",
    "active",
    "create_date",
    "write_date",
];

/// A `project.task` row as Odoo sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRow {
    #[serde(default, deserialize_with = "falsy")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "many2one")]
    pub project_id: Option<Many2One>,
    #[serde(default, deserialize_with = "falsy")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub date_deadline: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub effective_hours: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub remaining_hours: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub total_hours_spent: Option<f64>,
    #[serde(default, deserialize_with = "many2one")]
    pub user_id: Option<Many2One>,
    #[serde(default, deserialize_with = "many2one")]
    pub stage_id: Option<Many2One>,
    #[serde(default, deserialize_with = "falsy")]
    pub priority: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "falsy")]
    pub create_date: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub write_date: Option<String>,
}

/// A hydrated task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub project_id: Option<i64>,
    pub project_name: String,
    pub state: String,
    /// Percentage, 0 to 100.
    pub progress: f64,
    pub deadline: Option<NaiveDateTime>,
    pub effective_hours: f64,
    pub remaining_hours: f64,
    pub total_hours_spent: f64,
    pub assignee_id: Option<i64>,
    pub assignee_name: String,
    pub stage_id: Option<i64>,
    pub stage_name: String,
    pub priority: String,
    pub is_active: bool,
    pub create_date: Option<NaiveDateTime>,
    pub write_date: Option<NaiveDateTime>,
}

impl Task {
    pub fn from_row(row: &TaskRow) -> Self {
        let description = row.description.as_deref().map(strip_html);
        let state = row
            .state
            .as_deref()
            .map(clean_task_state)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "draft".to_string());

        Self {
            id: row.id.unwrap_or(0),
            name: clean_string(row.name.as_deref(), ""),
            description: clean_string(description.as_deref(), NOT_PROVIDED),
            project_id: tuple_id(row.project_id.as_ref()),
            project_name: tuple_name(row.project_id.as_ref()),
            state,
            progress: clean_number(row.progress, 0.0),
            deadline: parse_odoo_date(row.date_deadline.as_deref()),
            effective_hours: clean_number(row.effective_hours, 0.0),
            remaining_hours: clean_number(row.remaining_hours, 0.0),
            total_hours_spent: clean_number(row.total_hours_spent, 0.0),
            assignee_id: tuple_id(row.user_id.as_ref()),
            assignee_name: tuple_name(row.user_id.as_ref()),
            stage_id: tuple_id(row.stage_id.as_ref()),
            stage_name: tuple_name(row.stage_id.as_ref()),
            priority: clean_string(row.priority.as_deref(), "0"),
            is_active: clean_bool(row.active, true),
            create_date: parse_odoo_date(row.create_date.as_deref()),
            write_date: parse_odoo_date(row.write_date.as_deref()),
        }
    }

    pub fn state_label(&self) -> String {
        task_state_label(&self.state)
    }

    pub fn priority_label(&self) -> &'static str {
        priority_label(&self.priority)
    }

    pub fn progress_display(&self) -> String {
        format!("{}%", self.progress.round())
    }

    pub fn formatted_deadline(&self) -> String {
        format_date_fr(self.deadline, NO_DEADLINE)
    }

    pub fn effective_hours_display(&self) -> String {
        format_hours(self.effective_hours)
    }

    pub fn remaining_hours_display(&self) -> String {
        format_hours(self.remaining_hours)
    }

    pub fn is_done(&self) -> bool {
        self.state == "done"
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        match self.deadline {
            Some(deadline) => deadline < now && !self.is_done(),
            None => false,
        }
    }

    /// Whole days until the deadline, rounded up.
    pub fn days_remaining(&self, now: NaiveDateTime) -> Option<i64> {
        self.deadline.map(|deadline| ceil_days(deadline - now))
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.id <= 0 {
            errors.push("ID invalide".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("Nom de la tâche requis".to_string());
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }
}

/// Values for a new task, before it has an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    pub description: Option<String>,
    pub project_id: Option<i64>,
    pub user_id: Option<i64>,
    /// `YYYY-MM-DD`.
    pub date_deadline: Option<String>,
    pub priority: Option<String>,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Odoo `create` values. Unset fields are left out.
    pub fn to_values(&self) -> Value {
        let mut values = Map::new();
        values.insert("name".to_string(), json!(self.name.trim()));
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            values.insert("description".to_string(), json!(description));
        }
        if let Some(project_id) = self.project_id {
            values.insert("project_id".to_string(), json!(project_id));
        }
        if let Some(user_id) = self.user_id {
            values.insert("user_ids".to_string(), json!([[6, 0, [user_id]]]));
        }
        if let Some(deadline) = self.date_deadline.as_deref().filter(|d| !d.is_empty()) {
            values.insert("date_deadline".to_string(), json!(deadline));
        }
        if let Some(priority) = self.priority.as_deref() {
            values.insert("priority".to_string(), json!(priority));
        }
        Value::Object(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    fn sample_row() -> TaskRow {
        serde_json::from_value(json!({
            "id": 42,
            "name": "Coulage dalle",
            "description": "<p>Dalle&nbsp;R+1</p>",
            "project_id": [3, "Villa Almadies"],
            "state": "01_in_progress",
            "progress": 37.5,
            "date_deadline": "2024-05-20",
            "effective_hours": 12.5,
            "remaining_hours": false,
            "user_id": false,
            "stage_id": [2, "En cours"],
            "priority": "1"
        }))
        .expect("row")
    }

    #[test]
    fn test_hydrate_task() {
        let task = Task::from_row(&sample_row());
        assert_eq!(task.id, 42);
        assert_eq!(task.description, "Dalle R+1");
        assert_eq!(task.project_id, Some(3));
        assert_eq!(task.project_name, "Villa Almadies");
        assert_eq!(task.state, "in_progress");
        assert_eq!(task.state_label(), "En cours");
        assert_eq!(task.progress_display(), "38%");
        assert_eq!(task.assignee_id, None);
        assert_eq!(task.assignee_name, NOT_PROVIDED);
        assert_eq!(task.remaining_hours, 0.0);
        assert_eq!(task.effective_hours_display(), "12.5h");
        assert_eq!(task.priority_label(), "Élevée");
        assert_eq!(task.formatted_deadline(), "20/05/2024");
        assert!(task.is_valid());
    }

    #[test]
    fn test_hydration_is_idempotent() {
        let row = sample_row();
        assert_eq!(Task::from_row(&row), Task::from_row(&row));
    }

    #[test]
    fn test_missing_deadline() {
        let task = Task::from_row(&TaskRow::default());
        assert_eq!(task.formatted_deadline(), NO_DEADLINE);
        assert_eq!(task.days_remaining(at(2024, 1, 1)), None);
        assert!(!task.is_overdue(at(2024, 1, 1)));
        assert_eq!(task.priority_label(), "Normale");
        assert_eq!(task.validation_errors().len(), 2);
    }

    #[test]
    fn test_overdue_ignores_done_tasks() {
        let mut task = Task::from_row(&sample_row());
        assert!(task.is_overdue(at(2024, 6, 1)));
        task.state = "done".to_string();
        assert!(!task.is_overdue(at(2024, 6, 1)));
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let task = Task::from_row(&sample_row());
        assert_eq!(task.days_remaining(at(2024, 5, 18)), Some(2));
    }

    #[test]
    fn test_draft_values() {
        let mut draft = TaskDraft::new(" Ferraillage ");
        draft.project_id = Some(3);
        draft.user_id = Some(7);
        draft.description = Some("  ".to_string());
        let values = draft.to_values();
        assert_eq!(values["name"], "Ferraillage");
        assert_eq!(values["project_id"], 3);
        assert_eq!(values["user_ids"], json!([[6, 0, [7]]]));
        assert!(values.get("description").is_none());
        assert!(values.get("date_deadline").is_none());
    }
}
