//! Data models for Odoo records.
//!
//! Each entity comes in two shapes:
//!
//! - a `*Row` type mirroring the raw `search_read` payload, where any
//!   field may be `false`
//! - a hydrated view model (`Project`, `Task`, `UserProfile`, `Employee`)
//!   with relational names inlined and display defaults applied; this is
//!   what gets cached

pub mod odoo;
pub mod project;
pub mod task;
pub mod user;

use tracing::warn;

pub use odoo::{falsy, many2one, Many2One};
pub use project::{Project, ProjectRow, PROJECT_DETAIL_FIELDS, PROJECT_LIST_FIELDS, PROJECT_MODEL};
pub use task::{Task, TaskDraft, TaskRow, TASK_FIELDS, TASK_MODEL};
pub use user::{Employee, EmployeeRow, UserProfile, UserRow, EMPLOYEE_FIELDS, PROFILE_FIELDS, USER_MODEL};

/// Hydrate project rows. Invalid projects are logged and kept.
pub fn hydrate_projects(rows: &[ProjectRow]) -> Vec<Project> {
    rows.iter()
        .map(|row| {
            let project = Project::from_row(row);
            let errors = project.validation_errors();
            if !errors.is_empty() {
                warn!(id = project.id, errors = ?errors, "Invalid project after hydration");
            }
            project
        })
        .collect()
}

/// Hydrate task rows. Invalid tasks are logged and kept.
pub fn hydrate_tasks(rows: &[TaskRow]) -> Vec<Task> {
    rows.iter()
        .map(|row| {
            let task = Task::from_row(row);
            let errors = task.validation_errors();
            if !errors.is_empty() {
                warn!(id = task.id, errors = ?errors, "Invalid task after hydration");
            }
            task
        })
        .collect()
}

pub fn hydrate_employees(rows: &[EmployeeRow]) -> Vec<Employee> {
    rows.iter().map(Employee::from_row).collect()
}
