//! Users (`res.users`): the signed-in profile and the employee list.

use serde::{Deserialize, Serialize};

use super::odoo::{falsy, many2one, Many2One};
use crate::hydration::{
    avatar_uri, clean_bool, clean_string, language_label, timezone_label, tuple_name,
    NOT_PROVIDED,
};

/// Odoo model name.
pub const USER_MODEL: &str = "res.users";

pub const PROFILE_FIELDS: &[&str] = &[
    "id",
    "name",
    "email",
    "mobile",
    "lang",
    "tz",
    "avatar_1024",
    "company_id",
    "city",
    "street",
    "country_id",
];

pub const EMPLOYEE_FIELDS: &[&str] = &["id", "name", "login", "email", "active"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRow {
    #[serde(default, deserialize_with = "falsy")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub lang: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub tz: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub avatar_1024: Option<String>,
    #[serde(default, deserialize_with = "many2one")]
    pub company_id: Option<Many2One>,
    #[serde(default, deserialize_with = "falsy")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "many2one")]
    pub country_id: Option<Many2One>,
}

/// The signed-in user's profile, with display defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub language: String,
    pub timezone: String,
    pub avatar: String,
    pub company: String,
    pub city: String,
    pub street: String,
    pub country: String,
}

impl UserProfile {
    pub fn from_row(row: &UserRow) -> Self {
        Self {
            id: row.id.unwrap_or(0),
            name: clean_string(row.name.as_deref(), NOT_PROVIDED),
            email: clean_string(row.email.as_deref(), NOT_PROVIDED),
            mobile: clean_string(row.mobile.as_deref(), NOT_PROVIDED),
            language: row.lang.as_deref().map(language_label).unwrap_or_else(|| NOT_PROVIDED.to_string()),
            timezone: row.tz.as_deref().map(timezone_label).unwrap_or_else(|| NOT_PROVIDED.to_string()),
            avatar: avatar_uri(row.avatar_1024.as_deref()),
            company: tuple_name(row.company_id.as_ref()),
            city: clean_string(row.city.as_deref(), NOT_PROVIDED),
            street: clean_string(row.street.as_deref(), NOT_PROVIDED),
            country: tuple_name(row.country_id.as_ref()),
        }
    }

    /// Street, city and country joined, skipping the unknown parts.
    pub fn full_address(&self) -> String {
        let parts: Vec<&str> = [&self.street, &self.city, &self.country]
            .into_iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty() && *p != NOT_PROVIDED)
            .collect();
        if parts.is_empty() {
            "Adresse non renseignée".to_string()
        } else {
            parts.join(", ")
        }
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.id <= 0 {
            errors.push("ID invalide".to_string());
        }
        if self.name == NOT_PROVIDED {
            errors.push("Nom requis".to_string());
        }
        if self.email != NOT_PROVIDED && !self.email.contains('@') {
            errors.push("Format d'email invalide".to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeRow {
    #[serde(default, deserialize_with = "falsy")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "falsy")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub login: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub email: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub login: String,
    pub email: String,
    pub is_active: bool,
}

impl Employee {
    pub fn from_row(row: &EmployeeRow) -> Self {
        Self {
            id: row.id.unwrap_or(0),
            name: clean_string(row.name.as_deref(), ""),
            login: clean_string(row.login.as_deref(), ""),
            email: clean_string(row.email.as_deref(), ""),
            is_active: clean_bool(row.active, true),
        }
    }
}
