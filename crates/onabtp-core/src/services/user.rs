use anyhow::Result;
use tracing::warn;

use super::{Fetched, ServiceContext};
use crate::api::{Domain, SearchOptions};
use crate::models::{
    hydrate_employees, Employee, EmployeeRow, UserProfile, UserRow, EMPLOYEE_FIELDS,
    PROFILE_FIELDS, USER_MODEL,
};

const EMPLOYEE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    async fn fetch_profile(&self) -> Result<Option<UserProfile>> {
        let rows: Vec<UserRow> = self
            .ctx
            .client
            .search_read(
                &self.ctx.credentials,
                USER_MODEL,
                &Domain::new().eq("id", self.ctx.credentials.uid),
                PROFILE_FIELDS,
                &SearchOptions::default(),
            )
            .await?;
        Ok(rows.first().map(UserProfile::from_row))
    }

    /// Profile of the signed-in user.
    pub async fn get_profile(&self) -> Fetched<Option<UserProfile>> {
        match self.fetch_profile().await {
            Ok(Some(profile)) => {
                if let Err(e) = self.ctx.storage.cache_profile(&profile) {
                    warn!(error = %e, "Failed to cache profile");
                }
                Fetched::network(Some(profile))
            }
            Ok(None) => {
                warn!(uid = self.ctx.credentials.uid, "No user record for uid");
                Fetched::network(None)
            }
            Err(e) => {
                warn!(error = %e, "Profile fetch failed, using cache");
                match self.ctx.storage.load_profile() {
                    Ok(Some(cached)) => Fetched::cache(Some(cached.data), Some(cached.cached_at)),
                    Ok(None) => Fetched::cache(None, None),
                    Err(e) => {
                        warn!(error = %e, "Failed to read cached profile");
                        Fetched::cache(None, None)
                    }
                }
            }
        }
    }

    async fn fetch_employees(&self) -> Result<Vec<Employee>> {
        let options = SearchOptions {
            limit: Some(EMPLOYEE_LIMIT),
            order: None,
        };
        let rows: Vec<EmployeeRow> = self
            .ctx
            .client
            .search_read(
                &self.ctx.credentials,
                USER_MODEL,
                &Domain::new().eq("active", true),
                EMPLOYEE_FIELDS,
                &options,
            )
            .await?;
        Ok(hydrate_employees(&rows))
    }

    /// Active users, for task assignment.
    pub async fn get_employees(&self) -> Fetched<Vec<Employee>> {
        match self.fetch_employees().await {
            Ok(employees) => {
                if let Err(e) = self.ctx.storage.cache_employees(&employees) {
                    warn!(error = %e, "Failed to cache employees");
                }
                Fetched::network(employees)
            }
            Err(e) => {
                warn!(error = %e, "Employee fetch failed, using cache");
                Fetched::from_cache(self.ctx.storage.load_employees(), "users")
            }
        }
    }
}
