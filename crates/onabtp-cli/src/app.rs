use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use onabtp_core::auth::{AuthError, CredentialStore};
use onabtp_core::cache::OfflineStorage;
use onabtp_core::models::{Project, Task, TaskDraft};
use onabtp_core::services::{refresh_all, DataSource, Fetched, ServiceContext};
use onabtp_core::sync::SyncEngine;
use onabtp_core::utils::truncate_string;
use onabtp_core::{
    AuthService, Config, Connectivity, ConnectivityMonitor, Credentials, FileStore, OdooClient,
    ProjectService, TaskService, UserService, WriteOutcome,
};

use crate::Command;

/// Column width for names in list output
const NAME_WIDTH: usize = 40;

pub struct App {
    /// Config as stored on disk; the only one ever saved.
    stored: Config,
    /// Effective config for this run (environment and `--offline` applied).
    config: Config,
    client: OdooClient,
    storage: OfflineStorage,
    connectivity: Connectivity,
    auth: AuthService,
    json: bool,
}

impl App {
    pub fn new(stored: Config, config: Config, json: bool) -> Result<Self> {
        let store = FileStore::new(config.cache_dir()?)?;
        let storage = OfflineStorage::new(Arc::new(store));
        let client = OdooClient::new(&config)?;
        let connectivity = Connectivity::new(&config)?;
        let auth = AuthService::new(client.clone(), storage.clone(), connectivity.clone());
        Ok(Self {
            stored,
            config,
            client,
            storage,
            connectivity,
            auth,
            json,
        })
    }

    pub async fn run(mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { email, remember } => self.login(email, remember).await,
            Command::Logout => self.logout(),
            Command::Status => self.status().await,
            Command::Projects => self.projects().await,
            Command::Project { id } => self.project(id).await,
            Command::Tasks { project } => self.tasks(project).await,
            Command::Task { id } => self.task(id).await,
            Command::TaskCreate {
                name,
                project,
                assignee,
                deadline,
                description,
                priority,
            } => {
                let draft = TaskDraft {
                    name,
                    description,
                    project_id: project,
                    user_id: assignee,
                    date_deadline: deadline,
                    priority,
                };
                self.task_create(draft).await
            }
            Command::TaskUpdate {
                id,
                name,
                progress,
                deadline,
                set,
            } => {
                let values = update_values(name, progress, deadline, &set)?;
                self.task_update(id, values).await
            }
            Command::TaskDelete { id } => self.task_delete(id).await,
            Command::Profile => self.profile().await,
            Command::Employees => self.employees().await,
            Command::Queue { purge } => self.queue(purge),
            Command::Sync => self.sync().await,
            Command::Watch { interval } => self.watch(interval).await,
            Command::Diagnose => self.diagnose().await,
            Command::ClearCache => self.clear_cache(),
        }
    }

    // ===== Session =====

    async fn login(&mut self, email: Option<String>, remember: bool) -> Result<()> {
        let default_email = self
            .storage
            .last_login()
            .ok()
            .flatten()
            .or_else(|| self.stored.last_login.clone());
        let email = match email {
            Some(email) => email,
            None => prompt_email(default_email.as_deref())?,
        };
        if email.trim().is_empty() {
            bail!("Email requis");
        }
        let password = rpassword::prompt_password("Mot de passe : ")?;

        let mut outcome = match self.auth.login(&email, &password).await {
            Ok(outcome) => outcome,
            Err(AuthError::Storage(e)) => return Err(e),
            Err(e) => bail!("{}", e),
        };

        match outcome.source {
            DataSource::Network => println!("Connecté (uid {})", outcome.uid),
            DataSource::Cache => println!("Connecté hors ligne (uid {})", outcome.uid),
        }

        let confirmed = outcome.password_confirmed().await;
        if confirmed == Some(false) {
            println!("Attention : le serveur a refusé ce mot de passe");
        }
        if remember {
            match confirmed {
                Some(true) => {
                    CredentialStore::store(&self.config.database, email.trim(), &password)?;
                    println!("Mot de passe enregistré dans le trousseau");
                }
                Some(false) => println!("Mot de passe non enregistré : refusé par le serveur"),
                None => println!("Mot de passe non enregistré : serveur injoignable pour le vérifier"),
            }
        }

        self.stored.last_login = Some(email.trim().to_string());
        if let Err(e) = self.stored.save() {
            warn!(error = %e, "Failed to save config");
        }
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        if let Some(session) = self.auth.session()? {
            if CredentialStore::has_credentials(&session.database, &session.login) {
                if let Err(e) = CredentialStore::delete(&session.database, &session.login) {
                    warn!(error = %e, "Failed to delete keychain entry");
                }
            }
        }
        self.auth.logout()?;
        println!("Déconnecté");
        Ok(())
    }

    /// Credentials for `execute_kw`: session uid plus keychain or prompted password.
    fn credentials(&self) -> Result<Credentials> {
        let session = self
            .auth
            .session()?
            .ok_or_else(|| anyhow!("Non connecté. Lancez `onabtp login`."))?;
        let password = match CredentialStore::get_password(&session.database, &session.login) {
            Ok(password) => password,
            Err(e) => {
                debug!(error = %e, "No stored password");
                rpassword::prompt_password(format!("Mot de passe pour {} : ", session.login))?
            }
        };
        Ok(Credentials::new(session.uid, password))
    }

    fn context(&self) -> Result<ServiceContext> {
        Ok(ServiceContext::new(
            self.client.clone(),
            self.credentials()?,
            self.storage.clone(),
        ))
    }

    async fn status(&self) -> Result<()> {
        let session = self.auth.session()?;
        let online = self.connectivity.check().await;
        let authenticated = self.auth.is_authenticated().await?;
        let stats = self.storage.stats()?;
        let cached_user = self.auth.current_user()?;

        if self.json {
            return print_json(&json!({
                "server": self.config.url,
                "database": self.config.database,
                "online": online,
                "authenticated": authenticated,
                "session": session,
                "cached_user": cached_user,
                "cache": stats,
            }));
        }

        println!("Serveur      : {} ({})", self.config.url, self.config.database);
        println!("Connexion    : {}", if online { "en ligne" } else { "hors ligne" });
        match session {
            Some(s) => println!(
                "Session      : {} (uid {}){}",
                s.login,
                s.uid,
                if authenticated { "" } else { " - non valide" }
            ),
            None => println!("Session      : aucune"),
        }
        if let Some(user) = &cached_user {
            println!(
                "Hors ligne   : {} ({}), dernière connexion {}",
                user.name,
                user.email,
                user.last_login.with_timezone(&Local).format("%d/%m/%Y %H:%M")
            );
        }
        println!(
            "Projets      : {} en cache{}",
            stats.projects_count,
            age_suffix(stats.projects_age.as_deref())
        );
        println!(
            "Tâches       : {} en cache{}",
            stats.tasks_count,
            age_suffix(stats.tasks_age.as_deref())
        );
        if self.storage.any_stale() {
            println!("             (cache de plus d'une heure, relancez `onabtp projects` ou `onabtp tasks`)");
        }
        println!("En attente   : {} action(s)", stats.pending_actions);
        if let Some(last) = stats.last_sync {
            println!("Dernière synchro : {}", last.with_timezone(&Local).format("%d/%m/%Y %H:%M"));
        }
        Ok(())
    }

    // ===== Projects =====

    async fn projects(&self) -> Result<()> {
        let fetched = ProjectService::new(self.context()?).get_projects().await;
        if self.json {
            return print_json(&fetched.data);
        }
        print_origin(&fetched);
        if fetched.data.is_empty() {
            println!("Aucun projet");
        }
        for project in &fetched.data {
            print_project_line(project);
        }
        Ok(())
    }

    async fn project(&self, id: i64) -> Result<()> {
        let fetched = ProjectService::new(self.context()?).get_project(id).await;
        let project = fetched
            .data
            .as_ref()
            .ok_or_else(|| anyhow!("Projet {} introuvable", id))?;
        if self.json {
            return print_json(project);
        }
        print_origin(&fetched);
        let now = Local::now().naive_local();
        println!("{}", project.display_name);
        println!("  État        : {}", project.state_label());
        println!("  Type        : {}", project.construction_type_label());
        println!("  Responsable : {}", project.manager_name);
        println!("  Client      : {}", project.partner_name);
        println!("  Début       : {}", project.formatted_start_date());
        println!("  Fin         : {}", project.formatted_end_date());
        if project.deadline().is_some() {
            if project.is_overdue(now) {
                println!("  Retard      : {} jour(s)", -project.days_remaining(now));
            } else {
                println!("  Restant     : {} jour(s)", project.days_remaining(now));
            }
        }
        println!("  Avancement  : {}", project.progress_display());
        println!(
            "  Tâches      : {} ({} ouvertes, {} fermées)",
            project.task_count, project.open_task_count, project.closed_task_count
        );
        println!("  Chantier    : {}", project.site_dimensions());
        if project.has_location() {
            if let (Some(lat), Some(lon)) = (project.latitude, project.longitude) {
                println!("  Position    : {:.5}, {:.5}", lat, lon);
            }
        }
        println!("  Description : {}", project.description);
        Ok(())
    }

    // ===== Tasks =====

    async fn tasks(&self, project: Option<i64>) -> Result<()> {
        let service = TaskService::new(self.context()?);
        let fetched = match project {
            Some(id) => service.get_tasks_by_project(id).await,
            None => service.get_tasks().await,
        };
        if self.json {
            return print_json(&fetched.data);
        }
        print_origin(&fetched);
        if fetched.data.is_empty() {
            println!("Aucune tâche");
        }
        let now = Local::now().naive_local();
        for task in &fetched.data {
            print_task_line(task, now);
        }
        Ok(())
    }

    async fn task(&self, id: i64) -> Result<()> {
        let fetched = TaskService::new(self.context()?).get_task(id).await;
        let task = fetched
            .data
            .as_ref()
            .ok_or_else(|| anyhow!("Tâche {} introuvable", id))?;
        if self.json {
            return print_json(task);
        }
        print_origin(&fetched);
        let now = Local::now().naive_local();
        println!("{}", task.name);
        println!("  Projet      : {}", task.project_name);
        println!("  État        : {}", task.state_label());
        println!("  Étape       : {}", task.stage_name);
        println!("  Priorité    : {}", task.priority_label());
        println!("  Assignée à  : {}", task.assignee_name);
        println!("  Échéance    : {}", task.formatted_deadline());
        if let Some(days) = task.days_remaining(now) {
            if task.is_overdue(now) {
                println!("  Retard      : {} jour(s)", -days);
            } else if !task.is_done() {
                println!("  Restant     : {} jour(s)", days);
            }
        }
        println!("  Avancement  : {}", task.progress_display());
        println!(
            "  Heures      : {} passées, {} restantes",
            task.effective_hours_display(),
            task.remaining_hours_display()
        );
        println!("  Description : {}", task.description);
        Ok(())
    }

    async fn task_create(&self, draft: TaskDraft) -> Result<()> {
        let outcome = TaskService::new(self.context()?).create_task(&draft).await?;
        self.report_write(outcome, |id| format!("Tâche créée (id {})", id))
    }

    async fn task_update(&self, id: i64, values: Value) -> Result<()> {
        let outcome = TaskService::new(self.context()?).update_task(id, values).await?;
        self.report_write(outcome, |_| format!("Tâche {} mise à jour", id))
    }

    async fn task_delete(&self, id: i64) -> Result<()> {
        let outcome = TaskService::new(self.context()?).delete_task(id).await?;
        self.report_write(outcome, |_| format!("Tâche {} supprimée", id))
    }

    fn report_write<T: Serialize>(
        &self,
        outcome: WriteOutcome<T>,
        applied: impl FnOnce(&T) -> String,
    ) -> Result<()> {
        match outcome {
            WriteOutcome::Applied(result) => {
                if self.json {
                    return print_json(&json!({"status": "applied", "result": result}));
                }
                println!("{}", applied(&result));
            }
            WriteOutcome::Queued(action_id) => {
                if self.json {
                    return print_json(&json!({"status": "queued", "action": action_id}));
                }
                println!("Serveur injoignable : modification mise en file ({})", action_id);
            }
        }
        Ok(())
    }

    // ===== Users =====

    async fn profile(&self) -> Result<()> {
        let fetched = UserService::new(self.context()?).get_profile().await;
        let profile = fetched
            .data
            .as_ref()
            .ok_or_else(|| anyhow!("Profil indisponible"))?;
        if self.json {
            return print_json(profile);
        }
        print_origin(&fetched);
        println!("{}", profile.name);
        println!("  Email       : {}", profile.email);
        println!("  Mobile      : {}", profile.mobile);
        println!("  Société     : {}", profile.company);
        println!("  Adresse     : {}", profile.full_address());
        println!("  Langue      : {}", profile.language);
        println!("  Fuseau      : {}", profile.timezone);
        Ok(())
    }

    async fn employees(&self) -> Result<()> {
        let fetched = UserService::new(self.context()?).get_employees().await;
        if self.json {
            return print_json(&fetched.data);
        }
        print_origin(&fetched);
        for employee in &fetched.data {
            println!(
                "{:>6}  {:<30}  {}",
                employee.id,
                truncate_string(&employee.name, 30),
                employee.email
            );
        }
        Ok(())
    }

    // ===== Sync =====

    fn queue(&self, purge: bool) -> Result<()> {
        let queue = onabtp_core::SyncQueue::new(self.storage.clone());
        if purge {
            let removed = queue.purge_synced()?;
            println!("{} action(s) synchronisée(s) supprimée(s)", removed);
        }
        let actions = queue.load()?;
        if self.json {
            return print_json(&actions);
        }
        if actions.is_empty() {
            println!("File de synchronisation vide");
        }
        for action in &actions {
            let status = if action.synced { "ok" } else { "en attente" };
            println!(
                "{}  {:<6} {:<7} {:<10} {}{}",
                action.timestamp.with_timezone(&Local).format("%d/%m %H:%M"),
                action.action_type.to_string(),
                action.entity.to_string(),
                status,
                action.id,
                action
                    .last_error
                    .as_deref()
                    .map(|e| format!(" ({} essai(s) : {})", action.attempts, truncate_string(e, 60)))
                    .unwrap_or_default()
            );
        }
        Ok(())
    }

    fn engine(&self) -> Result<SyncEngine> {
        let ctx = self.context()?;
        Ok(SyncEngine::new(ctx.client, ctx.credentials, ctx.queue, self.connectivity.clone()))
    }

    async fn sync(&self) -> Result<()> {
        let report = self.engine()?.sync_pending_actions().await?;
        if self.json {
            return print_json(&report);
        }
        if report.attempted == 0 {
            println!("Rien à synchroniser");
        } else {
            println!(
                "{} action(s) synchronisée(s), {} en échec",
                report.synced, report.failed
            );
        }
        Ok(())
    }

    async fn watch(&self, interval: u64) -> Result<()> {
        let ctx = self.context()?;
        let engine = SyncEngine::new(
            ctx.client.clone(),
            ctx.credentials.clone(),
            ctx.queue.clone(),
            self.connectivity.clone(),
        );
        let monitor =
            ConnectivityMonitor::start(self.connectivity.clone(), Duration::from_secs(interval.max(1))).await;
        println!(
            "Surveillance de la connexion ({}), Ctrl+C pour arrêter",
            if monitor.is_online() { "en ligne" } else { "hors ligne" }
        );

        if monitor.is_online() {
            let report = engine.sync_pending_actions().await?;
            debug!(synced = report.synced, "Initial sync done");
            let summary = refresh_all(
                &ProjectService::new(ctx.clone()),
                &TaskService::new(ctx.clone()),
                &UserService::new(ctx),
            )
            .await;
            println!(
                "Cache rafraîchi : {} projets, {} tâches, {} collaborateurs",
                summary.projects, summary.tasks, summary.employees
            );
        }

        engine.run_on_reconnect(&monitor).await;
        Ok(())
    }

    async fn diagnose(&self) -> Result<()> {
        let diagnostic = self.connectivity.diagnostic(&self.client).await;
        if self.json {
            return print_json(&diagnostic);
        }
        println!("{}", diagnostic.summary());
        if !diagnostic.is_connected() {
            println!("  Les données affichées viendront du cache local");
        }
        println!("  Internet    : {}", yes_no(diagnostic.internet_reachable));
        println!("  Odoo        : {}", yes_no(diagnostic.odoo_reachable));
        if let Some(version) = &diagnostic.server_version {
            println!("  Version     : {}", version);
        }
        if let Some(ms) = diagnostic.response_time_ms {
            println!("  Latence     : {} ms", ms);
        }
        if let Some(details) = &diagnostic.error_details {
            println!("  Détail      : {}", details);
        }
        Ok(())
    }

    fn clear_cache(&self) -> Result<()> {
        self.auth.clear_cache()?;
        println!("Cache local supprimé");
        Ok(())
    }
}

// ===== Output helpers =====

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_origin<T>(fetched: &Fetched<T>) {
    if fetched.is_offline() {
        match fetched.age_display() {
            Some(age) => println!("(hors ligne - données du cache, {})", age),
            None => println!("(hors ligne - aucune donnée en cache)"),
        }
    }
}

fn print_project_line(project: &Project) {
    println!(
        "{:>6}  {:<width$}  {:<12}  {:>5}  {}",
        project.id,
        truncate_string(&project.display_name, NAME_WIDTH),
        project.state_label(),
        project.progress_display(),
        project.formatted_end_date(),
        width = NAME_WIDTH
    );
}

fn print_task_line(task: &Task, now: chrono::NaiveDateTime) {
    let flag = if task.is_overdue(now) { "!" } else { " " };
    println!(
        "{:>6} {} {:<width$}  {:<12}  {:>5}  {}",
        task.id,
        flag,
        truncate_string(&task.name, NAME_WIDTH),
        task.state_label(),
        task.progress_display(),
        task.formatted_deadline(),
        width = NAME_WIDTH
    );
}

fn age_suffix(age: Option<&str>) -> String {
    age.map(|a| format!(" ({})", a)).unwrap_or_default()
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "oui"
    } else {
        "non"
    }
}

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("Email [{}] : ", d),
        None => print!("Email : "),
    }
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim();
    Ok(match (email.is_empty(), default) {
        (true, Some(d)) => d.to_string(),
        _ => email.to_string(),
    })
}

/// Build `write` values from the update flags.
fn update_values(
    name: Option<String>,
    progress: Option<f64>,
    deadline: Option<String>,
    set: &[String],
) -> Result<Value> {
    let mut values = Map::new();
    if let Some(name) = name {
        values.insert("name".to_string(), json!(name));
    }
    if let Some(progress) = progress {
        values.insert("progress".to_string(), json!(progress.clamp(0.0, 100.0)));
    }
    if let Some(deadline) = deadline {
        values.insert("date_deadline".to_string(), json!(deadline));
    }
    for pair in set {
        let (field, raw) = pair
            .split_once('=')
            .with_context(|| format!("Expected FIELD=VALUE, got '{}'", pair))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| json!(raw));
        values.insert(field.trim().to_string(), value);
    }
    if values.is_empty() {
        bail!("Aucun champ à modifier");
    }
    Ok(Value::Object(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_values() {
        let values = update_values(
            Some("Coffrage".to_string()),
            Some(120.0),
            None,
            &["stage_id=4".to_string(), "kanban_state=blocked".to_string()],
        )
        .expect("values");
        assert_eq!(values["name"], "Coffrage");
        assert_eq!(values["progress"], 100.0);
        assert_eq!(values["stage_id"], 4);
        assert_eq!(values["kanban_state"], "blocked");
    }

    #[test]
    fn test_update_values_rejects_empty_and_malformed() {
        assert!(update_values(None, None, None, &[]).is_err());
        assert!(update_values(None, None, None, &["oops".to_string()]).is_err());
    }
}
