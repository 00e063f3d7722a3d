//! Command-line surface: the gateway server plus direct matter operations.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use rustyline::DefaultEditor;
use secrecy::ExposeSecret;
use uuid::Uuid;

use matterdesk::channels::web::{GatewayState, server, start_server};
use matterdesk::config::Config;
use matterdesk::db::{
    self, MatterRecord, MatterStatus, MatterTaskStore, NewProfileRecord, OfficerRole, ProfileStore,
    RecordStore, TaskStatus,
};
use matterdesk::matters::intake;
use matterdesk::matters::rollup;
use matterdesk::matters::{
    CompletionPrompt, CompletionRollup, MatterQuery, MatterView, NewTaskInput, PresetAnswer,
    TaskView,
};
use matterdesk::storage;

/// matterdesk - corporate legal matter tracking
#[derive(Parser, Debug)]
#[command(name = "matterdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP gateway
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show status counts, overdue and due-soon totals, and recent matters
    Dashboard,

    /// Matter commands
    #[command(subcommand)]
    Matters(MattersCommand),

    /// Task commands
    #[command(subcommand)]
    Tasks(TasksCommand),

    /// Officer profile commands
    #[command(subcommand)]
    Officers(OfficersCommand),
}

#[derive(Subcommand, Debug)]
pub enum MattersCommand {
    /// List matters, newest first
    #[command(alias = "ls")]
    List {
        /// Only matters with this status (pending, in-progress, completed, closed)
        #[arg(long, value_parser = parse_matter_status)]
        status: Option<MatterStatus>,

        /// Case-insensitive search over requester, matter type, request type and division
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one matter with its tasks
    Show {
        /// Matter ID
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum TasksCommand {
    /// Add a task to a matter (a Pending matter moves to In Progress)
    Add(AddTaskArgs),

    /// Change a task's status
    SetStatus {
        /// Task ID
        task_id: Uuid,

        /// New status (pending, in-progress, completed)
        #[arg(value_parser = parse_task_status)]
        status: TaskStatus,

        /// Complete the matter without asking if every task is now Completed
        #[arg(long, conflicts_with = "no")]
        yes: bool,

        /// Leave the matter as is without asking
        #[arg(long)]
        no: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddTaskArgs {
    /// Matter ID
    pub matter_id: Uuid,

    #[arg(long)]
    pub description: String,

    #[arg(long)]
    pub task_type: Option<String>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due_date: Option<NaiveDate>,

    /// Officer profile ID
    #[arg(long)]
    pub assigned_officer: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
pub enum OfficersCommand {
    /// List profiles holding an officer role
    List,

    /// Create an officer profile
    Add {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: Option<String>,

        /// legal_officer, senior_legal_officer, deputy_secretary or secretary
        #[arg(long, value_parser = parse_officer_role)]
        role: OfficerRole,

        #[arg(long)]
        division: Option<String>,
    },
}

fn normalize_status(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .replace(['-', '_'], " ")
}

fn parse_matter_status(raw: &str) -> Result<MatterStatus, String> {
    let wanted = normalize_status(raw);
    MatterStatus::ALL
        .into_iter()
        .find(|s| s.as_str().to_ascii_lowercase() == wanted)
        .ok_or_else(|| format!("unknown matter status '{raw}'"))
}

fn parse_task_status(raw: &str) -> Result<TaskStatus, String> {
    let wanted = normalize_status(raw);
    TaskStatus::ALL
        .into_iter()
        .find(|s| s.as_str().to_ascii_lowercase() == wanted)
        .ok_or_else(|| format!("unknown task status '{raw}'"))
}

fn parse_officer_role(raw: &str) -> Result<OfficerRole, String> {
    OfficerRole::from_db_value(&raw.trim().to_ascii_lowercase().replace('-', "_"))
        .ok_or_else(|| format!("unknown officer role '{raw}'"))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Asks on the controlling terminal. Any read failure counts as "no".
pub struct TerminalPrompt;

#[async_trait]
impl CompletionPrompt for TerminalPrompt {
    async fn confirm_matter_completion(&self, matter: &MatterRecord, task_count: usize) -> bool {
        let question = format!(
            "All {task_count} task(s) of matter {} ({}) are Completed. Mark the matter Completed? [y/N] ",
            matter.id, matter.requester_name
        );
        let answer = tokio::task::spawn_blocking(move || {
            let mut editor = DefaultEditor::new().ok()?;
            editor.readline(&question).ok()
        })
        .await;
        match answer {
            Ok(Some(line)) => is_yes(&line),
            _ => false,
        }
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let store = db::connect_from_config(&config.database)
        .await
        .context("failed to open record store")?;

    match cli.command {
        Command::Serve { port } => serve(config, store, port).await,
        Command::Dashboard => {
            let stats = intake::dashboard(store.as_ref(), Utc::now()).await?;
            println!(
                "Total {}  Pending {}  In Progress {}  Completed {}  Overdue {}  Due soon {}",
                stats.total,
                stats.pending,
                stats.in_progress,
                stats.completed,
                stats.overdue,
                stats.due_soon
            );
            print_matters(&stats.recent);
            Ok(())
        }
        Command::Matters(MattersCommand::List { status, search }) => {
            let query = MatterQuery { status, search };
            let matters = intake::list_matters(store.as_ref(), &query, Utc::now()).await?;
            print_matters(&matters);
            Ok(())
        }
        Command::Matters(MattersCommand::Show { id }) => show_matter(store.as_ref(), id).await,
        Command::Tasks(TasksCommand::Add(args)) => {
            let input = NewTaskInput {
                task_type: args.task_type,
                description: args.description,
                assigned_officer: args.assigned_officer,
                due_date: args.due_date,
            };
            let added = rollup::add_task(store.as_ref(), args.matter_id, input).await?;
            println!("Task {} added", added.task.id);
            if added.escalated {
                println!("Matter {} moved to In Progress", args.matter_id);
            }
            Ok(())
        }
        Command::Tasks(TasksCommand::SetStatus {
            task_id,
            status,
            yes,
            no,
        }) => {
            let prompt: Box<dyn CompletionPrompt> = if yes || no {
                Box::new(PresetAnswer(yes))
            } else {
                Box::new(TerminalPrompt)
            };
            let changed = rollup::set_task_status(
                store.as_ref(),
                prompt.as_ref(),
                None,
                task_id,
                status,
                Utc::now(),
            )
            .await?;
            println!("Task {} is now {}", changed.task.id, changed.task.status.as_str());
            match changed.rollup {
                CompletionRollup::MatterCompleted => {
                    println!("Matter {} marked Completed", changed.task.matter_id)
                }
                CompletionRollup::Declined => {
                    println!("Matter {} left unchanged", changed.task.matter_id)
                }
                CompletionRollup::NotTriggered => {}
            }
            Ok(())
        }
        Command::Officers(OfficersCommand::List) => {
            for officer in store.list_officers().await? {
                println!(
                    "{}  {:<28} {:<22} {}",
                    officer.id,
                    officer.display_name(),
                    officer.role.as_deref().unwrap_or("-"),
                    officer.division.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Officers(OfficersCommand::Add {
            email,
            name,
            role,
            division,
        }) => {
            let email = email.trim().to_string();
            if email.is_empty() {
                bail!("--email must not be empty");
            }
            let profile = store
                .create_profile(&NewProfileRecord {
                    id: None,
                    email,
                    full_name: name,
                    role: Some(role.as_str().to_string()),
                    division,
                })
                .await?;
            println!("Officer {} created", profile.id);
            Ok(())
        }
    }
}

async fn serve(config: Config, store: Arc<dyn RecordStore>, port: Option<u16>) -> Result<()> {
    let files = storage::from_config(&config.storage).context("failed to open file store")?;
    let mut addr = config.gateway.socket_addr()?;
    if let Some(port) = port {
        addr.set_port(port);
    }
    let token = match &config.gateway.auth_token {
        Some(token) => token.expose_secret().to_string(),
        None => {
            let token = Uuid::new_v4().simple().to_string();
            println!("Generated gateway token: {token}");
            token
        }
    };

    let state = Arc::new(GatewayState::new(
        store,
        files,
        config.storage.bucket.clone(),
    ));
    let bound = start_server(addr, Arc::clone(&state), token).await?;
    println!("matterdesk listening on http://{bound}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    server::shutdown(&state).await;
    Ok(())
}

async fn show_matter(store: &dyn RecordStore, id: Uuid) -> Result<()> {
    let now = Utc::now();
    let view = intake::matter_detail(store, id, now).await?;
    let m = &view.matter;
    println!("Matter      {}", m.id);
    println!("Status      {}{}", m.status.as_str(), flag_suffix(&view));
    println!("Type        {} / {}", m.type_of_matter, m.request_type);
    println!(
        "Requester   {}{}",
        m.requester_name,
        m.requesting_division
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default()
    );
    println!("Received    {}", m.date_received);
    if let Some(due) = m.due_date {
        println!("Due         {due}");
    }
    println!(
        "Officer     {}",
        view.assigned_officer_name.as_deref().unwrap_or("unassigned")
    );

    let tasks = store.list_matter_tasks(id).await?;
    if tasks.is_empty() {
        println!("No tasks");
    }
    for task in tasks {
        let view = TaskView::new(task, now);
        let flag = if view.flags.is_overdue {
            " [overdue]"
        } else if view.flags.is_due_soon {
            " [due soon]"
        } else {
            ""
        };
        println!(
            "  {}  {:<12} {}{}",
            view.task.id,
            view.task.status.as_str(),
            view.task.description,
            flag
        );
    }
    Ok(())
}

fn flag_suffix(view: &MatterView) -> &'static str {
    if view.flags.is_overdue {
        " [overdue]"
    } else if view.flags.is_due_soon {
        " [due soon]"
    } else {
        ""
    }
}

fn print_matters(matters: &[MatterView]) {
    if matters.is_empty() {
        println!("No matters");
        return;
    }
    for view in matters {
        let m = &view.matter;
        println!(
            "{}  {:<12} {:<24} {:<20} due {}{}",
            m.id,
            m.status.as_str(),
            m.requester_name,
            m.type_of_matter,
            m.due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            flag_suffix(view)
        );
    }
}
