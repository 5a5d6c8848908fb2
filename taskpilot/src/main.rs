//! taskpilot - task manager with an AI assistant
//!
//! Talks to the task backend configured in `config.toml` (or
//! `TASKPILOT_BACKEND_URL`). With `--offline` everything runs against a
//! seeded in-memory backend that lives for one invocation.

mod assist;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use taskpilot_core::{
    transfer, ApiClient, AppState, AuthStore, Backend, Config, ContextSource, Credentials,
    ImportMode, InMemoryBackend, Milestone, NewContextEntry, NewTask, Registration, TaskPriority,
    TaskStatus, TaskUpdate,
};

#[derive(Parser, Debug)]
#[command(name = "taskpilot")]
#[command(about = "Task manager with an AI assistant")]
#[command(version)]
struct Cli {
    /// Use seeded demo data instead of the REST backend
    #[arg(long, global = true)]
    offline: bool,

    /// Config file (default: ~/.config/taskpilot/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and keep the session token
    Login {
        /// Email address
        login: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Manage context entries
    #[command(subcommand)]
    Context(ContextCommand),
    /// Ask the AI assistant
    #[command(subcommand)]
    Assist(assist::AssistCommand),
}

#[derive(Subcommand, Debug)]
enum TasksCommand {
    /// List tasks
    List {
        /// Only tasks due today
        #[arg(long)]
        today: bool,
    },
    /// Show one task with its milestones
    Show { id: u64 },
    /// Create a task
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value_t = TaskPriority::Medium)]
        priority: TaskPriority,
        #[arg(short, long, default_value = "")]
        category: String,
        /// RFC 3339 timestamp or YYYY-MM-DD (end of that local day)
        #[arg(long, value_parser = parse_deadline)]
        deadline: Option<DateTime<Utc>>,
        /// Milestone title (repeatable)
        #[arg(short, long = "milestone")]
        milestones: Vec<String>,
    },
    /// Change fields of a task
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        status: Option<TaskStatus>,
        #[arg(short, long)]
        priority: Option<TaskPriority>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long, value_parser = parse_deadline)]
        deadline: Option<DateTime<Utc>>,
    },
    /// Delete a task
    Delete { id: u64 },
    /// Export tasks as JSON
    Export {
        /// Export only this task, as a single object
        #[arg(long)]
        id: Option<u64>,
        /// Output file, or a directory for the default file name
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Import tasks from an exported file
    Import {
        file: PathBuf,
        /// Keep current tasks and add the imported ones
        #[arg(long)]
        append: bool,
    },
    /// Mark a milestone completed
    Toggle {
        id: u64,
        milestone: u64,
        /// Mark it not completed instead
        #[arg(long)]
        undo: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ContextCommand {
    /// List context entries
    List,
    /// Record a context entry
    Add {
        text: String,
        #[arg(long, default_value_t = ContextSource::Notes)]
        source: ContextSource,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    let _log_guard = taskpilot_core::logging::init(&config.logging).ok();

    // Logging out needs no backend
    if let Command::Logout = cli.command {
        AuthStore::new(Config::token_path())
            .logout()
            .context("failed to clear session")?;
        println!("Logged out.");
        return Ok(());
    }

    let mut state = open_state(&config, cli.offline)?;

    match cli.command {
        Command::Login { login, password } => {
            state
                .login(&Credentials { login, password })
                .await
                .context("login failed")?;
            println!("Logged in.");
        }
        Command::Register {
            name,
            username,
            email,
            password,
        } => {
            let registration = Registration {
                name,
                username,
                email,
                password,
            };
            state
                .register(&registration)
                .await
                .context("registration failed")?;
            println!("Account created. Log in with 'taskpilot login'.");
        }
        // Handled before the backend is opened
        Command::Logout => {}
        Command::Whoami => {
            require_session(&state, cli.offline)?;
            let user = state.user.fetch().await.context("failed to load user")?;
            if cli.json {
                render::json(&user)?;
            } else {
                println!("{} (@{}) <{}>", user.name, user.username, user.email);
            }
        }
        Command::Tasks(command) => {
            require_session(&state, cli.offline)?;
            run_tasks(command, &mut state, cli.json).await?;
        }
        Command::Context(command) => {
            require_session(&state, cli.offline)?;
            run_context(command, &mut state, cli.json).await?;
        }
        Command::Assist(command) => {
            require_session(&state, cli.offline)?;
            assist::run(command, &mut state, &config, cli.json).await?;
        }
    }

    Ok(())
}

fn open_state(config: &Config, offline: bool) -> Result<AppState> {
    let auth = Arc::new(AuthStore::new(Config::token_path()));
    auth.hydrate().context("failed to read saved session")?;

    let backend: Arc<dyn Backend> = if offline {
        tracing::debug!("Using in-memory backend");
        Arc::new(InMemoryBackend::seeded())
    } else {
        Arc::new(
            ApiClient::new(&config.backend, auth.clone())
                .context("failed to configure task backend")?,
        )
    };
    Ok(AppState::new(backend, auth))
}

fn require_session(state: &AppState, offline: bool) -> Result<()> {
    if offline || state.auth.is_authenticated() {
        return Ok(());
    }
    anyhow::bail!("Not logged in. Run 'taskpilot login' first.")
}

async fn run_tasks(command: TasksCommand, state: &mut AppState, json: bool) -> Result<()> {
    match command {
        TasksCommand::List { today } => {
            let tasks = if today {
                state.tasks.refresh_today().await
            } else {
                state.tasks.refresh().await
            }
            .context("failed to load tasks")?;

            if json {
                render::json(tasks)?;
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for task in tasks {
                    println!("{}", render::task_line(task));
                }
            }
        }
        TasksCommand::Show { id } => {
            state.tasks.refresh().await.context("failed to load tasks")?;
            let task = state.tasks.require(id)?;
            if json {
                render::json(task)?;
            } else {
                render::task_detail(task);
            }
        }
        TasksCommand::Add {
            title,
            description,
            priority,
            category,
            deadline,
            milestones,
        } => {
            let task = NewTask {
                description,
                priority,
                category,
                deadline,
                milestones: milestones
                    .into_iter()
                    .zip(1u64..)
                    .map(|(title, id)| Milestone::new(id, title))
                    .collect(),
                ..NewTask::new(title)
            };
            let created = state.tasks.add(task).await.context("failed to create task")?;
            if json {
                render::json(&created)?;
            } else {
                println!("Created task {}: {}", created.id, created.title);
            }
        }
        TasksCommand::Edit {
            id,
            title,
            description,
            status,
            priority,
            category,
            deadline,
        } => {
            let update = TaskUpdate {
                title,
                description,
                status,
                priority,
                category,
                deadline,
                milestones: None,
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to change. Pass at least one field to update.");
            }
            let task = state
                .tasks
                .update(id, update)
                .await
                .context("failed to update task")?;
            if json {
                render::json(&task)?;
            } else {
                println!("{}", render::task_line(&task));
            }
        }
        TasksCommand::Delete { id } => {
            state.tasks.delete(id).await.context("failed to delete task")?;
            println!("Deleted task {}.", id);
        }
        TasksCommand::Export { id, out } => {
            state.tasks.refresh().await.context("failed to load tasks")?;
            let tasks = state.tasks.tasks();
            let (text, count) = match id {
                Some(id) => (transfer::export_task(state.tasks.require(id)?)?, 1),
                None => (transfer::export_tasks(tasks)?, tasks.len()),
            };
            match out {
                Some(path) => {
                    let path = export_target(&path);
                    std::fs::write(&path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Exported {} tasks to {}", count, path.display());
                }
                None => println!("{}", text),
            }
        }
        TasksCommand::Import { file, append } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let imported = transfer::parse_tasks(&text)?;
            let mode = if append {
                state.tasks.refresh().await.context("failed to load tasks")?;
                ImportMode::Append
            } else {
                ImportMode::Replace
            };
            let count = state
                .tasks
                .import(imported, mode)
                .await
                .context("failed to import tasks")?;
            println!(
                "Imported {} tasks ({} total).",
                count,
                state.tasks.tasks().len()
            );
        }
        TasksCommand::Toggle { id, milestone, undo } => {
            state.tasks.refresh().await.context("failed to load tasks")?;
            let task = state
                .tasks
                .toggle_milestone(id, milestone, !undo)
                .await
                .context("failed to update milestone")?;
            if json {
                render::json(&task)?;
            } else {
                println!(
                    "{} is now {}.",
                    task.title,
                    render::status_label(task.status)
                );
            }
        }
    }
    Ok(())
}

async fn run_context(command: ContextCommand, state: &mut AppState, json: bool) -> Result<()> {
    match command {
        ContextCommand::List => {
            let entries = state
                .context
                .refresh()
                .await
                .context("failed to load context entries")?;
            if json {
                render::json(entries)?;
            } else if entries.is_empty() {
                println!("No context entries.");
            } else {
                for entry in entries {
                    println!("{}", render::context_line(entry));
                }
            }
        }
        ContextCommand::Add { text, source } => {
            let entry = state
                .context
                .add(NewContextEntry {
                    content: text,
                    source,
                })
                .await
                .context("failed to add context entry")?;
            if json {
                render::json(&entry)?;
            } else {
                println!("Added context entry {}.", entry.id);
            }
        }
    }
    Ok(())
}

/// A directory gets the dated default file name.
fn export_target(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(transfer::export_file_name(Local::now().date_naive()))
    } else {
        path.to_path_buf()
    }
}

fn parse_deadline(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("expected RFC 3339 timestamp or YYYY-MM-DD, got '{}'", s))?;
    date.and_hms_opt(23, 59, 0)
        .and_then(|dt| dt.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("'{}' is not a valid local time", s))
}
