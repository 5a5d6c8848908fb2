//! `taskpilot assist ...`: run an AI flow and optionally store its suggestion.

use anyhow::{Context, Result};
use clap::Subcommand;
use taskpilot_core::flows::{self, TaskAssistant};
use taskpilot_core::schema::parse_timestamp;
use taskpilot_core::{AppState, Config, Suggestion, TaskPriority};

use crate::render;

#[derive(Subcommand, Debug)]
pub enum AssistCommand {
    /// Suggest a category for a task
    Categorize {
        id: u64,
        #[arg(long)]
        apply: bool,
    },
    /// Rewrite a task description using context entries
    Enhance {
        id: u64,
        #[arg(long)]
        apply: bool,
    },
    /// Extract keywords from context entries
    Keywords,
    /// Score every task from 1 to 10
    Prioritize {
        /// Store the scores as task priorities
        #[arg(long)]
        apply: bool,
    },
    /// Suggest calendar slots for unfinished tasks
    Schedule,
    /// Analyze the sentiment of context entries
    Sentiment,
    /// Suggest a deadline for a task
    Deadline {
        id: u64,
        /// e.g. easy, medium, hard
        #[arg(long)]
        complexity: Option<String>,
        #[arg(long)]
        apply: bool,
    },
    /// Break a task down into milestones
    Milestones {
        id: u64,
        /// Replace the task's milestones with the suggestion
        #[arg(long)]
        apply: bool,
    },
}

pub async fn run(
    command: AssistCommand,
    state: &mut AppState,
    config: &Config,
    json: bool,
) -> Result<()> {
    state.tasks.refresh().await.context("failed to load tasks")?;
    state
        .context
        .refresh()
        .await
        .context("failed to load context entries")?;

    match command {
        AssistCommand::Categorize { id, apply } => {
            let task = state.tasks.require(id)?;
            let input =
                flows::categorize_input(task, state.context.entries(), state.context.categories());
            let out = assistant(config)?.categorize(&input).await?;
            if json {
                render::json(&out)?;
            } else {
                println!("{} ({:.0}% confident)", out.category, out.confidence * 100.0);
            }
            if apply {
                store(state, id, Suggestion::Category(out.category)).await?;
            }
        }
        AssistCommand::Enhance { id, apply } => {
            let task = state.tasks.require(id)?;
            let input = flows::enhance_input(task, state.context.entries());
            let out = assistant(config)?.enhance_description(&input).await?;
            if json {
                render::json(&out)?;
            } else {
                println!("{}", out.enhanced_task_description);
            }
            if apply {
                store(state, id, Suggestion::Description(out.enhanced_task_description)).await?;
            }
        }
        AssistCommand::Keywords => {
            let input = flows::keywords_input(state.context.entries());
            let out = assistant(config)?.extract_keywords(&input).await?;
            if json {
                render::json(&out)?;
            } else {
                println!("{}", out.keywords.join(", "));
            }
        }
        AssistCommand::Prioritize { apply } => {
            if state.tasks.tasks().is_empty() {
                println!("No tasks to prioritize.");
                return Ok(());
            }
            let input = flows::prioritize_input(state.tasks.tasks(), state.context.entries());
            let scored = assistant(config)?.prioritize(&input).await?;
            if json {
                render::json(&scored)?;
            } else {
                for item in &scored {
                    println!("{:>5.1}  {}", item.priority, item.title);
                }
            }
            if apply {
                // Resolve every id before the first write
                let mut updates = Vec::with_capacity(scored.len());
                for item in &scored {
                    let id = item
                        .id
                        .parse::<u64>()
                        .ok()
                        .and_then(|id| state.tasks.get(id))
                        .map(|task| task.id)
                        .with_context(|| format!("scored task '{}' is not a loaded task", item.id))?;
                    updates.push((id, TaskPriority::from_score(item.priority)));
                }
                for (id, priority) in updates {
                    store(state, id, Suggestion::Priority(priority)).await?;
                }
            }
        }
        AssistCommand::Schedule => {
            let input = flows::calendar_input(state.tasks.tasks(), state.context.entries());
            let out = assistant(config)?.suggest_calendar_slots(&input).await?;
            if json {
                render::json(&out)?;
            } else {
                for slot in &out.suggested_slots {
                    println!("- {}", slot);
                }
                println!();
                println!("{}", out.reasoning);
            }
        }
        AssistCommand::Sentiment => {
            let input = flows::sentiment_input(state.context.entries());
            let out = assistant(config)?.analyze_sentiment(&input).await?;
            if json {
                render::json(&out)?;
            } else {
                println!("Overall: {}", out.overall_sentiment);
                for item in &out.sentiment_breakdown {
                    println!("  {:<10} {}", item.sentiment, item.entry);
                }
            }
        }
        AssistCommand::Deadline {
            id,
            complexity,
            apply,
        } => {
            let task = state.tasks.require(id)?;
            let input =
                flows::deadline_input(task, state.context.entries(), complexity.as_deref());
            let out = assistant(config)?.suggest_deadline(&input).await?;
            if json {
                render::json(&out)?;
            } else {
                println!("{}", out.suggested_deadline);
                println!("{}", out.reasoning);
            }
            if apply {
                let deadline = parse_timestamp(&out.suggested_deadline)
                    .with_context(|| format!("unreadable deadline '{}'", out.suggested_deadline))?;
                store(state, id, Suggestion::Deadline(deadline)).await?;
            }
        }
        AssistCommand::Milestones { id, apply } => {
            let task = state.tasks.require(id)?;
            let input = flows::milestones_input(task);
            let out = assistant(config)?.suggest_milestones(&input).await?;
            if json {
                render::json(&out)?;
            } else {
                for (i, title) in out.milestones.iter().enumerate() {
                    println!("{}. {}", i + 1, title);
                }
            }
            if apply {
                store(state, id, Suggestion::Milestones(out.milestones)).await?;
            }
        }
    }
    Ok(())
}

fn assistant(config: &Config) -> Result<TaskAssistant> {
    TaskAssistant::from_config(&config.llm).context("failed to configure the model provider")
}

async fn store(state: &mut AppState, id: u64, suggestion: Suggestion) -> Result<()> {
    let task = state
        .tasks
        .apply(id, suggestion)
        .await
        .with_context(|| format!("failed to update task {}", id))?;
    eprintln!("Saved to task {}: {}", task.id, task.title);
    Ok(())
}
