//! Terminal output for tasks and context entries.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use taskpilot_core::{ContextEntry, Task, TaskStatus};

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in progress",
        TaskStatus::Done => "done",
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// One line per task: id, status, priority, title and the optional bits.
pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{:>4}  {:<11} {:<7} {}",
        task.id,
        status_label(task.status),
        task.priority,
        task.title
    );
    if !task.category.is_empty() {
        line.push_str(&format!("  [{}]", task.category));
    }
    if let Some(deadline) = task.deadline {
        line.push_str(&format!("  due {}", local_time(deadline)));
    }
    if let Some(progress) = task.progress() {
        line.push_str(&format!("  {:.0}%", progress * 100.0));
    }
    line
}

pub fn task_detail(task: &Task) {
    println!("#{} {}", task.id, task.title);
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!();
    println!("  Status:   {}", status_label(task.status));
    println!("  Priority: {}", task.priority);
    if !task.category.is_empty() {
        println!("  Category: {}", task.category);
    }
    if let Some(deadline) = task.deadline {
        println!("  Deadline: {}", local_time(deadline));
    }
    println!("  Created:  {}", local_time(task.created_at));

    if !task.milestones.is_empty() {
        println!();
        println!("  Milestones:");
        for milestone in &task.milestones {
            let mark = if milestone.completed { "x" } else { " " };
            println!("    [{}] {:>3}  {}", mark, milestone.id, milestone.title);
        }
    }
}

pub fn context_line(entry: &ContextEntry) -> String {
    format!(
        "{:>4}  {:<8} {}  {}",
        entry.id,
        entry.source,
        local_time(entry.timestamp),
        entry.content
    )
}
