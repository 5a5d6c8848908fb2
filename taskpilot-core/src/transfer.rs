//! Task export and import as JSON files.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Task;

const NOT_AN_ARRAY: &str = "Invalid file format. Expected an array of tasks.";

/// Pretty-printed JSON array
pub fn export_tasks(tasks: &[Task]) -> Result<String> {
    Ok(serde_json::to_string_pretty(tasks)?)
}

/// Pretty-printed JSON object
pub fn export_task(task: &Task) -> Result<String> {
    Ok(serde_json::to_string_pretty(task)?)
}

/// Default file name for an export, e.g. `tasks-2024-05-01.json`
pub fn export_file_name(date: chrono::NaiveDate) -> String {
    format!("tasks-{}.json", date.format("%Y-%m-%d"))
}

/// Parse an exported file.
///
/// The top level must be an array; each element must be a complete task.
pub fn parse_tasks(text: &str) -> Result<Vec<Task>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Import(format!("file is not valid JSON: {}", e)))?;
    let Value::Array(items) = value else {
        return Err(Error::Import(NOT_AN_ARRAY.to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<Task>(item)
                .map_err(|e| Error::Import(format!("task #{}: {}", i + 1, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::backend::Backend;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let tasks = InMemoryBackend::seeded().list_tasks().await.unwrap();
        let text = export_tasks(&tasks).unwrap();
        assert!(text.starts_with("[\n"));
        assert_eq!(parse_tasks(&text).unwrap(), tasks);
    }

    #[tokio::test]
    async fn test_single_task_export_is_an_object() {
        let task = InMemoryBackend::seeded().get_task(4).await.unwrap();
        let text = export_task(&task).unwrap();
        assert!(text.starts_with("{\n"));
        // A lone object is not an importable file
        assert!(parse_tasks(&text).is_err());
    }

    #[test]
    fn test_non_array_rejected() {
        let err = parse_tasks(r#"{"id": 1}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to import tasks: Invalid file format. Expected an array of tasks."
        );
    }

    #[test]
    fn test_bad_element_reported_by_position() {
        let err = parse_tasks(
            r#"[{"id": 1, "title": "ok", "createdAt": "2024-05-01T09:00:00Z"}, {"title": "no id"}]"#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("task #2"), "{message}");
        assert!(message.contains("id"), "{message}");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_tasks("not json"), Err(Error::Import(_))));
        assert_eq!(parse_tasks("[]").unwrap(), Vec::new());
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(export_file_name(date), "tasks-2024-05-01.json");
    }
}
