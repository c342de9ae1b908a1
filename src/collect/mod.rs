use serde_json::Value;

use crate::core::Task;

pub mod dump;
pub mod launch;
pub mod live;

/// Task entries come from the `/tasks` API or a dump's task queue, both
/// camelCase. The document batch size lives under `details`, so it is
/// lifted out here; an entry that does not deserialize is dropped.
fn task_from_value(value: Value) -> Option<Task> {
    let batch_size = value
        .get("details")
        .and_then(|d| d.get("receivedDocuments"))
        .and_then(Value::as_u64);
    let mut task: Task = serde_json::from_value(value).ok()?;
    if task.batch_size.is_none() {
        task.batch_size = batch_size;
    }
    Some(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskStatus;
    use serde_json::json;

    #[test]
    fn batch_size_is_lifted_from_details() {
        let task = task_from_value(json!({
            "uid": 42,
            "indexUid": "movies",
            "status": "succeeded",
            "type": "documentAdditionOrUpdate",
            "details": {"receivedDocuments": 1, "indexedDocuments": 1},
        }))
        .expect("task");
        assert_eq!(task.uid, 42);
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.batch_size, Some(1));
    }

    #[test]
    fn unknown_status_drops_the_entry() {
        assert!(task_from_value(json!({
            "uid": 1,
            "status": "somethingNew",
            "type": "documentAdditionOrUpdate",
        }))
        .is_none());
    }
}
