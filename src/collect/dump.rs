use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use walkdir::WalkDir;

use crate::core::{IndexData, IndexSettings, IndexStats, Snapshot, SnapshotSource, Task};

/// How many documents per index feed the content heuristics.
pub const DEFAULT_SAMPLE_DOCS: usize = 100;

/// Reads an extracted dump directory:
///
/// ```text
/// dump-{timestamp}/
/// ├── metadata.json
/// ├── tasks/queue.json
/// └── indexes/{uid}/
///     ├── metadata.json
///     ├── settings.json
///     └── documents.jsonl
/// ```
///
/// The path may point at the dump directory itself or at a parent that
/// contains it; the directory holding `metadata.json` is located by a
/// shallow walk. Stats are rebuilt from the document stream since dumps
/// carry none.
pub fn collect(path: &Path, max_sample_docs: usize) -> Result<Snapshot> {
    let root = find_dump_root(path)?;

    let metadata = read_json(&root.join("metadata.json")).unwrap_or(Value::Null);
    let version = metadata
        .get("dumpVersion")
        .or_else(|| metadata.get("version"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut snapshot = Snapshot::new(SnapshotSource::Dump {
        path: path.display().to_string(),
        version,
    });
    snapshot.indexes = load_indexes(&root, max_sample_docs)?;
    snapshot.tasks = load_tasks(&root);
    Ok(snapshot)
}

fn find_dump_root(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        bail!("dump path does not exist: {}", path.display());
    }
    if path.join("metadata.json").is_file() {
        return Ok(path.to_path_buf());
    }
    for entry in WalkDir::new(path).max_depth(2).into_iter().flatten() {
        if entry.file_type().is_file() && entry.file_name() == "metadata.json" {
            if let Some(parent) = entry.path().parent() {
                return Ok(parent.to_path_buf());
            }
        }
    }
    bail!(
        "no extracted dump found under {} (expected a directory with metadata.json; extract the .dump archive first)",
        path.display()
    )
}

fn load_indexes(root: &Path, max_sample_docs: usize) -> Result<Vec<IndexData>> {
    let indexes_dir = root.join("indexes");
    if !indexes_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut indexes = Vec::new();
    for entry in std::fs::read_dir(&indexes_dir)
        .with_context(|| format!("read {}", indexes_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let uid = entry.file_name().to_string_lossy().to_string();
        if let Some(index) = load_index(&entry.path(), &uid, max_sample_docs) {
            indexes.push(index);
        }
    }
    indexes.sort_by(|a, b| a.uid.cmp(&b.uid));
    Ok(indexes)
}

/// A single unreadable index drops that index, not the whole run.
fn load_index(dir: &Path, uid: &str, max_sample_docs: usize) -> Option<IndexData> {
    let mut index = IndexData::new(uid);

    if let Some(metadata) = read_json(&dir.join("metadata.json")) {
        index.primary_key = metadata
            .get("primaryKey")
            .and_then(Value::as_str)
            .map(str::to_string);
        index.created_at = metadata
            .get("createdAt")
            .and_then(Value::as_str)
            .map(str::to_string);
        index.updated_at = metadata
            .get("updatedAt")
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    if let Some(settings) = read_json(&dir.join("settings.json")) {
        index.settings = serde_json::from_value::<IndexSettings>(settings).ok()?;
    }

    let mut field_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut doc_count: u64 = 0;
    let documents_path = dir.join("documents.jsonl");
    if let Ok(file) = std::fs::File::open(&documents_path) {
        let reader = std::io::BufReader::new(file);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            // A malformed line skips that document only.
            let Ok(doc) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            doc_count += 1;
            if let Value::Object(map) = &doc {
                for field in map.keys() {
                    *field_distribution.entry(field.clone()).or_default() += 1;
                }
            }
            if index.sample_documents.len() < max_sample_docs {
                index.sample_documents.push(doc);
            }
        }
    }

    index.stats = IndexStats {
        number_of_documents: doc_count,
        is_indexing: false,
        field_distribution,
    };
    Some(index)
}

fn load_tasks(root: &Path) -> Vec<Task> {
    let Some(data) = read_json(&root.join("tasks").join("queue.json")) else {
        return Vec::new();
    };
    let entries = match data {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(entries)) => entries,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|entry| super::task_from_value(entry))
        .collect()
}

fn read_json(path: &Path) -> Option<Value> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};

    static DIR_SEQ: AtomicU64 = AtomicU64::new(0);

    fn temp_dump() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "meiliscan-dump-{}-{}",
            std::process::id(),
            DIR_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        let root = dir.join("dump-20260801");
        std::fs::create_dir_all(root.join("indexes").join("movies")).expect("mkdir");
        std::fs::create_dir_all(root.join("tasks")).expect("mkdir");
        std::fs::write(
            root.join("metadata.json"),
            r#"{"dumpVersion": "V6", "dumpDate": "2026-08-01T00:00:00Z"}"#,
        )
        .expect("metadata");

        let movies = root.join("indexes").join("movies");
        std::fs::write(movies.join("metadata.json"), r#"{"primaryKey": "id"}"#).expect("meta");
        std::fs::write(
            movies.join("settings.json"),
            r#"{"searchableAttributes": ["title"], "filterableAttributes": ["genre"]}"#,
        )
        .expect("settings");
        let mut docs = std::fs::File::create(movies.join("documents.jsonl")).expect("docs");
        for n in 0..7 {
            writeln!(docs, r#"{{"id": {n}, "title": "movie {n}", "genre": "drama"}}"#)
                .expect("write");
        }
        writeln!(docs, "not json at all").expect("write");

        std::fs::write(
            root.join("tasks").join("queue.json"),
            r#"[{"uid": 1, "indexUid": "movies", "status": "succeeded", "type": "documentAdditionOrUpdate", "enqueuedAt": "2026-08-01T00:00:00Z"}]"#,
        )
        .expect("tasks");
        dir
    }

    #[test]
    fn reads_an_extracted_dump_from_the_parent_directory() {
        let dir = temp_dump();
        let snapshot = collect(&dir, 5).expect("collect");

        assert_eq!(snapshot.indexes.len(), 1);
        let movies = &snapshot.indexes[0];
        assert_eq!(movies.uid, "movies");
        assert_eq!(movies.primary_key.as_deref(), Some("id"));
        assert_eq!(movies.settings.searchable_attributes, vec!["title"]);
        // 7 valid lines; the malformed one is dropped, not fatal.
        assert_eq!(movies.stats.number_of_documents, 7);
        assert_eq!(movies.stats.field_distribution["title"], 7);
        // Sample capped at the requested size.
        assert_eq!(movies.sample_documents.len(), 5);

        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tasks[0].index_uid.as_deref(), Some("movies"));
        assert_eq!(snapshot.source.version(), Some("V6"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_path_is_a_clear_error() {
        let err = collect(Path::new("/nonexistent/dump"), 5).expect_err("error");
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn directory_without_a_dump_is_rejected() {
        let dir = std::env::temp_dir().join(format!(
            "meiliscan-empty-{}-{}",
            std::process::id(),
            DIR_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let err = collect(&dir, 5).expect_err("error");
        assert!(err.to_string().contains("metadata.json"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
