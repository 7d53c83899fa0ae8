//! Per-day transcript files for the responder endpoints.
//!
//! Every interaction is appended to `<root>/txt/<dd-mm-YYYY>.txt` and to the
//! JSON array in `<root>/json/<dd-mm-YYYY>.json`. The JSON file is replaced
//! through a sibling temp file, and one that no longer parses is left alone.

use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::entities::LogRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct JsonEntry {
    id: String,
    user: String,
    assistant: String,
    timestamp: String,
}

#[derive(Debug)]
pub struct InteractionLog {
    root: PathBuf,
    // Serializes the read-modify-write of the JSON file.
    write_lock: Mutex<()>,
}

impl InteractionLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn record(&self, log: &LogRecord) -> std::io::Result<()> {
        let day = log.timestamp.with_timezone(&Local).format("%d-%m-%Y").to_string();
        let timestamp = crate::entities::encode_ts(log.timestamp);
        let _guard = self.write_lock.lock().await;

        let json_dir = self.root.join("json");
        tokio::fs::create_dir_all(&json_dir).await?;
        let json_path = json_dir.join(format!("{day}.json"));
        let mut entries: Vec<JsonEntry> = match tokio::fs::read(&json_path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidData,
                    format!("{} is not a JSON array of interactions: {e}", json_path.display()),
                )
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        let txt_dir = self.root.join("txt");
        tokio::fs::create_dir_all(&txt_dir).await?;
        let mut txt = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(txt_dir.join(format!("{day}.txt")))
            .await?;
        let block = format!(
            "[ID]: {}\n[TS]: {}\n[USER]: {}\n[ASSISTANT]: {}\n\n",
            log.id, timestamp, log.user_input, log.model_input
        );
        txt.write_all(block.as_bytes()).await?;
        txt.flush().await?;

        entries.push(JsonEntry {
            id: log.id.clone(),
            user: log.user_input.clone(),
            assistant: log.model_input.clone(),
            timestamp,
        });
        let body = serde_json::to_vec_pretty(&entries).map_err(Error::other)?;
        let tmp_path = json_dir.join(format!(".{day}.json.tmp"));
        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &json_path).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn appends_to_both_files() {
        let root = std::env::temp_dir().join(format!("atelier-ilog-{}", uuid::Uuid::new_v4()));
        let log = InteractionLog::new(&root);
        let now = Utc::now();
        for (i, prompt) in ["hello", "again"].iter().enumerate() {
            log.record(&LogRecord {
                id: format!("id-{i}"),
                timestamp: now,
                user_input: (*prompt).to_owned(),
                model_input: format!("re: {prompt}"),
            })
            .await
            .expect("record");
        }

        let day = now.with_timezone(&Local).format("%d-%m-%Y").to_string();
        let txt = std::fs::read_to_string(root.join("txt").join(format!("{day}.txt"))).expect("txt");
        assert!(txt.contains("[USER]: hello\n[ASSISTANT]: re: hello\n"));
        assert_eq!(txt.matches("[ID]: ").count(), 2);

        let raw = std::fs::read(root.join("json").join(format!("{day}.json"))).expect("json");
        let entries: Vec<JsonEntry> = serde_json::from_slice(&raw).expect("array");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].assistant, "re: again");

        let leftovers: Vec<_> = std::fs::read_dir(root.join("json"))
            .expect("json dir")
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn corrupt_day_file_is_reported_and_kept() {
        let root = std::env::temp_dir().join(format!("atelier-ilog-{}", uuid::Uuid::new_v4()));
        let log = InteractionLog::new(&root);
        let now = Utc::now();
        let day = now.with_timezone(&Local).format("%d-%m-%Y").to_string();
        let json_path = root.join("json").join(format!("{day}.json"));
        std::fs::create_dir_all(root.join("json")).expect("dir");
        std::fs::write(&json_path, b"[{\"id\": \"half-writ").expect("seed");

        let err = log
            .record(&LogRecord {
                id: "id-0".into(),
                timestamp: now,
                user_input: "hello".into(),
                model_input: "re: hello".into(),
            })
            .await
            .expect_err("corrupt file");
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(std::fs::read(&json_path).expect("still there"), b"[{\"id\": \"half-writ");
        assert!(!root.join("txt").join(format!("{day}.txt")).exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
