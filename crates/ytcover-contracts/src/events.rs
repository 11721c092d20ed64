use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// One step of a cover generation, as written to the event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    CoverRequested {
        image_path: String,
        game_name: String,
        driver: String,
        fallback: Option<String>,
    },
    ProviderFailed {
        error: String,
    },
    CoverGenerated {
        cover_path: String,
        elapsed_ms: u64,
    },
}

/// Append-only JSONL log of generation events.
///
/// Every line carries `type`, `generation_id` and `ts` followed by the event
/// fields. Clones share the same file and lock.
#[derive(Debug, Clone)]
pub struct GenerationLog {
    inner: Arc<GenerationLogInner>,
}

#[derive(Debug)]
struct GenerationLogInner {
    path: PathBuf,
    generation_id: String,
    lock: Mutex<()>,
}

impl GenerationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_id(path, uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn with_id(path: impl Into<PathBuf>, generation_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GenerationLogInner {
                path: path.into(),
                generation_id: generation_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn generation_id(&self) -> &str {
        &self.inner.generation_id
    }

    pub fn record(&self, event: &GenerationEvent) -> anyhow::Result<Value> {
        let fields = match serde_json::to_value(event)? {
            Value::Object(fields) => fields,
            other => anyhow::bail!("event serialized to non-object: {other}"),
        };

        let mut line = Map::new();
        if let Some(kind) = fields.get("type") {
            line.insert("type".to_string(), kind.clone());
        }
        line.insert(
            "generation_id".to_string(),
            Value::String(self.inner.generation_id.clone()),
        );
        line.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in fields {
            if key != "type" {
                line.insert(key, value);
            }
        }

        if let Some(parent) = self.inner.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed creating {}", parent.display()))?;
            }
        }

        let encoded = serde_json::to_string(&line)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("generation log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed opening {}", self.inner.path.display()))?;
        file.write_all(encoded.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(line))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn record_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let log = GenerationLog::with_id(&path, "gen-123");

        let emitted = log.record(&GenerationEvent::CoverRequested {
            image_path: "/tmp/shot.jpg".to_string(),
            game_name: "Hollow Knight".to_string(),
            driver: "openai".to_string(),
            fallback: Some("gemini".to_string()),
        })?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], "cover_requested");
        assert_eq!(parsed["generation_id"], "gen-123");
        assert_eq!(parsed["game_name"], "Hollow Knight");
        assert_eq!(parsed["fallback"], "gemini");

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn record_appends_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = GenerationLog::new(&path);

        log.record(&GenerationEvent::ProviderFailed {
            error: "openai request failed (500)".to_string(),
        })?;
        log.clone().record(&GenerationEvent::CoverGenerated {
            cover_path: "/tmp/cover.jpg".to_string(),
            elapsed_ms: 42,
        })?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<Value> = content
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "provider_failed");
        assert_eq!(lines[1]["type"], "cover_generated");
        assert_eq!(lines[1]["elapsed_ms"], 42);
        assert_eq!(lines[0]["generation_id"], lines[1]["generation_id"]);
        assert_eq!(log.generation_id().len(), 32);
        Ok(())
    }
}
