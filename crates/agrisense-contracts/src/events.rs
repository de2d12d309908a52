use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only JSON Lines writer for orchestration events.
///
/// - default fields are `type`, `session_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line, to a file or to stderr
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
enum EventTarget {
    File(PathBuf),
    Stderr,
}

#[derive(Debug)]
struct EventWriterInner {
    target: EventTarget,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self::with_target(EventTarget::File(path.into()), session_id.into())
    }

    pub fn stderr(session_id: impl Into<String>) -> Self {
        Self::with_target(EventTarget::Stderr, session_id.into())
    }

    fn with_target(target: EventTarget, session_id: String) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                target,
                session_id,
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.inner.target {
            EventTarget::File(path) => Some(path),
            EventTarget::Stderr => None,
        }
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        match &self.inner.target {
            EventTarget::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(line.as_bytes())?;
                file.write_all(b"\n")?;
            }
            EventTarget::Stderr => {
                let mut stderr = std::io::stderr().lock();
                stderr.write_all(line.as_bytes())?;
                stderr.write_all(b"\n")?;
            }
        }

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
