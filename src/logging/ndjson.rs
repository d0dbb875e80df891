use crate::events::Event;
use crate::query::EventQuery;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

fn append_line(path: &Path, line: &Value) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open ndjson log {}", path.display()))?;
    writeln!(f, "{}", line)?;
    Ok(())
}

pub fn mirror_mutation(path: &Path, action: &str, ev: &Event) -> Result<()> {
    let line = json!({
        "ts": Utc::now().to_rfc3339(),
        "kind": "mutation",
        "action": action,
        "event": ev.id,
        "version": ev.system.version,
        "source": ev.system.source,
    });
    append_line(path, &line)
}

/// Stable fingerprint of a query, used to group replays of the same query.
pub fn query_fingerprint(query: &EventQuery) -> Result<String> {
    let canonical = serde_json::to_string(query)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn mirror_query(path: &Path, query: &EventQuery, matched: usize) -> Result<()> {
    let line = json!({
        "ts": Utc::now().to_rfc3339(),
        "kind": "query",
        "fingerprint": query_fingerprint(query)?,
        "query": query,
        "matched": matched,
    });
    append_line(path, &line)
}

/// Read back every logged query, in log order, for replay.
pub fn replay_queries(path: &Path) -> Result<Vec<EventQuery>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read ndjson log {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("parse line {} of {}", idx + 1, path.display()))?;
        if value.get("kind").and_then(|v| v.as_str()) != Some("query") {
            continue;
        }
        if let Some(query) = value.get("query") {
            out.push(
                serde_json::from_value(query.clone())
                    .with_context(|| format!("decode query on line {}", idx + 1))?,
            );
        }
    }
    Ok(out)
}
