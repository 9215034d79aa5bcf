//! Interpret service replies as per-row field values

use rowforge_domain::{RowId, SENTINEL};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Result of interpreting one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// One value list per batch row, each aligned with the target columns
    Rows(Vec<Vec<String>>),

    /// No list could be decoded from the reply
    Failed(String),
}

/// Interpret a reply for a batch
///
/// The substring from the first `[` to the last `]` is decoded as a JSON
/// list. Items are matched to rows by `row_id` when every item is an object
/// naming a distinct row of the batch, and by position otherwise. Items
/// missing a target column, rows without an item and non-object items all
/// produce the sentinel; only a reply with no decodable list fails.
pub fn interpret(reply: &str, targets: &[String], row_ids: &[RowId]) -> ParseOutcome {
    let items = match extract_list(reply) {
        Ok(items) => items,
        Err(reason) => return ParseOutcome::Failed(reason),
    };

    let aligned: Vec<Option<&Value>> = match align_by_row_id(&items, row_ids) {
        Some(aligned) => aligned,
        None => (0..row_ids.len()).map(|i| items.get(i)).collect(),
    };

    let rows = aligned
        .into_iter()
        .map(|item| match item.and_then(Value::as_object) {
            Some(object) => fields(object, targets),
            None => vec![SENTINEL.to_string(); targets.len()],
        })
        .collect();

    ParseOutcome::Rows(rows)
}

fn extract_list(reply: &str) -> Result<Vec<Value>, String> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Err("reply contains no bracketed list".to_string());
    };
    if end < start {
        return Err("reply contains no bracketed list".to_string());
    }

    match serde_json::from_str::<Value>(&reply[start..=end]) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err("decoded value is not a list".to_string()),
        Err(e) => Err(format!("JSON parse error: {}", e)),
    }
}

fn align_by_row_id<'v>(items: &'v [Value], row_ids: &[RowId]) -> Option<Vec<Option<&'v Value>>> {
    if items.is_empty() {
        return None;
    }

    let positions: HashMap<&str, usize> = row_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut aligned = vec![None; row_ids.len()];
    for item in items {
        let id = item.get("row_id").and_then(render_id)?;
        let position = *positions.get(id.as_str())?;
        if aligned[position].is_some() {
            return None;
        }
        aligned[position] = Some(item);
    }
    Some(aligned)
}

fn render_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn fields(object: &Map<String, Value>, targets: &[String]) -> Vec<String> {
    targets
        .iter()
        .map(|column| object.get(column).map(render).unwrap_or_default())
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => SENTINEL.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
