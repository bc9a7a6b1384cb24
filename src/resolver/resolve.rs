//! `{{…}}` reference substitution over layered namespaces.
//!
//! Recognized references: `question`, `file_attachment`, `chat_history`,
//! `$form.<path>`, `$vars.<path>`, `$flow.<path>`, and a bare node id
//! resolving to that node's `output.content` in the current checkpoint.
//! References that fail to resolve are left in place verbatim.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::chat::ChatTurn;
use crate::error::NodeError;
use crate::execution::ExecutedDataEntry;
use crate::flow::FlowNode;

use super::html_text::html_to_text;
use super::path::dotted_lookup;

/// Everything a `{{…}}` reference can see, borrowed from the running flow.
pub struct ResolveContext<'a> {
    pub question: Option<&'a str>,
    pub file_content: Option<&'a str>,
    pub chat_history: &'a [ChatTurn],
    pub form: &'a Map<String, Value>,
    pub vars: &'a Map<String, Value>,
    /// The `$flow` namespace: chatflowid, chatId, sessionId, apiMessageId,
    /// state, chatHistory, plus override-config fields.
    pub flow: &'a Value,
    pub executed: &'a [ExecutedDataEntry],
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(.*?)\}\}").unwrap())
}

/// The current question with uploaded-file text prepended when present.
pub fn question_with_files(question: &str, file_content: Option<&str>) -> String {
    match file_content {
        Some(files) if !files.is_empty() => format!("{}\n\n{}", files, question),
        _ => question.to_string(),
    }
}

/// Chat history flattened as `role: content` lines.
pub fn flatten_chat_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup_in_map<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let root = map.get(head)?;
    match rest {
        Some(rest) => dotted_lookup(root, rest),
        None => Some(root),
    }
}

fn resolve_reference(reference: &str, ctx: &ResolveContext<'_>) -> Option<String> {
    match reference {
        "question" => Some(question_with_files(
            ctx.question.unwrap_or_default(),
            ctx.file_content,
        )),
        "file_attachment" => Some(ctx.file_content.unwrap_or_default().to_string()),
        "chat_history" => Some(flatten_chat_history(ctx.chat_history)),
        _ => {
            if let Some(path) = reference.strip_prefix("$form.") {
                return lookup_in_map(ctx.form, path).map(value_to_text);
            }
            if let Some(path) = reference.strip_prefix("$vars.") {
                return lookup_in_map(ctx.vars, path).map(value_to_text);
            }
            if let Some(path) = reference.strip_prefix("$flow.") {
                return dotted_lookup(ctx.flow, path).map(value_to_text);
            }
            // node-id reference; the HTML-to-text pass can leave a stray
            // backslash in front of the id
            let node_id = reference.trim_start_matches('\\');
            ctx.executed
                .iter()
                .rev()
                .find(|entry| entry.node_id == node_id)
                .and_then(|entry| entry.output_content())
                .map(|s| s.to_string())
        }
    }
}

/// Normalize a string and substitute every reference left-to-right.
pub fn resolve_string(raw: &str, ctx: &ResolveContext<'_>) -> Result<String, NodeError> {
    let text = html_to_text(raw);
    let resolved = reference_re().replace_all(&text, |caps: &Captures<'_>| {
        let reference = caps[1].trim();
        match resolve_reference(reference, ctx) {
            Some(value) => value,
            None => {
                tracing::debug!("leaving unresolved reference {{{{ {} }}}}", reference);
                caps[0].to_string()
            }
        }
    });
    Ok(resolved.into_owned())
}

fn resolve_value(value: &Value, ctx: &ResolveContext<'_>) -> Result<Value, NodeError> {
    match value {
        Value::String(s) => Ok(Value::String(resolve_string(s, ctx)?)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_value(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve a node's concrete input values. Only parameters declared with
/// `acceptVariable` are walked; everything else is copied through.
pub fn resolve_node_inputs(
    node: &FlowNode,
    ctx: &ResolveContext<'_>,
) -> Result<Map<String, Value>, NodeError> {
    let mut resolved = Map::with_capacity(node.inputs.len());
    for (name, value) in &node.inputs {
        let out = if node.accepts_variable(name) {
            resolve_value(value, ctx)
                .map_err(|e| NodeError::Resolve(format!("{} in parameter {}", e, name)))?
        } else {
            value.clone()
        };
        resolved.insert(name.clone(), out);
    }
    Ok(resolved)
}
