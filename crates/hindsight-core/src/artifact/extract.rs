//! Artifact extraction from step actions.
//!
//! Scans each step's action for a JSON tool call that writes or edits a
//! file, and records a content-addressed [`CodeArtifact`] for it. Actions
//! that are not recognizable file changes are skipped; extraction never
//! fails.

use chrono::Utc;
use serde_json::{Map, Value};

use hindsight_types::artifact::{ChangeType, CodeArtifact};
use hindsight_types::config::ArtifactConfig;
use hindsight_types::trajectory::Trajectory;

use crate::service::hash::ContentHasher;

const TOOL_KEYS: &[&str] = &["tool", "name", "action"];
const ARGS_KEYS: &[&str] = &["args", "arguments", "input", "parameters"];
const WRITE_TOOLS: &[&str] = &["write_file", "write", "create_file"];
const EDIT_TOOLS: &[&str] = &["edit_file", "edit", "str_replace", "replace_in_file"];
const PATH_KEYS: &[&str] = &["path", "file_path", "filename"];
const CONTENT_KEYS: &[&str] = &["content", "text"];
const NEW_TEXT_KEYS: &[&str] = &["new_text", "new_string", "new_str", "replacement"];

/// Extracts code artifacts from a trajectory's actions.
pub struct ArtifactExtractor<'a, H: ContentHasher> {
    hasher: &'a H,
    config: &'a ArtifactConfig,
}

impl<'a, H: ContentHasher> ArtifactExtractor<'a, H> {
    pub fn new(hasher: &'a H, config: &'a ArtifactConfig) -> Self {
        Self { hasher, config }
    }

    /// One artifact per recognized write or edit, in step order.
    pub fn extract(&self, trajectory: &Trajectory, working_dir: &str) -> Vec<CodeArtifact> {
        trajectory
            .steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| {
                let artifact = self.extract_action(&step.action, working_dir);
                if artifact.is_none() {
                    tracing::trace!(trajectory_id = %trajectory.id, step = i, "no code artifact in action");
                }
                artifact
            })
            .collect()
    }

    fn extract_action(&self, action: &str, working_dir: &str) -> Option<CodeArtifact> {
        let call = parse_tool_call(action)?;
        let tool = first_str(&call, TOOL_KEYS)?;
        let args = arguments(&call);
        let file_path = first_str(&args, PATH_KEYS)?;

        let (change_type, text) = if WRITE_TOOLS.contains(&tool) {
            (ChangeType::Write, first_str(&args, CONTENT_KEYS)?)
        } else if EDIT_TOOLS.contains(&tool) {
            (ChangeType::Edit, first_str(&args, NEW_TEXT_KEYS)?)
        } else {
            return None;
        };

        // An edit that inserts nothing leaves no trace to validate
        if change_type == ChangeType::Edit && text.is_empty() {
            return None;
        }

        Some(CodeArtifact {
            file_path: file_path.to_string(),
            change_type,
            content_hash: self.hasher.compute_hash(text),
            content_snippet: snippet(text, self.config.snippet_max_chars).to_string(),
            working_dir: working_dir.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Parse the action as a JSON object, either whole or from its outermost
/// `{...}` span.
fn parse_tool_call(action: &str) -> Option<Map<String, Value>> {
    let trimmed = action.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The argument object: nested under a known key, or the call itself.
///
/// Nested arguments may also be a JSON-encoded string.
fn arguments(call: &Map<String, Value>) -> Map<String, Value> {
    for key in ARGS_KEYS {
        match call.get(*key) {
            Some(Value::Object(map)) => return map.clone(),
            Some(Value::String(encoded)) => {
                if let Ok(Value::Object(map)) = serde_json::from_str(encoded) {
                    return map;
                }
            }
            _ => {}
        }
    }
    call.clone()
}

fn first_str<'m>(map: &'m Map<String, Value>, keys: &[&str]) -> Option<&'m str> {
    keys.iter().find_map(|key| map.get(*key).and_then(Value::as_str))
}

/// Longest prefix of at most `max_chars` characters.
/// Bounded prefix of `text`. When cut, a trailing partial line is dropped
/// so every snippet line is a whole line of the change; a single overlong
/// line is kept cut.
fn snippet(text: &str, max_chars: usize) -> &str {
    let truncated = truncate_chars(text, max_chars);
    if truncated.len() == text.len() {
        return text;
    }
    match truncated.rfind('\n') {
        Some(newline) => &truncated[..=newline],
        None => truncated,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
