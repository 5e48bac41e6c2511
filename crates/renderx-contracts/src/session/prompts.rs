use std::path::Path;

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use uuid::Uuid;

use super::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptItem {
    pub id: String,
    pub text: String,
}

impl PromptItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }
}

/// Ordered prompt queue. Ids survive edits so references held by a renderer
/// stay valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptList {
    items: Vec<PromptItem>,
}

impl PromptList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[PromptItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PromptItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn add(&mut self, text: &str) -> Result<&PromptItem, SessionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        self.items.push(PromptItem::new(trimmed));
        let last = self.items.len() - 1;
        Ok(&self.items[last])
    }

    /// One prompt per non-blank line; returns how many were added.
    pub fn add_lines(&mut self, text: &str) -> usize {
        let before = self.items.len();
        self.items.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PromptItem::new),
        );
        self.items.len() - before
    }

    pub fn import_file(&mut self, path: &Path) -> Result<usize, SessionError> {
        let bytes = std::fs::read(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.add_lines(&String::from_utf8_lossy(&bytes)))
    }

    /// Replaces the text in place and returns a unified diff of the change,
    /// or `None` when the text is unchanged.
    pub fn edit(&mut self, id: &str, text: &str) -> Result<Option<Vec<String>>, SessionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| SessionError::UnknownPrompt(id.to_string()))?;
        if item.text == trimmed {
            return Ok(None);
        }
        let diff = prompt_diff(&item.text, trimmed);
        item.text = trimmed.to_string();
        Ok(Some(diff))
    }

    pub fn delete(&mut self, id: &str) -> Option<PromptItem> {
        let position = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(position))
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Resolves a user reference: a 1-based position, a full id, or an
    /// unambiguous id prefix of at least four characters.
    pub fn resolve_ref(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if let Ok(position) = reference.parse::<usize>() {
            return position
                .checked_sub(1)
                .and_then(|idx| self.items.get(idx))
                .map(|item| item.id.clone());
        }
        if let Some(item) = self.get(reference) {
            return Some(item.id.clone());
        }
        if reference.len() < 4 {
            return None;
        }
        let mut matches = self
            .items
            .iter()
            .filter(|item| item.id.starts_with(reference));
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first.id.clone())
    }
}

fn prompt_diff(prev: &str, curr: &str) -> Vec<String> {
    let prev = format!("{prev}\n");
    let curr = format!("{curr}\n");
    let diff = TextDiff::from_lines(&prev, &curr);
    diff.unified_diff()
        .header("before", "after")
        .to_string()
        .lines()
        .map(str::to_string)
        .collect()
}
