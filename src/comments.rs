//! Comment overlay: free-text notes attached to element identities.
//!
//! Serialized as a flat JSON object `{ "<identity>": "<text>", ... }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::model::ElementIdentity;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentMap {
    comments: BTreeMap<ElementIdentity, String>,
}

impl CommentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.comments.get(id).map(String::as_str)
    }

    /// Attach `text` to `id`, replacing any earlier comment. Empty (or
    /// whitespace-only) text removes the comment instead.
    pub fn set(&mut self, id: &str, text: &str) {
        if text.trim().is_empty() {
            self.comments.remove(id);
        } else {
            self.comments.insert(ElementIdentity::from(id), text.to_string());
        }
    }

    /// Returns the removed text, if there was any.
    pub fn delete(&mut self, id: &str) -> Option<String> {
        self.comments.remove(id)
    }

    pub fn all(&self) -> impl Iterator<Item = (&ElementIdentity, &str)> {
        self.comments.iter().map(|(id, text)| (id, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Comments whose element is no longer in `document`, e.g. after a
    /// resolved measure replaced its candidates.
    pub fn orphaned(&self, document: &Document) -> Vec<&ElementIdentity> {
        let orphans: Vec<&ElementIdentity> = self
            .comments
            .keys()
            .filter(|id| !document.contains(id.as_str()))
            .collect();
        if !orphans.is_empty() {
            log::debug!("{} comments point at missing elements", orphans.len());
        }
        orphans
    }
}
