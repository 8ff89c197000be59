//! scoremerge: conflict resolution for MEI scores.
//!
//! A score that combined several candidate versions of a passage carries the
//! candidates as competing layers inside one measure. A
//! [`ResolutionSession`] opens such a measure, lets the user eliminate notes
//! (or whole chords and beams) from the candidates, and sends the marked
//! measure to a [`MergeService`] that folds what is left into one layer.
//!
//! # Example
//! ```no_run
//! use scoremerge::{load_file, LocalMergeService, ResolutionSession};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let document = load_file("path/to/score.mei")?;
//! let mut session = ResolutionSession::new(document, LocalMergeService::new());
//! session.open("m-40")?;
//! session.toggle("m-44")?;
//! let outcome = session.submit().await?;
//! println!("resolved: {}", outcome.is_resolved());
//! # Ok(())
//! # }
//! ```

pub mod comments;
pub mod config;
pub mod document;
pub mod elimination;
pub mod error;
pub mod grouping;
pub mod identity;
pub mod layers;
pub mod merge;
pub mod model;
pub mod projection;
pub mod session;

use std::path::Path;

pub use comments::CommentMap;
pub use config::{MergeConfig, ResolveConfig};
pub use document::{Document, Element, Subtree};
pub use elimination::EliminationTracker;
pub use error::{
    BindingError, ConfigError, DocumentError, MergeServiceError, ParseError, RenderError,
    ResolveError,
};
pub use grouping::GroupingResolver;
pub use identity::{IdentityBinding, IdentityIndex};
pub use layers::reorder_layers;
pub use merge::{HttpMergeService, LocalMergeService, MergeRequest, MergeResponse, MergeService};
pub use model::*;
pub use projection::{Projection, RenderableMeasure, Renderer};
pub use session::ResolutionSession;

/// Parse an MEI document from raw bytes.
pub fn load(data: &[u8]) -> Result<Document, ParseError> {
    document::load(data)
}

/// Parse an MEI document from a file path.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Document, ParseError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| ParseError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load(&data)
}

/// Serialize a document back to MEI bytes, XML declaration included.
pub fn serialize(document: &Document) -> Vec<u8> {
    document.serialize()
}
