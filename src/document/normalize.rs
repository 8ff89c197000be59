//! Ingest normalisation for MEI documents.
//!
//! Uploaded files carry header metadata and MIDI hints that only add noise to
//! comparisons, and may lack identities on some elements. Normalising strips
//! the former and fills in the latter:
//!   - `<meiHead>` is removed
//!   - `pnum` on notes and every `<instrDef>` are removed
//!   - identities are (re)generated as `m-<index>` in document order

use super::{Document, Element};
use crate::error::DocumentError;

/// Normalise a freshly loaded document in place.
///
/// With `keep_existing_ids` the identities already present survive and only
/// unidentified elements get new ones; otherwise every element is renumbered.
pub fn normalize(doc: &mut Document, keep_existing_ids: bool) -> Result<(), DocumentError> {
    let root = doc.root_mut();
    root.retain_elements(&|e: &Element| e.kind() != "meiHead");
    remove_midi_data(root);
    doc.reindex()?;
    generate_ids(doc, keep_existing_ids)
}

fn remove_midi_data(root: &mut Element) {
    root.retain_elements(&|e: &Element| e.kind() != "instrDef");
    root.walk_mut(&mut |e: &mut Element| {
        if e.kind() == "note" {
            e.remove_attribute("pnum");
        }
    });
}

/// Give every element an identity.
pub fn generate_ids(doc: &mut Document, keep_existing: bool) -> Result<(), DocumentError> {
    if keep_existing {
        let missing = doc
            .root()
            .descendants()
            .iter()
            .filter(|e| e.identity().is_none())
            .count();
        let fresh = (0..missing)
            .map(|_| doc.generate_identity().map(|id| id.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut fresh = fresh.into_iter();
        doc.root_mut().walk_mut(&mut |e: &mut Element| {
            if e.identity().is_none() {
                if let Some(id) = fresh.next() {
                    e.set_identity(&id);
                }
            }
        });
    } else {
        let mut index = 0usize;
        doc.root_mut().walk_mut(&mut |e: &mut Element| {
            e.set_identity(&format!("m-{index}"));
            index += 1;
        });
    }
    doc.reindex()?;
    log::debug!("generated identities, {} elements identified", doc.identity_count());
    Ok(())
}
