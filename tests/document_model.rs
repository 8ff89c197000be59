//! Integration tests: document loading, addressing and splicing against the
//! fixture score in tests/fixtures/.

use pretty_assertions::assert_eq;
use scoremerge::document::{self, Subtree};
use scoremerge::{load, load_file, serialize, Document, DocumentError, ParseError};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn conflict_score() -> Document {
    load_file(fixture("conflict.mei")).expect("Failed to load conflict.mei")
}

// ─── Loading ────────────────────────────────────────────────────────

#[test]
fn load_indexes_every_identity() {
    let doc = conflict_score();

    assert_eq!(doc.root().kind(), "mei");
    assert!(doc.contains("m-1"));
    assert!(doc.contains("m-41a"));
    assert!(doc.contains("m-48"));
    // m-1..m-14, m-20..m-27, m-40..m-48 plus the two candidate layers
    assert_eq!(doc.identity_count(), 14 + 8 + 9 + 2);

    let title = doc.find_by_identity("m-5").unwrap();
    assert_eq!(title.text().as_deref(), Some("Candidate merge & review"));

    println!("✓ conflict.mei: {} identified elements", doc.identity_count());
}

#[test]
fn serialize_then_load_is_identity() {
    let doc = conflict_score();
    let bytes = serialize(&doc);
    let reloaded = load(&bytes).expect("Serialized document should load");

    assert_eq!(doc, reloaded);
    assert_eq!(serialize(&reloaded), bytes);

    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains("xmlns=\"http://www.music-encoding.org/ns/mei\""));
    assert!(text.contains("&amp; review"));
    println!("✓ Round trip OK ({} bytes)", text.len());
}

#[test]
fn malformed_sources_are_rejected() {
    let err = load(b"<mei><measure></mei>").unwrap_err();
    assert!(matches!(err, ParseError::InvalidXml(_)), "got {err:?}");

    let err = load(&[0x3c, 0xff, 0xfe, 0x3e]).unwrap_err();
    assert!(matches!(err, ParseError::InvalidUtf8(_)), "got {err:?}");

    let err = load_file(fixture("does-not-exist.mei")).unwrap_err();
    assert!(matches!(err, ParseError::Read { .. }), "got {err:?}");
}

#[test]
fn duplicate_identity_fails_load() {
    let xml = br#"<mei><note xml:id="n1"/><rest xml:id="n1"/></mei>"#;
    let err = load(xml).unwrap_err();
    assert_eq!(err, ParseError::DuplicateIdentity("n1".into()));
}

// ─── Queries ────────────────────────────────────────────────────────

#[test]
fn find_and_ancestors() {
    let doc = conflict_score();

    let err = doc.find_by_identity("m-999").unwrap_err();
    assert_eq!(err, DocumentError::NotFound("m-999".into()));

    let ancestors: Vec<&str> = doc
        .ancestors("m-25")
        .unwrap()
        .into_iter()
        .map(|e| e.kind())
        .collect();
    assert_eq!(
        ancestors,
        vec!["chord", "layer", "staff", "measure", "section", "score", "mdiv", "body", "music", "mei"]
    );

    let measure = doc
        .find_ancestor_matching("m-46", |e| e.kind() == "measure")
        .unwrap();
    assert_eq!(measure.identity(), Some("m-40"));

    // Strictly upward: a measure is not its own ancestor
    assert!(doc
        .find_ancestor_matching("m-40", |e| e.kind() == "measure")
        .is_err());
}

#[test]
fn extracted_subtree_is_standalone() {
    let doc = conflict_score();
    let before = serialize(&doc);

    let measure = doc.extract_subtree("m-40").unwrap();
    assert_eq!(measure.identity(), Some("m-40"));
    assert!(measure.contains("m-47"));
    assert!(!measure.contains("m-23"));

    let xml = measure.to_xml_string();
    assert!(xml.starts_with("<measure xmlns"));
    assert!(xml.contains("xmlns=\"http://www.music-encoding.org/ns/mei\""));
    assert!(xml.contains("xmlns:xlink=\"http://www.w3.org/1999/xlink\""));
    let reparsed = Subtree::parse(xml.as_bytes()).expect("Subtree should parse on its own");
    assert_eq!(reparsed.root(), measure.root());

    // Extraction never touches the document
    assert_eq!(serialize(&doc), before);
}

// ─── Splicing ───────────────────────────────────────────────────────

#[test]
fn replace_subtree_splices_and_generates_identities() {
    let mut doc = conflict_score();
    let replacement = Subtree::parse(
        br#"<measure xml:id="m-40" n="2"><staff xml:id="m-41" n="1"><layer n="1"><note xml:id="m-42" dur="2"/><note dur="2"/></layer></staff></measure>"#,
    )
    .unwrap();

    let new_id = doc.replace_subtree("m-40", replacement).unwrap();
    assert_eq!(new_id.as_str(), "m-40");

    // Removed identities are gone, new elements numbered past m-48
    assert!(!doc.contains("m-41a"));
    assert!(!doc.contains("m-44"));
    assert_eq!(doc.find_by_identity("m-49").unwrap().kind(), "layer");
    assert_eq!(doc.find_by_identity("m-50").unwrap().kind(), "note");

    // The spliced measure sits where the old one was and stays reachable
    let parent = doc.ancestors("m-40").unwrap()[0];
    assert_eq!(parent.identity(), Some("m-14"));
    assert_eq!(doc.generate_identity().unwrap().as_str(), "m-51");

    // The generated ids survive a round trip
    let reloaded = load(&serialize(&doc)).unwrap();
    assert!(reloaded.contains("m-50"));
}

#[test]
fn replacing_with_unmodified_copy_is_identity() {
    let original = conflict_score();
    let mut doc = original.clone();
    for id in ["m-40", "m-24", "m-5", "m-1"] {
        let copy = doc.extract_subtree(id).unwrap();
        let new_id = doc.replace_subtree(id, copy).unwrap();
        assert_eq!(new_id.as_str(), id);
        assert_eq!(doc, original, "replacing '{id}' changed the document");
    }
    assert_eq!(serialize(&doc), serialize(&original));
}

#[test]
fn replace_subtree_rejects_foreign_identity() {
    let mut doc = conflict_score();
    let before = serialize(&doc);
    let replacement =
        Subtree::parse(br#"<measure xml:id="m-40"><note xml:id="m-23" dur="1"/></measure>"#).unwrap();

    let err = doc.replace_subtree("m-40", replacement).unwrap_err();
    assert_eq!(err, DocumentError::DuplicateIdentity("m-23".into()));
    assert_eq!(serialize(&doc), before);

    let replacement = Subtree::parse(br#"<measure/>"#).unwrap();
    let err = doc.replace_subtree("m-999", replacement).unwrap_err();
    assert_eq!(err, DocumentError::NotFound("m-999".into()));
}

#[test]
fn generated_identities_are_never_reused() {
    let mut doc = conflict_score();
    let replacement = Subtree::parse(br#"<measure xml:id="m-40"/>"#).unwrap();
    doc.replace_subtree("m-40", replacement).unwrap();

    // m-48 no longer exists but was held once
    assert!(!doc.contains("m-48"));
    assert_eq!(doc.generate_identity().unwrap().as_str(), "m-49");
}

#[test]
fn identity_counter_overflow_is_an_error() {
    let max = format!("m-{}", u64::MAX);
    let mut doc = load(format!(r#"<mei xml:id="{max}"><measure xml:id="m-1"/></mei>"#).as_bytes())
        .unwrap();

    let err = doc.generate_identity().unwrap_err();
    assert_eq!(err, DocumentError::IdentitiesExhausted(max.as_str().into()));

    let before = serialize(&doc);
    let replacement = Subtree::parse(br#"<measure xml:id="m-1"><note/></measure>"#).unwrap();
    let err = doc.replace_subtree("m-1", replacement).unwrap_err();
    assert!(matches!(err, DocumentError::IdentitiesExhausted(_)), "got {err:?}");
    assert_eq!(serialize(&doc), before);
}

// ─── Normalisation ──────────────────────────────────────────────────

#[test]
fn normalize_strips_header_and_midi_data() {
    let mut doc = conflict_score();
    document::normalize(&mut doc, true).unwrap();

    assert!(!doc.contains("m-2"), "meiHead should be removed");
    assert!(!doc.contains("m-5"));
    assert!(!doc.contains("m-13"), "instrDef should be removed");
    assert_eq!(doc.find_by_identity("m-23").unwrap().attribute("pnum"), None);
    assert_eq!(doc.find_by_identity("m-23").unwrap().attribute("pname"), Some("c"));
    assert!(doc.contains("m-41a"), "existing identities are kept");
}

#[test]
fn normalize_renumbers_in_document_order() {
    let mut doc = load(
        br#"<mei xmlns="http://www.music-encoding.org/ns/mei"><meiHead/><music><measure xml:id="x"><note/></measure></music></mei>"#,
    )
    .unwrap();
    document::normalize(&mut doc, false).unwrap();

    let ids: Vec<&str> = doc
        .root()
        .descendants()
        .into_iter()
        .filter_map(|e| e.identity())
        .collect();
    assert_eq!(ids, vec!["m-0", "m-1", "m-2", "m-3"]);
    assert_eq!(doc.find_by_identity("m-2").unwrap().kind(), "measure");
}
