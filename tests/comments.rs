//! Integration tests: comment overlay storage and its JSON form.

use pretty_assertions::assert_eq;
use scoremerge::{load_file, CommentMap, Document, ElementIdentity, Subtree};
use std::path::PathBuf;

fn conflict_score() -> Document {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/conflict.mei");
    load_file(&path).expect("Failed to load conflict.mei")
}

#[test]
fn set_get_delete() {
    let mut comments = CommentMap::new();
    assert!(comments.is_empty());

    comments.set("m-42", "check the accidental");
    comments.set("m-44", "duplicate of m-42?");
    assert_eq!(comments.get("m-42"), Some("check the accidental"));
    assert_eq!(comments.len(), 2);

    comments.set("m-42", "accidental is fine");
    assert_eq!(comments.get("m-42"), Some("accidental is fine"));

    // Empty text removes the comment
    comments.set("m-44", "  ");
    assert_eq!(comments.get("m-44"), None);

    assert_eq!(comments.delete("m-42").as_deref(), Some("accidental is fine"));
    assert_eq!(comments.delete("m-42"), None);
    assert!(comments.is_empty());
}

#[test]
fn json_is_a_flat_object() {
    let json = r#"{ "m-23": "too low", "m-46": "beam looks off" }"#;
    let comments = CommentMap::from_json(json).unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments.get("m-46"), Some("beam looks off"));

    let all: Vec<(&str, &str)> = comments.all().map(|(id, text)| (id.as_str(), text)).collect();
    assert_eq!(all, vec![("m-23", "too low"), ("m-46", "beam looks off")]);

    let value: serde_json::Value = serde_json::from_str(&comments.to_json().unwrap()).unwrap();
    assert_eq!(value, serde_json::json!({ "m-23": "too low", "m-46": "beam looks off" }));

    assert!(CommentMap::from_json(r#"["m-23"]"#).is_err());
}

#[test]
fn orphaned_after_splice() {
    let mut doc = conflict_score();
    let mut comments = CommentMap::new();
    comments.set("m-23", "keep");
    comments.set("m-44", "goes away with its layer");
    comments.set("m-42", "survives the merge");
    assert!(comments.orphaned(&doc).is_empty());

    let merged = Subtree::parse(
        br#"<measure xml:id="m-40"><staff xml:id="m-41"><layer xml:id="m-r41"><note xml:id="m-42" dur="1"/></layer></staff></measure>"#,
    )
    .unwrap();
    doc.replace_subtree("m-40", merged).unwrap();

    let orphans: Vec<&ElementIdentity> = comments.orphaned(&doc);
    assert_eq!(orphans, vec![&ElementIdentity::from("m-44")]);
}
