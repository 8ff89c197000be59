//! Integration tests: restacking candidate layers in a rendered projection.

use pretty_assertions::assert_eq;
use scoremerge::layers::first_seen_layers;
use scoremerge::{reorder_layers, Projection};

const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
  <g id="m-40" class="measure">
    <g id="a1" fill="red"/>
    <g id="b1" fill="blue"><use xlink:href="#glyph" fill="blue"/></g>
    <rect id="bar" class="barLine"/>
    <g id="a2" fill="red"/>
    <path fill="red" d="M0 0"/>
    <g id="c1" fill="green"/>
  </g>
</svg>"##;

#[test]
fn first_seen_layer_is_painted_last() {
    let projection = Projection::parse(SVG).unwrap();
    assert_eq!(first_seen_layers(&projection, "fill"), vec!["red", "blue", "green"]);

    let reordered = reorder_layers(projection, "fill");
    assert_eq!(
        reordered.identities(),
        vec!["m-40", "bar", "c1", "b1", "a1", "a2"]
    );
    println!("✓ paint order: {:?}", reordered.identities());
}

#[test]
fn element_multiset_is_unchanged() {
    let projection = Projection::parse(SVG).unwrap();
    let count = |p: &Projection| p.root().descendants().len();
    let before = count(&projection);

    let reordered = reorder_layers(projection.clone(), "fill");
    assert_eq!(count(&reordered), before);

    let mut ids_before = projection.identities();
    let mut ids_after = reordered.identities();
    ids_before.sort();
    ids_after.sort();
    assert_eq!(ids_before, ids_after);

    // The unaddressed path keeps its place among the untagged children
    let measure = reordered.element("m-40").unwrap();
    let kinds: Vec<&str> = measure.child_elements().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["rect", "path", "g", "g", "g", "g"]);
    assert_eq!(reordered.attribute_of("b1", "fill"), Some("blue"));
}

#[test]
fn single_layer_is_left_alone() {
    let svg = r#"<svg><g id="a1" fill="red"/><g id="x"/><g id="a2" fill="red"/></svg>"#;
    let projection = Projection::parse(svg).unwrap();
    let reordered = reorder_layers(projection.clone(), "fill");
    assert_eq!(reordered, projection);
}

#[test]
fn layer_attribute_is_configurable() {
    let svg = r#"<svg><g id="a" data-layer="1"/><g id="b" data-layer="2"/></svg>"#;
    let projection = Projection::parse(svg).unwrap();

    // Nothing carries fill, so nothing moves
    assert_eq!(reorder_layers(projection.clone(), "fill").identities(), vec!["a", "b"]);
    assert_eq!(
        reorder_layers(projection, "data-layer").identities(),
        vec!["b", "a"]
    );
}

#[test]
fn markup_round_trips() {
    let projection = Projection::parse(SVG).unwrap();
    let reparsed = Projection::parse(&projection.to_markup()).unwrap();
    assert_eq!(reparsed, projection);
}
