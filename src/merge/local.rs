//! In-process merger for conflicting measure layers.
//!
//! Within each staff, layers whose identities share the same digits are
//! candidates for the same voice (`m-12a` / `m-12b`). A pair of candidates is
//! merged by laying their visible timed events out on one timeline and
//! picking a maximal set of non-overlapping ones (earliest finish first).
//! When every visible event fits, the pair becomes one layer `m-r<digits>`;
//! otherwise both candidates stay and the measure is still conflicting.

use std::collections::HashSet;

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedMul};

use super::{MergeRequest, MergeResponse, MergeService};
use crate::document::{Element, Node};
use crate::error::MergeServiceError;

/// Elements that take up time in a layer.
const EVENT_KINDS: [&str; 3] = ["note", "rest", "space"];
/// Elements whose contents form a single event.
const EVENT_GROUP_KINDS: [&str; 2] = ["beam", "chord"];

/// Identity prefix of merged layers.
const MERGED_LAYER_PREFIX: &str = "m-r";

#[derive(Debug, Clone, Default)]
pub struct LocalMergeService;

impl LocalMergeService {
    pub fn new() -> Self {
        Self
    }
}

impl MergeService for LocalMergeService {
    async fn merge(&self, request: &MergeRequest) -> Result<MergeResponse, MergeServiceError> {
        let mut measure = request.measure()?;
        let resolved = merge_measure_layers(measure.root_mut());
        log::debug!(
            "local merge of '{}': resolved={resolved}",
            measure.identity().unwrap_or("?")
        );
        Ok(if resolved {
            MergeResponse::resolved(&measure)
        } else {
            MergeResponse::still_conflicting(Some(&measure))
        })
    }
}

/// Merge the candidate layers of every staff in `measure` in place.
/// Returns true when no staff has competing layers left.
pub fn merge_measure_layers(measure: &mut Element) -> bool {
    let mut resolved = true;
    for staff in measure.child_elements_mut() {
        if staff.kind() == "staff" {
            resolved &= merge_staff(staff);
        }
    }
    resolved
}

fn merge_staff(staff: &mut Element) -> bool {
    // Group layer positions by the digits of their identity, first-seen order
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, child) in staff.children.iter().enumerate() {
        if let Node::Element(e) = child {
            if e.kind() == "layer" {
                let key = layer_key(e);
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, members)) => members.push(i),
                    None => groups.push((key, vec![i])),
                }
            }
        }
    }

    let mut resolved = true;
    let mut replacements: Vec<(Vec<usize>, Element)> = Vec::new();
    for (key, members) in &groups {
        if members.len() == 1 {
            continue;
        }
        let layers: Vec<&Element> = members
            .iter()
            .filter_map(|&i| match &staff.children[i] {
                Node::Element(e) => Some(e),
                Node::Text(_) => None,
            })
            .collect();
        match merge_layers(&layers, key) {
            Some(merged) => replacements.push((members.clone(), merged)),
            None => resolved = false,
        }
    }

    // The merged layer takes the place of the first candidate
    let mut dropped = HashSet::new();
    for (members, merged) in replacements {
        staff.children[members[0]] = Node::Element(merged);
        dropped.extend(members[1..].iter().copied());
    }
    if !dropped.is_empty() {
        let children = std::mem::take(&mut staff.children);
        staff.children = children
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !dropped.contains(i))
            .map(|(_, child)| child)
            .collect();
    }

    resolved
}

fn layer_key(layer: &Element) -> String {
    layer
        .identity()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

struct TimedEvent<'a> {
    event: &'a Element,
    start: Rational64,
    finish: Rational64,
}

fn merge_layers(layers: &[&Element], key: &str) -> Option<Element> {
    if layers.len() != 2 {
        log::warn!("cannot merge {} candidate layers for voice '{key}'", layers.len());
        return None;
    }

    // A hidden layer contributes nothing
    let mut visible = Vec::new();
    for layer in layers.iter().copied().filter(|layer| is_visible(layer)) {
        visible.extend(layer_timeline(layer)?);
    }

    let mut by_finish: Vec<&TimedEvent> = visible.iter().collect();
    by_finish.sort_by_key(|e| e.finish);
    let mut selected: Vec<&TimedEvent> = Vec::new();
    let mut selected_finish: Option<Rational64> = None;
    for event in by_finish {
        if selected_finish.map_or(true, |f| event.start >= f) {
            selected_finish = Some(event.finish);
            selected.push(event);
        }
    }

    if selected.len() != visible.len() {
        log::debug!(
            "voice '{key}': {} of {} visible events overlap",
            visible.len() - selected.len(),
            visible.len()
        );
        return None;
    }

    selected.sort_by_key(|e| e.start);
    let template = layers[0];
    let mut merged = Element::new(template.name.clone());
    merged.set_identity(&format!("{MERGED_LAYER_PREFIX}{key}"));
    if let Some(n) = template.attribute("n") {
        merged.set_attribute("n", n);
    }
    for event in selected {
        merged.push_element(event.event.clone());
    }
    Some(merged)
}

/// Visible events of a layer laid out back to back from the start of the
/// measure. Hidden events still take up their time. `None` when an event
/// has no usable duration or the running time overflows.
fn layer_timeline(layer: &Element) -> Option<Vec<TimedEvent<'_>>> {
    let mut events = Vec::new();
    collect_events(layer, true, &mut events);

    let mut start = Rational64::from_integer(0);
    let mut timeline = Vec::with_capacity(events.len());
    for (event, visible) in events {
        let finish = start.checked_add(&event_duration(event)?)?;
        if visible {
            timeline.push(TimedEvent {
                event,
                start,
                finish,
            });
        }
        start = finish;
    }
    Some(timeline)
}

/// Timed events under `element`, each paired with whether it and every
/// enclosing container are visible.
fn collect_events<'a>(element: &'a Element, visible: bool, out: &mut Vec<(&'a Element, bool)>) {
    for child in element.child_elements() {
        let kind = child.kind();
        let shown = visible && is_visible(child);
        if EVENT_GROUP_KINDS.contains(&kind) || EVENT_KINDS.contains(&kind) {
            out.push((child, shown));
        } else {
            collect_events(child, shown, out);
        }
    }
}

/// Length as a fraction of a whole note: `dur="4"` is 1/4, each dot adds
/// half of the previous value. A beam lasts as long as its contents.
fn event_duration(event: &Element) -> Option<Rational64> {
    if event.kind() == "beam" {
        let mut total = Rational64::from_integer(0);
        for child in event.child_elements() {
            let kind = child.kind();
            if EVENT_GROUP_KINDS.contains(&kind) || EVENT_KINDS.contains(&kind) {
                total = total.checked_add(&event_duration(child)?)?;
            }
        }
        return Some(total);
    }

    let dur: i64 = event.attribute("dur")?.trim().parse().ok()?;
    if dur <= 0 {
        return None;
    }
    let base = Rational64::new(1, dur);
    let dots: u32 = match event.attribute("dots") {
        Some(d) => d.trim().parse().ok()?,
        None => 0,
    };
    if dots > 8 {
        return None;
    }
    base.checked_mul(&(Rational64::from_integer(2) - Rational64::new(1, 1i64 << dots)))
}

/// `space` never shows; anything else unless flagged `visible="false"`.
fn is_visible(element: &Element) -> bool {
    element.kind() != "space" && element.attribute("visible").map_or(true, |v| v == "true")
}
