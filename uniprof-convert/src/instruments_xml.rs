//! Parses the XML produced by
//! `xctrace export --xpath '/trace-toc[1]/run[1]/data[1]/table[@schema="time-profile"]'`
//! for the macOS Instruments plugin (spec.md §4.5.3).
//!
//! Instruments XML uses an id/ref interning scheme: any element may carry an
//! `@id` and later occurrences reuse it via `@ref`. Per spec.md §9, we walk
//! the entire document once collecting every `@id`-bearing element into a
//! lookup map, then resolve `@ref`s lazily against that map rather than
//! streaming — a deliberate memory/simplicity trade-off the spec calls out
//! as acceptable.

use std::collections::BTreeMap;

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;

use uniprof_schema::{Frame, FrameTable, Profile, SampledProfile, SpeedscopeFile, ValueUnit};

use crate::error::ConvertError;

#[derive(Debug, Clone, Default)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<Node>,
}

/// Parses the full document into a tree and an id→node lookup, mirroring
/// the eager-collection strategy spec.md §9 requires.
fn parse_tree(xml: &str) -> Result<(Node, BTreeMap<String, Node>), ConvertError> {
    let mut reader = Reader::from_str(xml);

    let mut by_id: BTreeMap<String, Node> = BTreeMap::new();
    let mut stack: Vec<Node> = vec![Node {
        tag: "#root".to_string(),
        ..Default::default()
    }];

    loop {
        match reader.read_event()? {
            XmlEvent::Eof => break,
            XmlEvent::Start(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let mut attrs = BTreeMap::new();
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    attrs.insert(key, value);
                }
                stack.push(Node {
                    tag,
                    attrs,
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            XmlEvent::Empty(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let mut attrs = BTreeMap::new();
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    attrs.insert(key, value);
                }
                let node = Node {
                    tag,
                    attrs,
                    text: String::new(),
                    children: Vec::new(),
                };
                push_finished_child(&mut stack, &mut by_id, node);
            }
            XmlEvent::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            XmlEvent::End(_) => {
                let node = stack.pop().expect("unbalanced XML: extra closing tag");
                push_finished_child(&mut stack, &mut by_id, node);
            }
            _ => {}
        }
    }

    let root = stack.pop().expect("unbalanced XML: missing root");
    Ok((root, by_id))
}

fn push_finished_child(stack: &mut Vec<Node>, by_id: &mut BTreeMap<String, Node>, node: Node) {
    if let Some(id) = node.attrs.get("id") {
        by_id.insert(id.clone(), node.clone());
    }
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Resolves a node that may be a `@ref` placeholder into its definition.
fn resolve<'a>(node: &'a Node, by_id: &'a BTreeMap<String, Node>) -> Option<&'a Node> {
    if let Some(r) = node.attrs.get("ref") {
        by_id.get(r)
    } else {
        Some(node)
    }
}

fn find_all<'a>(node: &'a Node, tag: &str, out: &mut Vec<&'a Node>) {
    if node.tag == tag {
        out.push(node);
    }
    for child in &node.children {
        find_all(child, tag, out);
    }
}

/// Parses `"<number> <unit>"` (e.g. `"3.00 ms"`) into nanoseconds. A bare
/// number with no unit is assumed to already be nanoseconds.
fn parse_time_to_ns(text: &str) -> Option<f64> {
    let text = text.trim();
    let mut parts = text.splitn(2, char::is_whitespace);
    let number: f64 = parts.next()?.parse().ok()?;
    let unit = parts.next().map(str::trim).unwrap_or("ns");
    let multiplier = match unit {
        "ns" | "" => 1.0,
        "us" | "\u{b5}s" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        _ => 1.0,
    };
    Some(number * multiplier)
}

fn node_display_text(node: &Node, by_id: &BTreeMap<String, Node>) -> String {
    if let Some(resolved) = resolve(node, by_id) {
        if !resolved.text.trim().is_empty() {
            return resolved.text.trim().to_string();
        }
        for key in ["fmt", "name"] {
            if let Some(v) = resolved.attrs.get(key) {
                return v.clone();
            }
        }
    }
    String::new()
}

pub fn convert(xml: &str, profile_name: &str) -> Result<SpeedscopeFile, ConvertError> {
    let (root, by_id) = parse_tree(xml)?;

    let mut rows = Vec::new();
    find_all(&root, "row", &mut rows);
    if rows.is_empty() {
        return Err(ConvertError::Empty);
    }

    let mut frames = FrameTable::new();
    let mut by_thread: BTreeMap<String, SampledProfile> = BTreeMap::new();
    let mut max_end = 0.0_f64;

    for row in rows {
        let mut sample_time_ns = 0.0_f64;
        let mut weight_ns = 0.0_f64;
        let mut thread_label = String::from("thread");
        let mut process_label = String::new();
        let mut stack: Vec<usize> = Vec::new();

        for child in &row.children {
            match child.tag.as_str() {
                "sample-time" => {
                    sample_time_ns = parse_time_to_ns(&child.text).unwrap_or(0.0);
                }
                "weight" => {
                    weight_ns = parse_time_to_ns(&child.text).unwrap_or(0.0);
                }
                "thread" => {
                    thread_label = node_display_text(child, &by_id);
                    let mut process_nodes = Vec::new();
                    find_all(child, "process", &mut process_nodes);
                    if let Some(process_node) = process_nodes.first() {
                        process_label = node_display_text(process_node, &by_id);
                    }
                }
                "process" => {
                    process_label = node_display_text(child, &by_id);
                }
                "backtrace" => {
                    let mut frame_nodes = Vec::new();
                    find_all(child, "frame", &mut frame_nodes);
                    // xctrace lists backtrace frames innermost-first; reverse
                    // to the canonical bottom-first (outermost-first) order
                    // every converter must produce (spec.md §8 property 6).
                    frame_nodes.reverse();
                    for frame_node in frame_nodes {
                        let Some(resolved) = resolve(frame_node, &by_id) else {
                            continue;
                        };
                        let name = node_display_text(resolved, &by_id);
                        let file = resolved.attrs.get("binary").cloned();
                        let idx = match file {
                            Some(file) => frames.index_for(Frame::with_location(name, file, None, None)),
                            None => frames.index_for(Frame::new(name)),
                        };
                        stack.push(idx);
                    }
                }
                _ => {}
            }
        }

        let key = if process_label.is_empty() {
            thread_label.clone()
        } else {
            format!("{process_label} ({thread_label})")
        };
        let profile = by_thread
            .entry(key.clone())
            .or_insert_with(|| SampledProfile::new(key, ValueUnit::Nanoseconds));

        let weight = if weight_ns > 0.0 { weight_ns } else { 1.0 };
        profile.push_sample(stack, weight);
        max_end = max_end.max(sample_time_ns + weight);
    }

    let mut profiles = Vec::new();
    for (_, mut profile) in by_thread {
        profile.end_value = profile.end_value.max(max_end).max(profile.total_weight());
        profiles.push(Profile::Sampled(profile));
    }

    Ok(SpeedscopeFile::from_frame_table(
        profile_name,
        "uniprof-instruments",
        frames,
        profiles,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_reference_resolves_after_later_definition() {
        let xml = r#"
            <trace-query-result>
              <node>
                <row>
                  <sample-time>100 ms</sample-time>
                  <thread ref="t1"/>
                  <weight>1.00 ms</weight>
                  <backtrace>
                    <frame ref="f1"/>
                    <frame ref="f2"/>
                  </backtrace>
                </row>
                <thread id="t1" fmt="Main Thread"/>
                <frame id="f1" name="do_work" binary="app"/>
                <frame id="f2" name="main" binary="app"/>
              </node>
            </trace-query-result>
        "#;
        let file = convert(xml, "trace").unwrap();
        assert_eq!(file.shared.frames.len(), 2);
        let Profile::Sampled(p) = &file.profiles[0] else {
            panic!()
        };
        assert_eq!(p.samples[0].len(), 2);
        // backtrace lists innermost (do_work) first; canonical form reverses
        // it so the outermost caller (main) is at index 0.
        assert_eq!(file.shared.frames[p.samples[0][0]].name, "main");
        assert_eq!(file.shared.frames[*p.samples[0].last().unwrap()].name, "do_work");
    }

    #[test]
    fn weight_parses_with_unit_suffix() {
        assert_eq!(parse_time_to_ns("3.00 ms"), Some(3_000_000.0));
        assert_eq!(parse_time_to_ns("42"), Some(42.0));
    }

    #[test]
    fn no_rows_is_an_error() {
        let xml = "<trace-query-result><node></node></trace-query-result>";
        assert!(matches!(convert(xml, "trace"), Err(ConvertError::Empty)));
    }
}
