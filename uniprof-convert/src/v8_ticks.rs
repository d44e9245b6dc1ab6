//! Converts the `ticks.json` artifact emitted by the Node.js `0x` plugin
//! into a canonical profile (spec.md §4.5.2).

use serde::Deserialize;

use uniprof_schema::{Frame, FrameTable, Profile, SampledProfile, SpeedscopeFile, ValueUnit};

use crate::error::ConvertError;

const TICK_WEIGHT_MS: f64 = 1.0;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TicksDocument {
    Array(Vec<Vec<RawTickFrame>>),
    Object { ticks: Vec<RawTick> },
}

#[derive(Debug, Deserialize)]
struct RawTick {
    stack: Vec<RawTickFrame>,
}

#[derive(Debug, Deserialize, Clone)]
struct RawTickFrame {
    #[serde(rename = "type")]
    frame_type: Option<String>,
    kind: Option<String>,
    name: String,
}

pub fn convert(contents: &str, profile_name: &str) -> Result<SpeedscopeFile, ConvertError> {
    let doc: TicksDocument = serde_json::from_str(contents)?;
    let stacks: Vec<Vec<RawTickFrame>> = match doc {
        TicksDocument::Array(stacks) => stacks,
        TicksDocument::Object { ticks } => ticks.into_iter().map(|t| t.stack).collect(),
    };

    if stacks.is_empty() {
        return Err(ConvertError::Empty);
    }

    let mut frames = FrameTable::new();
    let mut profile = SampledProfile::new(profile_name, ValueUnit::Milliseconds);

    for stack in stacks {
        let resolved: Vec<usize> = stack
            .iter()
            .map(|raw| frames.index_for(resolve_frame(raw)))
            .collect();
        profile.push_sample(resolved, TICK_WEIGHT_MS);
    }
    profile.end_value = profile.total_weight();

    Ok(SpeedscopeFile::from_frame_table(
        profile_name,
        "uniprof-0x",
        frames,
        vec![Profile::Sampled(profile)],
    ))
}

fn resolve_frame(raw: &RawTickFrame) -> Frame {
    match raw.frame_type.as_deref() {
        Some("CPP") => Frame::new(format!("(c++) {}", raw.name)),
        Some("SHARED_LIB") => Frame::new(format!("(LIB) {}", raw.name)),
        Some("CODE") => Frame::new(format!("{} {}", code_kind_prefix(raw.kind.as_deref()), raw.name)),
        _ => resolve_js_frame(&raw.name),
    }
}

fn code_kind_prefix(kind: Option<&str>) -> &'static str {
    match kind.map(str::to_ascii_lowercase).as_deref() {
        Some("ic") => "(IC)",
        Some("bytecode") => "(bytecode)",
        Some("stub") => "(stub)",
        Some("builtin") => "(builtin)",
        Some("regexp") => "(regexp)",
        _ => "(code)",
    }
}

/// Parses the three JS frame name shapes spec.md §4.5.2 calls out:
/// path-only with line:col, `"name file://… :L:C"`, and `"name path:L:C"`.
fn resolve_js_frame(name: &str) -> Frame {
    let Some((rest, line, col)) = split_trailing_location(name) else {
        if name.is_empty() {
            return Frame::new("(anonymous)");
        }
        return Frame::new(name.to_string());
    };

    let (func_name, file) = match rest.rfind(' ') {
        Some(idx) => {
            let func_part = rest[..idx].trim();
            let loc_part = rest[idx + 1..].trim();
            let file = loc_part.strip_prefix("file://").unwrap_or(loc_part);
            (func_part.to_string(), file.to_string())
        }
        None => (String::new(), rest.to_string()),
    };

    if func_name.is_empty() {
        Frame::with_location(format!("(anonymous {file}:{line})"), file, Some(line), Some(col))
    } else {
        Frame::with_location(func_name, file, Some(line), Some(col))
    }
}

/// Splits `"...:<line>:<col>"` off the end of a frame name, if present.
fn split_trailing_location(name: &str) -> Option<(&str, u32, u32)> {
    let mut parts = name.rsplitn(3, ':');
    let col: u32 = parts.next()?.parse().ok()?;
    let line: u32 = parts.next()?.parse().ok()?;
    let rest = parts.next()?;
    Some((rest, line, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(stack: Vec<RawTickFrame>) -> String {
        serde_json::to_string(&serde_json::json!({ "ticks": [{ "stack": stack_to_json(stack) }] }))
            .unwrap()
    }

    fn stack_to_json(stack: Vec<RawTickFrame>) -> serde_json::Value {
        serde_json::Value::Array(
            stack
                .into_iter()
                .map(|f| {
                    serde_json::json!({
                        "type": f.frame_type,
                        "kind": f.kind,
                        "name": f.name,
                    })
                })
                .collect(),
        )
    }

    fn frame(frame_type: Option<&str>, kind: Option<&str>, name: &str) -> RawTickFrame {
        RawTickFrame {
            frame_type: frame_type.map(str::to_string),
            kind: kind.map(str::to_string),
            name: name.to_string(),
        }
    }

    #[test]
    fn cpp_and_lib_frames_get_prefixed() {
        let input = tick(vec![
            frame(Some("CPP"), None, "node::Run"),
            frame(Some("SHARED_LIB"), None, "/usr/lib/libc.so"),
        ]);
        let file = convert(&input, "proc").unwrap();
        let names: Vec<_> = file.shared.frames.iter().map(|f| f.name.clone()).collect();
        assert!(names.contains(&"(c++) node::Run".to_string()));
        assert!(names.contains(&"(LIB) /usr/lib/libc.so".to_string()));
    }

    #[test]
    fn js_frame_with_path_and_location() {
        let input = tick(vec![frame(Some("JS"), None, "doWork /app/index.js:10:5")]);
        let file = convert(&input, "proc").unwrap();
        let f = &file.shared.frames[0];
        assert_eq!(f.name, "doWork");
        assert_eq!(f.file.as_deref(), Some("/app/index.js"));
        assert_eq!(f.line, Some(10));
        assert_eq!(f.col, Some(5));
    }

    #[test]
    fn js_frame_with_file_url() {
        let input = tick(vec![frame(Some("JS"), None, "doWork file:///app/index.js:10:5")]);
        let file = convert(&input, "proc").unwrap();
        assert_eq!(file.shared.frames[0].file.as_deref(), Some("/app/index.js"));
    }

    #[test]
    fn anonymous_js_frame_with_location() {
        let input = tick(vec![frame(Some("JS"), None, "/app/index.js:10:5")]);
        let file = convert(&input, "proc").unwrap();
        assert_eq!(file.shared.frames[0].name, "(anonymous /app/index.js:10)");
    }

    #[test]
    fn anonymous_without_location() {
        let f = resolve_js_frame("");
        assert_eq!(f.name, "(anonymous)");
    }

    #[test]
    fn code_frame_kind_prefixes() {
        assert_eq!(code_kind_prefix(Some("IC")), "(IC)");
        assert_eq!(code_kind_prefix(Some("builtin")), "(builtin)");
        assert_eq!(code_kind_prefix(None), "(code)");
    }

    #[test]
    fn each_tick_weighs_one_millisecond() {
        let input = tick(vec![frame(Some("JS"), None, "main /a.js:1:1")]);
        let file = convert(&input, "proc").unwrap();
        let Profile::Sampled(p) = &file.profiles[0] else {
            panic!()
        };
        assert_eq!(p.weights[0], 1.0);
        assert!(matches!(p.unit, ValueUnit::Milliseconds));
    }
}
