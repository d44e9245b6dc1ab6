//! Parses Brendan Gregg's folded-stack text format, as emitted by
//! `async-profiler --collapsed` for the JVM plugin (spec.md §4.5.4).
//!
//! Each non-empty line is `<frame1>;<frame2>;...;<frameN> <count>`, frames
//! outermost-first, separated by `;`. The trailing integer is the sample
//! weight. Unit is `none`.

use uniprof_schema::{Frame, FrameTable, Profile, SampledProfile, SpeedscopeFile, ValueUnit};

use crate::error::ConvertError;

pub fn convert(
    contents: &str,
    profile_name: &str,
    exporter: &str,
    clean_frame_name: impl Fn(&str) -> String,
) -> Result<SpeedscopeFile, ConvertError> {
    let mut frames = FrameTable::new();
    let mut profile = SampledProfile::new(profile_name, ValueUnit::None);
    let mut saw_any_line = false;

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        saw_any_line = true;

        let (stack_part, count_part) = line
            .rsplit_once(' ')
            .ok_or_else(|| ConvertError::Malformed {
                line: line_no + 1,
                message: "missing trailing sample count".to_string(),
            })?;
        let weight: f64 = count_part
            .trim()
            .parse()
            .map_err(|_| ConvertError::Malformed {
                line: line_no + 1,
                message: "sample count was not a number".to_string(),
            })?;

        let stack: Vec<usize> = stack_part
            .split(';')
            .map(|raw_name| frames.index_for(Frame::new(clean_frame_name(raw_name))))
            .collect();
        profile.push_sample(stack, weight);
    }

    if !saw_any_line {
        return Err(ConvertError::Empty);
    }

    profile.end_value = profile.total_weight();

    Ok(SpeedscopeFile::from_frame_table(
        profile_name,
        exporter,
        frames,
        vec![Profile::Sampled(profile)],
    ))
}

/// Cleans an async-profiler Java method signature: strips the parameter-type
/// descriptor, converts `/` package separators to `.`, and renders array
/// types as `T[]` (spec.md §4.4 JVM).
pub fn clean_java_method_name(raw: &str) -> String {
    let base = match raw.find('(') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let dotted = base.replace('/', ".");
    render_array_type(&dotted)
}

fn render_array_type(name: &str) -> String {
    let stripped = name.trim_start_matches('[');
    let depth = name.len() - stripped.len();
    if depth == 0 {
        return name.to_string();
    }

    let element = descriptor_to_type_name(stripped);
    format!("{element}{}", "[]".repeat(depth))
}

fn descriptor_to_type_name(descriptor: &str) -> String {
    if let Some(class) = descriptor.strip_prefix('L') {
        return class.trim_end_matches(';').to_string();
    }
    match descriptor {
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "S" => "short".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folded_stack_parses_weight_and_order() {
        let input = "main;do_work;expensive_loop 42\n";
        let file = convert(input, "proc", "uniprof-async-profiler", |s| s.to_string()).unwrap();
        let Profile::Sampled(profile) = &file.profiles[0] else {
            panic!()
        };
        assert_eq!(profile.samples[0].len(), 3);
        assert_eq!(profile.weights[0], 42.0);
        assert_eq!(file.shared.frames[profile.samples[0][0]].name, "main");
        assert_eq!(
            file.shared.frames[*profile.samples[0].last().unwrap()].name,
            "expensive_loop"
        );
    }

    #[test]
    fn java_method_name_strips_descriptor_and_dots_package() {
        let cleaned = clean_java_method_name("java/lang/Thread.run(Ljava/lang/Runnable;)V");
        assert_eq!(cleaned, "java.lang.Thread.run");
    }

    #[test]
    fn java_array_type_descriptor() {
        assert_eq!(
            descriptor_to_type_name("Ljava.lang.String;"),
            "java.lang.String"
        );
        assert_eq!(render_array_type("[Ljava.lang.String;"), "java.lang.String[]");
        assert_eq!(render_array_type("[[I"), "int[][]");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            convert("", "proc", "exp", |s| s.to_string()),
            Err(ConvertError::Empty)
        ));
    }
}
