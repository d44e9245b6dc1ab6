//! Parses the line-oriented textual output of `perf script` (and the
//! structurally identical output produced after `perf inject --jit` for the
//! BEAM plugin) into canonical profiles.
//!
//! Grammar (spec.md §4.5.1): events are separated by blank lines. A header
//! line looks like `<command>  <pid>[/<tid>]  <time>:  <count> <event>:`
//! followed by zero or more indented frame lines
//! `<hex-addr> <symbol+offset> (<file>)`, where the `(<file>)` segment may be
//! absent.

use std::collections::BTreeMap;
use std::io::BufRead;

use uniprof_schema::{Frame, FrameTable, Profile, SampledProfile, SpeedscopeFile, ValueUnit};

use crate::error::ConvertError;
use crate::perf_event::{PerfEvent, PerfStackFrame};

const UNKNOWN_FILE: &str = "[unknown]";

/// Parses every event out of a perf-script stream. Exposed separately from
/// `convert` so the BEAM and native `perf` plugins' JIT symbol injection step
/// can operate on the same event list before final canonical emission.
pub fn parse_events<R: BufRead>(reader: R) -> Result<Vec<PerfEvent>, ConvertError> {
    let mut events = Vec::new();
    let mut current: Option<(PerfEvent, Vec<PerfStackFrame>)> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed_end = line.trim_end();

        if trimmed_end.trim().is_empty() {
            if let Some((mut event, frames)) = current.take() {
                event.stack = frames;
                events.push(event);
            }
            continue;
        }

        let is_indented = line.starts_with(' ') || line.starts_with('\t');
        if is_indented {
            let Some((_, frames)) = current.as_mut() else {
                return Err(ConvertError::Malformed {
                    line: line_no + 1,
                    message: "stack frame line appeared before any event header".to_string(),
                });
            };
            frames.insert(0, parse_frame_line(trimmed_end.trim()));
        } else {
            if let Some((mut event, frames)) = current.take() {
                event.stack = frames;
                events.push(event);
            }
            let header = parse_header_line(trimmed_end, line_no + 1)?;
            current = Some((header, Vec::new()));
        }
    }

    if let Some((mut event, frames)) = current.take() {
        event.stack = frames;
        events.push(event);
    }

    Ok(events)
}

fn parse_header_line(line: &str, line_no: usize) -> Result<PerfEvent, ConvertError> {
    let malformed = |message: &str| ConvertError::Malformed {
        line: line_no,
        message: message.to_string(),
    };

    // The header has exactly two colons: one right after the timestamp, and
    // one trailing the event name. Split on the first, since the timestamp
    // itself never contains a colon.
    let time_colon = line
        .find(':')
        .ok_or_else(|| malformed("missing ':' after timestamp"))?;
    let (before_time, after_time) = line.split_at(time_colon);
    let after_time = after_time[1..].trim();

    let event_type = after_time
        .strip_suffix(':')
        .ok_or_else(|| malformed("missing trailing ':' on event name"))?
        .trim()
        .splitn(2, char::is_whitespace)
        .nth(1)
        .ok_or_else(|| malformed("missing event name after sample count"))?
        .trim()
        .to_string();

    let before_time = before_time.trim_end();
    let mut time_tokens = before_time.rsplitn(2, char::is_whitespace);
    let time_str = time_tokens
        .next()
        .ok_or_else(|| malformed("missing timestamp"))?;
    let time: f64 = time_str
        .parse()
        .map_err(|_| malformed("timestamp was not a number"))?;
    let rest = time_tokens
        .next()
        .ok_or_else(|| malformed("missing command/pid fields"))?;

    let mut pid_tokens = rest.trim_end().rsplitn(2, char::is_whitespace);
    let pid_tid_field = pid_tokens
        .next()
        .ok_or_else(|| malformed("missing pid/tid field"))?;
    let command = pid_tokens
        .next()
        .ok_or_else(|| malformed("missing command field"))?
        .trim()
        .to_string();

    let (process_id, thread_id) = match pid_tid_field.split_once('/') {
        Some((pid, tid)) => (
            Some(
                pid.parse()
                    .map_err(|_| malformed("pid was not a number"))?,
            ),
            tid.parse().map_err(|_| malformed("tid was not a number"))?,
        ),
        None => (
            None,
            pid_tid_field
                .parse()
                .map_err(|_| malformed("pid/tid field was not a number"))?,
        ),
    };

    Ok(PerfEvent {
        command,
        process_id,
        thread_id,
        time,
        event_type,
        stack: Vec::new(),
    })
}

fn parse_frame_line(line: &str) -> PerfStackFrame {
    let (addr_str, rest) = match line.split_once(char::is_whitespace) {
        Some((addr, rest)) => (addr, rest.trim_start()),
        None => (line, ""),
    };
    let address = format!("0x{addr_str}");

    let (symbol_and_offset, file) = match rest.rfind(" (") {
        Some(idx) if rest.ends_with(')') => (&rest[..idx], rest[idx + 2..rest.len() - 1].to_string()),
        _ => (rest, UNKNOWN_FILE.to_string()),
    };

    let symbol_name = match symbol_and_offset.rfind('+') {
        Some(idx)
            if symbol_and_offset[idx + 1..]
                .strip_prefix("0x")
                .map(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
                .unwrap_or(false) =>
        {
            symbol_and_offset[..idx].to_string()
        }
        _ => symbol_and_offset.to_string(),
    };

    PerfStackFrame {
        address,
        symbol_name,
        file,
    }
}

/// Converts a parsed event list into a canonical profile file, attributing
/// `1 / sampling_hz` seconds of weight to each sample.
pub fn events_to_profile(
    events: Vec<PerfEvent>,
    sampling_hz: f64,
    exporter: &str,
    profile_file_name: &str,
) -> Result<SpeedscopeFile, ConvertError> {
    if events.is_empty() {
        return Err(ConvertError::Empty);
    }

    let weight = 1.0 / sampling_hz;
    let mut frames = FrameTable::new();
    let mut by_thread: BTreeMap<String, SampledProfile> = BTreeMap::new();

    for event in events {
        let key = event.thread_profile_name();
        let profile = by_thread
            .entry(key.clone())
            .or_insert_with(|| SampledProfile::new(key, ValueUnit::Seconds));

        let stack: Vec<usize> = event
            .stack
            .iter()
            .map(|f| {
                frames.index_for(Frame::with_location(
                    f.symbol_name.clone(),
                    f.file.clone(),
                    None,
                    None,
                ))
            })
            .collect();
        profile.push_sample(stack, weight);
    }

    let mut profiles: Vec<Profile> = Vec::new();
    for (_, mut profile) in by_thread {
        profile.end_value = profile.total_weight();
        profiles.push(Profile::Sampled(profile));
    }

    Ok(SpeedscopeFile::from_frame_table(
        profile_file_name,
        exporter,
        frames,
        profiles,
    ))
}

pub fn convert<R: BufRead>(
    reader: R,
    sampling_hz: f64,
    exporter: &str,
    profile_file_name: &str,
) -> Result<SpeedscopeFile, ConvertError> {
    let events = parse_events(reader)?;
    events_to_profile(events, sampling_hz, exporter, profile_file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_input() -> &'static str {
        "myprog  1000/1001  100.000000:   1 cpu-clock:\n\
            ffffffff00000003 expensive_loop+0x5 (/bin/myprog)\n\
            ffffffff00000002 do_work+0x10 (/bin/myprog)\n\
            ffffffff00000001 main+0x20 (/bin/myprog)\n\
\n\
         myprog  1000/1001  100.001000:   1 cpu-clock:\n\
            ffffffff00000003 expensive_loop+0x5 (/bin/myprog)\n\
            ffffffff00000002 do_work+0x10 (/bin/myprog)\n\
            ffffffff00000001 main+0x20 (/bin/myprog)\n"
    }

    #[test]
    fn s1_perf_script_two_events_three_frames() {
        let file = convert(Cursor::new(sample_input()), 999.0, "uniprof-perf", "myprog").unwrap();
        assert_eq!(file.shared.frames.len(), 3);
        assert_eq!(file.profiles.len(), 1);
        let Profile::Sampled(profile) = &file.profiles[0] else {
            panic!("expected sampled profile");
        };
        assert_eq!(profile.samples.len(), 2);
        assert_eq!(profile.samples[0].len(), 3);
        assert!((profile.weights[0] - 1.0 / 999.0).abs() < 1e-12);
        assert_eq!(profile.name, "myprog (pid: 1000, tid: 1001)");
    }

    #[test]
    fn s1_stack_is_bottom_first_outermost_caller() {
        let file = convert(Cursor::new(sample_input()), 999.0, "uniprof-perf", "myprog").unwrap();
        let Profile::Sampled(profile) = &file.profiles[0] else {
            panic!("expected sampled profile");
        };
        let outermost_idx = profile.samples[0][0];
        assert_eq!(file.shared.frames[outermost_idx].name, "main");
        let innermost_idx = *profile.samples[0].last().unwrap();
        assert_eq!(file.shared.frames[innermost_idx].name, "expensive_loop");
    }

    #[test]
    fn s2_frame_without_file_segment() {
        let frame = parse_frame_line("ffffffff00123456 foo_function+0x10");
        assert_eq!(frame.address, "0xffffffff00123456");
        assert_eq!(frame.symbol_name, "foo_function");
        assert_eq!(frame.file, "[unknown]");
    }

    #[test]
    fn frame_with_file_segment() {
        let frame = parse_frame_line("ffffffff00123456 foo_function+0x10 (/lib/libc.so)");
        assert_eq!(frame.symbol_name, "foo_function");
        assert_eq!(frame.file, "/lib/libc.so");
    }

    #[test]
    fn no_pid_falls_back_to_tid_only_grouping() {
        let input = "myprog  1001  100.000000:   1 cpu-clock:\n    ffffffff00000001 main+0x20 (/bin/myprog)\n";
        let file = convert(Cursor::new(input), 999.0, "uniprof-perf", "myprog").unwrap();
        let Profile::Sampled(profile) = &file.profiles[0] else {
            panic!("expected sampled profile");
        };
        assert_eq!(profile.name, "myprog (tid: 1001)");
    }
}
