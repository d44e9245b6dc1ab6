//! Frame aggregation over sampled profiles (spec.md §4.6 "Aggregation").

use std::collections::HashMap;

use uniprof_schema::Frame;

/// One row of the analysis: a frame plus its aggregated weight statistics.
#[derive(Debug, Clone)]
pub struct Hotspot {
    pub frame: Frame,
    pub total_weight: f64,
    pub self_weight: f64,
    pub samples: usize,
    pub sample_weights: Vec<f64>,
}

impl Hotspot {
    /// `p50`/`p90`/`p99` of `sample_weights`, omitted when every sample has
    /// the same weight (spec.md §4.6 step 5 "computed only when weights
    /// vary").
    pub fn percentiles(&self) -> Option<(f64, f64, f64)> {
        if self.sample_weights.is_empty() {
            return None;
        }
        let first = self.sample_weights[0];
        if self.sample_weights.iter().all(|w| (*w - first).abs() < f64::EPSILON) {
            return None;
        }
        let mut sorted = self.sample_weights.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Some((
            percentile(&sorted, 0.50),
            percentile(&sorted, 0.90),
            percentile(&sorted, 0.99),
        ))
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Truncates `stack` to its leaf-most `max_depth` frames when `max_depth` is
/// set (spec.md §4.6 step 1).
pub fn truncate_depth(stack: &[usize], max_depth: Option<usize>) -> Vec<usize> {
    match max_depth {
        Some(depth) if stack.len() > depth => stack[stack.len() - depth..].to_vec(),
        _ => stack.to_vec(),
    }
}

/// Aggregates `(stack, weight)` pairs into per-frame hotspots. `stack` is
/// bottom-of-stack-first; the leaf is `stack.last()`.
pub fn aggregate(frames: &[Frame], samples: &[Vec<usize>], weights: &[f64], max_depth: Option<usize>) -> Vec<Hotspot> {
    let mut by_frame: HashMap<usize, Hotspot> = HashMap::new();

    for (stack, &weight) in samples.iter().zip(weights) {
        let stack = truncate_depth(stack, max_depth);
        if stack.is_empty() {
            continue;
        }
        let leaf = *stack.last().unwrap();

        let mut seen_in_stack: Vec<usize> = stack.clone();
        seen_in_stack.sort_unstable();
        seen_in_stack.dedup();

        for &frame_idx in &seen_in_stack {
            let entry = by_frame.entry(frame_idx).or_insert_with(|| Hotspot {
                frame: frames[frame_idx].clone(),
                total_weight: 0.0,
                self_weight: 0.0,
                samples: 0,
                sample_weights: Vec::new(),
            });
            entry.total_weight += weight;
            entry.samples += 1;
            entry.sample_weights.push(weight);
            if frame_idx == leaf {
                entry.self_weight += weight;
            }
        }
    }

    by_frame.into_values().collect()
}

/// Σweights across every sample (spec.md §4.6 step 2).
pub fn total_weight(weights: &[f64]) -> f64 {
    weights.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str) -> Frame {
        Frame::new(name)
    }

    #[test]
    fn self_weight_only_counts_leaf_occurrences() {
        let frames = vec![frame("main"), frame("work")];
        let samples = vec![vec![0, 1], vec![0, 1], vec![0]];
        let weights = vec![1.0, 1.0, 1.0];
        let hotspots = aggregate(&frames, &samples, &weights, None);

        let main = hotspots.iter().find(|h| h.frame.name == "main").unwrap();
        let work = hotspots.iter().find(|h| h.frame.name == "work").unwrap();
        assert_eq!(main.total_weight, 3.0);
        assert_eq!(main.self_weight, 1.0, "main is the leaf only in the third sample");
        assert_eq!(work.total_weight, 2.0);
        assert_eq!(work.self_weight, 2.0);
    }

    #[test]
    fn max_depth_truncates_to_leaf_most_frames() {
        let truncated = truncate_depth(&[0, 1, 2, 3], Some(2));
        assert_eq!(truncated, vec![2, 3]);
    }

    #[test]
    fn percentiles_omitted_when_all_weights_equal() {
        let hotspot = Hotspot {
            frame: frame("main"),
            total_weight: 3.0,
            self_weight: 3.0,
            samples: 3,
            sample_weights: vec![1.0, 1.0, 1.0],
        };
        assert!(hotspot.percentiles().is_none());
    }

    #[test]
    fn percentiles_present_when_weights_vary() {
        let hotspot = Hotspot {
            frame: frame("main"),
            total_weight: 6.0,
            self_weight: 6.0,
            samples: 3,
            sample_weights: vec![1.0, 2.0, 3.0],
        };
        assert!(hotspot.percentiles().is_some());
    }
}
