//! Filtering, sorting, and capping of aggregated hotspots (spec.md §4.6
//! "Filtering", "Sorting & cap").

use regex::Regex;

use crate::aggregate::Hotspot;
use crate::error::AnalyzeError;

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 0.1;
pub const MAX_HOTSPOTS: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub threshold: Option<f64>,
    pub filter_regex: Option<String>,
    pub min_samples: Option<usize>,
    pub max_depth: Option<usize>,
}

/// Drops frames under `threshold`/`minSamples`/not matching `filterRegex`,
/// then sorts descending by `totalWeight` and caps at 50 (spec.md §4.6).
pub fn filter_and_sort(
    mut hotspots: Vec<Hotspot>,
    total: f64,
    options: &AnalyzeOptions,
) -> Result<Vec<Hotspot>, AnalyzeError> {
    let threshold = options.threshold.unwrap_or(DEFAULT_THRESHOLD_PERCENT);
    let regex = options
        .filter_regex
        .as_deref()
        .map(Regex::new)
        .transpose()?;

    hotspots.retain(|h| {
        if total > 0.0 && (h.total_weight / total) * 100.0 < threshold {
            return false;
        }
        if let Some(min_samples) = options.min_samples {
            if h.samples < min_samples {
                return false;
            }
        }
        if let Some(regex) = &regex {
            let file_line = match (&h.frame.file, h.frame.line) {
                (Some(file), Some(line)) => format!("{file}:{line}"),
                (Some(file), None) => file.clone(),
                _ => String::new(),
            };
            if !regex.is_match(&h.frame.name) && !regex.is_match(&file_line) {
                return false;
            }
        }
        true
    });

    hotspots.sort_by(|a, b| {
        b.total_weight
            .partial_cmp(&a.total_weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hotspots.truncate(MAX_HOTSPOTS);

    Ok(hotspots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniprof_schema::Frame;

    fn hotspot(name: &str, total_weight: f64, samples: usize) -> Hotspot {
        Hotspot {
            frame: Frame::new(name),
            total_weight,
            self_weight: total_weight,
            samples,
            sample_weights: vec![total_weight / samples.max(1) as f64; samples],
        }
    }

    #[test]
    fn below_threshold_frames_are_dropped() {
        let hotspots = vec![hotspot("hot", 99.0, 10), hotspot("cold", 0.01, 1)];
        let result = filter_and_sort(hotspots, 100.0, &AnalyzeOptions::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].frame.name, "hot");
    }

    #[test]
    fn min_samples_filters_out_rare_frames() {
        let hotspots = vec![hotspot("frequent", 50.0, 20), hotspot("rare", 50.0, 1)];
        let options = AnalyzeOptions {
            min_samples: Some(5),
            threshold: Some(0.0),
            ..Default::default()
        };
        let result = filter_and_sort(hotspots, 100.0, &options).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].frame.name, "frequent");
    }

    #[test]
    fn invalid_regex_is_a_fatal_error() {
        let options = AnalyzeOptions {
            filter_regex: Some("(unclosed".to_string()),
            ..Default::default()
        };
        let result = filter_and_sort(Vec::new(), 100.0, &options);
        assert!(result.is_err());
    }

    #[test]
    fn results_sort_descending_and_cap_at_fifty() {
        let hotspots: Vec<Hotspot> = (0..60)
            .map(|i| hotspot(&format!("f{i}"), i as f64, 1))
            .collect();
        let options = AnalyzeOptions {
            threshold: Some(0.0),
            ..Default::default()
        };
        let result = filter_and_sort(hotspots, 1770.0, &options).unwrap();
        assert_eq!(result.len(), MAX_HOTSPOTS);
        assert_eq!(result[0].frame.name, "f59");
    }
}
