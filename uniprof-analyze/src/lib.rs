//! Unified hotspot analyzer (spec.md §4.6): works over both sampled and
//! evented canonical profiles, synthesizing samples from events first when
//! needed.

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod format;
pub mod synthesis;

pub use aggregate::Hotspot;
pub use error::AnalyzeError;
pub use filter::AnalyzeOptions;
pub use format::{AnalysisSummary, OutputFormat};

use uniprof_schema::{Profile, SpeedscopeFile};

/// Result of analyzing one canonical profile file: a rendered summary plus
/// its hotspots, ready for `format::render_pretty`/`render_json`.
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    pub hotspots: Vec<Hotspot>,
}

/// Runs the full analyzer pipeline over `file`'s first profile (spec.md
/// §4.6 "Input: a canonical profile file"). Evented profiles are synthesized
/// into sampled form before aggregation.
pub fn analyze(file: &SpeedscopeFile, options: &AnalyzeOptions) -> Result<AnalysisResult, AnalyzeError> {
    let Some(first) = file.profiles.first() else {
        return Err(AnalyzeError::EmptyProfile);
    };

    let profile_type = match first {
        Profile::Sampled(_) => "sampled",
        Profile::Evented(_) => "evented",
    };
    let total_events = match first {
        Profile::Evented(p) => Some(p.events.len()),
        Profile::Sampled(_) => None,
    };

    let mut samples: Vec<Vec<usize>> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    let mut unit = uniprof_schema::ValueUnit::None;

    for profile in &file.profiles {
        let sampled = match profile {
            Profile::Sampled(p) => p.clone(),
            Profile::Evented(p) => synthesis::synthesize(p),
        };
        unit = sampled.unit;
        samples.extend(sampled.samples);
        weights.extend(sampled.weights);
    }

    let total = aggregate::total_weight(&weights);
    let hotspots = if total <= 0.0 {
        Vec::new()
    } else {
        let aggregated = aggregate::aggregate(&file.shared.frames, &samples, &weights, options.max_depth);
        filter::filter_and_sort(aggregated, total, options)?
    };

    let summary = AnalysisSummary {
        total_samples: samples.len(),
        total_time: total,
        unit: unit_name(unit).to_string(),
        profile_name: file.name.clone().unwrap_or_default(),
        profiler: file.exporter.clone().unwrap_or_default(),
        thread_count: file.profiles.len(),
        profile_type: profile_type.to_string(),
        total_events,
    };

    Ok(AnalysisResult { summary, hotspots })
}

fn unit_name(unit: uniprof_schema::ValueUnit) -> &'static str {
    use uniprof_schema::ValueUnit;
    match unit {
        ValueUnit::None => "none",
        ValueUnit::Nanoseconds => "nanoseconds",
        ValueUnit::Microseconds => "microseconds",
        ValueUnit::Milliseconds => "milliseconds",
        ValueUnit::Seconds => "seconds",
        ValueUnit::Bytes => "bytes",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniprof_schema::{Frame, FrameTable, SampledProfile, ValueUnit};

    #[test]
    fn analyze_empty_profile_list_is_an_error() {
        let file = SpeedscopeFile::new("test", "uniprof");
        let result = analyze(&file, &AnalyzeOptions::default());
        assert!(matches!(result, Err(AnalyzeError::EmptyProfile)));
    }

    #[test]
    fn analyze_sampled_profile_produces_hotspots() {
        let mut frames = FrameTable::new();
        let main = frames.index_for(Frame::new("main"));
        let work = frames.index_for(Frame::new("do_work"));

        let mut profile = SampledProfile::new("thread 1", ValueUnit::Milliseconds);
        profile.push_sample(vec![main, work], 5.0);
        profile.push_sample(vec![main], 3.0);
        profile.end_value = 8.0;

        let file = SpeedscopeFile::from_frame_table(
            "test",
            "uniprof-python",
            frames,
            vec![Profile::Sampled(profile)],
        );

        let result = analyze(&file, &AnalyzeOptions::default()).unwrap();
        assert_eq!(result.summary.total_samples, 2);
        assert!(result.hotspots.iter().any(|h| h.frame.name == "main"));
    }
}
