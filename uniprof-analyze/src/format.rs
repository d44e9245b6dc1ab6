//! Pretty and JSON rendering of an analysis result (spec.md §4.6 "Output").

use comfy_table::{Cell, ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::aggregate::Hotspot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_samples: usize,
    pub total_time: f64,
    pub unit: String,
    pub profile_name: String,
    pub profiler: String,
    pub thread_count: usize,
    pub profile_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_events: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonHotspot {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    total_weight: f64,
    self_weight: f64,
    total_percent: f64,
    self_percent: f64,
    samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    p50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p90: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p99: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
struct AnalysisDocument {
    summary: AnalysisSummary,
    hotspots: Vec<JsonHotspot>,
}

/// `>10%` red, `>5%` yellow, else default (spec.md §4.6 "color escalation on
/// percentage cells").
fn colorize_percent(value: f64) -> String {
    let text = format!("{value:.2}%");
    if value > 10.0 {
        text.red().to_string()
    } else if value > 5.0 {
        text.yellow().to_string()
    } else {
        text
    }
}

/// Renders a comfy-table with color-escalated percentage columns. Percentile
/// columns only appear when at least one hotspot has percentiles.
pub fn render_pretty(summary: &AnalysisSummary, hotspots: &[Hotspot]) -> String {
    let show_percentiles = hotspots.iter().any(|h| h.percentiles().is_some());

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec!["Frame", "Location", "Total %", "Self %", "Samples"];
    if show_percentiles {
        header.extend(["p50", "p90", "p99"]);
    }
    table.set_header(header);

    for hotspot in hotspots {
        let total_percent = percent(hotspot.total_weight, summary.total_time);
        let self_percent = percent(hotspot.self_weight, summary.total_time);
        let location = match (&hotspot.frame.file, hotspot.frame.line) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            (Some(file), None) => file.clone(),
            _ => String::new(),
        };

        let mut row = vec![
            Cell::new(&hotspot.frame.name),
            Cell::new(location),
            Cell::new(colorize_percent(total_percent)),
            Cell::new(colorize_percent(self_percent)),
            Cell::new(hotspot.samples.to_string()),
        ];
        if show_percentiles {
            match hotspot.percentiles() {
                Some((p50, p90, p99)) => {
                    row.push(Cell::new(format!("{p50:.3}")));
                    row.push(Cell::new(format!("{p90:.3}")));
                    row.push(Cell::new(format!("{p99:.3}")));
                }
                None => {
                    row.push(Cell::new("-"));
                    row.push(Cell::new("-"));
                    row.push(Cell::new("-"));
                }
            }
        }
        table.add_row(row);
    }

    format!(
        "{} ({} samples, {:.3} {} total)\n{}",
        summary.profile_name, summary.total_samples, summary.total_time, summary.unit, table
    )
}

/// Single JSON document: `{summary, hotspots}` (spec.md §4.6 "a single JSON
/// document with summary ... and hotspots[]").
pub fn render_json(summary: &AnalysisSummary, hotspots: &[Hotspot]) -> Result<String, serde_json::Error> {
    let json_hotspots = hotspots
        .iter()
        .map(|h| {
            let (p50, p90, p99) = match h.percentiles() {
                Some((a, b, c)) => (Some(a), Some(b), Some(c)),
                None => (None, None, None),
            };
            JsonHotspot {
                name: h.frame.name.clone(),
                file: h.frame.file.clone(),
                line: h.frame.line,
                total_weight: h.total_weight,
                self_weight: h.self_weight,
                total_percent: percent(h.total_weight, summary.total_time),
                self_percent: percent(h.self_weight, summary.total_time),
                samples: h.samples,
                p50,
                p90,
                p99,
            }
        })
        .collect();

    let document = AnalysisDocument {
        summary: summary.clone(),
        hotspots: json_hotspots,
    };
    serde_json::to_string_pretty(&document)
}

fn percent(part: f64, total: f64) -> f64 {
    if total <= 0.0 {
        0.0
    } else {
        (part / total) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniprof_schema::Frame;

    fn summary() -> AnalysisSummary {
        AnalysisSummary {
            total_samples: 10,
            total_time: 1.0,
            unit: "seconds".to_string(),
            profile_name: "app".to_string(),
            profiler: "python".to_string(),
            thread_count: 1,
            profile_type: "sampled".to_string(),
            total_events: None,
        }
    }

    #[test]
    fn pretty_output_includes_profile_name_and_total() {
        let hotspots = vec![Hotspot {
            frame: Frame::new("main"),
            total_weight: 0.5,
            self_weight: 0.5,
            samples: 5,
            sample_weights: vec![0.1; 5],
        }];
        let rendered = render_pretty(&summary(), &hotspots);
        assert!(rendered.contains("app"));
        assert!(rendered.contains("main"));
    }

    #[test]
    fn json_output_is_valid_and_includes_percent_fields() {
        let hotspots = vec![Hotspot {
            frame: Frame::new("main"),
            total_weight: 0.5,
            self_weight: 0.25,
            samples: 5,
            sample_weights: vec![0.1; 5],
        }];
        let json = render_json(&summary(), &hotspots).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["hotspots"][0]["name"], "main");
        assert!((parsed["hotspots"][0]["totalPercent"].as_f64().unwrap() - 50.0).abs() < 1e-9);
    }
}
