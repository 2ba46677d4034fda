//! Results reporting and formatting.

use crate::metrics::RunSummary;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Formats run summaries for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(summary: &RunSummary) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Loadgen Results: {}", summary.scenario)]);

        table.add_row(vec![
            "Duration:",
            &format!(
                "{:.1}s of {:.1}s{}",
                summary.elapsed_secs,
                summary.configured_duration_secs,
                if summary.cancelled { " (cancelled)" } else { "" }
            ),
        ]);
        table.add_row(vec!["Workers:", &summary.workers.to_string()]);
        table.add_row(vec!["Target Rate:", &format!("{}/s", summary.target_rate)]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Trees:", &summary.trees.to_string()]);
        table.add_row(vec!["Units:", &summary.units.to_string()]);
        table.add_row(vec!["Log Records:", &summary.logs.to_string()]);
        table.add_row(vec![
            "Units/sec:",
            &format!("{:.1}", summary.units_per_second),
        ]);
        table.add_row(vec![
            "Trees/sec:",
            &format!("{:.1}", summary.trees_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Tree Latency (ms)", "p50 / p90 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1}",
                summary.tree_latency_p50,
                summary.tree_latency_p90,
                summary.tree_latency_p99,
                summary.tree_latency_max
            ),
        ]);

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(summary: &RunSummary) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }
}
