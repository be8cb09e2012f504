//! Output formatting for history entries and run summaries (table, JSON, markdown, CSV).

use crate::commands::run::RunSummary;
use crate::config::OutputFormat;
use crate::history::HistoryEntry;
use serde::Serialize;

/// Formats command output.
pub struct Formatter {
    format: OutputFormat,
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    id: &'a str,
    #[serde(flatten)]
    entry: &'a HistoryEntry,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats stored history entries.
    pub fn format_history(&self, entries: &[(String, HistoryEntry)], currency: &str) -> String {
        if entries.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => Self::history_csv_header().to_string(),
                _ => "History is empty.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => self.json_history(entries),
            OutputFormat::Table => self.table_history(entries, currency),
            OutputFormat::Markdown => self.markdown_history(entries, currency),
            OutputFormat::Csv => self.csv_history(entries),
        }
    }

    /// Formats the result of a scrape run.
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Table => self.table_summary(summary),
            OutputFormat::Markdown => self.markdown_summary(summary),
            OutputFormat::Csv => self.csv_summary(summary),
        }
    }

    // JSON formatting

    fn json_history(&self, entries: &[(String, HistoryEntry)]) -> String {
        let rows: Vec<HistoryRow<'_>> =
            entries.iter().map(|(id, entry)| HistoryRow { id, entry }).collect();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    // Table formatting

    fn table_history(&self, entries: &[(String, HistoryEntry)], currency: &str) -> String {
        let id_width = 12;
        let price_width = 12;
        let floor_width = 12;
        let seen_width = 16;
        let name_width = 50;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<id_width$}  {:>price_width$}  {:>floor_width$}  {:<seen_width$}  {}",
            "ID", "Last seen", "Drop floor", "Updated", "Name"
        ));
        lines.push(format!(
            "{:-<id_width$}  {:-<price_width$}  {:-<floor_width$}  {:-<seen_width$}  {:-<name_width$}",
            "", "", "", "", ""
        ));

        for (id, entry) in entries {
            let floor = entry
                .last_notified_price_for_drop
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "-".to_string());

            lines.push(format!(
                "{:<id_width$}  {:>price_width$}  {:>floor_width$}  {:<seen_width$}  {}",
                id,
                format!("{:.2}", entry.last_seen_price),
                floor,
                entry.last_updated.format("%Y-%m-%d %H:%M").to_string(),
                truncate(&entry.name, name_width)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} entries (prices in {})", entries.len(), currency));

        lines.join("\n")
    }

    fn table_summary(&self, summary: &RunSummary) -> String {
        let label_width = 20;
        let num_width = 7;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<label_width$}  {:>num_width$}  {:>num_width$}  {:>num_width$}  {:>num_width$}  {}",
            "Source", "Pages", "Items", "Skipped", "Alerts", "Outcome"
        ));
        lines.push(format!(
            "{:-<label_width$}  {:-<num_width$}  {:-<num_width$}  {:-<num_width$}  {:-<num_width$}  {:-<30}",
            "", "", "", "", "", ""
        ));

        for report in &summary.reports {
            lines.push(format!(
                "{:<label_width$}  {:>num_width$}  {:>num_width$}  {:>num_width$}  {:>num_width$}  {}",
                truncate(&report.label, label_width),
                report.pages_loaded,
                report.items_qualifying,
                report.items_skipped,
                report.notifications,
                report.outcome
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Sources: {} ({} failed)  Notifications: {}  Persistence warnings: {}",
            summary.sources_total, summary.sources_failed, summary.notifications, summary.persist_warnings
        ));
        if summary.interrupted {
            lines.push("Run interrupted before all sources finished.".to_string());
        }

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_history(&self, entries: &[(String, HistoryEntry)], currency: &str) -> String {
        let mut lines = Vec::new();

        lines.push(format!("| ID | Last seen ({}) | Drop floor | Condition | Name |", currency));
        lines.push("|----|-----------|------------|-----------|------|".to_string());

        for (id, entry) in entries {
            let floor = entry
                .last_notified_price_for_drop
                .map(|p| format!("{:.2}", p))
                .unwrap_or_default();

            lines.push(format!(
                "| {} | {:.2} | {} | {} | [{}]({}) |",
                id,
                entry.last_seen_price,
                floor,
                entry.last_seen_condition,
                truncate(&entry.name, 40),
                entry.url
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{} entries*", entries.len()));

        lines.join("\n")
    }

    fn markdown_summary(&self, summary: &RunSummary) -> String {
        let mut lines = Vec::new();

        lines.push("| Source | Pages | Items | Skipped | Alerts | Outcome |".to_string());
        lines.push("|--------|-------|-------|---------|--------|---------|".to_string());

        for report in &summary.reports {
            lines.push(format!(
                "| {} | {} | {} | {} | {} | {} |",
                report.label,
                report.pages_loaded,
                report.items_qualifying,
                report.items_skipped,
                report.notifications,
                report.outcome
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "*{} sources, {} failed, {} notifications*",
            summary.sources_total, summary.sources_failed, summary.notifications
        ));

        lines.join("\n")
    }

    // CSV formatting

    fn history_csv_header() -> &'static str {
        "id,name,last_seen_price,last_notified_price_for_drop,condition,source,last_updated,url"
    }

    fn csv_history(&self, entries: &[(String, HistoryEntry)]) -> String {
        let mut lines = Vec::new();
        lines.push(Self::history_csv_header().to_string());

        for (id, entry) in entries {
            let floor = entry
                .last_notified_price_for_drop
                .map(|p| p.to_string())
                .unwrap_or_default();

            lines.push(format!(
                "{},{},{},{},{},{},{},{}",
                id,
                Self::csv_escape(&entry.name),
                entry.last_seen_price,
                floor,
                Self::csv_escape(&entry.last_seen_condition),
                Self::csv_escape(&entry.source_last_seen),
                entry.last_updated.to_rfc3339(),
                entry.url
            ));
        }

        lines.join("\n")
    }

    fn csv_summary(&self, summary: &RunSummary) -> String {
        let mut lines = Vec::new();
        lines.push(
            "source,pages,items_seen,items_qualifying,items_skipped,notifications,delivery_failures,outcome"
                .to_string(),
        );

        for report in &summary.reports {
            lines.push(format!(
                "{},{},{},{},{},{},{},{}",
                Self::csv_escape(&report.label),
                report.pages_loaded,
                report.items_seen,
                report.items_qualifying,
                report.items_skipped,
                report.notifications,
                report.delivery_failures,
                Self::csv_escape(&report.outcome.to_string())
            ));
        }

        lines.join("\n")
    }

    fn csv_escape(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

/// Shortens `s` to `max` characters, marking the cut with "...".
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
