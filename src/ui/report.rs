//! End-of-run failure table.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::download::models::BatchReport;

#[derive(Tabled)]
struct FailureRow<'a> {
    #[tabled(rename = "Fail Status")]
    status: String,
    #[tabled(rename = "URL")]
    url: &'a str,
}

/// Not-found rows first, then everything else. `None` when nothing failed.
pub fn failure_table(report: &BatchReport) -> Option<String> {
    if report.failures.is_empty() {
        return None;
    }
    let rows: Vec<FailureRow> = report
        .not_found()
        .chain(report.other_failures())
        .map(|f| FailureRow {
            status: f.category.to_string(),
            url: &f.url,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    Some(table.to_string())
}

pub fn summary_line(report: &BatchReport) -> String {
    format!(
        "{} archived, {} already present, {} not found, {} failed",
        report.archived.len(),
        report.skipped.len(),
        report.not_found().count(),
        report.other_failures().count()
    )
}

pub fn print_report(report: &BatchReport) {
    if let Some(table) = failure_table(report) {
        println!("{table}");
    }
    println!("{}", summary_line(report));
}
