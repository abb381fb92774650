//! Render aggregated results as a CSV download, one block per judge.

use crate::{PeriodRecord, ScoreResult, UserRecord};
use chrono::{DateTime, Utc};

/// Lets spreadsheet tools detect UTF-8.
const UTF8_BOM: &str = "\u{FEFF}";
const UNSCORED_LABEL: &str = "Unscored";

/// Accumulates CSV rows into a string.
#[derive(Debug, Default)]
struct CsvBuilder {
    out: String,
}

impl CsvBuilder {
    fn row(&mut self, fields: &[&str]) {
        let line = fields
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");
        self.out.push_str(&line);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

/// Quote a field if it contains a separator, a quote or a line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render the export for a period.
///
/// For every judge in `judges`, every presenter is listed with their totals and each
/// question shows the average next to that judge's own score. Pass a single judge
/// to export only their block.
pub fn render_csv(
    period: &PeriodRecord,
    results: &[ScoreResult],
    judges: &[UserRecord],
    exported_at: DateTime<Utc>,
) -> String {
    let mut csv = CsvBuilder {
        out: UTF8_BOM.to_string(),
    };

    csv.row(&["Period", &period.name]);
    let date_range = format!(
        "{} - {}",
        period.start_date.format("%Y-%m-%d"),
        period.end_date.format("%Y-%m-%d")
    );
    csv.row(&["Date range", &date_range]);
    let exported = exported_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    csv.row(&["Exported at", &exported]);
    csv.blank();

    for (index, judge) in judges.iter().enumerate() {
        if index > 0 {
            csv.blank();
        }
        csv.row(&["Judge", &judge.name]);
        csv.blank();

        for result in results {
            csv.row(&[
                "Presenter",
                &result.presenter_name,
                "Total average",
                &result.total_average.to_string(),
            ]);

            for category in &result.categories {
                csv.blank();
                csv.row(&[
                    "Category",
                    &category.category_name,
                    "Category total",
                    &category.category_total.to_string(),
                ]);
                csv.row(&["Question", "Average", "Judge score"]);

                for question in &category.scores {
                    let judge_score = question
                        .judge_scores
                        .iter()
                        .find(|js| js.judge_id == judge.user_id)
                        .filter(|js| js.score > 0.0)
                        .map_or_else(|| UNSCORED_LABEL.to_string(), |js| format!("{:.1}", js.score));
                    csv.row(&[
                        &question.question_title,
                        &question.average_score.to_string(),
                        &judge_score,
                    ]);
                }
            }

            csv.blank();
        }
    }

    csv.out
}

/// A download name that is safe to put in a header.
pub fn export_filename(period: &PeriodRecord, exported_at: DateTime<Utc>) -> String {
    let name: String = period
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("scores_{name}_{}.csv", exported_at.timestamp_millis())
}
