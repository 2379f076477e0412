use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::info;

use crate::{
    confusion::{ConfusionMatrix, ConfusionRow},
    error::HmasError,
    input::csv_reader,
    metrics::{format_metric, parse_metric},
};

/// Column names of the confusion matrix output, after the unnamed sample column
pub const CONFUSION_COLUMNS: [&str; 8] = [
    "TP",
    "FP",
    "FN",
    "TN",
    "sensitivity",
    "specificity",
    "precision",
    "ACC",
];

impl ConfusionMatrix {
    /// Writes the matrix tab delimited, indexed by sample.  Undefined metrics are written as NA
    pub fn write_tsv(&self, path: &str) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .context(format!("Failed to create {}", path))?;
        let mut header = vec![""];
        header.extend_from_slice(&CONFUSION_COLUMNS);
        writer.write_record(&header)?;
        for row in &self.rows {
            let mut record = vec![
                row.sample.clone(),
                row.true_positive.to_string(),
                row.false_positive.to_string(),
                row.false_negative.to_string(),
                row.true_negative.to_string(),
            ];
            record.extend(row.metrics.values().iter().map(|metric| format_metric(*metric)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        info!("Wrote the confusion matrix of {} samples to {}", self.rows.len(), path);
        Ok(())
    }

    /// Reads a matrix written by `write_tsv`.  The metrics are recomputed from the counts and
    /// checked against the written values
    pub fn read_tsv(path: &str) -> Result<Self> {
        let mut reader = csv_reader(path, b'\t', true)?;
        let header = reader
            .headers()
            .map_err(|err| HmasError::format(path, 1, err.to_string()))?
            .clone();
        let columns = header.iter().skip(1).collect::<Vec<&str>>();
        if columns != CONFUSION_COLUMNS {
            return Err(HmasError::format(
                path,
                1,
                format!("expected the columns {}", CONFUSION_COLUMNS.join(", ")),
            )
            .into());
        }
        let mut rows = Vec::new();
        for (row_index, record_result) in reader.records().enumerate() {
            let line = row_index + 2;
            let record = record_result.map_err(|err| HmasError::format(path, line, err.to_string()))?;
            if record.len() != CONFUSION_COLUMNS.len() + 1 {
                return Err(HmasError::format(
                    path,
                    line,
                    format!("expected {} fields, found {}", CONFUSION_COLUMNS.len() + 1, record.len()),
                )
                .into());
            }
            let mut counts = [0usize; 4];
            for (count, field) in counts.iter_mut().zip(record.iter().skip(1)) {
                *count = field.trim().parse::<usize>().map_err(|_| {
                    HmasError::format(path, line, format!("'{}' is not a count", field))
                })?;
            }
            let row = ConfusionRow::new(&record[0], counts[0], counts[1], counts[2], counts[3]);
            for (written, computed) in record.iter().skip(5).zip(row.metrics.values().iter()) {
                match parse_metric(written) {
                    Some(metric) if metric == *computed => (),
                    _ => {
                        return Err(HmasError::format(
                            path,
                            line,
                            format!(
                                "metric '{}' does not agree with the counts of {}",
                                written, row.sample
                            ),
                        )
                        .into())
                    }
                }
            }
            rows.push(row);
        }
        Ok(ConfusionMatrix { rows })
    }
}

/// Fills the milliseconds with leading zeros so that it can follow a decimal point
///
/// # Example
/// ```
/// use hmas_tools::output::millisecond_decimal;
///
/// assert_eq!(millisecond_decimal(chrono::Duration::milliseconds(2_045)), "045");
/// ```
pub fn millisecond_decimal(elapsed_time: chrono::Duration) -> String {
    let milliseconds =
        (elapsed_time.num_milliseconds() - (elapsed_time.num_seconds() * 1000)).to_string();
    let mut final_string = String::new();
    for _ in milliseconds.chars().count()..3 {
        final_string.push('0');
    }
    final_string.push_str(&milliseconds);
    final_string
}

/// Time since `start_time` as 'h hours, m minutes, s.ms seconds'
pub fn elapsed_since(start_time: DateTime<Local>) -> String {
    let elapsed_time = Local::now() - start_time;
    format!(
        "{} hours, {} minutes, {}.{} seconds",
        elapsed_time.num_hours(),
        elapsed_time.num_minutes() % 60,
        elapsed_time.num_seconds() % 60,
        millisecond_decimal(elapsed_time)
    )
}
