use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};
use std::path::Path;

use crate::{
    count_table::{CountTable, SamplePrimerMatrix},
    error::HmasError,
    input::csv_reader,
    metrics::{round3, round_half_even},
};

/// Index label of the row appended to run level reports
pub const RUN_MEAN_ROW: &str = "Mean read depth across entire run";

/// Which amplicon threshold the report headers describe
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportKind {
    Run,    // all samples of a confusion matrix run
    Sample, // one sample straight from its count table
}

impl ReportKind {
    fn header(&self) -> [&'static str; 3] {
        match self {
            ReportKind::Run => [
                "Mean read depth",
                "% of successful primer-pairs\n(has at least 10 amplicons across all samples)",
                "# of primer pairs with less than 10 amplicons mapping\nover total primer-pairs",
            ],
            ReportKind::Sample => [
                "Mean read depth",
                "% of successful primer-pairs\n(has at least 2 amplicons in the sample)",
                "# of primer pairs with less than 2 amplicons mapping\nover total primer-pairs",
            ],
        }
    }
}

/// Read depth summary of one sample
#[derive(Debug, Clone, PartialEq)]
pub struct DepthRow {
    pub sample: String,
    pub mean_depth: f64, // rounded to one decimal
    pub failed: usize,   // primer pairs without any amplicon
    pub panel_size: usize,
}

impl DepthRow {
    /// Summarises the per primer totals of a sample.  Empty cells count as zero depth and as
    /// failed, and so does every panel primer that has no column at all
    ///
    /// # Example
    /// ```
    /// use hmas_tools::reports::DepthRow;
    ///
    /// let row = DepthRow::from_cells("S1", &[Some(10), None, Some(5)], 4);
    /// assert_eq!(row.mean_depth, 5.0);
    /// assert_eq!(row.failed, 2);
    /// assert_eq!(row.percent_successful(), 0.5);
    /// ```
    pub fn from_cells(sample: &str, cells: &[Option<u64>], panel_size: usize) -> Self {
        let mean_depth = if cells.is_empty() {
            0.0
        } else {
            let total = cells.iter().map(|cell| cell.unwrap_or(0)).sum::<u64>();
            round_half_even(total as f64 / cells.len() as f64, 1)
        };
        let blank = cells.iter().filter(|cell| cell.is_none()).count();
        DepthRow {
            sample: sample.to_string(),
            mean_depth,
            failed: blank + panel_size.saturating_sub(cells.len()),
            panel_size,
        }
    }

    /// Fraction of the panel with amplicons, rounded to three decimals
    pub fn percent_successful(&self) -> f64 {
        if self.panel_size == 0 {
            return 0.0;
        }
        round3(1.0 - self.failed as f64 / self.panel_size as f64)
    }

    fn record(&self) -> Vec<String> {
        vec![
            self.sample.clone(),
            format!("{:.1}", self.mean_depth),
            self.percent_successful().to_string(),
            format!("{} / {}", self.failed, self.panel_size),
        ]
    }
}

/// Mean of the sample means, rounded to the nearest integer with ties to even
pub fn run_mean(means: &[f64]) -> i64 {
    if means.is_empty() {
        return 0;
    }
    let mean = means.iter().sum::<f64>() / means.len() as f64;
    round_half_even(mean, 0) as i64
}

/// Read depth report for the state public health labs
#[derive(Debug, Clone, PartialEq)]
pub struct DepthReport {
    pub kind: ReportKind,
    pub rows: Vec<DepthRow>,
}

impl DepthReport {
    /// Run level report of every sample within the raw sample x primer totals
    pub fn from_matrix(raw: &SamplePrimerMatrix, panel_size: usize) -> Self {
        let rows = raw
            .samples()
            .iter()
            .map(|sample| {
                DepthRow::from_cells(sample, raw.row(sample).unwrap_or(&[]), panel_size)
            })
            .collect();
        DepthReport {
            kind: ReportKind::Run,
            rows,
        }
    }

    /// Report of a single sample from a count table holding only that sample's columns
    pub fn for_sample(sample: &str, table: &CountTable, panel_size: usize) -> Self {
        let cells = table
            .column_totals()
            .values()
            .map(|total| Some(*total))
            .collect::<Vec<Option<u64>>>();
        DepthReport {
            kind: ReportKind::Sample,
            rows: vec![DepthRow::from_cells(sample, &cells, panel_size)],
        }
    }

    /// Writes the report csv.  Run level reports end with the mean read depth of the run
    pub fn write_csv(&self, path: &str) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).context(format!("Failed to create {}", path))?;
        let mut header = vec![""];
        header.extend_from_slice(&self.kind.header());
        writer.write_record(&header)?;
        for row in &self.rows {
            writer.write_record(&row.record())?;
        }
        if self.kind == ReportKind::Run {
            let means = self.rows.iter().map(|row| row.mean_depth).collect::<Vec<f64>>();
            let depth = run_mean(&means).to_string();
            writer.write_record(&[RUN_MEAN_ROW, depth.as_str(), "", ""])?;
        }
        writer.flush()?;
        info!("Wrote the read depth report of {} samples to {}", self.rows.len(), path);
        Ok(())
    }
}

/// Report files are written with a '.csv' extension
pub fn report_path(path: &str) -> String {
    if Path::new(path)
        .extension()
        .map(|extension| extension.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
    {
        path.to_string()
    } else {
        format!("{}.csv", path)
    }
}

/// Creates the read depth report of one sample from its count table
pub fn create_sample_report(
    sample: &str,
    count_table_path: &str,
    oligo_path: &str,
    output: &str,
) -> Result<String> {
    let panel = crate::primers::PrimerPanel::load(oligo_path)?;
    let table = CountTable::load(count_table_path)?;
    let report = DepthReport::for_sample(sample, &table, panel.len());
    let path = report_path(output);
    report.write_csv(&path)?;
    Ok(path)
}

/// A csv with a header, read as text
#[derive(Debug, Clone, PartialEq)]
struct CsvTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_csv_table(path: &str) -> Result<CsvTable> {
    let mut reader = csv_reader(path, b',', true)?;
    let header = reader
        .headers()
        .map_err(|err| HmasError::format(path, 1, err.to_string()))?
        .iter()
        .map(|field| field.to_string())
        .collect::<Vec<String>>();
    let mut rows = Vec::new();
    for (row_index, record_result) in reader.records().enumerate() {
        let record =
            record_result.map_err(|err| HmasError::format(path, row_index + 2, err.to_string()))?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(CsvTable { header, rows })
}

// Concatenates tables, lining up the columns by name.  Columns appear in order of first sight and
// rows without a column get an empty field
fn concat_tables(paths: &[String]) -> Result<CsvTable> {
    if paths.is_empty() {
        return Err(HmasError::configuration("reports", "no files to combine").into());
    }
    let tables = paths
        .iter()
        .map(|path| read_csv_table(path))
        .collect::<Result<Vec<CsvTable>>>()?;
    let header = tables
        .iter()
        .flat_map(|table| table.header.iter().skip(1).cloned())
        .unique()
        .collect::<Vec<String>>();
    let index_name = tables[0].header.first().cloned().unwrap_or_default();
    let mut rows = Vec::new();
    for table in &tables {
        for row in &table.rows {
            let mut combined = vec![row.first().cloned().unwrap_or_default()];
            for column in &header {
                let field = table
                    .header
                    .iter()
                    .skip(1)
                    .position(|name| name == column)
                    .and_then(|position| row.get(position + 1))
                    .cloned()
                    .unwrap_or_default();
                combined.push(field);
            }
            rows.push(combined);
        }
    }
    let mut full_header = vec![index_name];
    full_header.extend(header);
    Ok(CsvTable {
        header: full_header,
        rows,
    })
}

fn write_table(table: &CsvTable, path: &str, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .context(format!("Failed to create {}", path))?;
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Concatenates the per sample reports into one run report and appends the mean read depth of the
/// run
pub fn combine_reports(reports: &[String], output: &str) -> Result<()> {
    let mut combined = concat_tables(reports)?;
    let mut means = Vec::new();
    for row in &combined.rows {
        match row.get(1).and_then(|field| field.trim().parse::<f64>().ok()) {
            Some(mean) => means.push(mean),
            None => warn!("Report row {} has no mean read depth", row.first().map(String::as_str).unwrap_or("")),
        }
    }
    let mut mean_row = vec![RUN_MEAN_ROW.to_string(), run_mean(&means).to_string()];
    mean_row.resize(combined.header.len(), String::new());
    combined.rows.push(mean_row);
    write_table(&combined, output, b',')?;
    info!("Combined {} reports into {}", reports.len(), output);
    Ok(())
}

/// Concatenates the per sample log csv files into one tab delimited table
pub fn combine_logs(logs: &[String], output: &str) -> Result<()> {
    let combined = concat_tables(logs)?;
    write_table(&combined, output, b'\t')?;
    info!("Combined {} logs into {}", logs.len(), output);
    Ok(())
}
