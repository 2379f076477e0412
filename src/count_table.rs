use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info, warn};
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    time::UNIX_EPOCH,
};

use crate::{
    error::HmasError,
    input::{csv_reader, open_reader, sort_case_insensitive},
};

/// Separator between the sample and the primer within count table column names
pub const SAMPLE_PRIMER_SEPARATOR: char = '.';

/// Splits a 'sample.primer' column name into its sample and primer
///
/// # Example
/// ```
/// use hmas_tools::count_table::split_sample_primer;
///
/// assert_eq!(split_sample_primer("2014K_0979.OG0000294primerGroup8"), Some(("2014K_0979", "OG0000294primerGroup8")));
/// assert_eq!(split_sample_primer("seq"), None);
/// ```
pub fn split_sample_primer(column: &str) -> Option<(&str, &str)> {
    column.split_once(SAMPLE_PRIMER_SEPARATOR)
}

/// Joins a sample and a primer into the count table column name
pub fn join_sample_primer(sample: &str, primer: &str) -> String {
    format!("{}{}{}", sample, SAMPLE_PRIMER_SEPARATOR, primer)
}

/// One representative sequence and its abundance within every 'sample.primer' column.  `None` is
/// a blank cell, which means never observed, and is different from an observed count of zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRow {
    pub seq: String,
    pub counts: Vec<Option<u64>>,
}

/// The full format count table.  Rows are keyed by the sequence ID and columns by 'sample.primer'
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CountTable {
    columns: Vec<String>,
    rows: Vec<CountRow>,
}

// Size and modification time of the parsed count table.  A cache is only trusted if these match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SourceFingerprint {
    len: u64,
    modified_secs: u64,
    modified_nanos: u32,
}

impl SourceFingerprint {
    fn of(path: &str) -> Result<Self> {
        let metadata = fs::metadata(path).context(format!("Failed to read metadata of {}", path))?;
        let modified = metadata
            .modified()
            .context(format!("Modification time not available for {}", path))?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Ok(SourceFingerprint {
            len: metadata.len(),
            modified_secs: modified.as_secs(),
            modified_nanos: modified.subsec_nanos(),
        })
    }
}

/// Path of the binary cache written next to a count table
pub fn cache_path(count_table_path: &str) -> String {
    format!("{}.bin", count_table_path)
}

impl CountTable {
    pub fn new(columns: Vec<String>, rows: Vec<CountRow>) -> Self {
        CountTable { columns, rows }
    }

    /// Reads a tab delimited full format count table.  The first column holds the sequence IDs and
    /// every other column is named 'sample.primer'.  A mothur 'total' column is skipped
    pub fn load(path: &str) -> Result<Self> {
        info!("Loading count table {}", path);
        let mut reader = csv_reader(path, b'\t', true)?;
        let header = reader
            .headers()
            .map_err(|err| HmasError::format(path, 1, err.to_string()))?
            .clone();
        if header.len() < 2 || header[0].trim() != "seq" {
            return Err(HmasError::format(
                path,
                1,
                "expected a 'seq' column followed by 'sample.primer' columns",
            )
            .into());
        }

        // (field index, column name) of every count column to keep
        let mut kept_fields = Vec::new();
        for (field_index, column) in header.iter().enumerate().skip(1) {
            let column = column.trim();
            if column.eq_ignore_ascii_case("total") {
                debug!("Skipping the total column of {}", path);
                continue;
            }
            if split_sample_primer(column).is_none() {
                return Err(HmasError::format(
                    path,
                    1,
                    format!("column '{}' is not in the 'sample.primer' format", column),
                )
                .into());
            }
            kept_fields.push((field_index, column.to_string()));
        }

        let mut rows = Vec::new();
        for (row_index, record_result) in reader.records().enumerate() {
            // header is line 1
            let line = row_index + 2;
            let record = record_result.map_err(|err| HmasError::format(path, line, err.to_string()))?;
            let seq = record.get(0).unwrap_or("").trim().to_string();
            if seq.is_empty() {
                continue;
            }
            let mut counts = Vec::with_capacity(kept_fields.len());
            for (field_index, _) in &kept_fields {
                let cell = record.get(*field_index).unwrap_or("");
                counts.push(parse_count(cell).map_err(|reason| HmasError::format(path, line, reason))?);
            }
            rows.push(CountRow { seq, counts });
        }
        let columns = kept_fields.into_iter().map(|(_, column)| column).collect();
        let table = CountTable { columns, rows };
        info!(
            "Count table contains {} sequences and {} sample.primer columns",
            table.rows.len().to_formatted_string(&Locale::en),
            table.columns.len().to_formatted_string(&Locale::en)
        );
        Ok(table)
    }

    /// Loads the count table through the binary cache at '<path>.bin'.  The cache is used when it
    /// was written from a source of the same size and modification time, otherwise the table is
    /// parsed again and the cache is rewritten
    pub fn load_cached(path: &str) -> Result<Self> {
        let fingerprint = SourceFingerprint::of(path)?;
        let cache = cache_path(path);
        if Path::new(&cache).is_file() {
            match read_cache(&cache) {
                Ok((cached_fingerprint, table)) if cached_fingerprint == fingerprint => {
                    info!("Loaded count table from cache {}", cache);
                    return Ok(table);
                }
                Ok(_) => info!("Cache {} is out of date with {}, reparsing", cache, path),
                Err(err) => warn!("Ignoring unreadable cache {}: {:#}", cache, err),
            }
        }
        let table = CountTable::load(path)?;
        if let Err(err) = table.write_cache(path) {
            warn!("Failed to write count table cache {}: {:#}", cache, err);
        }
        Ok(table)
    }

    /// Writes the binary cache for the count table found at `count_table_path`
    pub fn write_cache(&self, count_table_path: &str) -> Result<()> {
        let fingerprint = SourceFingerprint::of(count_table_path)?;
        let cache = cache_path(count_table_path);
        let mut writer =
            BufWriter::new(File::create(&cache).context(format!("Failed to create {}", cache))?);
        bincode::serialize_into(&mut writer, &fingerprint)?;
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        debug!("Wrote count table cache {}", cache);
        Ok(())
    }

    /// Builds a count table from a vsearch match file.  Each line is 'target<TAB>query' where the
    /// query header is 'read_id=primer=sample', as written after primer removal.  Counts are the
    /// number of reads of each sample.primer represented by the target sequence
    pub fn from_match_file(path: &str) -> Result<Self> {
        let mut target_counts: BTreeMap<String, AHashMap<String, u64>> = BTreeMap::new();
        let mut sample_primers = BTreeSet::new();
        for (line_index, line_result) in open_reader(path)?.lines().enumerate() {
            let line = line_result.context(format!("Failed to read line from {}", path))?;
            if line.trim().is_empty() {
                continue;
            }
            let (target, query) = line
                .split('\t')
                .take(2)
                .collect_tuple()
                .ok_or_else(|| HmasError::format(path, line_index + 1, "expected target and query columns"))?;
            let query_fields = query.trim().split('=').collect::<Vec<&str>>();
            if query_fields.len() < 3 {
                return Err(HmasError::format(
                    path,
                    line_index + 1,
                    format!("query '{}' is not in the 'read_id=primer=sample' format", query),
                )
                .into());
            }
            let sample_primer = join_sample_primer(query_fields[2], query_fields[1]);
            *target_counts
                .entry(target.trim().to_string())
                .or_default()
                .entry(sample_primer.clone())
                .or_insert(0) += 1;
            sample_primers.insert(sample_primer);
        }
        if target_counts.is_empty() {
            return Err(HmasError::EmptyInput {
                path: path.to_string(),
            }
            .into());
        }

        let columns = sample_primers.into_iter().collect::<Vec<String>>();
        let rows = target_counts
            .into_iter()
            .map(|(seq, counts)| CountRow {
                counts: columns
                    .iter()
                    .map(|column| Some(*counts.get(column).unwrap_or(&0)))
                    .collect(),
                seq,
            })
            .collect::<Vec<CountRow>>();
        info!(
            "Built count table of {} unique sequences across {} sample.primer pairs",
            rows.len().to_formatted_string(&Locale::en),
            columns.len().to_formatted_string(&Locale::en)
        );
        Ok(CountTable { columns, rows })
    }

    /// Keeps only the columns which belong to one of the samples
    pub fn restrict_to_samples(&self, samples: &[String]) -> CountTable {
        let samples = samples.iter().map(|sample| sample.as_str()).collect::<AHashSet<&str>>();
        let kept = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| {
                split_sample_primer(column)
                    .map(|(sample, _)| samples.contains(sample))
                    .unwrap_or(false)
            })
            .map(|(index, _)| index)
            .collect::<Vec<usize>>();
        CountTable {
            columns: kept.iter().map(|&index| self.columns[index].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| CountRow {
                    seq: row.seq.clone(),
                    counts: kept.iter().map(|&index| row.counts[index]).collect(),
                })
                .collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[CountRow] {
        &self.rows
    }

    /// Total abundance of every column.  Blank cells add nothing
    pub fn column_totals(&self) -> BTreeMap<String, u64> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let total = self
                    .rows
                    .iter()
                    .filter_map(|row| row.counts[index])
                    .sum::<u64>();
                (column.clone(), total)
            })
            .collect()
    }

    /// Long format view of the table: (sequence ID, sample.primer, count) for every filled cell
    pub fn melt(&self) -> impl Iterator<Item = (&str, &str, u64)> + '_ {
        self.rows.iter().flat_map(move |row| {
            row.counts
                .iter()
                .zip(self.columns.iter())
                .filter_map(move |(count, column)| {
                    count.map(|count| (row.seq.as_str(), column.as_str(), count))
                })
        })
    }

    /// Writes the table tab delimited with 'seq' as the first column.  Blank cells stay blank
    pub fn write_tsv(&self, path: &str) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .context(format!("Failed to create {}", path))?;
        let mut header = vec!["seq".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;
        for row in &self.rows {
            let mut record = vec![row.seq.clone()];
            record.extend(
                row.counts
                    .iter()
                    .map(|count| count.map(|count| count.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_cache(cache: &str) -> Result<(SourceFingerprint, CountTable)> {
    let mut reader =
        BufReader::new(File::open(cache).context(format!("Failed to open {}", cache))?);
    let fingerprint: SourceFingerprint = bincode::deserialize_from(&mut reader)?;
    let table: CountTable = bincode::deserialize_from(&mut reader)?;
    Ok((fingerprint, table))
}

// Parses a count cell.  Blank is None.  Integral floats, as written by dataframe libraries, are accepted
fn parse_count(cell: &str) -> Result<Option<u64>, String> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    if let Ok(count) = cell.parse::<u64>() {
        return Ok(Some(count));
    }
    match cell.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 => Ok(Some(value as u64)),
        _ => Err(format!("'{}' is not a non-negative integer count", cell)),
    }
}

/// A samples x primers view of per 'sample.primer' totals.  A cell is the total when the
/// 'sample.primer' has a total, zero when the column only exists within the raw table, and empty
/// when the sample never had the column
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePrimerMatrix {
    samples: Vec<String>,
    primers: Vec<String>,
    cells: Vec<Vec<Option<u64>>>, // cells[sample][primer]
}

impl SamplePrimerMatrix {
    /// Creates the matrix for the samples.  The primers are all primers found within the totals,
    /// sorted case-insensitively
    pub fn from_totals(
        totals: &BTreeMap<String, u64>,
        samples: &[String],
        raw_columns: &BTreeSet<String>,
    ) -> Self {
        let mut primers = totals
            .keys()
            .filter_map(|column| split_sample_primer(column).map(|(_, primer)| primer.to_string()))
            .unique()
            .collect::<Vec<String>>();
        sort_case_insensitive(&mut primers);

        let cells = samples
            .iter()
            .map(|sample| {
                primers
                    .iter()
                    .map(|primer| {
                        let column = join_sample_primer(sample, primer);
                        if let Some(total) = totals.get(&column) {
                            Some(*total)
                        } else if raw_columns.contains(&column) {
                            Some(0)
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .collect();
        SamplePrimerMatrix {
            samples: samples.to_vec(),
            primers,
            cells,
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn primers(&self) -> &[String] {
        &self.primers
    }

    /// Cells of one sample in the order of `primers()`.  Unknown samples have no row
    pub fn row(&self, sample: &str) -> Option<&[Option<u64>]> {
        self.samples
            .iter()
            .position(|known| known == sample)
            .map(|index| self.cells[index].as_slice())
    }

    /// Primers with a nonzero total for the sample
    pub fn observed(&self, sample: &str) -> BTreeSet<String> {
        match self.row(sample) {
            Some(row) => row
                .iter()
                .zip(self.primers.iter())
                .filter(|(cell, _)| cell.unwrap_or(0) > 0)
                .map(|(_, primer)| primer.clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Mean of a sample row with empty cells counted as zero
    pub fn row_mean(&self, sample: &str) -> f64 {
        match self.row(sample) {
            Some(row) if !row.is_empty() => {
                row.iter().map(|cell| cell.unwrap_or(0)).sum::<u64>() as f64 / row.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Writes the matrix tab delimited with a trailing 'mean' column.  Used for debugging runs
    pub fn write_tsv(&self, path: &str) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .context(format!("Failed to create {}", path))?;
        let mut header = vec![String::new()];
        header.extend(self.primers.iter().cloned());
        header.push("mean".to_string());
        writer.write_record(&header)?;
        for (sample, row) in self.samples.iter().zip(self.cells.iter()) {
            let mut record = vec![sample.clone()];
            record.extend(
                row.iter()
                    .map(|cell| cell.map(|count| count.to_string()).unwrap_or_default()),
            );
            record.push(self.row_mean(sample).to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn example_table() -> &'static str {
        "seq\tS1.PP1\tS1.PP2 \tS2.PP1\tS3.PP1\n\
         seq1\t10\t0\t42\t1\n\
         seq2\t0\t86\t\t\n\
         seq3\t4\t0\t0\t\n"
    }

    #[test]
    fn load_count_table_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "run.final.count_table", example_table());
        let table = CountTable::load(&path).unwrap();
        assert_eq!(table.columns(), &["S1.PP1", "S1.PP2", "S2.PP1", "S3.PP1"]);
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.rows()[1].counts, vec![Some(0), Some(86), None, None]);
        let totals = table.column_totals();
        assert_eq!(totals["S1.PP1"], 14);
        assert_eq!(totals["S1.PP2"], 86);
        assert_eq!(totals["S3.PP1"], 1);
    }

    #[test]
    fn malformed_header_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.count_table", "seq\tS1PP1\nseq1\t3\n");
        let err = CountTable::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HmasError>(),
            Some(HmasError::Format { line: 1, .. })
        ));
        let path = write_file(
            &dir,
            "mothur.count_table",
            "Representative_Sequence\tS1.PP1\nseq1\t3\n",
        );
        let err = CountTable::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HmasError>(),
            Some(HmasError::Format { line: 1, .. })
        ));
        let path = write_file(&dir, "bad_cell.count_table", "seq\tS1.PP1\nseq1\tmany\n");
        let err = CountTable::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HmasError>(),
            Some(HmasError::Format { line: 2, .. })
        ));
    }

    #[test]
    fn restrict_and_melt_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "run.final.count_table", example_table());
        let table = CountTable::load(&path)
            .unwrap()
            .restrict_to_samples(&["S1".to_string(), "S3".to_string()]);
        assert_eq!(table.columns(), &["S1.PP1", "S1.PP2", "S3.PP1"]);
        let melted = table.melt().collect::<Vec<(&str, &str, u64)>>();
        assert!(melted.contains(&("seq3", "S1.PP1", 4)));
        assert!(!melted.iter().any(|(seq, column, _)| *seq == "seq2" && *column == "S3.PP1"));
        assert_eq!(melted.len(), 7);
    }

    #[test]
    fn cache_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "run.final.count_table", example_table());
        let parsed = CountTable::load_cached(&path).unwrap();
        assert!(Path::new(&cache_path(&path)).is_file());
        let cached = CountTable::load_cached(&path).unwrap();
        assert_eq!(parsed, cached);

        // a changed source invalidates the cache
        write_file(&dir, "run.final.count_table", "seq\tS9.PP9\nseqA\t7\n");
        let reparsed = CountTable::load_cached(&path).unwrap();
        assert_eq!(reparsed.columns(), &["S9.PP9"]);
    }

    #[test]
    fn from_match_file_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "output.match.final.txt",
            "seqA\tM03235:53:1101=PP1=S1\n\
             seqA\tM03235:53:1102=PP1=S1\n\
             seqA\tM03235:53:1103=PP1=S2\n\
             seqB\tM03235:53:1104=PP2=S1\n",
        );
        let table = CountTable::from_match_file(&path).unwrap();
        assert_eq!(table.columns(), &["S1.PP1", "S1.PP2", "S2.PP1"]);
        assert_eq!(
            table.rows(),
            &[
                CountRow {
                    seq: "seqA".to_string(),
                    counts: vec![Some(2), Some(0), Some(1)]
                },
                CountRow {
                    seq: "seqB".to_string(),
                    counts: vec![Some(0), Some(1), Some(0)]
                },
            ]
        );

        let output = dir.path().join("final.count_table");
        table.write_tsv(output.to_str().unwrap()).unwrap();
        assert_eq!(CountTable::load(output.to_str().unwrap()).unwrap(), table);

        let empty = write_file(&dir, "empty.match.txt", "");
        let err = CountTable::from_match_file(&empty).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HmasError>(),
            Some(HmasError::EmptyInput { .. })
        ));
    }

    #[test]
    fn sample_primer_matrix_test() {
        let raw_columns = ["S1.PP1", "S1.pp0", "S2.PP2"]
            .iter()
            .map(|column| column.to_string())
            .collect::<BTreeSet<String>>();
        let mut totals = BTreeMap::new();
        totals.insert("S1.PP1".to_string(), 5);
        totals.insert("S2.PP2".to_string(), 3);
        totals.insert("S1.pp0".to_string(), 0);
        let samples = vec!["S1".to_string(), "S2".to_string()];
        let matrix = SamplePrimerMatrix::from_totals(&totals, &samples, &raw_columns);
        assert_eq!(matrix.primers(), &["pp0", "PP1", "PP2"]);
        assert_eq!(matrix.row("S1"), Some(&[Some(0), Some(5), None][..]));
        assert_eq!(matrix.row("S2"), Some(&[None, None, Some(3)][..]));
        // zero totals are not observed
        assert_eq!(
            matrix.observed("S1").into_iter().collect::<Vec<String>>(),
            vec!["PP1".to_string()]
        );
        assert!(matrix.observed("S9").is_empty());
        assert!((matrix.row_mean("S1") - 5.0 / 3.0).abs() < 1e-9);

        // totals missing for a raw column become zero
        let mut validated = BTreeMap::new();
        validated.insert("S1.PP1".to_string(), 2);
        let matrix = SamplePrimerMatrix::from_totals(&validated, &samples, &raw_columns);
        assert_eq!(matrix.primers(), &["PP1"]);
        assert_eq!(matrix.row("S1"), Some(&[Some(2)][..]));
        assert_eq!(matrix.row("S2"), Some(&[None][..]));
    }
}
