use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::error::HmasError;

/// Opens a file for buffered reading.  Files ending with '.gz' are decompressed on the fly
pub fn open_reader(path: &str) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).context(format!("Failed to open file: {}", path))?;
    if path.ends_with(".gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Creates a csv reader over the file with the given delimiter.  The first line is treated as a
/// header when `has_headers` is set.  Rows may have a different number of fields than the header
pub fn csv_reader(
    path: &str,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn BufRead>>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(open_reader(path)?))
}

/// Checks that a required input exists, is a file, and can be opened for reading
///
/// # Example
/// ```
/// use hmas_tools::input::require_file;
///
/// assert!(require_file("does_not_exist.count_table").is_err());
/// ```
pub fn require_file(path: &str) -> Result<(), HmasError> {
    if !Path::new(path).is_file() {
        return Err(HmasError::configuration(path, "file does not exist"));
    }
    File::open(path).map_err(|err| HmasError::configuration(path, &err.to_string()))?;
    Ok(())
}

/// Sorts names case-insensitively.  Names which only differ by case keep their input order
///
/// # Example
/// ```
/// use hmas_tools::input::sort_case_insensitive;
///
/// let mut samples = vec!["b_sample".to_string(), "A_sample".to_string(), "a_sample".to_string()];
/// sort_case_insensitive(&mut samples);
/// assert_eq!(samples, vec!["A_sample", "a_sample", "b_sample"]);
/// ```
pub fn sort_case_insensitive(names: &mut [String]) {
    names.sort_by_key(|name| name.to_lowercase())
}

/// Reads a one column sample list without a header.  Blank lines and excluded samples, such as
/// negative controls, are dropped.  The returned list is de-duplicated and sorted
/// case-insensitively
pub fn read_sample_list(path: &str, exclude: &[String]) -> Result<Vec<String>> {
    let mut samples = Vec::new();
    for line in open_reader(path)?.lines() {
        let line = line.context(format!("Failed to read line from {}", path))?;
        // only the first column is used when the list was saved as a csv
        let sample = line.split(',').next().unwrap_or("").trim();
        if sample.is_empty() {
            continue;
        }
        samples.push(sample.to_string());
    }
    Ok(clean_sample_list(samples, exclude))
}

/// Removes excluded and duplicated samples, then sorts the remaining case-insensitively
pub fn clean_sample_list(samples: Vec<String>, exclude: &[String]) -> Vec<String> {
    let mut cleaned = Vec::new();
    for sample in samples {
        if exclude.contains(&sample) || cleaned.contains(&sample) {
            continue;
        }
        cleaned.push(sample);
    }
    sort_case_insensitive(&mut cleaned);
    cleaned
}
