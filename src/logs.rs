use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;
use std::fs;

/// Read counts scraped from a PEAR log
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PearCounts {
    pub assembled: u64,
    pub discarded: u64,
    pub not_assembled: u64,
}

/// Reads the assembled, discarded and not assembled read counts from PEAR output.  Counts which
/// are not found stay at 0
///
/// # Example
/// ```
/// use hmas_tools::logs::parse_pear_log;
///
/// let log = "Assembled reads ...................: 1,024,300 / 1,100,000 (93.118%)\n";
/// assert_eq!(parse_pear_log(log).unwrap().assembled, 1_024_300);
/// ```
pub fn parse_pear_log(text: &str) -> Result<PearCounts> {
    let mut counts = PearCounts::default();
    let count_regex = Regex::new(r"^\s*(Assembled|Discarded|Not assembled) reads \.+:\s*([\d,]+)")?;
    for line in text.lines() {
        if let Some(captures) = count_regex.captures(line) {
            let count = captures[2].replace(',', "").parse::<u64>()?;
            match &captures[1] {
                "Assembled" => counts.assembled = count,
                "Discarded" => counts.discarded = count,
                _ => counts.not_assembled = count,
            }
        }
    }
    Ok(counts)
}

/// Total and discarded reads from the quality filter log, found on the first line which mentions
/// 'sequences kept'.  Fields are kept as written
///
/// # Example
/// ```
/// use hmas_tools::logs::parse_qfilter_log;
///
/// let log = "2081 sequences kept (of which 0 truncated), 6 sequences discarded.\n";
/// assert_eq!(parse_qfilter_log(log), ("2081".to_string(), "6".to_string()));
/// ```
pub fn parse_qfilter_log(text: &str) -> (String, String) {
    for line in text.lines() {
        if line.contains("sequences kept") {
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            if fields.len() >= 3 {
                return (fields[0].to_string(), fields[fields.len() - 3].to_string());
            }
        }
    }
    ("0".to_string(), "0".to_string())
}

fn write_summary(output: &str, header: &[&str], record: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(output).context(format!("Failed to create {}", output))?;
    writer.write_record(header)?;
    writer.write_record(record)?;
    writer.flush()?;
    Ok(())
}

/// Writes the PEAR read counts of a sample as a two line csv
pub fn pear_log_summary(log_path: &str, sample: &str, output: &str) -> Result<PearCounts> {
    let text = fs::read_to_string(log_path).context(format!("Failed to read {}", log_path))?;
    let counts = parse_pear_log(&text)?;
    if counts == PearCounts::default() {
        warn!("No read counts found within PEAR log {}", log_path);
    }
    write_summary(
        output,
        &["Sample name", "Assembled reads", "Discarded reads", "Un-assembled reads"],
        &[
            sample.to_string(),
            counts.assembled.to_string(),
            counts.discarded.to_string(),
            counts.not_assembled.to_string(),
        ],
    )?;
    info!("Wrote PEAR summary of {} to {}", sample, output);
    Ok(counts)
}

/// Writes the quality filter read counts of a sample as a two line csv
pub fn qfilter_log_summary(log_path: &str, sample: &str, output: &str) -> Result<(String, String)> {
    let text = fs::read_to_string(log_path).context(format!("Failed to read {}", log_path))?;
    let (total, discarded) = parse_qfilter_log(&text);
    write_summary(
        output,
        &["Sample name", "Total reads", "Discarded reads"],
        &[sample.to_string(), total.clone(), discarded.clone()],
    )?;
    info!("Wrote quality filter summary of {} to {}", sample, output);
    Ok((total, discarded))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEAR_LOG: &str = "\
 ____  _____    _    ____
|  _ \\| ____|  / \\  |  _ \\
Assembled reads ...................: 1,947 / 2,093 (93.024%)
Discarded reads ...................: 0 / 2,093 (0.000%)
Not assembled reads ...............: 146 / 2,093 (6.976%)
";

    #[test]
    fn pear_log_test() {
        assert_eq!(
            parse_pear_log(PEAR_LOG).unwrap(),
            PearCounts {
                assembled: 1947,
                discarded: 0,
                not_assembled: 146
            }
        );
        assert_eq!(parse_pear_log("nothing here").unwrap(), PearCounts::default());
    }

    #[test]
    fn pear_summary_file_test() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("S1.pear.log");
        std::fs::write(&log_path, PEAR_LOG).unwrap();
        let output = dir.path().join("S1.pear.csv");
        pear_log_summary(log_path.to_str().unwrap(), "S1", output.to_str().unwrap()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "Sample name,Assembled reads,Discarded reads,Un-assembled reads\nS1,1947,0,146\n"
        );
    }

    #[test]
    fn qfilter_log_test() {
        let log = "vsearch v2.22.1_linux_x86_64\n\
                   Reading input file 100%\n\
                   43590 sequences kept (of which 0 truncated), 1237 sequences discarded.\n";
        assert_eq!(
            parse_qfilter_log(log),
            ("43590".to_string(), "1237".to_string())
        );
        assert_eq!(parse_qfilter_log(""), ("0".to_string(), "0".to_string()));
    }
}
