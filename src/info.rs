use anyhow::Result;
use std::{fmt, path::Path};

use crate::{blast::BlastHit, error::HmasError, input::require_file};

/// Default minimum percent identity of a BLAST hit
pub const DEFAULT_PIDENT: f64 = 100.0;
/// Default minimum query coverage of a BLAST hit
pub const DEFAULT_PCOV: f64 = 100.0;
/// Default minimum fraction of the subject covered by the alignment
pub const DEFAULT_P_ALIGN: f64 = 0.99;
/// Default number of BLAST target sequences kept per query
pub const DEFAULT_MAX_HITS: u32 = 100;

/// The thresholds a BLAST hit needs to pass in order to validate a sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlastThresholds {
    pub pident: f64,  // minimum percent identity, 0-100
    pub pcov: f64,    // minimum query coverage, 0-100
    pub p_align: f64, // minimum alignment length over subject length, 0-1
}

impl Default for BlastThresholds {
    fn default() -> Self {
        BlastThresholds {
            pident: DEFAULT_PIDENT,
            pcov: DEFAULT_PCOV,
            p_align: DEFAULT_P_ALIGN,
        }
    }
}

impl BlastThresholds {
    /// Creates the thresholds after checking that each is within its range
    ///
    /// # Example
    /// ```
    /// use hmas_tools::info::BlastThresholds;
    ///
    /// assert!(BlastThresholds::new(100.0, 100.0, 0.99).is_ok());
    /// assert!(BlastThresholds::new(100.0, 100.0, 1.5).is_err());
    /// ```
    pub fn new(pident: f64, pcov: f64, p_align: f64) -> Result<Self, HmasError> {
        check_range("pident", pident, 0.0, 100.0)?;
        check_range("pcov", pcov, 0.0, 100.0)?;
        check_range("p-align", p_align, 0.0, 1.0)?;
        Ok(BlastThresholds {
            pident,
            pcov,
            p_align,
        })
    }

    /// Whether the hit passes all three thresholds.  A subject of length 0 never passes
    pub fn passes(&self, hit: &BlastHit) -> bool {
        if hit.subject_len == 0 {
            return false;
        }
        let aligned_fraction = hit.alignment_len as f64 / hit.subject_len as f64;
        hit.percent_identity >= self.pident
            && aligned_fraction >= self.p_align
            && hit.coverage >= self.pcov
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), HmasError> {
    if value.is_nan() || value < min || value > max {
        return Err(HmasError::InvalidSetting {
            name: name.to_string(),
            value: value.to_string(),
            range: format!("[{}, {}]", min, max),
        });
    }
    Ok(())
}

impl fmt::Display for BlastThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\
            Minimum percent identity:      {}\n\
            Minimum query coverage:        {}\n\
            Minimum aligned subject ratio: {}",
            self.pident, self.pcov, self.p_align
        )
    }
}

/// Where the samples to report on come from
#[derive(Debug, Clone, PartialEq)]
pub enum SampleSource {
    File(String),      // one sample per line, no header
    Names(Vec<String>), // given directly, as done for each batch folder
}

impl fmt::Display for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSource::File(path) => write!(f, "{}", path),
            SampleSource::Names(names) => write!(f, "{}", names.join(", ")),
        }
    }
}

/// Everything needed for one confusion matrix run
#[derive(Debug, Clone)]
pub struct ConfusionConfig {
    pub count_table: String,
    pub unique_fasta: String,
    pub reference: String,
    pub samples: SampleSource,
    pub metasheet: String,
    pub mapping: String,
    pub oligos: String,
    pub output: String,
    pub blast_file: Option<String>, // pre-computed BLAST hits.  BLAST is not run when given
    pub report_file: Option<String>,
    pub exclude: Vec<String>, // control samples left out of the report
    pub thresholds: BlastThresholds,
    pub max_hits: u32,
    pub scratch_dir: String, // holds the BLAST database and BLAST output
    pub cache_table: bool,
}

impl ConfusionConfig {
    /// Checks every input before any work is done.  The query and reference fasta files are only
    /// needed when BLAST is run
    pub fn validate(&self) -> Result<(), HmasError> {
        let mut required = vec![&self.count_table, &self.metasheet, &self.mapping, &self.oligos];
        if let SampleSource::File(sample_list) = &self.samples {
            required.push(sample_list);
        }
        match &self.blast_file {
            Some(blast_file) => required.push(blast_file),
            None => {
                required.push(&self.unique_fasta);
                required.push(&self.reference);
            }
        }
        for path in required {
            require_file(path)?;
        }
        if self.max_hits == 0 {
            return Err(HmasError::InvalidSetting {
                name: "max-hits".to_string(),
                value: "0".to_string(),
                range: "[1, 4294967295]".to_string(),
            });
        }
        if let Some(parent) = Path::new(&self.output).parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(HmasError::configuration(
                    &self.output,
                    "output directory does not exist",
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfusionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blast_info = match &self.blast_file {
            Some(blast_file) => format!("BLAST hits:    {}", blast_file),
            None => format!(
                "Query fasta:   {}\nReference:     {}\nMax hits:      {}",
                self.unique_fasta, self.reference, self.max_hits
            ),
        };
        let exclude_info = if self.exclude.is_empty() {
            "None".to_string()
        } else {
            self.exclude.join(", ")
        };
        write!(
            f,
            "\
            -SETTINGS-\n\
            Count table:   {}\n\
            Samples:       {}\n\
            Excluded:      {}\n\
            Metasheet:     {}\n\
            Mapping:       {}\n\
            Oligos:        {}\n\
            {}\n\
            Output:        {}\n\
            {}",
            self.count_table,
            self.samples,
            exclude_info,
            self.metasheet,
            self.mapping,
            self.oligos,
            blast_info,
            self.output,
            self.thresholds
        )
    }
}

/// Settings shared by every sample folder of a batch run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: String, // contains one folder per sample
    pub reference: String,
    pub metasheet: String,
    pub mapping: String,
    pub oligos: String,
    pub output: String, // combined confusion matrix
    pub exclude: Vec<String>,
    pub thresholds: BlastThresholds,
    pub max_hits: u32,
    pub threads: usize, // upper bound of concurrent folders
    pub cache_table: bool,
}

impl BatchConfig {
    /// Checks the shared inputs before any folder is processed
    pub fn validate(&self) -> Result<(), HmasError> {
        if !Path::new(&self.input_dir).is_dir() {
            return Err(HmasError::configuration(
                &self.input_dir,
                "input directory does not exist",
            ));
        }
        for path in [&self.reference, &self.metasheet, &self.mapping, &self.oligos] {
            require_file(path)?;
        }
        if self.threads == 0 {
            return Err(HmasError::InvalidSetting {
                name: "threads".to_string(),
                value: "0".to_string(),
                range: "[1, number of CPUs]".to_string(),
            });
        }
        Ok(())
    }

    /// The private configuration of one sample folder.  Each folder gets its own scratch directory
    /// and output so that concurrent folders never share writable files
    pub fn folder_config(&self, folder: &SampleFolder) -> ConfusionConfig {
        ConfusionConfig {
            count_table: folder.count_table.clone(),
            unique_fasta: folder.unique_fasta.clone(),
            reference: self.reference.clone(),
            samples: SampleSource::Names(vec![folder.name.clone()]),
            metasheet: self.metasheet.clone(),
            mapping: self.mapping.clone(),
            oligos: self.oligos.clone(),
            output: folder.output.clone(),
            blast_file: None,
            report_file: None,
            exclude: self.exclude.clone(),
            thresholds: self.thresholds,
            max_hits: self.max_hits,
            scratch_dir: folder.scratch_dir.clone(),
            cache_table: self.cache_table,
        }
    }
}

impl fmt::Display for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\
            -SETTINGS-\n\
            Input directory: {}\n\
            Reference:       {}\n\
            Metasheet:       {}\n\
            Mapping:         {}\n\
            Oligos:          {}\n\
            Output:          {}\n\
            Threads:         {}\n\
            {}",
            self.input_dir,
            self.reference,
            self.metasheet,
            self.mapping,
            self.oligos,
            self.output,
            self.threads,
            self.thresholds
        )
    }
}

/// File locations of one sample folder within a batch input directory
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFolder {
    pub name: String,
    pub count_table: String,
    pub unique_fasta: String,
    pub output: String,
    pub scratch_dir: String,
}

impl SampleFolder {
    /// Lays out the expected files of the folder.  The count table may have been left within the
    /// temp sub-folder
    pub fn new(input_dir: &str, name: &str) -> Self {
        let folder = Path::new(input_dir).join(name);
        let final_table = format!("{}.final.count_table", name);
        let mut count_table = folder.join(&final_table);
        if !count_table.is_file() {
            count_table = folder.join("temp").join(&final_table);
        }
        SampleFolder {
            name: name.to_string(),
            count_table: count_table.to_string_lossy().to_string(),
            unique_fasta: folder
                .join(format!("{}.final.unique.fasta", name))
                .to_string_lossy()
                .to_string(),
            output: folder
                .join(format!("confusion_matrix_{}", name))
                .to_string_lossy()
                .to_string(),
            scratch_dir: folder.join("blast_scratch").to_string_lossy().to_string(),
        }
    }

    /// Whether the folder has unique sequences to BLAST
    pub fn has_sequences(&self) -> bool {
        std::fs::metadata(&self.unique_fasta)
            .map(|metadata| metadata.is_file() && metadata.len() > 0)
            .unwrap_or(false)
    }
}
