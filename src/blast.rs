use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use num_format::{Locale, ToFormattedString};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    count_table::{join_sample_primer, CountTable},
    error::HmasError,
    info::BlastThresholds,
    input::{csv_reader, require_file},
    mapping::{Metasheet, SampleIsolates},
    tools::{find_executable, run_tool},
};

/// Tabular output columns requested from blastn.  `BlastHit` follows the same order
pub const BLAST_OUTFMT: &str = "6 qseqid sseqid qlen slen length evalue qcovs pident mismatch";

/// One row of the BLAST tabular output
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlastHit {
    pub query_id: String,   // representative sequence ID from the count table
    pub subject_id: String, // reference amplicon ID from the metasheet
    pub query_len: u32,
    pub subject_len: u32,
    pub alignment_len: u32,
    pub e_value: f64,
    pub coverage: f64, // query coverage per subject, 0-100
    pub percent_identity: f64,
    pub mismatch_count: u32,
}

/// Reads the tab delimited BLAST hits without a header
pub fn read_hits(path: &str) -> Result<Vec<BlastHit>> {
    let mut reader = csv_reader(path, b'\t', false)?;
    let mut hits = Vec::new();
    for (row_index, hit_result) in reader.deserialize::<BlastHit>().enumerate() {
        let hit = hit_result.map_err(|err| HmasError::format(path, row_index + 1, err.to_string()))?;
        hits.push(hit);
    }
    info!(
        "Read {} BLAST hits from {}",
        hits.len().to_formatted_string(&Locale::en),
        path
    );
    Ok(hits)
}

/// Runs makeblastdb and blastn.  Both are found on PATH when the runner is created
#[derive(Debug, Clone)]
pub struct BlastRunner {
    makeblastdb: PathBuf,
    blastn: PathBuf,
}

impl BlastRunner {
    pub fn locate() -> Result<Self, HmasError> {
        Ok(BlastRunner {
            makeblastdb: find_executable("makeblastdb")?,
            blastn: find_executable("blastn")?,
        })
    }

    /// BLASTs the query against the reference amplicons.  The database and the hits are written
    /// within `scratch_dir`, which is created when missing.  Returns the path of the hits
    pub fn run(
        &self,
        query: &str,
        reference: &str,
        scratch_dir: &str,
        max_hits: u32,
    ) -> Result<String> {
        require_file(query)?;
        require_file(reference)?;
        fs::create_dir_all(scratch_dir)
            .context(format!("Failed to create scratch directory {}", scratch_dir))?;

        let reference_stem = Path::new(reference)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "reference".to_string());
        let database = Path::new(scratch_dir).join(reference_stem);
        info!("Building BLAST database {}", database.display());
        run_tool(
            Command::new(&self.makeblastdb)
                .arg("-in")
                .arg(reference)
                .arg("-out")
                .arg(&database)
                .args(&["-dbtype", "nucl", "-parse_seqids"]),
            "makeblastdb",
        )?;

        let query_name = Path::new(query)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "query".to_string());
        let hits_path = Path::new(scratch_dir).join(format!("{}_blast.out", query_name));
        info!("Running blastn with {} maximum target sequences", max_hits);
        run_tool(
            Command::new(&self.blastn)
                .arg("-db")
                .arg(&database)
                .arg("-query")
                .arg(query)
                .args(&["-outfmt", BLAST_OUTFMT])
                .arg("-max_target_seqs")
                .arg(max_hits.to_string())
                .args(&["-max_hsps", "1"])
                .arg("-out")
                .arg(&hits_path),
            "blastn",
        )?;
        Ok(hits_path.to_string_lossy().to_string())
    }
}

/// The 'sample.primer' columns each sequence was validated for by a passing BLAST hit
#[derive(Debug, Clone, Default)]
pub struct RemappedHits {
    by_seq: AHashMap<String, AHashSet<String>>, // sequence ID -> sample.primer columns
}

impl RemappedHits {
    pub fn insert(&mut self, seq: &str, sample_primer: String) {
        self.by_seq
            .entry(seq.to_string())
            .or_insert_with(AHashSet::new)
            .insert(sample_primer);
    }

    pub fn contains(&self, seq: &str, sample_primer: &str) -> bool {
        self.by_seq
            .get(seq)
            .map(|columns| columns.contains(sample_primer))
            .unwrap_or(false)
    }

    /// Number of (sequence, sample.primer) pairs
    pub fn len(&self) -> usize {
        self.by_seq.values().map(|columns| columns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }
}

/// Keeps the hits which pass the thresholds and moves each from the reference amplicon to every
/// 'sample.primer' column it stands for.  The subject resolves through the metasheet to an isolate
/// and primer, and the isolate fans out to all samples which contain it
pub fn remap_hits(
    hits: &[BlastHit],
    thresholds: &BlastThresholds,
    metasheet: &Metasheet,
    mapping: &SampleIsolates,
) -> RemappedHits {
    let mut remapped = RemappedHits::default();
    let mut unknown_subjects = BTreeSet::new();
    let mut unmapped_isolates = BTreeSet::new();
    let mut passing = 0;
    for hit in hits.iter().filter(|hit| thresholds.passes(hit)) {
        passing += 1;
        let entry = match metasheet.lookup(&hit.subject_id) {
            Some(entry) => entry,
            None => {
                unknown_subjects.insert(hit.subject_id.as_str());
                continue;
            }
        };
        let samples = mapping.samples(&entry.isolate);
        if samples.is_empty() {
            unmapped_isolates.insert(entry.isolate.as_str());
            continue;
        }
        for sample in samples {
            remapped.insert(&hit.query_id, join_sample_primer(sample, &entry.primer));
        }
    }
    for subject in &unknown_subjects {
        warn!("BLAST subject {} can't be found in the metasheet", subject);
    }
    for isolate in &unmapped_isolates {
        warn!("Isolate {} can't be found in the sample-isolates mapping file", isolate);
    }
    info!(
        "{} of {} BLAST hits passed the thresholds and remapped to {} sequence/sample.primer pairs",
        passing.to_formatted_string(&Locale::en),
        hits.len().to_formatted_string(&Locale::en),
        remapped.len().to_formatted_string(&Locale::en)
    );
    remapped
}

/// Totals of every 'sample.primer' counted only over sequences with a passing BLAST hit remapped
/// to that same column.  Cells with a zero count are left out, and each cell is counted once no
/// matter how many hits validated it
pub fn validated_counts(table: &CountTable, remapped: &RemappedHits) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for (seq, sample_primer, count) in table.melt() {
        if count > 0 && remapped.contains(seq, sample_primer) {
            *totals.entry(sample_primer.to_string()).or_insert(0) += count;
        }
    }
    debug!("{} sample.primer columns have validated counts", totals.len());
    totals
}
