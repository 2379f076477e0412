use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use std::{fmt, fs, path::Path, process::Command};

use crate::{
    input::require_file,
    primers::PrimerPanel,
    tools::{find_executable, run_tool},
};

/// Settings of one cutadapt primer removal run
#[derive(Debug, Clone, PartialEq)]
pub struct CutadaptConfig {
    pub read1: String,
    pub read2: String,
    pub out_dir: String,
    pub sample: String,
    pub oligos: String,
    pub max_error: f64,
    pub min_length: u32,
    pub threads: usize,
}

impl fmt::Display for CutadaptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\
            -SETTINGS-\n\
            Sample:        {}\n\
            Reads:         {}, {}\n\
            Oligos:        {}\n\
            Output:        {}\n\
            Max error:     {}\n\
            Min length:    {}\n\
            Threads:       {}",
            self.sample,
            self.read1,
            self.read2,
            self.oligos,
            self.out_dir,
            self.max_error,
            self.min_length,
            self.threads
        )
    }
}

/// Builds the cutadapt arguments.  Every primer pair becomes a linked adapter for each read, and
/// the read names are tagged with the primer and the sample
pub fn cutadapt_args(panel: &PrimerPanel, config: &CutadaptConfig) -> Vec<String> {
    let mut args = Vec::with_capacity(panel.len() * 4 + 20);
    // last primer of the oligo file first.  cutadapt settles equally good matches by adapter order
    for primer in panel.iter().rev() {
        let (read1_adapter, read2_adapter) = primer.linked_adapters();
        args.push("-a".to_string());
        args.push(read1_adapter);
        args.push("-A".to_string());
        args.push(read2_adapter);
    }
    let out_dir = Path::new(&config.out_dir);
    args.push("-o".to_string());
    args.push(
        out_dir
            .join(format!("{}.1.fastq", config.sample))
            .to_string_lossy()
            .to_string(),
    );
    args.push("-p".to_string());
    args.push(
        out_dir
            .join(format!("{}.2.fastq", config.sample))
            .to_string_lossy()
            .to_string(),
    );
    args.push(config.read1.clone());
    args.push(config.read2.clone());
    args.push(format!(
        "--rename={{id}}  adapter={{adapter_name}}={} {{comment}}",
        config.sample
    ));
    args.push("--quiet".to_string());
    args.push("--discard-untrimmed".to_string());
    args.push("-e".to_string());
    args.push(config.max_error.to_string());
    args.push("-m".to_string());
    args.push(config.min_length.to_string());
    args.push("-j".to_string());
    args.push(config.threads.to_string());
    args
}

/// Removes the primers from a pair of reads with cutadapt
pub fn run_cutadapt(config: &CutadaptConfig) -> Result<()> {
    require_file(&config.oligos)?;
    let panel = PrimerPanel::load(&config.oligos)?;
    info!("Removing {} primer pairs from {}", panel.len(), config.sample);
    let cutadapt = find_executable("cutadapt")?;
    fs::create_dir_all(&config.out_dir)
        .context(format!("Failed to create output directory {}", config.out_dir))?;
    let output = run_tool(
        Command::new(cutadapt).args(cutadapt_args(&panel, config)),
        "cutadapt",
    )?;
    if !output.is_empty() {
        debug!("cutadapt output:\n{}", output);
    }
    Ok(())
}

/// Joins the read ID and the cutadapt adapter tag within a fasta file, in place.  Tools such as
/// vsearch cut the read ID at the first space.  Returns the number of headers rewritten
///
/// '>M03235:53:1101:16683:11154  adapter=OG0000294primerGroup8=AR_0409' becomes
/// '>M03235:53:1101:16683:11154=OG0000294primerGroup8=AR_0409'
pub fn remove_space(path: &str) -> Result<usize> {
    let bytes = fs::read(path).context(format!("Failed to read {}", path))?;
    let contents = String::from_utf8_lossy(&bytes);
    let adapter_regex = Regex::new(r"(?i)\s+adapter=")?;
    let replaced = adapter_regex.find_iter(&contents).count();
    let joined = adapter_regex.replace_all(&contents, "=");
    fs::write(path, joined.as_bytes()).context(format!("Failed to write {}", path))?;
    info!("Joined {} read IDs within {}", replaced, path);
    Ok(replaced)
}
