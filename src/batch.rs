use anyhow::{Context, Result};
use itertools::Itertools;
use log::{error, info, warn};
use std::{fmt, fs, path::Path, sync::Mutex};

use crate::{
    confusion::ConfusionMatrix,
    error::HmasError,
    info::{BatchConfig, SampleFolder},
    pipeline::run_confusion_matrix,
};

/// A sample folder whose confusion matrix could not be built
#[derive(Debug)]
pub struct WorkerFailure {
    pub folder: String,
    pub error: anyhow::Error,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.folder, self.error)
    }
}

/// Finds the sample folders of the input directory which have unique sequences.  Folders without
/// them are skipped with a warning, and excluded control folders are skipped
pub fn discover_folders(input_dir: &str, exclude: &[String]) -> Result<Vec<SampleFolder>> {
    let mut names = Vec::new();
    for entry_result in
        fs::read_dir(input_dir).context(format!("Failed to read directory {}", input_dir))?
    {
        let entry = entry_result.context(format!("Failed to read directory {}", input_dir))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    let mut folders = Vec::new();
    for name in names {
        if exclude.contains(&name) {
            info!("Skipping excluded control folder {}", name);
            continue;
        }
        let folder = SampleFolder::new(input_dir, &name);
        if folder.has_sequences() {
            folders.push(folder);
        } else {
            warn!(
                "Skipping {}, {} is missing or empty",
                name, folder.unique_fasta
            );
        }
    }
    Ok(folders)
}

// One folder's confusion matrix.  The scratch directory is only removed after a success so the
// BLAST files stay available for inspection
fn process_folder(config: &BatchConfig, folder: &SampleFolder) -> Result<ConfusionMatrix, WorkerFailure> {
    let folder_config = config.folder_config(folder);
    match run_confusion_matrix(&folder_config) {
        Ok(matrix) => {
            if Path::new(&folder.scratch_dir).exists() {
                if let Err(err) = fs::remove_dir_all(&folder.scratch_dir) {
                    warn!("Failed to remove {}: {}", folder.scratch_dir, err);
                }
            }
            info!("Finished {}", folder.name);
            Ok(matrix)
        }
        Err(error) => Err(WorkerFailure {
            folder: folder.name.clone(),
            error,
        }),
    }
}

/// Builds the confusion matrix of every sample folder on a bounded pool of threads and writes the
/// rows of all folders to the combined output in the order the folders finish.  Every failed folder
/// is logged before the batch fails
pub fn run_batch(config: &BatchConfig) -> Result<ConfusionMatrix> {
    config.validate()?;
    info!("{}", config);
    let folders = discover_folders(&config.input_dir, &config.exclude)?;
    if folders.is_empty() {
        return Err(HmasError::configuration(
            &config.input_dir,
            "no sample folders with unique sequences",
        )
        .into());
    }
    let threads = folders.len().min(config.threads);
    info!("Processing {} sample folders on {} threads", folders.len(), threads);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to create the thread pool")?;
    // results are pushed as each folder finishes
    let results = Mutex::new(Vec::with_capacity(folders.len()));
    pool.scope(|s| {
        for folder in &folders {
            let results = &results;
            s.spawn(move |_| {
                let result = process_folder(config, folder);
                match results.lock() {
                    Ok(mut results) => results.push(result),
                    Err(poisoned) => poisoned.into_inner().push(result),
                }
            });
        }
    });
    let results = results
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let mut combined = ConfusionMatrix::default();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(matrix) => combined.extend(matrix),
            Err(failure) => {
                error!("{}", failure);
                failures.push(failure);
            }
        }
    }
    if !failures.is_empty() {
        return Err(HmasError::BatchFailed {
            failed: failures.len(),
            total: folders.len(),
            folders: failures.iter().map(|failure| failure.folder.as_str()).join(", "),
        }
        .into());
    }
    combined.write_tsv(&config.output)?;
    Ok(combined)
}
