use anyhow::Result;
use log::{debug, info, log_enabled, Level};
use num_format::{Locale, ToFormattedString};
use std::collections::BTreeSet;

use crate::{
    blast::{read_hits, remap_hits, validated_counts, BlastRunner},
    confusion::ConfusionMatrix,
    count_table::{CountTable, SamplePrimerMatrix},
    error::HmasError,
    info::{ConfusionConfig, SampleSource},
    input::{clean_sample_list, read_sample_list},
    mapping::{Metasheet, SampleIsolates},
    primers::PrimerPanel,
    reports::{report_path, DepthReport},
};

/// Samples of the run with the excluded controls removed, sorted case-insensitively
pub fn resolve_samples(config: &ConfusionConfig) -> Result<Vec<String>> {
    match &config.samples {
        SampleSource::File(path) => read_sample_list(path, &config.exclude),
        SampleSource::Names(names) => Ok(clean_sample_list(names.clone(), &config.exclude)),
    }
}

/// Runs the whole confusion matrix validation: loads the inputs, BLASTs the representative
/// sequences unless hits are given, and writes the confusion matrix and the optional report
pub fn run_confusion_matrix(config: &ConfusionConfig) -> Result<ConfusionMatrix> {
    config.validate()?;
    info!("{}", config);

    let samples = resolve_samples(config)?;
    if samples.is_empty() {
        return Err(HmasError::configuration(
            &config.samples.to_string(),
            "no samples left after removing the excluded controls",
        )
        .into());
    }
    info!("Samples: {}", samples.join(", "));

    let panel = PrimerPanel::load(&config.oligos)?;
    if panel.is_empty() {
        return Err(HmasError::configuration(&config.oligos, "no primer lines found").into());
    }
    let panel_names = panel.names();
    info!(
        "Primer panel holds {} primer pairs",
        panel.len().to_formatted_string(&Locale::en)
    );

    let table = if config.cache_table {
        CountTable::load_cached(&config.count_table)?
    } else {
        CountTable::load(&config.count_table)?
    }
    .restrict_to_samples(&samples);
    let raw_columns = table.columns().iter().cloned().collect::<BTreeSet<String>>();
    let raw = SamplePrimerMatrix::from_totals(&table.column_totals(), &samples, &raw_columns);

    if let Some(report_file) = &config.report_file {
        DepthReport::from_matrix(&raw, panel.len()).write_csv(&report_path(report_file))?;
    }

    let mapping = SampleIsolates::load(&config.mapping)?;
    let metasheet = Metasheet::load(&config.metasheet)?;

    let hits_path = match &config.blast_file {
        Some(blast_file) => blast_file.clone(),
        None => BlastRunner::locate()?.run(
            &config.unique_fasta,
            &config.reference,
            &config.scratch_dir,
            config.max_hits,
        )?,
    };
    let hits = read_hits(&hits_path)?;
    let remapped = remap_hits(&hits, &config.thresholds, &metasheet, &mapping);
    let validated = SamplePrimerMatrix::from_totals(
        &validated_counts(&table, &remapped),
        &samples,
        &raw_columns,
    );

    if log_enabled!(Level::Debug) {
        let raw_path = format!("{}.raw.tsv", config.output);
        let blast_path = format!("{}.blast.tsv", config.output);
        raw.write_tsv(&raw_path)?;
        validated.write_tsv(&blast_path)?;
        debug!("Wrote sample x primer totals to {} and {}", raw_path, blast_path);
    }

    let matrix = ConfusionMatrix::build(&samples, &panel_names, &mapping, &metasheet, &raw, &validated);
    matrix.write_tsv(&config.output)?;
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        confusion::ConfusionRow,
        info::{BlastThresholds, DEFAULT_MAX_HITS},
    };

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn run_with_blast_hits_test() {
        let dir = tempfile::tempdir().unwrap();
        let oligos = write_file(
            &dir,
            "panel.oligos",
            "primer\tAACG\tTTGC\tPP1\nprimer\tGGAT\tCCTA\tPP2\nprimer\tCATG\tGTAC\tPP3\n",
        );
        let count_table = write_file(
            &dir,
            "run.final.count_table",
            "seq\tS1.PP1\tS1.PP3\tS2.PP1\tWater1.PP2\n\
             seq1\t12\t0\t7\t\n\
             seq2\t0\t4\t0\t\n\
             seq3\t\t\t\t9\n",
        );
        let sample_list = write_file(&dir, "samples.csv", "S2\nS1\nWater1\n");
        let metasheet = write_file(
            &dir,
            "metasheet.csv",
            "seq_id,primer,sample\nr1,PP1,IsoA\nr2,PP2,IsoA\nr3,PP3,IsoB\n",
        );
        let mapping = write_file(&dir, "mapping.csv", "sample,isolate\nS1,IsoA\nS2,IsoA\n");
        let blast_file = write_file(
            &dir,
            "hits.out",
            "seq1\tr1\t250\t250\t250\t1e-120\t100\t100.000\t0\n\
             seq2\tr3\t250\t250\t250\t1e-120\t100\t100.000\t0\n",
        );
        let output = dir.path().join("confusion_matrix").to_str().unwrap().to_string();
        let report = dir.path().join("report").to_str().unwrap().to_string();
        let config = ConfusionConfig {
            count_table,
            unique_fasta: "unused.fasta".to_string(),
            reference: "unused.fasta".to_string(),
            samples: SampleSource::File(sample_list),
            metasheet,
            mapping,
            oligos,
            output: output.clone(),
            blast_file: Some(blast_file),
            report_file: Some(report.clone()),
            exclude: vec!["Water1".to_string()],
            thresholds: BlastThresholds::default(),
            max_hits: DEFAULT_MAX_HITS,
            scratch_dir: dir.path().to_str().unwrap().to_string(),
            cache_table: false,
        };
        let matrix = run_confusion_matrix(&config).unwrap();
        // S1: predicted PP1 PP2, observed PP1 PP3, validated PP1 only since seq2 maps to IsoB
        // S2: predicted PP1 PP2, observed and validated PP1
        assert_eq!(
            matrix.rows,
            vec![
                ConfusionRow::new("S1", 1, 1, 1, 0),
                ConfusionRow::new("S2", 1, 0, 1, 1),
            ]
        );
        assert_eq!(ConfusionMatrix::read_tsv(&output).unwrap(), matrix);
        let report = std::fs::read_to_string(format!("{}.csv", report)).unwrap();
        assert!(report.contains("S1,8.0,0.667,1 / 3\n"));
    }
}
