pub mod batch;
pub mod blast;
pub mod confusion;
pub mod count_table;
pub mod cutadapt;
pub mod error;
pub mod info;
pub mod input;
pub mod logging;
pub mod logs;
pub mod mapping;
pub mod metrics;
pub mod multiqc;
pub mod output;
pub mod pipeline;
pub mod primers;
pub mod reports;
pub mod tools;

use anyhow::{anyhow, Context, Result};
use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{info, LevelFilter};
use std::{path::Path, str::FromStr};

use crate::{
    count_table::CountTable,
    cutadapt::CutadaptConfig,
    info::{BatchConfig, BlastThresholds, ConfusionConfig, SampleSource},
};

/// One tool invocation with its settings
#[derive(Debug, Clone)]
pub enum Command {
    ConfusionMatrix(ConfusionConfig),
    BatchConfusionMatrix(BatchConfig),
    MakeCountTable {
        match_file: String,
        output: String,
        cache_table: bool,
    },
    CreateReport {
        sample: String,
        count_table: String,
        oligos: String,
        output: String,
    },
    CombineReports {
        reports: Vec<String>,
        output: String,
    },
    CombineLogs {
        logs: Vec<String>,
        output: String,
    },
    ParsePearLog {
        log: String,
        sample: String,
        output: String,
    },
    ParseQfilterLog {
        log: String,
        sample: String,
        output: String,
    },
    RunCutadapt(CutadaptConfig),
    RemoveSpace {
        fasta: String,
    },
    UpdateMultiqcConfig {
        config: String,
        header: String,
        versions: String,
        oligos: String,
    },
    ParseCommandline {
        command_line: String,
        params: Option<String>,
        output: String,
    },
}

/// A struct that contains and initiates all input arguments
#[derive(Debug, Clone)]
pub struct Args {
    pub command: Command,
    pub log_level: LevelFilter,    // debug with --verbose, warn with --quiet
    pub log_file: Option<String>, // log records are appended here instead of stderr
}

impl Args {
    pub fn new() -> Result<Self> {
        let total_cpus = num_cpus::get().to_string();
        Args::from_matches(&app(&total_cpus).get_matches())
    }

    /// Parses the arguments from any iterator.  The first item is the binary name
    pub fn from_iter<I, T>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let total_cpus = num_cpus::get().to_string();
        let matches = app(&total_cpus)
            .get_matches_from_safe(iter)
            .map_err(|err| anyhow!("{}", err.message))?;
        Args::from_matches(&matches)
    }

    fn from_matches(args: &ArgMatches) -> Result<Self> {
        // global flags may be given before or after the subcommand
        let (_, global_sub_args) = args.subcommand();
        let flag = |name: &str| {
            args.is_present(name) || global_sub_args.map_or(false, |sub_args| sub_args.is_present(name))
        };
        let log_level = logging::log_level(flag("verbose"), flag("quiet"));
        let log_file = args
            .value_of("log_file")
            .or_else(|| global_sub_args.and_then(|sub_args| sub_args.value_of("log_file")))
            .map(|path| path.to_string());
        let command = match args.subcommand() {
            ("confusion-matrix", Some(sub_args)) => {
                Command::ConfusionMatrix(confusion_config(sub_args)?)
            }
            ("batch-confusion-matrix", Some(sub_args)) => {
                Command::BatchConfusionMatrix(batch_config(sub_args)?)
            }
            ("make-count-table", Some(sub_args)) => Command::MakeCountTable {
                match_file: required(sub_args, "match_file")?,
                output: required(sub_args, "output")?,
                cache_table: sub_args.is_present("cache_table"),
            },
            ("create-report", Some(sub_args)) => Command::CreateReport {
                sample: required(sub_args, "sample")?,
                count_table: required(sub_args, "count_table")?,
                oligos: required(sub_args, "oligos")?,
                output: required(sub_args, "output")?,
            },
            ("combine-reports", Some(sub_args)) => Command::CombineReports {
                reports: file_list(sub_args, "reports"),
                output: required(sub_args, "output")?,
            },
            ("combine-logs", Some(sub_args)) => Command::CombineLogs {
                logs: file_list(sub_args, "logs"),
                output: required(sub_args, "output")?,
            },
            ("parse-pear-log", Some(sub_args)) => Command::ParsePearLog {
                log: required(sub_args, "log")?,
                sample: required(sub_args, "sample")?,
                output: required(sub_args, "output")?,
            },
            ("parse-qfilter-log", Some(sub_args)) => Command::ParseQfilterLog {
                log: required(sub_args, "log")?,
                sample: required(sub_args, "sample")?,
                output: required(sub_args, "output")?,
            },
            ("run-cutadapt", Some(sub_args)) => Command::RunCutadapt(CutadaptConfig {
                read1: required(sub_args, "read1")?,
                read2: required(sub_args, "read2")?,
                out_dir: required(sub_args, "out_dir")?,
                sample: required(sub_args, "sample")?,
                oligos: required(sub_args, "oligos")?,
                max_error: parsed(sub_args, "max_error")?,
                min_length: parsed(sub_args, "min_length")?,
                threads: parsed(sub_args, "threads")?,
            }),
            ("remove-space", Some(sub_args)) => Command::RemoveSpace {
                fasta: required(sub_args, "fasta")?,
            },
            ("update-multiqc-config", Some(sub_args)) => Command::UpdateMultiqcConfig {
                config: required(sub_args, "config")?,
                header: required(sub_args, "header")?,
                versions: required(sub_args, "versions")?,
                oligos: required(sub_args, "oligos")?,
            },
            ("parse-commandline", Some(sub_args)) => Command::ParseCommandline {
                command_line: required(sub_args, "cmdline")?,
                params: sub_args.value_of("params").map(|params| params.to_string()),
                output: required(sub_args, "output")?,
            },
            (other, _) => return Err(anyhow!("Unknown subcommand '{}'", other)),
        };
        Ok(Args {
            command,
            log_level,
            log_file,
        })
    }

    /// Name of the subcommand, used when logging the elapsed time
    pub fn command_name(&self) -> &'static str {
        match self.command {
            Command::ConfusionMatrix(_) => "confusion-matrix",
            Command::BatchConfusionMatrix(_) => "batch-confusion-matrix",
            Command::MakeCountTable { .. } => "make-count-table",
            Command::CreateReport { .. } => "create-report",
            Command::CombineReports { .. } => "combine-reports",
            Command::CombineLogs { .. } => "combine-logs",
            Command::ParsePearLog { .. } => "parse-pear-log",
            Command::ParseQfilterLog { .. } => "parse-qfilter-log",
            Command::RunCutadapt(_) => "run-cutadapt",
            Command::RemoveSpace { .. } => "remove-space",
            Command::UpdateMultiqcConfig { .. } => "update-multiqc-config",
            Command::ParseCommandline { .. } => "parse-commandline",
        }
    }
}

/// Runs the tool chosen on the command line
pub fn run(command: &Command) -> Result<()> {
    match command {
        Command::ConfusionMatrix(config) => {
            let matrix = pipeline::run_confusion_matrix(config)?;
            info!("Confusion matrix holds {} samples", matrix.len());
        }
        Command::BatchConfusionMatrix(config) => {
            let matrix = batch::run_batch(config)?;
            info!(
                "Combined confusion matrix of {} samples written to {}",
                matrix.len(),
                config.output
            );
        }
        Command::MakeCountTable {
            match_file,
            output,
            cache_table,
        } => {
            let table = CountTable::from_match_file(match_file)?;
            table.write_tsv(output)?;
            if *cache_table {
                table.write_cache(output)?;
            }
        }
        Command::CreateReport {
            sample,
            count_table,
            oligos,
            output,
        } => {
            let path = reports::create_sample_report(sample, count_table, oligos, output)?;
            info!("Wrote the report of {} to {}", sample, path);
        }
        Command::CombineReports { reports, output } => crate::reports::combine_reports(reports, output)?,
        Command::CombineLogs { logs, output } => crate::reports::combine_logs(logs, output)?,
        Command::ParsePearLog {
            log,
            sample,
            output,
        } => {
            logs::pear_log_summary(log, sample, output)?;
        }
        Command::ParseQfilterLog {
            log,
            sample,
            output,
        } => {
            logs::qfilter_log_summary(log, sample, output)?;
        }
        Command::RunCutadapt(config) => {
            info!("{}", config);
            cutadapt::run_cutadapt(config)?
        }
        Command::RemoveSpace { fasta } => {
            cutadapt::remove_space(fasta)?;
        }
        Command::UpdateMultiqcConfig {
            config,
            header,
            versions,
            oligos,
        } => multiqc::update_multiqc_config(config, header, versions, oligos)?,
        Command::ParseCommandline {
            command_line,
            params,
            output,
        } => multiqc::write_commandline_html(command_line, params.as_deref(), output)?,
    }
    Ok(())
}

fn required(args: &ArgMatches, name: &str) -> Result<String> {
    args.value_of(name)
        .map(|value| value.to_string())
        .ok_or_else(|| anyhow!("Missing value for {}", name))
}

fn parsed<T>(args: &ArgMatches, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = required(args, name)?;
    value
        .parse::<T>()
        .context(format!("Invalid value '{}' for {}", value, name))
}

// Lists may be given as several values or as one space delimited string
fn file_list(args: &ArgMatches, name: &str) -> Vec<String> {
    args.values_of(name)
        .map(|values| {
            values
                .flat_map(|value| value.split_whitespace())
                .map(|value| value.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn exclude_list(args: &ArgMatches) -> Vec<String> {
    args.values_of("exclude")
        .map(|values| values.map(|value| value.to_string()).collect())
        .unwrap_or_default()
}

fn thresholds(args: &ArgMatches) -> Result<BlastThresholds> {
    Ok(BlastThresholds::new(
        parsed(args, "pident")?,
        parsed(args, "pcov")?,
        parsed(args, "p_align")?,
    )?)
}

fn confusion_config(args: &ArgMatches) -> Result<ConfusionConfig> {
    let output = required(args, "output")?;
    let scratch_dir = match args.value_of("scratch_dir") {
        Some(scratch_dir) => scratch_dir.to_string(),
        None => Path::new(&output)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| parent.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string()),
    };
    Ok(ConfusionConfig {
        count_table: required(args, "count_table")?,
        unique_fasta: args.value_of("unique_fasta").unwrap_or_default().to_string(),
        reference: args.value_of("reference").unwrap_or_default().to_string(),
        samples: SampleSource::File(required(args, "sample_list")?),
        metasheet: required(args, "metasheet")?,
        mapping: required(args, "mapping")?,
        oligos: required(args, "oligos")?,
        output,
        blast_file: args.value_of("blast_file").map(|path| path.to_string()),
        report_file: args.value_of("report_file").map(|path| path.to_string()),
        exclude: exclude_list(args),
        thresholds: thresholds(args)?,
        max_hits: parsed(args, "max_hits")?,
        scratch_dir,
        cache_table: args.is_present("cache_table"),
    })
}

fn batch_config(args: &ArgMatches) -> Result<BatchConfig> {
    Ok(BatchConfig {
        input_dir: required(args, "input")?,
        reference: required(args, "reference")?,
        metasheet: required(args, "metasheet")?,
        mapping: required(args, "mapping")?,
        oligos: required(args, "oligos")?,
        output: required(args, "output")?,
        exclude: exclude_list(args),
        thresholds: thresholds(args)?,
        max_hits: parsed(args, "max_hits")?,
        threads: parsed(args, "threads")?,
        cache_table: args.is_present("cache_table"),
    })
}

fn input_arg<'a, 'b>(name: &'a str, long: &'b str, help: &'b str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(long)
        .takes_value(true)
        .required(true)
        .help(help)
}

// Arguments shared by the single run and the batch run
fn shared_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        input_arg("metasheet", "metasheet", "Metasheet csv with seq_id, primer and sample (isolate) columns")
            .short("e"),
        input_arg("mapping", "mapping", "Sample to isolate mapping csv").short("m"),
        input_arg("oligos", "oligos", "Oligo (primer panel) file").short("p"),
        Arg::with_name("exclude")
            .short("x")
            .long("exclude")
            .takes_value(true)
            .multiple(true)
            .use_delimiter(true)
            .help("Control samples left out of the confusion matrix, comma separated"),
        Arg::with_name("pident")
            .long("pident")
            .takes_value(true)
            .default_value("100")
            .help("Minimum percent identity of a BLAST hit, 0-100"),
        Arg::with_name("pcov")
            .long("pcov")
            .takes_value(true)
            .default_value("100")
            .help("Minimum query coverage of a BLAST hit, 0-100"),
        Arg::with_name("p_align")
            .long("p-align")
            .takes_value(true)
            .default_value("0.99")
            .help("Minimum alignment length over reference length of a BLAST hit, 0-1"),
        Arg::with_name("max_hits")
            .long("max-hits")
            .takes_value(true)
            .default_value("100")
            .help("Maximum number of BLAST target sequences kept per query"),
        Arg::with_name("cache_table")
            .long("cache-table")
            .takes_value(false)
            .help("Keep a binary cache of the parsed count table next to it as '<count table>.bin'"),
    ]
}

fn app<'a, 'b>(total_cpus: &'a str) -> App<'a, 'b> {
    App::new("hmas-tools")
        .version(crate_version!())
        .about("Validates HMAS amplicon sequencing runs against known positive controls")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .help("Debug logging.  Also writes the sample x primer tables next to the confusion matrix"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .global(true)
                .help("Only log warnings and errors"),
        )
        .arg(
            Arg::with_name("log_file")
                .long("log-file")
                .takes_value(true)
                .global(true)
                .help("Append the log to this file instead of stderr"),
        )
        .subcommand(
            SubCommand::with_name("confusion-matrix")
                .about("Builds the confusion matrix of one run from its count table and BLAST hits")
                .arg(input_arg("count_table", "count-table", "Count table, tab delimited").short("c"))
                .arg(
                    Arg::with_name("unique_fasta")
                        .short("f")
                        .long("unique-fasta")
                        .takes_value(true)
                        .required_unless("blast_file")
                        .help("Unique sequences of the run, the BLAST query"),
                )
                .arg(
                    Arg::with_name("reference")
                        .short("r")
                        .long("reference")
                        .takes_value(true)
                        .required_unless("blast_file")
                        .help("Fasta of the positive control target sequences"),
                )
                .arg(input_arg("sample_list", "sample-list", "Sample list, one sample per line").short("s"))
                .arg(input_arg("output", "output", "Confusion matrix output file").short("o"))
                .arg(
                    Arg::with_name("blast_file")
                        .short("b")
                        .long("blast-file")
                        .takes_value(true)
                        .help("Pre-computed BLAST hits.  BLAST is not run when given"),
                )
                .arg(
                    Arg::with_name("report_file")
                        .long("report-file")
                        .takes_value(true)
                        .help("Write the read depth report of the run here.  '.csv' is added when missing"),
                )
                .arg(
                    Arg::with_name("scratch_dir")
                        .long("scratch-dir")
                        .takes_value(true)
                        .help("Directory for the BLAST database and output.  Defaults to the output directory"),
                )
                .args(&shared_args()),
        )
        .subcommand(
            SubCommand::with_name("batch-confusion-matrix")
                .about("Builds the confusion matrix of every sample folder and combines them")
                .arg(input_arg("input", "input", "Directory with one folder per sample").short("i"))
                .arg(input_arg("reference", "reference", "Fasta of the positive control target sequences").short("r"))
                .arg(input_arg("output", "output", "Combined confusion matrix output file").short("o"))
                .arg(
                    Arg::with_name("threads")
                        .short("t")
                        .long("threads")
                        .takes_value(true)
                        .default_value(total_cpus)
                        .help("Maximum number of folders processed at once"),
                )
                .args(&shared_args()),
        )
        .subcommand(
            SubCommand::with_name("make-count-table")
                .about("Builds a count table from a vsearch match file")
                .arg(input_arg("match_file", "match-file", "vsearch match file, target and query columns").short("m"))
                .arg(input_arg("output", "output", "Count table output file").short("o"))
                .arg(
                    Arg::with_name("cache_table")
                        .long("cache-table")
                        .takes_value(false)
                        .help("Also write the binary cache of the count table"),
                ),
        )
        .subcommand(
            SubCommand::with_name("create-report")
                .about("Read depth report of one sample")
                .arg(input_arg("sample", "sample", "Sample name").short("s"))
                .arg(input_arg("count_table", "count-table", "Count table of the sample").short("c"))
                .arg(input_arg("oligos", "oligos", "Oligo (primer panel) file").short("p"))
                .arg(input_arg("output", "output", "Report output file.  '.csv' is added when missing").short("o")),
        )
        .subcommand(
            SubCommand::with_name("combine-reports")
                .about("Combines sample reports into the run report")
                .arg(
                    input_arg("reports", "reports", "Sample report files, space delimited or repeated")
                        .short("p")
                        .multiple(true),
                )
                .arg(input_arg("output", "output", "Run report output file").short("o")),
        )
        .subcommand(
            SubCommand::with_name("combine-logs")
                .about("Combines sample log summaries into one tab delimited table")
                .arg(
                    input_arg("logs", "logs", "Log summary csv files, space delimited or repeated")
                        .short("p")
                        .multiple(true),
                )
                .arg(input_arg("output", "output", "Combined output file").short("o")),
        )
        .subcommand(
            SubCommand::with_name("parse-pear-log")
                .about("Summarizes the read counts of a PEAR log")
                .arg(input_arg("log", "log", "PEAR log").short("p"))
                .arg(input_arg("sample", "sample", "Sample name").short("s"))
                .arg(input_arg("output", "output", "Summary csv output file").short("o")),
        )
        .subcommand(
            SubCommand::with_name("parse-qfilter-log")
                .about("Summarizes the read counts of a quality filter log")
                .arg(input_arg("log", "log", "Quality filter log").short("p"))
                .arg(input_arg("sample", "sample", "Sample name").short("s"))
                .arg(input_arg("output", "output", "Summary csv output file").short("o")),
        )
        .subcommand(
            SubCommand::with_name("run-cutadapt")
                .about("Removes the panel primers from paired reads with cutadapt")
                .arg(input_arg("read1", "read1", "R1 reads").short("f"))
                .arg(input_arg("read2", "read2", "R2 reads").short("r"))
                .arg(input_arg("out_dir", "out-dir", "Output directory").short("o"))
                .arg(input_arg("sample", "sample", "Sample name").short("s"))
                .arg(input_arg("oligos", "oligos", "Oligo (primer panel) file").short("p"))
                .arg(
                    Arg::with_name("max_error")
                        .short("e")
                        .long("max-error")
                        .takes_value(true)
                        .default_value("0")
                        .help("Maximum error rate of a primer match"),
                )
                .arg(
                    Arg::with_name("min_length")
                        .short("l")
                        .long("min-length")
                        .takes_value(true)
                        .default_value("1")
                        .help("Minimum read length after primer removal"),
                )
                .arg(
                    Arg::with_name("threads")
                        .short("t")
                        .long("threads")
                        .takes_value(true)
                        .default_value(total_cpus)
                        .help("Number of cutadapt threads"),
                ),
        )
        .subcommand(
            SubCommand::with_name("remove-space")
                .about("Joins the read IDs and the adapter names of a fasta file in place")
                .arg(input_arg("fasta", "input-file", "Fasta file").short("f")),
        )
        .subcommand(
            SubCommand::with_name("update-multiqc-config")
                .about("Adds the header information and software versions to the MultiQC config")
                .arg(Arg::with_name("config").index(1).required(true).help("multiqc_config.yaml"))
                .arg(
                    Arg::with_name("header")
                        .index(2)
                        .required(true)
                        .help("Header information as '[key: value, key: value]'"),
                )
                .arg(Arg::with_name("versions").index(3).required(true).help("Software versions yaml"))
                .arg(Arg::with_name("oligos").index(4).required(true).help("Oligo (primer panel) file")),
        )
        .subcommand(
            SubCommand::with_name("parse-commandline")
                .about("Writes the pipeline arguments as MultiQC custom content")
                .arg(input_arg("cmdline", "cmdline", "The full workflow command line"))
                .arg(
                    Arg::with_name("params")
                        .long("params")
                        .takes_value(true)
                        .help("Other '--key value' parameters of the workflow"),
                )
                .arg(input_arg("output", "output", "Output file").short("o")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{DEFAULT_MAX_HITS, DEFAULT_PCOV, DEFAULT_P_ALIGN};

    #[test]
    fn confusion_matrix_args_test() {
        let args = Args::from_iter(vec![
            "hmas-tools",
            "-v",
            "confusion-matrix",
            "--count-table",
            "run.final.count_table",
            "--sample-list",
            "samples.csv",
            "--metasheet",
            "metasheet.csv",
            "--mapping",
            "mapping.csv",
            "--oligos",
            "panel.oligos",
            "--output",
            "out/confusion_matrix",
            "--blast-file",
            "hits.out",
            "--exclude",
            "Water1,Water2",
            "--pident",
            "97",
        ])
        .unwrap();
        assert_eq!(args.log_level, LevelFilter::Debug);
        assert_eq!(args.command_name(), "confusion-matrix");
        match args.command {
            Command::ConfusionMatrix(config) => {
                assert_eq!(config.blast_file.as_deref(), Some("hits.out"));
                assert_eq!(config.exclude, vec!["Water1", "Water2"]);
                assert_eq!(config.thresholds.pident, 97.0);
                assert_eq!(config.thresholds.pcov, DEFAULT_PCOV);
                assert_eq!(config.thresholds.p_align, DEFAULT_P_ALIGN);
                assert_eq!(config.max_hits, DEFAULT_MAX_HITS);
                assert_eq!(config.scratch_dir, "out");
                assert!(config.unique_fasta.is_empty());
                assert!(!config.cache_table);
            }
            other => panic!("Expected the confusion matrix command, found {:?}", other),
        }
    }

    #[test]
    fn fasta_needed_without_blast_file_test() {
        assert!(Args::from_iter(vec![
            "hmas-tools",
            "confusion-matrix",
            "-c",
            "table",
            "-s",
            "samples",
            "-e",
            "metasheet",
            "-m",
            "mapping",
            "-p",
            "oligos",
            "-o",
            "out",
        ])
        .is_err());
    }

    #[test]
    fn invalid_threshold_test() {
        let err = Args::from_iter(vec![
            "hmas-tools",
            "batch-confusion-matrix",
            "-i",
            "runs",
            "-r",
            "reference.fasta",
            "-e",
            "metasheet",
            "-m",
            "mapping",
            "-p",
            "oligos",
            "-o",
            "combined",
            "--p-align",
            "1.5",
        ])
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<error::HmasError>(),
            Some(error::HmasError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn report_list_test() {
        let args = Args::from_iter(vec![
            "hmas-tools",
            "-q",
            "combine-reports",
            "--reports",
            "S1.csv S2.csv",
            "S3.csv",
            "--output",
            "run.csv",
        ])
        .unwrap();
        assert_eq!(args.log_level, LevelFilter::Warn);
        match args.command {
            Command::CombineReports { reports, output } => {
                assert_eq!(reports, vec!["S1.csv", "S2.csv", "S3.csv"]);
                assert_eq!(output, "run.csv");
            }
            other => panic!("Expected the combine reports command, found {:?}", other),
        }
    }

    #[test]
    fn multiqc_positional_args_test() {
        let args = Args::from_iter(vec![
            "hmas-tools",
            "update-multiqc-config",
            "multiqc_config.yaml",
            "[Run: 1]",
            "versions.yml",
            "panel.oligos",
        ])
        .unwrap();
        match args.command {
            Command::UpdateMultiqcConfig { header, oligos, .. } => {
                assert_eq!(header, "[Run: 1]");
                assert_eq!(oligos, "panel.oligos");
            }
            other => panic!("Expected the MultiQC command, found {:?}", other),
        }
    }
}
