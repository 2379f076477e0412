use anyhow::{anyhow, bail, Context, Result};
use log::info;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::{fmt::Write as FmtWrite, fs, path::Path};

/// Parses the MultiQC header string '[key: value, key: value]' into ordered pairs.  A key given
/// twice keeps its first position and its last value
///
/// # Example
/// ```
/// use hmas_tools::multiqc::parse_header_info;
///
/// let pairs = parse_header_info("[Run: M3235-23-008, Analyst: lab]").unwrap();
/// assert_eq!(pairs, vec![
///     ("Run".to_string(), "M3235-23-008".to_string()),
///     ("Analyst".to_string(), "lab".to_string()),
/// ]);
/// ```
pub fn parse_header_info(header: &str) -> Result<Vec<(String, String)>> {
    let header = header.trim_matches(|c: char| c == '[' || c == ']');
    let pair_regex = Regex::new(r"([^:,]+):([^,]+)")?;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for captures in pair_regex.captures_iter(header) {
        let key = captures[1].trim().to_string();
        let value = captures[2].trim().to_string();
        upsert(&mut pairs, key, value);
    }
    Ok(pairs)
}

fn upsert(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter().position(|(known, _)| *known == key) {
        Some(position) => pairs[position].1 = value,
        None => pairs.push((key, value)),
    }
}

/// Flattens a versions yaml of 'process: {tool: version}' sections into a single 'tool: version'
/// mapping.  A tool listed under several processes keeps the last version
pub fn flatten_versions(versions: &Value) -> Result<Mapping> {
    let sections = match versions {
        Value::Mapping(sections) => sections,
        Value::Null => return Ok(Mapping::new()),
        _ => bail!("Software versions need to be a mapping of sections"),
    };
    let mut flat = Mapping::new();
    for (section, tools) in sections {
        let tools = tools.as_mapping().ok_or_else(|| {
            anyhow!(
                "Software version section {} is not a mapping",
                section.as_str().unwrap_or("?")
            )
        })?;
        for (tool, version) in tools {
            flat.insert(tool.clone(), version.clone());
        }
    }
    Ok(flat)
}

/// Rewrites the MultiQC config with the report header information and the software versions.  The
/// oligo file name is added as the last header entry
pub fn update_multiqc_config(
    config_path: &str,
    header: &str,
    versions_path: &str,
    oligo_path: &str,
) -> Result<()> {
    let config_text =
        fs::read_to_string(config_path).context(format!("Failed to read {}", config_path))?;
    let mut config = match serde_yaml::from_str::<Value>(&config_text)
        .context(format!("Failed to parse {}", config_path))?
    {
        Value::Mapping(config) => config,
        Value::Null => Mapping::new(),
        _ => bail!("{} is not a yaml mapping", config_path),
    };

    let versions_text =
        fs::read_to_string(versions_path).context(format!("Failed to read {}", versions_path))?;
    let versions = serde_yaml::from_str::<Value>(&versions_text)
        .context(format!("Failed to parse {}", versions_path))?;
    let software_versions = flatten_versions(&versions)?;

    let oligo_name = Path::new(oligo_path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| oligo_path.to_string());
    let mut header_info = parse_header_info(header)?
        .into_iter()
        .map(|(key, value)| single_entry(key, value))
        .collect::<Vec<Value>>();
    header_info.push(single_entry("oligo file".to_string(), oligo_name));

    config.insert(
        Value::String("report_header_info".to_string()),
        Value::Sequence(header_info),
    );
    config.insert(
        Value::String("software_versions".to_string()),
        Value::Mapping(software_versions),
    );
    let updated = serde_yaml::to_string(&Value::Mapping(config))?;
    fs::write(config_path, updated).context(format!("Failed to write {}", config_path))?;
    info!("Updated MultiQC config {}", config_path);
    Ok(())
}

fn single_entry(key: String, value: String) -> Value {
    let mut entry = Mapping::new();
    entry.insert(Value::String(key), Value::String(value));
    Value::Mapping(entry)
}

/// Splits a command line the way a POSIX shell would.  Single quotes are literal, double quotes
/// allow backslash escapes of '"', '\', '$' and '`', and a backslash outside quotes escapes the
/// next character
///
/// # Example
/// ```
/// use hmas_tools::multiqc::shell_split;
///
/// let tokens = shell_split(r#"nextflow run main.nf --title "HMAS run" --note 'a b'"#).unwrap();
/// assert_eq!(tokens, vec!["nextflow", "run", "main.nf", "--title", "HMAS run", "--note", "a b"]);
/// ```
pub fn shell_split(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(quoted) => current.push(quoted),
                        None => bail!("No closing single quotation within: {}", line),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => bail!("No closing double quotation within: {}", line),
                        },
                        Some(quoted) => current.push(quoted),
                        None => bail!("No closing double quotation within: {}", line),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => bail!("No escaped character at the end of: {}", line),
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Collects '--key value' pairs.  A '--key' directly followed by another '--key' has no value and
/// is skipped
pub fn parse_key_values(line: &str) -> Result<Vec<(String, String)>> {
    let tokens = shell_split(line)?;
    let mut pairs = Vec::new();
    let mut index = 0;
    while index + 1 < tokens.len() {
        if tokens[index].starts_with("--") && !tokens[index + 1].starts_with("--") {
            pairs.push((tokens[index].clone(), tokens[index + 1].clone()));
            index += 2;
        } else {
            index += 1;
        }
    }
    Ok(pairs)
}

/// MultiQC custom content listing the main pipeline arguments.  Params come first and a key given
/// again keeps its first position with the later value
pub fn commandline_html(command_line: &str, params: Option<&str>) -> Result<String> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let params_pairs = match params {
        Some(params) => parse_key_values(params)?,
        None => Vec::new(),
    };
    for (key, value) in params_pairs.into_iter().chain(parse_key_values(command_line)?) {
        upsert(&mut pairs, key, value);
    }
    let mut html = String::from(
        "# id: 'cli-html'\n\
         # section_name: 'Pipeline Arguments'\n\
         # description: 'This section lists some of the main arguments used'\n\
         # plot_type: 'html'\n\n\
         <dl class=dl-horizontal>\n",
    );
    for (key, value) in &pairs {
        write!(html, "  <dt>{}</dt>\n  <dd>{}</dd>\n", key, value)?;
    }
    html.push_str("</dl>\n");
    Ok(html)
}

/// Writes the pipeline arguments section for MultiQC
pub fn write_commandline_html(command_line: &str, params: Option<&str>, output: &str) -> Result<()> {
    let html = commandline_html(command_line, params)?;
    fs::write(output, html).context(format!("Failed to write {}", output))?;
    info!("Wrote pipeline arguments to {}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_info_test() {
        let pairs = parse_header_info("[Run ID: 0042, Panel: HMAS2, Run ID: 0043]").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("Run ID".to_string(), "0043".to_string()),
                ("Panel".to_string(), "HMAS2".to_string()),
            ]
        );
    }

    #[test]
    fn update_config_test() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("multiqc_config.yaml");
        std::fs::write(
            &config,
            "title: HMAS QC\nreport_header_info:\n  - old: entry\n",
        )
        .unwrap();
        let versions = dir.path().join("versions.yml");
        std::fs::write(
            &versions,
            "CUTADAPT:\n  cutadapt: 4.4\nPEAR:\n  pear: 0.9.6\nVSEARCH:\n  vsearch: 2.22.1\n  cutadapt: 4.5\n",
        )
        .unwrap();
        update_multiqc_config(
            config.to_str().unwrap(),
            "[Run: M3235, Analyst: lab]",
            versions.to_str().unwrap(),
            "/panels/hmas2.oligos",
        )
        .unwrap();

        let updated: Value =
            serde_yaml::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();
        assert_eq!(updated["title"], Value::String("HMAS QC".to_string()));
        let header = updated["report_header_info"].as_sequence().unwrap();
        assert_eq!(header.len(), 3);
        assert_eq!(header[0]["Run"], Value::String("M3235".to_string()));
        assert_eq!(header[2]["oligo file"], Value::String("hmas2.oligos".to_string()));
        let software = updated["software_versions"].as_mapping().unwrap();
        assert_eq!(software.len(), 3);
        assert_eq!(updated["software_versions"]["cutadapt"].as_f64(), Some(4.5));
        assert_eq!(
            updated["software_versions"]["vsearch"],
            Value::String("2.22.1".to_string())
        );
    }

    #[test]
    fn shell_split_test() {
        assert_eq!(
            shell_split(r#"--a "x \"y\"" b\ c '' --d"#).unwrap(),
            vec!["--a", "x \"y\"", "b c", "", "--d"]
        );
        assert!(shell_split("--a 'open").is_err());
    }

    #[test]
    fn commandline_html_test() {
        let html = commandline_html(
            "nextflow run hmas2 --reads /data/run1 --oligo hmas.oligos --resume --outdir out",
            Some("--outdir default_out --cpus 4"),
        )
        .unwrap();
        assert_eq!(
            html,
            "# id: 'cli-html'\n\
             # section_name: 'Pipeline Arguments'\n\
             # description: 'This section lists some of the main arguments used'\n\
             # plot_type: 'html'\n\n\
             <dl class=dl-horizontal>\n\
             \x20 <dt>--outdir</dt>\n\x20 <dd>out</dd>\n\
             \x20 <dt>--cpus</dt>\n\x20 <dd>4</dd>\n\
             \x20 <dt>--reads</dt>\n\x20 <dd>/data/run1</dd>\n\
             \x20 <dt>--oligo</dt>\n\x20 <dd>hmas.oligos</dd>\n\
             </dl>\n"
        );
    }
}
