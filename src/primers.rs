use ahash::AHashMap;
use anyhow::{Context, Result};
use std::{collections::BTreeSet, io::BufRead};

use crate::{error::HmasError, input::open_reader};

/// Lines of the oligo file which define a primer pair start with this token
pub const PRIMER_MARKER: &str = "primer";

/// Complement of a single IUPAC nucleotide code.  Symbols outside of the table are returned as is
///
/// # Example
/// ```
/// use hmas_tools::primers::complement;
///
/// assert_eq!(complement('A'), 'T');
/// assert_eq!(complement('Y'), 'R');
/// assert_eq!(complement('-'), '-');
/// ```
pub fn complement(base: char) -> char {
    match base {
        'A' => 'T',
        'T' => 'A',
        'G' => 'C',
        'C' => 'G',
        'U' => 'A',
        'Y' => 'R',
        'R' => 'Y',
        'K' => 'M',
        'M' => 'K',
        'B' => 'V',
        'V' => 'B',
        'D' => 'H',
        'H' => 'D',
        'N' => 'N',
        other => other,
    }
}

/// Reverse complements a nucleotide sequence with IUPAC ambiguity codes
///
/// # Example
/// ```
/// use hmas_tools::primers::revcomp;
///
/// assert_eq!(revcomp("GRCGGGGACATTCTCC"), "GGAGAATGTCCCCGYC");
/// ```
pub fn revcomp(seq: &str) -> String {
    seq.chars().rev().map(complement).collect()
}

/// One primer pair from the oligo file
#[derive(Debug, Clone, PartialEq)]
pub struct Primer {
    pub name: String,
    pub forward: String,
    pub reverse: String,
    pub reverse_complement: String, // reverse complement of the reverse primer, computed at load
}

impl Primer {
    pub fn new(name: &str, forward: &str, reverse: &str) -> Self {
        Primer {
            name: name.to_string(),
            forward: forward.to_string(),
            reverse: reverse.to_string(),
            reverse_complement: revcomp(reverse),
        }
    }

    /// Linked adapters for cutadapt.  The first is trimmed from read 1 and the second from read 2
    ///
    /// # Example
    /// ```
    /// use hmas_tools::primers::Primer;
    ///
    /// let primer = Primer::new("PP1", "AACG", "TTGC");
    /// let (read1, read2) = primer.linked_adapters();
    /// assert_eq!(read1, "PP1=^AACG...GCAA");
    /// assert_eq!(read2, "PP1=^TTGC...CGTT");
    /// ```
    pub fn linked_adapters(&self) -> (String, String) {
        (
            format!("{}=^{}...{}", self.name, self.forward, self.reverse_complement),
            format!("{}=^{}...{}", self.name, self.reverse, revcomp(&self.forward)),
        )
    }
}

/// The full set of primer pairs used by the assay.  Immutable once loaded
#[derive(Debug, Clone, Default)]
pub struct PrimerPanel {
    primers: Vec<Primer>,
    index: AHashMap<String, usize>, // primer name -> position within primers
}

impl PrimerPanel {
    /// Reads a tab delimited oligo file.  Every line which starts with 'primer' needs the columns
    /// marker, forward sequence, reverse sequence and primer name.  All other lines are ignored.
    /// A primer name found twice keeps the last definition
    pub fn load(oligo_path: &str) -> Result<Self> {
        let mut panel = PrimerPanel::default();
        for (line_index, line_result) in open_reader(oligo_path)?.lines().enumerate() {
            let line = line_result.context(format!("Failed to read line from {}", oligo_path))?;
            if !line.starts_with(PRIMER_MARKER) {
                continue;
            }
            let fields = line.split('\t').collect::<Vec<&str>>();
            if fields.len() < 4 {
                return Err(HmasError::format(
                    oligo_path,
                    line_index + 1,
                    format!(
                        "expected 4 tab delimited columns (marker, forward, reverse, name), found {}",
                        fields.len()
                    ),
                )
                .into());
            }
            let name = fields[3].trim();
            if name.is_empty() {
                return Err(
                    HmasError::format(oligo_path, line_index + 1, "missing primer name").into(),
                );
            }
            panel.insert(Primer::new(name, fields[1].trim(), fields[2].trim()));
        }
        Ok(panel)
    }

    /// Builds a panel from already parsed primers
    pub fn from_primers(primers: Vec<Primer>) -> Self {
        let mut panel = PrimerPanel::default();
        for primer in primers {
            panel.insert(primer);
        }
        panel
    }

    fn insert(&mut self, primer: Primer) {
        if let Some(&position) = self.index.get(&primer.name) {
            self.primers[position] = primer;
        } else {
            self.index.insert(primer.name.clone(), self.primers.len());
            self.primers.push(primer);
        }
    }

    /// All primer names within the panel
    pub fn names(&self) -> BTreeSet<String> {
        self.primers
            .iter()
            .map(|primer| primer.name.clone())
            .collect()
    }

    /// Forward sequence and reverse complemented reverse sequence of the primer pair
    pub fn sequences(&self, name: &str) -> Option<(&str, &str)> {
        self.get(name)
            .map(|primer| (primer.forward.as_str(), primer.reverse_complement.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&Primer> {
        self.index.get(name).map(|&position| &self.primers[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Primers in the order they were defined within the oligo file
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Primer> {
        self.primers.iter()
    }

    pub fn len(&self) -> usize {
        self.primers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_oligos(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.oligos");
        std::fs::write(&path, contents).unwrap();
        let path_string = path.to_str().unwrap().to_string();
        (dir, path_string)
    }

    #[test]
    fn load_panel_test() {
        let (_dir, path) = write_oligos(
            "#mothur oligos\n\
             primer\tTTATCGGGATGCCAGATCTGC\tGRCGGGGACATTCTCCTCCAG\tOG0003222primerGroup\n\
             barcode\tAAAA\tCCCC\tignored\n\
             primer\tACGT\tAACC\tOG0000294primerGroup8\n",
        );
        let panel = PrimerPanel::load(&path).unwrap();
        assert_eq!(panel.len(), 2);
        assert!(panel.contains("OG0000294primerGroup8"));
        assert!(!panel.contains("ignored"));
        assert_eq!(
            panel.sequences("OG0003222primerGroup"),
            Some(("TTATCGGGATGCCAGATCTGC", "CTGGAGGAGAATGTCCCCGYC"))
        );
        assert_eq!(
            panel.names().into_iter().collect::<Vec<String>>(),
            vec!["OG0000294primerGroup8", "OG0003222primerGroup"]
        );
    }

    #[test]
    fn malformed_panel_test() {
        let (_dir, path) = write_oligos(
            "primer\tACGT\tAACC\tPP1\n\
             primer\tACGT\tAACC\n",
        );
        let err = PrimerPanel::load(&path).unwrap_err();
        match err.downcast_ref::<HmasError>() {
            Some(HmasError::Format { line, .. }) => assert_eq!(*line, 2),
            other => panic!("Expected a format error, found {:?}", other),
        }
    }

    #[test]
    fn duplicate_primer_test() {
        let (_dir, path) = write_oligos("primer\tAAAA\tCCCC\tPP1\nprimer\tGGGG\tTTTT\tPP1\n");
        let panel = PrimerPanel::load(&path).unwrap();
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.sequences("PP1"), Some(("GGGG", "AAAA")));
    }

    #[test]
    fn revcomp_round_trip_test() {
        let iupac = "ATGCYRKMBVDHN";
        for seq in ["ACGTTGCA", "GRCGGGGACATTCTCCTCCAG", iupac, ""] {
            assert_eq!(revcomp(&revcomp(seq)), seq);
        }
        // unrecognised symbols are kept, lower case included
        assert_eq!(revcomp("ac-GT"), "AC-ca");
    }
}
