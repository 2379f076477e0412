use ahash::AHashMap;
use anyhow::Result;
use log::{debug, info};
use std::{
    borrow::Borrow,
    collections::{BTreeMap, BTreeSet},
    iter::FromIterator,
};

use crate::{error::HmasError, input::csv_reader};

/// A many to many relation which can be looked up from either side.  Built once and never changed,
/// so the reverse direction is always the exact inverse of the forward direction
#[derive(Debug, Clone)]
pub struct BiMultiMap<K: Ord + Clone, V: Ord + Clone> {
    forward: BTreeMap<K, BTreeSet<V>>,
    reverse: BTreeMap<V, BTreeSet<K>>,
    empty_values: BTreeSet<V>, // returned for missing keys so lookups do not allocate
    empty_keys: BTreeSet<K>,
}

impl<K: Ord + Clone, V: Ord + Clone> Default for BiMultiMap<K, V> {
    fn default() -> Self {
        BiMultiMap {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
            empty_values: BTreeSet::new(),
            empty_keys: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Clone, V: Ord + Clone> FromIterator<(K, V)> for BiMultiMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(pairs: I) -> Self {
        let mut map = BiMultiMap::default();
        for (key, value) in pairs {
            map.reverse
                .entry(value.clone())
                .or_insert_with(BTreeSet::new)
                .insert(key.clone());
            map.forward
                .entry(key)
                .or_insert_with(BTreeSet::new)
                .insert(value);
        }
        map
    }
}

impl<K: Ord + Clone, V: Ord + Clone> BiMultiMap<K, V> {
    /// Values related to the key.  Missing keys give an empty set
    ///
    /// # Example
    /// ```
    /// use hmas_tools::mapping::BiMultiMap;
    ///
    /// let map: BiMultiMap<String, String> = vec![
    ///     ("S1".to_string(), "I1".to_string()),
    ///     ("S2".to_string(), "I1".to_string()),
    ///     ("S2".to_string(), "I2".to_string()),
    /// ]
    /// .into_iter()
    /// .collect();
    /// assert_eq!(map.forward("S2").len(), 2);
    /// assert_eq!(map.reverse("I1").iter().collect::<Vec<_>>(), vec!["S1", "S2"]);
    /// assert!(map.forward("S3").is_empty());
    /// ```
    pub fn forward<Q>(&self, key: &Q) -> &BTreeSet<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.forward.get(key).unwrap_or(&self.empty_values)
    }

    /// Keys related to the value.  Missing values give an empty set
    pub fn reverse<Q>(&self, value: &Q) -> &BTreeSet<K>
    where
        V: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.reverse.get(value).unwrap_or(&self.empty_keys)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.forward.contains_key(key)
    }

    pub fn contains_value<Q>(&self, value: &Q) -> bool
    where
        V: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.reverse.contains_key(value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.forward.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.reverse.keys()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Which isolates were spiked into which sample
#[derive(Debug, Clone, Default)]
pub struct SampleIsolates {
    map: BiMultiMap<String, String>, // sample -> isolates
}

impl SampleIsolates {
    /// Reads the sample to isolates mapping csv.  The file has a header, the first column is the
    /// sample and all other columns are isolates.  Blank cells are dropped and samples without any
    /// isolate are left out
    pub fn load(path: &str) -> Result<Self> {
        let mut reader = csv_reader(path, b',', true)?;
        let mut pairs = Vec::new();
        let mut without_isolates = 0;
        for (row_index, record_result) in reader.records().enumerate() {
            let record =
                record_result.map_err(|err| HmasError::format(path, row_index + 2, err.to_string()))?;
            let sample = record.get(0).unwrap_or("").trim();
            if sample.is_empty() {
                continue;
            }
            let isolates = record
                .iter()
                .skip(1)
                .map(str::trim)
                .filter(|isolate| !isolate.is_empty())
                .collect::<Vec<&str>>();
            if isolates.is_empty() {
                without_isolates += 1;
                debug!("Sample {} has no isolates within {}", sample, path);
            }
            for isolate in isolates {
                pairs.push((sample.to_string(), isolate.to_string()));
            }
        }
        let mapping = SampleIsolates::from_pairs(pairs);
        info!(
            "Mapped {} samples to {} isolates. {} samples without isolates were dropped",
            mapping.map.len(),
            mapping.map.values().count(),
            without_isolates
        );
        Ok(mapping)
    }

    /// Builds the mapping from (sample, isolate) pairs
    pub fn from_pairs<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        SampleIsolates {
            map: pairs.into_iter().collect(),
        }
    }

    pub fn isolates(&self, sample: &str) -> &BTreeSet<String> {
        self.map.forward(sample)
    }

    /// All samples which contain the isolate
    pub fn samples(&self, isolate: &str) -> &BTreeSet<String> {
        self.map.reverse(isolate)
    }

    pub fn contains_sample(&self, sample: &str) -> bool {
        self.map.contains_key(sample)
    }

    pub fn contains_isolate(&self, isolate: &str) -> bool {
        self.map.contains_value(isolate)
    }
}

/// One reference amplicon from the metasheet
#[derive(Debug, Clone, PartialEq)]
pub struct MetasheetEntry {
    pub primer: String,
    pub isolate: String,
}

/// The metasheet of the reference amplicons.  Every reference sequence ID is tied to the primer
/// pair that amplifies it and the isolate it came from
#[derive(Debug, Clone, Default)]
pub struct Metasheet {
    entries: AHashMap<String, MetasheetEntry>, // reference sequence ID -> entry
    predicted: BiMultiMap<String, String>,     // isolate -> primers
}

impl Metasheet {
    /// Reads the metasheet csv.  Columns are found by the header names 'seq_id', 'primer' and
    /// 'sample', where 'sample' holds the isolate name
    pub fn load(path: &str) -> Result<Self> {
        let mut reader = csv_reader(path, b',', true)?;
        let header = reader
            .headers()
            .map_err(|err| HmasError::format(path, 1, err.to_string()))?
            .clone();
        let find_column = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().trim_start_matches('#') == name)
                .ok_or_else(|| HmasError::format(path, 1, format!("missing the '{}' column", name)))
        };
        let seq_id_column = find_column("seq_id")?;
        let primer_column = find_column("primer")?;
        let isolate_column = find_column("sample")?;

        let mut entries = Vec::new();
        for (row_index, record_result) in reader.records().enumerate() {
            let line = row_index + 2;
            let record = record_result.map_err(|err| HmasError::format(path, line, err.to_string()))?;
            let field = |column: usize| record.get(column).unwrap_or("").trim().to_string();
            let seq_id = field(seq_id_column);
            if seq_id.is_empty() {
                continue;
            }
            let entry = MetasheetEntry {
                primer: field(primer_column),
                isolate: field(isolate_column),
            };
            if entry.primer.is_empty() || entry.isolate.is_empty() {
                return Err(HmasError::format(
                    path,
                    line,
                    format!("sequence {} is missing its primer or sample", seq_id),
                )
                .into());
            }
            entries.push((seq_id, entry));
        }
        let metasheet = Metasheet::from_entries(entries);
        info!(
            "Metasheet lists {} reference sequences from {} isolates",
            metasheet.entries.len(),
            metasheet.predicted.len()
        );
        Ok(metasheet)
    }

    /// Builds the metasheet from (sequence ID, entry) pairs.  Every row adds to the predicted
    /// primers, and the last row of a repeated sequence ID is the one looked up
    pub fn from_entries<I: IntoIterator<Item = (String, MetasheetEntry)>>(entries: I) -> Self {
        let rows = entries.into_iter().collect::<Vec<(String, MetasheetEntry)>>();
        let predicted = rows
            .iter()
            .map(|(_, entry)| (entry.isolate.clone(), entry.primer.clone()))
            .collect();
        let row_count = rows.len();
        let entries = rows.into_iter().collect::<AHashMap<String, MetasheetEntry>>();
        if entries.len() < row_count {
            debug!("Metasheet repeats {} sequence IDs", row_count - entries.len());
        }
        Metasheet { entries, predicted }
    }

    /// Primers expected to amplify from the isolate.  Unknown isolates give an empty set
    pub fn predicted_primers(&self, isolate: &str) -> &BTreeSet<String> {
        self.predicted.forward(isolate)
    }

    pub fn contains_isolate(&self, isolate: &str) -> bool {
        self.predicted.contains_key(isolate)
    }

    /// Primer and isolate of a reference sequence ID, as found in the BLAST subject column
    pub fn lookup(&self, seq_id: &str) -> Option<&MetasheetEntry> {
        self.entries.get(seq_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn reverse_is_inverse_test() {
        let pairs = vec![
            ("S1", "I1"),
            ("S1", "I2"),
            ("S2", "I2"),
            ("S3", "I3"),
            ("S3", "I3"),
        ];
        let map = pairs
            .iter()
            .map(|(sample, isolate)| (sample.to_string(), isolate.to_string()))
            .collect::<BiMultiMap<String, String>>();
        for sample in map.keys() {
            for isolate in map.forward(sample.as_str()) {
                assert!(map.reverse(isolate.as_str()).contains(sample));
            }
        }
        for isolate in map.values() {
            for sample in map.reverse(isolate.as_str()) {
                assert!(map.forward(sample.as_str()).contains(isolate));
            }
        }
        let forward_pairs = map
            .keys()
            .map(|sample| map.forward(sample.as_str()).len())
            .sum::<usize>();
        let reverse_pairs = map
            .values()
            .map(|isolate| map.reverse(isolate.as_str()).len())
            .sum::<usize>();
        assert_eq!(forward_pairs, 4);
        assert_eq!(forward_pairs, reverse_pairs);
        assert!(map.reverse("I9").is_empty());
    }

    #[test]
    fn load_sample_isolates_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "mapping.csv",
            "sample,isolate1,isolate2\n\
             S1,2014K_0979,\n\
             S2,2014K_0979,2011K_0222\n\
             Water1,,\n",
        );
        let mapping = SampleIsolates::load(&path).unwrap();
        assert!(mapping.contains_sample("S2"));
        assert!(!mapping.contains_sample("Water1"));
        assert_eq!(mapping.isolates("S1").len(), 1);
        assert_eq!(
            mapping.samples("2014K_0979").iter().collect::<Vec<&String>>(),
            vec!["S1", "S2"]
        );
        assert!(mapping.contains_isolate("2011K_0222"));
        assert!(mapping.isolates("S9").is_empty());
    }

    #[test]
    fn load_metasheet_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "metasheet.csv",
            "seq_id,primer,sample\n\
             OG0002941-OG0002941primerGroup0-2014K_0324,OG0002941primerGroup0,2014K_0324\n\
             OG0000294-OG0000294primerGroup8-2014K_0324,OG0000294primerGroup8,2014K_0324\n\
             OG0000294-OG0000294primerGroup8-ParatyphiA,OG0000294primerGroup8,ParatyphiA\n",
        );
        let metasheet = Metasheet::load(&path).unwrap();
        assert_eq!(metasheet.predicted_primers("2014K_0324").len(), 2);
        assert_eq!(
            metasheet.lookup("OG0000294-OG0000294primerGroup8-ParatyphiA"),
            Some(&MetasheetEntry {
                primer: "OG0000294primerGroup8".to_string(),
                isolate: "ParatyphiA".to_string()
            })
        );
        assert!(metasheet.lookup("unknown").is_none());
        assert!(metasheet.predicted_primers("unknown").is_empty());

        let path = write_file(
            &dir,
            "repeated.csv",
            "seq_id,primer,sample\nr1,PP1,IsoA\nr1,PP2,IsoA\nr2,PP3,IsoB\n",
        );
        let metasheet = Metasheet::load(&path).unwrap();
        assert_eq!(
            metasheet.predicted_primers("IsoA").iter().map(String::as_str).collect::<Vec<&str>>(),
            vec!["PP1", "PP2"]
        );
        assert_eq!(metasheet.lookup("r1").map(|entry| entry.primer.as_str()), Some("PP2"));

        let path = write_file(&dir, "bad.csv", "seq_id,primer\nseq1,PP1\n");
        let err = Metasheet::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HmasError>(),
            Some(HmasError::Format { line: 1, .. })
        ));
    }
}
