use itertools::Itertools;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;

use crate::{
    count_table::SamplePrimerMatrix,
    input::sort_case_insensitive,
    mapping::{Metasheet, SampleIsolates},
    metrics::Metrics,
};

/// Where each primer of the panel falls for one sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    pub true_positive: BTreeSet<String>,
    pub false_positive: BTreeSet<String>,
    pub false_negative: BTreeSet<String>,
    pub true_negative: BTreeSet<String>,
}

/// Sorts every panel primer of a sample into TP, FP, FN or TN.
///
/// * TP: validated, meaning observed and confirmed by BLAST
/// * TN: neither observed nor predicted
/// * FP: observed but not validated, and not predicted
/// * FN: predicted but not observed, or observed and predicted without validation
///
/// Observed and validated primers outside the panel are dropped, as are validated primers which
/// were not observed
///
/// # Example
/// ```
/// use hmas_tools::confusion::classify;
/// use std::collections::BTreeSet;
///
/// let set = |primers: &[&str]| primers.iter().map(|p| p.to_string()).collect::<BTreeSet<String>>();
/// let classification = classify(&set(&["P1", "P2", "P3"]), &set(&["P1", "P2"]), &set(&["P1", "P3"]), &set(&["P1"]));
/// assert_eq!(classification.true_positive, set(&["P1"]));
/// assert_eq!(classification.false_positive, set(&["P3"]));
/// assert_eq!(classification.false_negative, set(&["P2"]));
/// assert!(classification.true_negative.is_empty());
/// ```
pub fn classify(
    panel: &BTreeSet<String>,
    predicted: &BTreeSet<String>,
    observed: &BTreeSet<String>,
    validated: &BTreeSet<String>,
) -> Classification {
    let observed = within_panel(panel, observed, "observed");
    let mut validated = within_panel(panel, validated, "validated");
    let unobserved_validated = validated
        .difference(&observed)
        .cloned()
        .collect::<BTreeSet<String>>();
    for primer in &unobserved_validated {
        warn!("Primer {} validated by BLAST without being observed, dropped", primer);
        validated.remove(primer);
    }

    let predicted_negative = panel - predicted;
    let observed_negative = panel - &observed;

    let true_positive = validated;
    let true_negative = &observed_negative & &predicted_negative;
    let false_positive = &(&observed - &true_positive) & &predicted_negative;
    let false_negative = &(&observed_negative - &true_negative)
        | &(&(&observed - &true_positive) - &false_positive);
    Classification {
        true_positive,
        false_positive,
        false_negative,
        true_negative,
    }
}

fn within_panel(panel: &BTreeSet<String>, primers: &BTreeSet<String>, kind: &str) -> BTreeSet<String> {
    let outside = primers.difference(panel).collect::<Vec<&String>>();
    if !outside.is_empty() {
        warn!(
            "Primers {} are {} but not within the primer panel, dropped",
            outside.iter().join(", "),
            kind
        );
    }
    primers.intersection(panel).cloned().collect()
}

impl Classification {
    /// Invariant violations against the panel.  The four sets need to be pairwise disjoint and
    /// together hold exactly the panel.  Empty when the classification is sound
    pub fn check(&self, panel: &BTreeSet<String>) -> Vec<String> {
        let mut violations = Vec::new();
        let sum = self.true_positive.len()
            + self.false_positive.len()
            + self.false_negative.len()
            + self.true_negative.len();
        if sum != panel.len() {
            violations.push(format!(
                "TP + FP + FN + TN is {} while the panel holds {} primers",
                sum,
                panel.len()
            ));
        }
        let named_sets = [
            ("TP", &self.true_positive),
            ("FP", &self.false_positive),
            ("FN", &self.false_negative),
            ("TN", &self.true_negative),
        ];
        for ((first_name, first), (second_name, second)) in named_sets.iter().tuple_combinations() {
            let shared = first.intersection(second).collect::<Vec<&String>>();
            if !shared.is_empty() {
                violations.push(format!(
                    "{} and {} share {}",
                    first_name,
                    second_name,
                    shared.iter().join(", ")
                ));
            }
        }
        let classified = named_sets
            .iter()
            .flat_map(|(_, set)| set.iter())
            .collect::<BTreeSet<&String>>();
        let unclassified = panel
            .iter()
            .filter(|primer| !classified.contains(primer))
            .collect::<Vec<&String>>();
        if !unclassified.is_empty() {
            violations.push(format!("{} are not classified", unclassified.iter().join(", ")));
        }
        violations
    }
}

/// One output row: the confusion matrix counts of a sample and the derived metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionRow {
    pub sample: String,
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_negative: usize,
    pub metrics: Metrics,
}

impl ConfusionRow {
    pub fn new(
        sample: &str,
        true_positive: usize,
        false_positive: usize,
        false_negative: usize,
        true_negative: usize,
    ) -> Self {
        ConfusionRow {
            sample: sample.to_string(),
            true_positive,
            false_positive,
            false_negative,
            true_negative,
            metrics: Metrics::from_counts(
                true_positive,
                false_positive,
                false_negative,
                true_negative,
            ),
        }
    }

    pub fn from_classification(sample: &str, classification: &Classification) -> Self {
        ConfusionRow::new(
            sample,
            classification.true_positive.len(),
            classification.false_positive.len(),
            classification.false_negative.len(),
            classification.true_negative.len(),
        )
    }
}

/// The confusion matrix of a run, one row per sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfusionMatrix {
    pub rows: Vec<ConfusionRow>,
}

impl ConfusionMatrix {
    /// Classifies every sample against the panel.  Samples are processed in case-insensitive
    /// order.  A sample missing from the mapping, or an isolate missing from the metasheet, adds
    /// nothing to the predicted primers and is logged as a warning
    pub fn build(
        samples: &[String],
        panel: &BTreeSet<String>,
        mapping: &SampleIsolates,
        metasheet: &Metasheet,
        raw: &SamplePrimerMatrix,
        validated: &SamplePrimerMatrix,
    ) -> Self {
        let mut samples = samples.to_vec();
        sort_case_insensitive(&mut samples);

        let mut rows = Vec::with_capacity(samples.len());
        for sample in &samples {
            let predicted = predicted_primers(sample, mapping, metasheet);
            let without_columns = raw
                .row(sample)
                .map(|row| row.iter().all(Option::is_none))
                .unwrap_or(true);
            if without_columns {
                warn!("Sample {} has no columns within the count table", sample);
            }
            let observed = raw.observed(sample);
            let validated_primers = validated.observed(sample);
            let classification = classify(panel, &predicted, &observed, &validated_primers);
            for violation in classification.check(panel) {
                error!("Sample {}: {}", sample, violation);
            }
            let row = ConfusionRow::from_classification(sample, &classification);
            debug!(
                "Sample {}\nFP: {}\nFN: {}\nTN: {}\n{}",
                sample,
                classification.false_positive.iter().join(", "),
                classification.false_negative.iter().join(", "),
                classification.true_negative.iter().join(", "),
                row.metrics
            );
            rows.push(row);
        }
        info!("Built the confusion matrix of {} samples", rows.len());
        ConfusionMatrix { rows }
    }

    /// Adds the rows of another matrix after the current rows
    pub fn extend(&mut self, other: ConfusionMatrix) {
        self.rows.extend(other.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Union of the metasheet primers of every isolate within the sample
pub fn predicted_primers(
    sample: &str,
    mapping: &SampleIsolates,
    metasheet: &Metasheet,
) -> BTreeSet<String> {
    if !mapping.contains_sample(sample) {
        warn!("{} can't be found in the sample-isolates mapping file", sample);
        return BTreeSet::new();
    }
    let mut predicted = BTreeSet::new();
    for isolate in mapping.isolates(sample) {
        if !metasheet.contains_isolate(isolate) {
            warn!("{} can't be found in the metasheet", isolate);
            continue;
        }
        predicted.extend(metasheet.predicted_primers(isolate).iter().cloned());
    }
    predicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MetasheetEntry;
    use std::collections::BTreeMap;

    fn set(primers: &[&str]) -> BTreeSet<String> {
        primers.iter().map(|primer| primer.to_string()).collect()
    }

    fn metasheet() -> Metasheet {
        Metasheet::from_entries(
            [("r1", "P1", "IsoA"), ("r2", "P2", "IsoA"), ("r3", "P3", "IsoB")]
                .iter()
                .map(|(seq_id, primer, isolate)| {
                    (
                        seq_id.to_string(),
                        MetasheetEntry {
                            primer: primer.to_string(),
                            isolate: isolate.to_string(),
                        },
                    )
                }),
        )
    }

    fn matrix(cells: &[(&str, u64)], samples: &[&str]) -> SamplePrimerMatrix {
        let totals = cells
            .iter()
            .map(|(column, total)| (column.to_string(), *total))
            .collect::<BTreeMap<String, u64>>();
        let columns = totals.keys().cloned().collect::<BTreeSet<String>>();
        let samples = samples.iter().map(|sample| sample.to_string()).collect::<Vec<String>>();
        SamplePrimerMatrix::from_totals(&totals, &samples, &columns)
    }

    #[test]
    fn three_primer_scenario_test() {
        let panel = set(&["P1", "P2", "P3"]);
        let classification = classify(&panel, &set(&["P1", "P2"]), &set(&["P1", "P3"]), &set(&["P1"]));
        assert_eq!(classification.true_positive, set(&["P1"]));
        assert_eq!(classification.false_positive, set(&["P3"]));
        assert_eq!(classification.false_negative, set(&["P2"]));
        assert!(classification.true_negative.is_empty());
        assert!(classification.check(&panel).is_empty());

        let row = ConfusionRow::from_classification("S", &classification);
        assert_eq!(row.metrics.sensitivity, Some(0.5));
        assert_eq!(row.metrics.precision, Some(0.5));
        assert_eq!(row.metrics.specificity, Some(0.0));
    }

    #[test]
    fn unmapped_sample_test() {
        let panel = set(&["P1", "P2", "P3", "P4"]);
        let mapping = SampleIsolates::from_pairs(vec![("S1".to_string(), "IsoA".to_string())]);
        let predicted = predicted_primers("S9", &mapping, &metasheet());
        assert!(predicted.is_empty());
        let classification = classify(&panel, &predicted, &set(&["P1", "P2"]), &BTreeSet::new());
        assert_eq!(classification.false_positive, set(&["P1", "P2"]));
        assert_eq!(classification.true_negative, set(&["P3", "P4"]));
        assert!(classification.true_positive.is_empty());
        assert!(classification.false_negative.is_empty());
        assert!(classification.check(&panel).is_empty());
    }

    #[test]
    fn panel_sum_invariant_test() {
        let panel = set(&["P1", "P2", "P3", "P4"]);
        let subsets = (0..16)
            .map(|mask: usize| {
                panel
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| mask & (1usize << *index) != 0)
                    .map(|(_, primer)| primer.clone())
                    .collect::<BTreeSet<String>>()
            })
            .collect::<Vec<BTreeSet<String>>>();
        for predicted in &subsets {
            for observed in &subsets {
                for validated in &subsets {
                    let classification = classify(&panel, predicted, observed, validated);
                    assert!(classification.check(&panel).is_empty());
                    assert!(classification.true_positive.is_subset(observed));
                }
            }
        }
    }

    #[test]
    fn out_of_panel_primers_dropped_test() {
        let panel = set(&["P1", "P2"]);
        let classification = classify(&panel, &set(&["P1"]), &set(&["P1", "P9"]), &set(&["P1", "P2", "P9"]));
        assert_eq!(classification.true_positive, set(&["P1"]));
        assert_eq!(classification.true_negative, set(&["P2"]));
        assert!(classification.check(&panel).is_empty());
    }

    #[test]
    fn check_reports_violations_test() {
        let panel = set(&["P1", "P2"]);
        let classification = Classification {
            true_positive: set(&["P1"]),
            false_positive: set(&["P1"]),
            false_negative: BTreeSet::new(),
            true_negative: BTreeSet::new(),
        };
        let violations = classification.check(&panel);
        // the sum still matches, but P1 is counted twice and P2 never
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("TP and FP share P1"));
        assert!(violations[1].contains("P2"));
    }

    #[test]
    fn build_matrix_test() {
        let panel = set(&["P1", "P2", "P3"]);
        let mapping = SampleIsolates::from_pairs(vec![
            ("s2".to_string(), "IsoA".to_string()),
            ("S1".to_string(), "IsoA".to_string()),
            ("S1".to_string(), "IsoMissing".to_string()),
        ]);
        let samples = vec!["s2".to_string(), "S1".to_string(), "S3".to_string()];
        let raw = matrix(
            &[("S1.P1", 12), ("S1.P3", 4), ("s2.P1", 7), ("s2.P2", 0), ("S3.P3", 9)],
            &["s2", "S1", "S3"],
        );
        let validated = matrix(&[("S1.P1", 12), ("s2.P1", 7)], &["s2", "S1", "S3"]);
        let confusion = ConfusionMatrix::build(&samples, &panel, &mapping, &metasheet(), &raw, &validated);
        let samples = confusion
            .rows
            .iter()
            .map(|row| row.sample.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(samples, vec!["S1", "s2", "S3"]);
        // S1: predicted P1 P2, observed P1 P3, validated P1
        assert_eq!(confusion.rows[0], ConfusionRow::new("S1", 1, 1, 1, 0));
        // s2: P2 has a zero total so it is not observed
        assert_eq!(confusion.rows[1], ConfusionRow::new("s2", 1, 0, 1, 1));
        // S3 is not mapped
        assert_eq!(confusion.rows[2], ConfusionRow::new("S3", 0, 1, 0, 2));
    }
}
