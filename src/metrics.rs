use std::fmt;

/// Written in place of a metric whose denominator is zero
pub const UNDEFINED_METRIC: &str = "NA";

/// Rounds to the given number of decimals with ties to even.  A tie is judged on the exact binary
/// value, so 0.0625 is a tie at three decimals while 1.45, stored just below, is not one at one
///
/// # Example
/// ```
/// use hmas_tools::metrics::round_half_even;
///
/// assert_eq!(round_half_even(0.0625, 3), 0.062);
/// assert_eq!(round_half_even(0.1875, 3), 0.188);
/// assert_eq!(round_half_even(1.45, 1), 1.4);
/// assert_eq!(round_half_even(4.5, 0), 4.0);
/// ```
pub fn round_half_even(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    // error of the product, exact through the fused multiply-add
    let residual = value.mul_add(factor, -scaled);
    let floor = scaled.floor();
    let rounded = if scaled - floor == 0.5 {
        if residual > 0.0 {
            floor + 1.0
        } else if residual < 0.0 {
            floor
        } else if floor % 2.0 == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / factor
}

/// Rounds to three decimals with ties to even
///
/// # Example
/// ```
/// use hmas_tools::metrics::round3;
///
/// assert_eq!(round3(2.0 / 3.0), 0.667);
/// assert_eq!(round3(0.5), 0.5);
/// ```
pub fn round3(value: f64) -> f64 {
    round_half_even(value, 3)
}

// Rounded ratio, or None when nothing is in the denominator
fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(round3(numerator as f64 / denominator as f64))
    }
}

/// Summary statistics of one confusion matrix row.  `None` marks a metric with a zero denominator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub precision: Option<f64>,
    pub accuracy: Option<f64>,
}

impl Metrics {
    /// Derives the metrics from the four counts
    ///
    /// # Example
    /// ```
    /// use hmas_tools::metrics::Metrics;
    ///
    /// let metrics = Metrics::from_counts(1, 1, 1, 0);
    /// assert_eq!(metrics.sensitivity, Some(0.5));
    /// assert_eq!(metrics.specificity, Some(0.0));
    /// assert_eq!(metrics.accuracy, Some(0.333));
    /// ```
    pub fn from_counts(
        true_positive: usize,
        false_positive: usize,
        false_negative: usize,
        true_negative: usize,
    ) -> Self {
        Metrics {
            sensitivity: ratio(true_positive, true_positive + false_negative),
            specificity: ratio(true_negative, true_negative + false_positive),
            precision: ratio(true_positive, true_positive + false_positive),
            accuracy: ratio(
                true_positive + true_negative,
                true_positive + true_negative + false_positive + false_negative,
            ),
        }
    }

    /// The metrics in output column order
    pub fn values(&self) -> [Option<f64>; 4] {
        [
            self.sensitivity,
            self.specificity,
            self.precision,
            self.accuracy,
        ]
    }
}

/// Formats a metric with three decimals, or as NA when undefined
pub fn format_metric(metric: Option<f64>) -> String {
    match metric {
        Some(value) => format!("{:.3}", value),
        None => UNDEFINED_METRIC.to_string(),
    }
}

/// Parses a metric written by `format_metric`
pub fn parse_metric(field: &str) -> Option<Option<f64>> {
    let field = field.trim();
    if field == UNDEFINED_METRIC || field.is_empty() {
        return Some(None);
    }
    field.parse::<f64>().ok().map(Some)
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sensitivity: {}, specificity: {}, precision: {}, ACC: {}",
            format_metric(self.sensitivity),
            format_metric(self.specificity),
            format_metric(self.precision),
            format_metric(self.accuracy)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominators_test() {
        let metrics = Metrics::from_counts(0, 0, 0, 0);
        assert_eq!(metrics.values(), [None, None, None, None]);
        let metrics = Metrics::from_counts(0, 0, 0, 5);
        assert_eq!(metrics.sensitivity, None);
        assert_eq!(metrics.precision, None);
        assert_eq!(metrics.specificity, Some(1.0));
        assert_eq!(metrics.accuracy, Some(1.0));
    }

    #[test]
    fn metrics_within_range_test() {
        for tp in 0..6 {
            for fp in 0..6 {
                for fn_ in 0..6 {
                    for tn in 0..6 {
                        let metrics = Metrics::from_counts(tp, fp, fn_, tn);
                        for value in metrics.values().iter().flatten() {
                            assert!((0.0..=1.0).contains(value));
                            // already rounded to three decimals
                            assert_eq!(round3(*value), *value);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn sixteenth_rounds_to_even_test() {
        // 1/16 = 0.0625 exactly
        let metrics = Metrics::from_counts(1, 0, 15, 0);
        assert_eq!(metrics.sensitivity, Some(0.062));
        assert_eq!(format_metric(metrics.sensitivity), "0.062");
        // 3/16 = 0.1875 goes up to the even 0.188
        assert_eq!(Metrics::from_counts(3, 0, 13, 0).sensitivity, Some(0.188));
        assert_eq!(round3(-0.0625), -0.062);
    }

    #[test]
    fn format_metric_test() {
        assert_eq!(format_metric(Some(0.5)), "0.500");
        assert_eq!(format_metric(Some(1.0)), "1.000");
        assert_eq!(format_metric(Some(0.667)), "0.667");
        assert_eq!(format_metric(None), "NA");
        assert_eq!(parse_metric("0.667"), Some(Some(0.667)));
        assert_eq!(parse_metric("NA"), Some(None));
        assert_eq!(parse_metric("high"), None);
    }
}
