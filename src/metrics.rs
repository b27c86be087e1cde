use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::Label;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Held-out evaluation summary printed for the operator after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Indexed by `Label::index()`.
    pub per_class: [ClassMetrics; 2],
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

pub fn accuracy(truth: &[Label], predicted: &[Label]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// Zero denominators score 0.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn from_predictions(truth: &[Label], predicted: &[Label]) -> Self {
        debug_assert_eq!(truth.len(), predicted.len());
        let per_class = Label::ALL.map(|class| {
            let pairs = || truth.iter().zip(predicted);
            let tp = pairs().filter(|(t, p)| **t == class && **p == class).count();
            let predicted_positive = predicted.iter().filter(|p| **p == class).count();
            let support = truth.iter().filter(|t| **t == class).count();

            let precision = ratio(tp, predicted_positive);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                precision,
                recall,
                f1,
                support,
            }
        });

        let total: usize = per_class.iter().map(|m| m.support).sum();
        let average = |weight: &dyn Fn(&ClassMetrics) -> f64| {
            let weights: f64 = per_class.iter().map(weight).sum();
            let avg = |field: fn(&ClassMetrics) -> f64| {
                if weights == 0.0 {
                    0.0
                } else {
                    per_class.iter().map(|m| field(m) * weight(m)).sum::<f64>() / weights
                }
            };
            ClassMetrics {
                precision: avg(|m| m.precision),
                recall: avg(|m| m.recall),
                f1: avg(|m| m.f1),
                support: total,
            }
        };

        Self {
            accuracy: accuracy(truth, predicted),
            macro_avg: average(&|_| 1.0),
            weighted_avg: average(&|m| m.support as f64),
            per_class,
        }
    }

    pub fn class(&self, label: Label) -> &ClassMetrics {
        &self.per_class[label.index()]
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )
        };
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for label in Label::ALL {
            row(f, label.as_str(), self.class(label))?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.weighted_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Label::{Forged as F, Genuine as G};

    #[test]
    fn test_report_values() {
        let truth = [F, F, F, G, G, G, G, G];
        let predicted = [F, F, G, G, G, G, G, F];
        let report = ClassificationReport::from_predictions(&truth, &predicted);

        assert_eq!(report.accuracy, 6.0 / 8.0);
        let forged = report.class(F);
        assert_eq!(forged.support, 3);
        assert_eq!(forged.precision, 2.0 / 3.0);
        assert_eq!(forged.recall, 2.0 / 3.0);
        let genuine = report.class(G);
        assert_eq!(genuine.precision, 4.0 / 5.0);
        assert_eq!(genuine.recall, 4.0 / 5.0);
        assert_eq!(report.weighted_avg.support, 8);
        assert!((report.macro_avg.recall - (2.0 / 3.0 + 0.8) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_predictions_score_zero() {
        let truth = [F, G];
        let predicted = [G, G];
        let report = ClassificationReport::from_predictions(&truth, &predicted);
        assert_eq!(report.class(F).precision, 0.0);
        assert_eq!(report.class(F).f1, 0.0);
        assert_eq!(report.class(G).recall, 1.0);
    }

    #[test]
    fn test_display_lists_both_classes() {
        let report = ClassificationReport::from_predictions(&[F, G], &[F, G]);
        let text = report.to_string();
        assert!(text.contains("forged"));
        assert!(text.contains("genuine"));
        assert!(text.contains("weighted avg"));
    }
}
