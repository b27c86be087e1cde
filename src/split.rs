use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dataset::Label;
use crate::errors::{Result, SignatureError};

/// Train/test index sets over one sample list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    /// Share of every class held out for testing.
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            seed: 42,
        }
    }
}

/// Shuffled hold-out split that preserves class proportions.
///
/// Each class is shuffled with the same seeded generator (forged first, then
/// genuine) and `ceil(n · fraction)` of its samples go to the test side, while
/// at least one sample of every class stays in training. Both index lists are
/// returned sorted, so the same labels and seed always give the same partition.
pub fn stratified_split(labels: &[Label], config: &SplitConfig) -> Result<Partition> {
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(SignatureError::validation(
            "test_fraction",
            format!("must be in (0, 1), got {}", config.test_fraction),
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut partition = Partition::default();
    for class in Label::ALL {
        let mut members = indices_of(labels, class);
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);
        let n = members.len();
        let n_test = ((n as f64 * config.test_fraction).ceil() as usize).min(n - 1);
        partition.test.extend_from_slice(&members[..n_test]);
        partition.train.extend_from_slice(&members[n_test..]);
    }
    partition.train.sort_unstable();
    partition.test.sort_unstable();
    Ok(partition)
}

/// Unshuffled stratified k-fold: the i-th sample of each class goes to fold `i % k`.
///
/// `labels` are the labels of the samples to split; the returned indices point
/// into that slice. Every class needs at least `k` samples.
pub fn stratified_kfold(labels: &[Label], k: usize) -> Result<Vec<Partition>> {
    if k < 2 {
        return Err(SignatureError::validation("folds", "must be at least 2"));
    }
    let mut assignment = vec![0usize; labels.len()];
    for class in Label::ALL {
        let members = indices_of(labels, class);
        if members.len() < k {
            return Err(SignatureError::validation(
                "folds",
                format!(
                    "{} requires at least {} {} training samples, found {}",
                    k,
                    k,
                    class,
                    members.len()
                ),
            ));
        }
        for (position, &idx) in members.iter().enumerate() {
            assignment[idx] = position % k;
        }
    }
    Ok(partitions_from_assignment(&assignment, k))
}

/// Plain shuffled k-fold over `n` samples with contiguous fold boundaries
/// (`fold i` covers `i·n/k .. (i+1)·n/k` of the permutation).
pub fn shuffled_kfold(n: usize, k: usize, seed: u64) -> Vec<Partition> {
    let k = k.clamp(1, n.max(1));
    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut assignment = vec![0usize; n];
    for fold in 0..k {
        for &idx in &permutation[fold * n / k..(fold + 1) * n / k] {
            assignment[idx] = fold;
        }
    }
    partitions_from_assignment(&assignment, k)
}

fn partitions_from_assignment(assignment: &[usize], k: usize) -> Vec<Partition> {
    (0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..assignment.len()).partition(|&i| assignment[i] == fold);
            Partition { train, test }
        })
        .collect()
}

fn indices_of(labels: &[Label], class: Label) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|&(_, &l)| l == class)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(forged: usize, genuine: usize) -> Vec<Label> {
        let mut labels = vec![Label::Forged; forged];
        labels.extend(vec![Label::Genuine; genuine]);
        labels
    }

    #[test]
    fn test_split_is_reproducible() -> Result<()> {
        let labels = labels(20, 28);
        let a = stratified_split(&labels, &SplitConfig::default())?;
        let b = stratified_split(&labels, &SplitConfig::default())?;
        assert_eq!(a, b);

        let other = stratified_split(
            &labels,
            &SplitConfig {
                seed: 7,
                ..SplitConfig::default()
            },
        )?;
        assert_eq!(other.test.len(), a.test.len());
        Ok(())
    }

    #[test]
    fn test_split_preserves_proportions() -> Result<()> {
        let labels = labels(20, 28);
        let partition = stratified_split(&labels, &SplitConfig::default())?;
        let test_forged = partition
            .test
            .iter()
            .filter(|&&i| labels[i] == Label::Forged)
            .count();
        assert_eq!(test_forged, 5);
        assert_eq!(partition.test.len(), 5 + 7);
        assert_eq!(partition.train.len() + partition.test.len(), labels.len());

        let mut all: Vec<usize> = partition.train.iter().chain(&partition.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_split_keeps_one_training_sample() -> Result<()> {
        let labels = labels(1, 4);
        let partition = stratified_split(&labels, &SplitConfig::default())?;
        assert!(partition.train.contains(&0));
        Ok(())
    }

    #[test]
    fn test_invalid_fraction() {
        let config = SplitConfig {
            test_fraction: 1.0,
            seed: 42,
        };
        assert!(stratified_split(&labels(4, 4), &config).is_err());
    }

    #[test]
    fn test_kfold_covers_every_sample_once() -> Result<()> {
        let labels = labels(7, 9);
        let folds = stratified_kfold(&labels, 3)?;
        assert_eq!(folds.len(), 3);

        let mut seen = vec![0; labels.len()];
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), labels.len());
            for &i in &fold.test {
                seen[i] += 1;
            }
            let forged = fold.test.iter().filter(|&&i| labels[i] == Label::Forged).count();
            assert!((2..=3).contains(&forged));
        }
        assert!(seen.iter().all(|&n| n == 1));
        Ok(())
    }

    #[test]
    fn test_kfold_needs_enough_samples() {
        assert!(stratified_kfold(&labels(2, 9), 3).is_err());
        assert!(stratified_kfold(&labels(5, 5), 1).is_err());
    }

    #[test]
    fn test_shuffled_kfold() {
        let folds = shuffled_kfold(12, 5, 42);
        assert_eq!(folds.len(), 5);
        let total: usize = folds.iter().map(|f| f.test.len()).sum();
        assert_eq!(total, 12);
        assert_eq!(folds, shuffled_kfold(12, 5, 42));
        assert_eq!(shuffled_kfold(3, 5, 1).len(), 3);
    }
}
