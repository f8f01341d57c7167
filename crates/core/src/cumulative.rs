//! Cumulative midpoints for Shannon-Fano-Elias coding.
//!
//! For rank i: F(i) = p(0) + ... + p(i-1) + p(i) / 2.
//! The probabilities must be in the rank order produced by
//! [`Ranking`](crate::alphabet::Ranking).

/// Cumulative midpoints for every rank, in one pass.
pub fn cumulative_midpoints(probabilities: &[f64]) -> Vec<f64> {
    let mut prior = 0.0;
    probabilities
        .iter()
        .map(|&p| {
            let midpoint = prior + p / 2.0;
            prior += p;
            midpoint
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aaab() {
        assert_eq!(cumulative_midpoints(&[0.75, 0.25]), vec![0.375, 0.875]);
    }

    #[test]
    fn test_single_symbol() {
        assert_eq!(cumulative_midpoints(&[1.0]), vec![0.5]);
    }

    #[test]
    fn test_empty() {
        assert!(cumulative_midpoints(&[]).is_empty());
    }

    #[test]
    fn test_midpoint_sums_prior_probabilities() {
        let probs = [0.5, 0.25, 0.125, 0.125];
        assert_eq!(
            cumulative_midpoints(&probs),
            vec![0.25, 0.625, 0.8125, 0.9375]
        );
    }

    #[test]
    fn test_midpoints_strictly_increase_within_unit_interval() {
        let probs = [0.5, 0.25, 0.125, 0.125];
        let all = cumulative_midpoints(&probs);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert!(all.iter().all(|&f| (0.0..1.0).contains(&f)));
    }
}
