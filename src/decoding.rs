//! Turns an output column of the network into the next token.

use rand::Rng;

/// Normalizes `logits` into probabilities.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    exps.into_iter().map(|e| e / sum).collect()
}

/// Returns the index of the first largest value.
pub fn max_i(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &v)| {
            if v > best { (i, v) } else { (best_i, best) }
        })
        .0
}

/// Draws an index with the given probabilities.
///
/// Falls back to the last index if rounding leaves the cumulative sum below the drawn value.
pub fn sample_i<R: Rng + ?Sized>(probabilities: &[f32], rng: &mut R) -> usize {
    let r: f32 = rng.random();
    let mut cumulative = 0.;

    for (i, &p) in probabilities.iter().enumerate() {
        cumulative += p;
        if cumulative > r {
            return i;
        }
    }

    probabilities.len().saturating_sub(1)
}

/// Picks the next token from an output column.
///
/// A single output is a regression of the next token and is rounded to the nearest non-negative
/// integer. Wider outputs are logits, scaled by `temperature` when sampling.
///
/// # Arguments
/// * `output` - The output column of a time step.
/// * `sample` - Whether to sample from the distribution instead of taking its arg-max.
/// * `temperature` - Divides the logits before sampling.
/// * `rng` - The random number generator used when sampling.
pub fn decode<R: Rng + ?Sized>(
    output: &[f32],
    sample: bool,
    temperature: f32,
    rng: &mut R,
) -> usize {
    if let [value] = output {
        return value.round().max(0.) as usize;
    }

    if !sample {
        return max_i(output);
    }

    let probabilities = if temperature != 1. {
        let scaled: Vec<f32> = output.iter().map(|&x| x / temperature).collect();
        softmax(&scaled)
    } else {
        softmax(output)
    };

    sample_i(&probabilities, rng)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let probabilities = softmax(&[1., 2., 3., 1000.]);
        let sum: f32 = probabilities.iter().sum();

        assert!((sum - 1.).abs() < 1e-6);
        assert!(probabilities.iter().all(|p| p.is_finite()));
        assert_eq!(max_i(&probabilities), 3);
    }

    #[test]
    fn max_i_takes_the_first_of_ties() {
        assert_eq!(max_i(&[0.1, 0.7, 0.7, 0.2]), 1);
    }

    #[test]
    fn certain_outcomes_are_always_sampled() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(sample_i(&[0., 1., 0.], &mut rng), 1);
        }
    }

    #[test]
    fn scalar_outputs_round_to_tokens() {
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(decode(&[2.6], false, 1., &mut rng), 3);
        assert_eq!(decode(&[-0.7], true, 0.5, &mut rng), 0);
        assert_eq!(decode(&[0.2, 1.5, -3.], false, 1., &mut rng), 1);
    }

    #[test]
    fn scalar_outputs_ignore_sampling() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut untouched = StdRng::seed_from_u64(4);

        assert_eq!(decode(&[1.4], true, 3., &mut rng), 1);
        assert_eq!(rng.random::<u64>(), untouched.random::<u64>());
    }

    #[test]
    fn low_temperature_sharpens_the_distribution() {
        let mut rng = StdRng::seed_from_u64(11);
        let picks = (0..200)
            .filter(|_| decode(&[1., 1.5, 0.], true, 0.01, &mut rng) == 1)
            .count();

        assert_eq!(picks, 200);
    }
}
