//! Random distributions used by the generation process.
use crate::errors::SimulationError;
use crate::sequence::{Dna, NUCLEOTIDES, NUCLEOTIDES_INV};
use anyhow::{anyhow, Result};
use log::warn;
use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal, WeightedAliasIndex};

/// Cumulative categorical distribution over item indices.
///
/// Items are consumed in declaration order; any probability mass left after
/// the last defined weight belongs to the final index, and the first draw
/// landing in that region is reported once.
#[derive(Clone, Debug)]
pub struct CategoricalDistribution {
    cumulative: Vec<f64>,
    deficit: f64,
    label: String,
    warned_deficit: bool,
}

impl CategoricalDistribution {
    /// Build from weights in consumption order, where `None` marks an item
    /// whose probability was left unspecified. Unspecified items share the
    /// leftover mass (1 - S) equally. When S exceeds one, a warning is
    /// emitted and the unspecified items get nothing: draws then consume the
    /// defined weights in order, which clips the excess.
    pub fn from_partial(weights: &[Option<f64>], label: &str) -> Result<Self> {
        if weights.is_empty() {
            return Err(anyhow!("empty weight list for {label}"));
        }
        let defined: f64 = weights.iter().flatten().sum();
        if weights.iter().flatten().any(|&w| w < 0.0) {
            return Err(SimulationError::config(format!(
                "negative probability in {label}"
            )));
        }
        let residual_count = weights.iter().filter(|w| w.is_none()).count();
        let share = if defined > 1.0 {
            warn!(
                "defined probabilities for {label} sum to {defined:.6} > 1; \
                 clipping in declaration order"
            );
            0.0
        } else if residual_count > 0 {
            (1.0 - defined) / residual_count as f64
        } else {
            0.0
        };

        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for w in weights {
            total += w.unwrap_or(share);
            cumulative.push(total);
        }
        Ok(CategoricalDistribution {
            cumulative,
            deficit: (1.0 - total).max(0.0),
            label: label.to_string(),
            warned_deficit: false,
        })
    }

    /// Build from a fully indexed probability array (chewback and addition
    /// counts, index 0 meaning "zero bases").
    pub fn from_indexed(probabilities: &Array1<f64>, label: &str) -> Result<Self> {
        let weights: Vec<Option<f64>> = probabilities.iter().map(|&p| Some(p)).collect();
        Self::from_partial(&weights, label)
    }

    pub fn sample<R: Rng>(&mut self, rng: &mut R) -> usize {
        let u: f64 = rng.gen();
        for (i, &cum) in self.cumulative.iter().enumerate() {
            if u < cum {
                return i;
            }
        }
        // u fell in the deficit region: the mass that was never assigned
        // belongs to the last index.
        if !self.warned_deficit && self.deficit > 0.0 {
            warn!(
                "draw for {} landed in unassigned probability mass ({:.6}); \
                 assigning the last index. Check that the distribution sums to 1",
                self.label, self.deficit
            );
        }
        self.warned_deficit = true;
        self.cumulative.len() - 1
    }
}

/// Alias-method sampler over arbitrary nonnegative weights, used for the
/// multinomial population draws. All-zero weights degrade to uniform.
#[derive(Clone, Debug)]
pub struct DiscreteDistribution {
    distribution: WeightedAliasIndex<f64>,
}

impl DiscreteDistribution {
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if !weights.iter().all(|&x| x >= 0.) {
            return Err(anyhow!(
                "Error when creating distribution: negative weights"
            ));
        }
        let distribution = match weights.iter().sum::<f64>().abs() < 1e-10 {
            true => WeightedAliasIndex::new(vec![1.; weights.len()])
                .map_err(|e| anyhow!("Error when creating distribution: {e}"))?,
            false => WeightedAliasIndex::new(weights)
                .map_err(|e| anyhow!("Error when creating distribution: {e}"))?,
        };
        Ok(DiscreteDistribution { distribution })
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> usize {
        self.distribution.sample(rng)
    }
}

/// Gaussian length sampler truncated to mean ± cutoff standard deviations and
/// rounded to a positive integer. A zero standard deviation pins the length
/// to the mean without consuming randomness.
#[derive(Clone, Debug)]
pub struct BoundedGaussian {
    mean: f64,
    sd: f64,
    cutoff: f64,
    normal: Option<Normal<f64>>,
}

const LENGTH_DRAW_ATTEMPTS: usize = 10_000;

impl BoundedGaussian {
    pub fn new(mean: f64, sd: f64, cutoff: f64) -> Result<Self> {
        if mean < 1.0 {
            return Err(SimulationError::config(format!(
                "length mean {mean} must be at least 1"
            )));
        }
        if sd < 0.0 {
            return Err(SimulationError::config(format!(
                "length standard deviation {sd} must be nonnegative"
            )));
        }
        if sd > 0.0 && cutoff <= 0.0 {
            return Err(SimulationError::config(format!(
                "length cutoff {cutoff} must be positive when the standard deviation is nonzero"
            )));
        }
        let normal = if sd > 0.0 {
            Some(Normal::new(mean, sd).map_err(|e| anyhow!("invalid length distribution: {e}"))?)
        } else {
            None
        };
        Ok(BoundedGaussian {
            mean,
            sd,
            cutoff,
            normal,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        match &self.normal {
            None => self.mean.round() as usize,
            Some(normal) => loop {
                let length = normal.sample(rng).round();
                if length > 0.0 && (length - self.mean).abs() / self.sd <= self.cutoff {
                    return length as usize;
                }
            },
        }
    }

    /// Like [`sample`], additionally rejecting lengths above `max` (a read
    /// cannot outgrow the insert it is cut from).
    pub fn sample_at_most<R: Rng>(&self, rng: &mut R, max: usize) -> usize {
        match &self.normal {
            None => (self.mean.round() as usize).min(max),
            Some(normal) => {
                for _ in 0..LENGTH_DRAW_ATTEMPTS {
                    let length = normal.sample(rng).round();
                    if length > 0.0
                        && length as usize <= max
                        && (length - self.mean).abs() / self.sd <= self.cutoff
                    {
                        return length as usize;
                    }
                }
                max
            }
        }
    }
}

pub fn random_nucleotide<R: Rng>(rng: &mut R) -> u8 {
    NUCLEOTIDES[rng.gen_range(0..4)]
}

/// A uniformly chosen nucleotide different from `original`.
pub fn random_other_nucleotide<R: Rng>(original: u8, rng: &mut R) -> u8 {
    let index = NUCLEOTIDES_INV.get(&original).copied().unwrap_or(0);
    NUCLEOTIDES[(index + 1 + rng.gen_range(0..3)) % 4]
}

/// Non-templated N-region nucleotides.
pub fn random_dna<R: Rng>(length: usize, rng: &mut R) -> Dna {
    Dna {
        seq: (0..length).map(|_| random_nucleotide(rng)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn residual_mass_is_shared_equally() {
        // one defined weight of 0.5, three residual items -> 1/6 each
        let dist = CategoricalDistribution::from_partial(
            &[Some(0.5), None, None, None],
            "test",
        )
        .unwrap();
        let expected = [0.5, 0.5 + 1.0 / 6.0, 0.5 + 2.0 / 6.0, 1.0];
        for (cum, exp) in dist.cumulative.iter().zip(expected) {
            assert!((cum - exp).abs() < 1e-12);
        }
        assert!(dist.deficit < 1e-12);
    }

    #[test]
    fn overcommitted_weights_clip_in_order() {
        let mut dist = CategoricalDistribution::from_partial(
            &[Some(0.8), Some(0.8), None],
            "test",
        )
        .unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        for _ in 0..200 {
            // the third item has no mass left, only the first two can appear
            assert!(dist.sample(&mut rng) < 2);
        }
    }

    #[test]
    fn deficit_goes_to_last_index() {
        let mut dist =
            CategoricalDistribution::from_indexed(&array![0.3, 0.3], "test").unwrap();
        assert!((dist.deficit - 0.4).abs() < 1e-12);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut saw_last = false;
        for _ in 0..500 {
            if dist.sample(&mut rng) == 1 {
                saw_last = true;
            }
        }
        assert!(saw_last);
    }

    #[test]
    fn zero_sd_is_constant() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let g = BoundedGaussian::new(48.0, 0.0, 4.0).unwrap();
        for _ in 0..10 {
            assert_eq!(g.sample(&mut rng), 48);
        }
    }

    #[test]
    fn bounded_draws_stay_in_window() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let g = BoundedGaussian::new(50.0, 10.0, 2.0).unwrap();
        for _ in 0..500 {
            let l = g.sample(&mut rng) as f64;
            assert!((30.0..=70.0).contains(&l));
        }
        for _ in 0..500 {
            assert!(g.sample_at_most(&mut rng, 40) <= 40);
        }
    }

    #[test]
    fn mutated_base_differs() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        for &base in &NUCLEOTIDES {
            for _ in 0..50 {
                assert_ne!(random_other_nucleotide(base, &mut rng), base);
            }
        }
    }
}
