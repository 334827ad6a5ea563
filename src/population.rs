//! Distribution of a cell population over the repertoire.
use crate::distributions::DiscreteDistribution;
use crate::errors::SimulationError;
use anyhow::Result;
use rand::Rng;

/// How the N cells spread over the K clonotypes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PopulationDistribution {
    /// Every cell picks a clonotype uniformly at random.
    Equal,
    /// Cell n goes to clonotype n mod K.
    Stripe,
    /// Discrete standard Gaussian over K bins spanning ± cutoff standard
    /// deviations, multinomial-sampled.
    Unimodal { cutoff: f64 },
    /// χ² density with `k` degrees of freedom evaluated over [0, cutoff].
    ChiSquare { k: f64, cutoff: f64 },
    /// Logistic CDF with the given scale evaluated over [-cutoff, +cutoff].
    /// The default.
    LogisticCdf { scale: f64, cutoff: f64 },
}

impl PopulationDistribution {
    /// Assign `cells` cells to `bins` clonotypes. The result always sums to
    /// exactly `cells`; the looser |Σ - N| ≤ K bound is what callers may rely
    /// on.
    pub fn distribute<R: Rng>(&self, cells: usize, bins: usize, rng: &mut R) -> Result<Vec<u64>> {
        if bins == 0 {
            return Err(SimulationError::config(
                "cannot populate an empty repertoire",
            ));
        }
        let mut population = vec![0u64; bins];
        match *self {
            PopulationDistribution::Equal => {
                for _ in 0..cells {
                    population[rng.gen_range(0..bins)] += 1;
                }
            }
            PopulationDistribution::Stripe => {
                for n in 0..cells {
                    population[n % bins] += 1;
                }
            }
            _ => {
                let weights = self.bin_weights(bins)?;
                let distribution = DiscreteDistribution::new(weights)?;
                for _ in 0..cells {
                    population[distribution.generate(rng)] += 1;
                }
            }
        }
        Ok(population)
    }

    /// Unnormalized density evaluated at the centers of `bins` equally spaced
    /// bins. Normalization happens implicitly in the multinomial draw.
    fn bin_weights(&self, bins: usize) -> Result<Vec<f64>> {
        match *self {
            PopulationDistribution::Unimodal { cutoff } => {
                if cutoff <= 0.0 {
                    return Err(SimulationError::config(format!(
                        "unimodal cutoff {cutoff} must be positive"
                    )));
                }
                Ok(bin_centers(-cutoff, cutoff, bins)
                    .map(|x| (-x * x / 2.0).exp())
                    .collect())
            }
            PopulationDistribution::ChiSquare { k, cutoff } => {
                if k <= 0.0 || cutoff <= 0.0 {
                    return Err(SimulationError::config(format!(
                        "chi-square parameters must be positive (k = {k}, cutoff = {cutoff})"
                    )));
                }
                // normalization constant of the pdf cancels out
                Ok(bin_centers(0.0, cutoff, bins)
                    .map(|x| x.powf(k / 2.0 - 1.0) * (-x / 2.0).exp())
                    .collect())
            }
            PopulationDistribution::LogisticCdf { scale, cutoff } => {
                if scale <= 0.0 || cutoff <= 0.0 {
                    return Err(SimulationError::config(format!(
                        "logistic parameters must be positive (scale = {scale}, cutoff = {cutoff})"
                    )));
                }
                Ok(bin_centers(-cutoff, cutoff, bins)
                    .map(|x| 1.0 / (1.0 + (-x / scale).exp()))
                    .collect())
            }
            _ => unreachable!("equal and stripe need no weights"),
        }
    }
}

fn bin_centers(low: f64, high: f64, bins: usize) -> impl Iterator<Item = f64> {
    let width = (high - low) / bins as f64;
    (0..bins).map(move |k| low + (k as f64 + 0.5) * width)
}
