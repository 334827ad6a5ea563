//! Clonotype construction: chain pairing, uniqueness constraints and the
//! bounded retry machinery behind them.
use crate::catalog::Locus;
use crate::chain::{Chain, ChainBuilder};
use crate::errors::SimulationError;
use anyhow::Result;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Retries allowed per repertoire slot before the uniqueness constraint is
/// declared unsatisfiable.
pub const RETRY_BUDGET: usize = 1000;

// Unproductive rebuilds are bounded separately so a catalog that can never
// yield a productive chain still terminates.
const PRODUCTIVE_BUDGET: usize = 10 * RETRY_BUDGET;

/// Uniqueness ladder. Each level implies the ones above it: two clonotypes
/// with equal CDR3s necessarily share a chain, and two sharing a chain pair
/// are the same receptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Uniqueness {
    None,
    Tcr,
    Chain,
    Cdr3,
}

#[derive(Clone, Debug)]
pub struct RepertoireConfig {
    pub size: usize,
    /// Probability that a slot becomes an αβ receptor rather than γδ.
    pub alpha_beta_ratio: f64,
    pub uniqueness: Uniqueness,
    pub require_productive: bool,
    /// When set, unproductive rebuilds also consume the retry budget.
    pub strict_retries: bool,
}

impl Default for RepertoireConfig {
    fn default() -> Self {
        RepertoireConfig {
            size: 10,
            alpha_beta_ratio: 0.9,
            uniqueness: Uniqueness::None,
            require_productive: true,
            strict_retries: false,
        }
    }
}

/// A pair of recombined chains: α+β or γ+δ.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clonotype {
    pub chains: [Chain; 2],
}

impl Clonotype {
    pub fn locus_pair(&self) -> String {
        format!("{}/{}", self.chains[0].locus, self.chains[1].locus)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Repertoire {
    pub clonotypes: Vec<Clonotype>,
}

impl Repertoire {
    pub fn len(&self) -> usize {
        self.clonotypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clonotypes.is_empty()
    }

    /// Build a repertoire of `config.size` clonotypes.
    pub fn generate<R: Rng>(
        builder: &mut ChainBuilder,
        config: &RepertoireConfig,
        rng: &mut R,
    ) -> Result<Repertoire> {
        if !(0.0..=1.0).contains(&config.alpha_beta_ratio) {
            return Err(SimulationError::config(format!(
                "alpha/beta ratio {} outside [0, 1]",
                config.alpha_beta_ratio
            )));
        }
        let mut seen = SeenSets::default();
        let mut clonotypes = Vec::with_capacity(config.size);
        for slot in 0..config.size {
            let mut attempts = 0usize;
            let clonotype = loop {
                let pair = if rng.gen::<f64>() < config.alpha_beta_ratio {
                    (Locus::Tra, Locus::Trb)
                } else {
                    (Locus::Trg, Locus::Trd)
                };
                let first = next_chain(builder, pair.0, config, rng, &mut attempts)?;
                let second = next_chain(builder, pair.1, config, rng, &mut attempts)?;
                let candidate = Clonotype {
                    chains: [first, second],
                };
                if seen.accepts(&candidate, config.uniqueness) {
                    break candidate;
                }
                debug!("slot {slot}: duplicate clonotype rejected");
                attempts += 1;
                if attempts >= RETRY_BUDGET {
                    return Err(SimulationError::capacity(format!(
                        "could not satisfy {:?}-uniqueness for repertoire of size {} \
                         (slot {slot} exhausted {RETRY_BUDGET} retries)",
                        config.uniqueness, config.size
                    )));
                }
            };
            seen.insert(&clonotype, config.uniqueness);
            clonotypes.push(clonotype);
        }
        Ok(Repertoire { clonotypes })
    }
}

fn next_chain<R: Rng>(
    builder: &mut ChainBuilder,
    locus: Locus,
    config: &RepertoireConfig,
    rng: &mut R,
    attempts: &mut usize,
) -> Result<Chain> {
    let mut rebuilds = 0usize;
    loop {
        let chain = builder.build(locus, rng)?;
        if !config.require_productive || chain.productive {
            return Ok(chain);
        }
        warn!("unproductive {locus} chain resampled");
        rebuilds += 1;
        if config.strict_retries {
            *attempts += 1;
            if *attempts >= RETRY_BUDGET {
                return Err(SimulationError::capacity(format!(
                    "retry budget of {RETRY_BUDGET} exhausted while looking for a \
                     productive {locus} chain"
                )));
            }
        } else if rebuilds >= PRODUCTIVE_BUDGET {
            return Err(SimulationError::capacity(format!(
                "no productive {locus} chain found after {PRODUCTIVE_BUDGET} recombinations"
            )));
        }
    }
}

/// Bookkeeping for the uniqueness constraints.
#[derive(Default)]
struct SeenSets {
    tcrs: HashSet<(String, String)>,
    chains: HashMap<Locus, HashSet<String>>,
    cdr3s: HashSet<String>,
}

impl SeenSets {
    fn accepts(&self, candidate: &Clonotype, uniqueness: Uniqueness) -> bool {
        match uniqueness {
            Uniqueness::None => true,
            Uniqueness::Tcr => !self.tcrs.contains(&(
                candidate.chains[0].rna.get_string(),
                candidate.chains[1].rna.get_string(),
            )),
            Uniqueness::Chain => candidate.chains.iter().all(|chain| {
                self.chains
                    .get(&chain.locus)
                    .map_or(true, |set| !set.contains(&chain.rna.get_string()))
            }),
            Uniqueness::Cdr3 => candidate.chains.iter().all(|chain| match chain.cdr3() {
                Some(cdr3) => !self.cdr3s.contains(&cdr3.get_string()),
                None => true,
            }),
        }
    }

    fn insert(&mut self, clonotype: &Clonotype, uniqueness: Uniqueness) {
        match uniqueness {
            Uniqueness::None => {}
            Uniqueness::Tcr => {
                self.tcrs.insert((
                    clonotype.chains[0].rna.get_string(),
                    clonotype.chains[1].rna.get_string(),
                ));
            }
            Uniqueness::Chain => {
                for chain in &clonotype.chains {
                    self.chains
                        .entry(chain.locus)
                        .or_default()
                        .insert(chain.rna.get_string());
                }
            }
            Uniqueness::Cdr3 => {
                for chain in &clonotype.chains {
                    if let Some(cdr3) = chain.cdr3() {
                        self.cdr3s.insert(cdr3.get_string());
                    }
                }
            }
        }
    }
}
