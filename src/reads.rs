//! Slicing sequencing reads out of the populated repertoire.
use crate::chain::Chain;
use crate::distributions::BoundedGaussian;
use crate::errors::SimulationError;
use crate::repertoire::Repertoire;
use crate::sequence::Dna;
use anyhow::Result;
use log::warn;
use rand::Rng;

/// Which body of the chain the reads come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadSpace {
    Dna,
    Rna,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadType {
    Single,
    Paired,
    Amplicon,
}

/// Consecutive rejected iterations tolerated before giving up on the
/// population (amplicon probes that match nothing, bodies shorter than the
/// requested read).
const REJECTION_BUDGET: usize = 1000;

#[derive(Clone, Debug)]
pub struct ReadConfig {
    pub count: usize,
    pub space: ReadSpace,
    pub read_type: ReadType,
    pub read_length: BoundedGaussian,
    pub insert_length: BoundedGaussian,
    pub amplicon_probe: Dna,
}

/// One simulated read, or a read pair when `mate` is present. The name
/// records provenance: clonotype, cell, chain, source coordinates and
/// orientation.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedRead {
    pub name: String,
    pub seq: Dna,
    pub mate: Option<Dna>,
}

pub struct ReadSimulator<'a> {
    repertoire: &'a Repertoire,
    population: &'a [u64],
    config: &'a ReadConfig,
}

impl<'a> ReadSimulator<'a> {
    pub fn new(
        repertoire: &'a Repertoire,
        population: &'a [u64],
        config: &'a ReadConfig,
    ) -> Result<Self> {
        if population.len() != repertoire.len() {
            return Err(SimulationError::config(format!(
                "population has {} entries for {} clonotypes",
                population.len(),
                repertoire.len()
            )));
        }
        if config.read_type == ReadType::Amplicon && config.amplicon_probe.is_empty() {
            return Err(SimulationError::config(
                "amplicon reads need a non-empty probe",
            ));
        }
        if config.read_type == ReadType::Paired
            && config.read_length.mean() > config.insert_length.mean()
        {
            warn!(
                "mean read length {} exceeds mean insert length {}; mates will overlap heavily",
                config.read_length.mean(),
                config.insert_length.mean()
            );
        }
        Ok(ReadSimulator {
            repertoire,
            population,
            config,
        })
    }

    pub fn simulate<R: Rng>(&self, rng: &mut R) -> Result<Vec<SimulatedRead>> {
        let total_cells: u64 = self.population.iter().sum();
        if self.config.count > 0 && total_cells == 0 {
            return Err(SimulationError::data(
                "cannot draw reads from an empty population",
            ));
        }
        let mut reads = Vec::with_capacity(self.config.count);
        let mut rejected = 0usize;
        while reads.len() < self.config.count {
            if rejected >= REJECTION_BUDGET {
                return Err(SimulationError::data(format!(
                    "{rejected} consecutive cells yielded no read; \
                     check the amplicon probe and read lengths against the repertoire"
                )));
            }
            let (clone_index, cell_index) = self.pick_cell(total_cells, rng);
            let clonotype = &self.repertoire.clonotypes[clone_index];
            let chain = &clonotype.chains[usize::from(rng.gen::<f64>() >= 0.5)];
            let body = match self.config.space {
                ReadSpace::Dna => &chain.dna,
                ReadSpace::Rna => &chain.rna,
            };
            let prefix = format!(
                "tcrsim:readnum={}:clone={}:cell={}:chain={}",
                reads.len(),
                clone_index,
                cell_index,
                chain.locus
            );
            let read = match self.config.read_type {
                ReadType::Single => self.single_read(body, &prefix, rng),
                ReadType::Paired => self.paired_read(body, &prefix, rng),
                ReadType::Amplicon => self.amplicon_read(body, chain, &prefix, rng),
            };
            match read {
                Some(read) => {
                    rejected = 0;
                    reads.push(read);
                }
                None => rejected += 1,
            }
        }
        Ok(reads)
    }

    /// Uniform draw over cells; clonotype weighting follows from the
    /// population counts.
    fn pick_cell<R: Rng>(&self, total_cells: u64, rng: &mut R) -> (usize, u64) {
        let target = rng.gen_range(0..total_cells);
        let mut cumulative = 0u64;
        for (clone_index, &count) in self.population.iter().enumerate() {
            if target < cumulative + count {
                return (clone_index, target - cumulative);
            }
            cumulative += count;
        }
        unreachable!("population counts sum to total_cells")
    }

    fn single_read<R: Rng>(&self, body: &Dna, prefix: &str, rng: &mut R) -> Option<SimulatedRead> {
        let length = self.config.read_length.sample(rng);
        if body.len() < length {
            return None;
        }
        let start = rng.gen_range(0..=body.len() - length);
        let forward = rng.gen::<bool>();
        let slice = body.extract_subsequence(start, start + length);
        let (seq, strand) = if forward {
            (slice, '+')
        } else {
            (slice.reverse_complement(), '-')
        };
        Some(SimulatedRead {
            name: format!("{prefix}:pos={start}:strand={strand}"),
            seq,
            mate: None,
        })
    }

    fn paired_read<R: Rng>(&self, body: &Dna, prefix: &str, rng: &mut R) -> Option<SimulatedRead> {
        let insert = self.config.insert_length.sample(rng);
        if body.len() < insert {
            return None;
        }
        let start = rng.gen_range(0..=body.len() - insert);
        let r1_length = self.config.read_length.sample_at_most(rng, insert);
        let r2_length = self.config.read_length.sample_at_most(rng, insert);
        let r1 = body.extract_subsequence(start, start + r1_length);
        let r2 = body
            .extract_subsequence(start + insert - r2_length, start + insert)
            .reverse_complement();
        Some(SimulatedRead {
            name: format!("{prefix}:pos={start}:insert={insert}:strand=+"),
            seq: r1,
            mate: Some(r2),
        })
    }

    /// R1 is anchored at the probe and its mate is defined as the exact
    /// reverse complement of R1.
    fn amplicon_read<R: Rng>(
        &self,
        body: &Dna,
        chain: &Chain,
        prefix: &str,
        rng: &mut R,
    ) -> Option<SimulatedRead> {
        let length = self.config.read_length.sample(rng) as i64;
        let probe = &self.config.amplicon_probe;
        let start = if let Some(pos) = body.find(probe) {
            pos as i64
        } else if let Some(pos) = body.find(&probe.reverse_complement()) {
            // antisense hit: the read runs toward the probe and ends flush
            // with the probed region
            pos as i64 + probe.len() as i64 - length
        } else {
            log::debug!("no probe match on {} chain", chain.locus);
            return None;
        };
        if start < 0 || start + length > body.len() as i64 {
            return None;
        }
        let r1 = body.extract_subsequence(start as usize, (start + length) as usize);
        let r2 = r1.reverse_complement();
        Some(SimulatedRead {
            name: format!("{prefix}:probepos={start}"),
            seq: r1,
            mate: Some(r2),
        })
    }
}
