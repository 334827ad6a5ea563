//! Artifact writers: FASTQ files, the per-clonotype statistics table and the
//! binary repertoire snapshot.
use crate::catalog::SegmentCatalog;
use crate::errors::SimulationError;
use crate::quality::{MateSide, QualityDegrader};
use crate::reads::{ReadType, SimulatedRead};
use crate::repertoire::Repertoire;
use anyhow::{Context, Result};
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Quality character for a perfect, undegraded base.
pub const PERFECT_QUALITY: char = 'J';

pub struct OutputPaths {
    dir: PathBuf,
    base: String,
}

impl OutputPaths {
    pub fn new(dir: &Path, base: &str) -> OutputPaths {
        OutputPaths {
            dir: dir.to_path_buf(),
            base: base.to_string(),
        }
    }

    pub fn statistics(&self) -> PathBuf {
        self.dir.join(format!("{}.statistics.csv", self.base))
    }

    pub fn snapshot(&self) -> PathBuf {
        self.dir.join(format!("{}.population.bin", self.base))
    }

    fn fastq(&self, suffix: &str, degraded: bool) -> PathBuf {
        let tag = if degraded { ".degraded" } else { "" };
        self.dir
            .join(format!("{}{}{}.fastq", self.base, suffix, tag))
    }
}

/// Write perfect reads. Single-end reads go to `<base>.fastq`; pairs split
/// into `<base>_R1.fastq` and `<base>_R2.fastq`.
pub fn write_reads(paths: &OutputPaths, read_type: ReadType, reads: &[SimulatedRead]) -> Result<()> {
    match read_type {
        ReadType::Single => {
            let mut out = writer(&paths.fastq("", false))?;
            for read in reads {
                write_record(&mut out, &read.name, &read.seq.get_string(), None)?;
            }
            out.flush()?;
        }
        ReadType::Paired | ReadType::Amplicon => {
            let mut r1 = writer(&paths.fastq("_R1", false))?;
            let mut r2 = writer(&paths.fastq("_R2", false))?;
            for read in reads {
                let mate = read.mate.as_ref().ok_or_else(|| {
                    SimulationError::Config(format!("read {} is missing its mate", read.name))
                })?;
                write_record(&mut r1, &read.name, &read.seq.get_string(), None)?;
                write_record(&mut r2, &read.name, &mate.get_string(), None)?;
            }
            r1.flush()?;
            r2.flush()?;
        }
    }
    Ok(())
}

/// Degrade every read and write the mutated FASTQ files next to the perfect
/// ones, with a `_DEGRADED` tag on each identifier.
pub fn write_degraded_reads<R: Rng>(
    paths: &OutputPaths,
    read_type: ReadType,
    reads: &[SimulatedRead],
    degrader: &QualityDegrader,
    rng: &mut R,
) -> Result<()> {
    match read_type {
        ReadType::Single => {
            let mut out = writer(&paths.fastq("", true))?;
            for (index, read) in reads.iter().enumerate() {
                let (bases, quality) = degrader.degrade(&read.seq, index, MateSide::R1, rng)?;
                write_record(
                    &mut out,
                    &degraded_name(&read.name),
                    &bases.get_string(),
                    Some(&quality),
                )?;
            }
            out.flush()?;
        }
        ReadType::Paired | ReadType::Amplicon => {
            let mut r1 = writer(&paths.fastq("_R1", true))?;
            let mut r2 = writer(&paths.fastq("_R2", true))?;
            for (index, read) in reads.iter().enumerate() {
                let mate = read.mate.as_ref().ok_or_else(|| {
                    SimulationError::Config(format!("read {} is missing its mate", read.name))
                })?;
                let name = degraded_name(&read.name);
                let (bases1, quality1) = degrader.degrade(&read.seq, index, MateSide::R1, rng)?;
                let (bases2, quality2) = degrader.degrade(mate, index, MateSide::R2, rng)?;
                write_record(&mut r1, &name, &bases1.get_string(), Some(&quality1))?;
                write_record(&mut r2, &name, &bases2.get_string(), Some(&quality2))?;
            }
            r1.flush()?;
            r2.flush()?;
        }
    }
    Ok(())
}

fn degraded_name(name: &str) -> String {
    format!("{name}_DEGRADED")
}

fn writer(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("could not create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn write_record(
    out: &mut impl Write,
    name: &str,
    bases: &str,
    quality: Option<&str>,
) -> Result<()> {
    let perfect;
    let quality = match quality {
        Some(q) => q,
        None => {
            perfect = PERFECT_QUALITY.to_string().repeat(bases.len());
            &perfect
        }
    };
    writeln!(out, "@{name}")?;
    writeln!(out, "{bases}")?;
    writeln!(out, "+")?;
    writeln!(out, "{quality}")?;
    Ok(())
}

/// Rows of the statistics table, shared between the writer and the snapshot
/// round-trip checks.
pub fn statistics_rows(repertoire: &Repertoire, population: &[u64]) -> Vec<Vec<String>> {
    repertoire
        .clonotypes
        .iter()
        .zip(population)
        .enumerate()
        .map(|(index, (clonotype, &cells))| {
            let mut row = vec![index.to_string(), clonotype.locus_pair()];
            for chain in &clonotype.chains {
                row.push(chain.v_name.clone());
                row.push(chain.d_name.clone().unwrap_or_default());
                row.push(chain.j_name.clone());
                row.push(chain.c_name.clone());
                row.push(chain.cdr3().map(|c| c.get_string()).unwrap_or_default());
            }
            row.push(cells.to_string());
            row
        })
        .collect()
}

pub fn write_statistics(
    paths: &OutputPaths,
    repertoire: &Repertoire,
    population: &[u64],
) -> Result<()> {
    let path = paths.statistics();
    let mut out = csv::Writer::from_path(&path)
        .with_context(|| format!("could not create {}", path.display()))?;
    out.write_record([
        "CLONE",
        "LOCUS_PAIR",
        "V_1",
        "D_1",
        "J_1",
        "C_1",
        "CDR3_1",
        "V_2",
        "D_2",
        "J_2",
        "C_2",
        "CDR3_2",
        "CELL_COUNT",
    ])?;
    for row in statistics_rows(repertoire, population) {
        out.write_record(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// Frozen state of a run, taken after population distribution and before any
/// read is drawn. Chains carry segment names, never segment data, so a thawed
/// snapshot must be re-resolved against a freshly loaded catalog.
#[derive(Serialize, Deserialize)]
pub struct Snapshot {
    pub repertoire: Repertoire,
    pub population: Vec<u64>,
    pub rng: Xoshiro256PlusPlus,
}

impl Snapshot {
    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("could not create {}", path.display()))?;
        bincode::serialize_into(BufWriter::new(file), self)
            .with_context(|| format!("could not serialize snapshot to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Snapshot> {
        let file = File::open(path)
            .map_err(|e| SimulationError::data(format!("cannot open {}: {e}", path.display())))?;
        bincode::deserialize_from(BufReader::new(file)).map_err(|e| {
            SimulationError::data(format!("cannot decode snapshot {}: {e}", path.display()))
        })
    }

    /// Every segment referenced by the frozen chains must exist in the given
    /// catalog; a snapshot taken against a different catalog is a data error.
    pub fn validate(&self, catalog: &SegmentCatalog) -> Result<()> {
        if self.population.len() != self.repertoire.len() {
            return Err(SimulationError::data(format!(
                "snapshot population covers {} clonotypes but the repertoire holds {}",
                self.population.len(),
                self.repertoire.len()
            )));
        }
        for clonotype in &self.repertoire.clonotypes {
            for chain in &clonotype.chains {
                catalog.resolve(&chain.v_name)?;
                if let Some(d) = &chain.d_name {
                    catalog.resolve(d)?;
                }
                catalog.resolve(&chain.j_name)?;
                catalog.resolve(&chain.c_name)?;
            }
        }
        Ok(())
    }
}
