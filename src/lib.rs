//! In-silico synthesis of T-cell receptor sequencing reads.
//!
//! The pipeline runs in strict phases: a germline [`SegmentCatalog`] and a
//! [`RecombinationModel`] feed the [`ChainBuilder`], which simulates V(D)J
//! recombination with chewback and N-addition; a [`Repertoire`] pairs chains
//! into clonotypes; a [`PopulationDistribution`] spreads cells over them; the
//! [`ReadSimulator`] slices single, paired or amplicon reads out of the
//! population; and the [`QualityDegrader`] optionally turns those perfect
//! reads into error-bearing FASTQ records.

pub mod catalog;
pub mod chain;
pub mod distributions;
pub mod errors;
pub mod model;
pub mod output;
pub mod parser;
pub mod population;
pub mod quality;
pub mod reads;
pub mod repertoire;
pub mod sequence;

pub use catalog::{Locus, Segment, SegmentCatalog, SegmentRole, Strand};
pub use chain::{Chain, ChainBuilder, Insertions, Junction};
pub use errors::SimulationError;
pub use model::{RecombinationModel, SelectionTuple};
pub use output::{OutputPaths, Snapshot};
pub use population::PopulationDistribution;
pub use quality::{DegradationMethod, LogisticCurve, QualityCorpus, QualityDegrader};
pub use reads::{ReadConfig, ReadSimulator, ReadSpace, ReadType, SimulatedRead};
pub use repertoire::{Clonotype, Repertoire, RepertoireConfig, Uniqueness};
pub use sequence::{AminoAcid, Dna};
