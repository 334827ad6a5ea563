//! Germline V/D/J/C segment descriptions and the immutable index over them.
use crate::errors::SimulationError;
use crate::sequence::Dna;
use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The four T-cell receptor loci.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locus {
    Tra,
    Trb,
    Trg,
    Trd,
}

impl Locus {
    /// β and δ chains recombine through a diversity segment, α and γ do not.
    pub fn has_d_segment(self) -> bool {
        matches!(self, Locus::Trb | Locus::Trd)
    }

    pub fn code(self) -> &'static str {
        match self {
            Locus::Tra => "TRA",
            Locus::Trb => "TRB",
            Locus::Trg => "TRG",
            Locus::Trd => "TRD",
        }
    }

    pub fn from_code(code: &str) -> Result<Locus> {
        match code {
            "TRA" => Ok(Locus::Tra),
            "TRB" => Ok(Locus::Trb),
            "TRG" => Ok(Locus::Trg),
            "TRD" => Ok(Locus::Trd),
            _ => Err(SimulationError::data(format!("unknown locus {code:?}"))),
        }
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentRole {
    V,
    D,
    J,
    C,
}

impl SegmentRole {
    pub fn from_code(code: &str) -> Result<SegmentRole> {
        match code {
            "V" => Ok(SegmentRole::V),
            "D" => Ok(SegmentRole::D),
            "J" => Ok(SegmentRole::J),
            "C" => Ok(SegmentRole::C),
            _ => Err(SimulationError::data(format!(
                "unknown segment role {code:?}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_code(code: &str) -> Result<Strand> {
        match code {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Err(SimulationError::data(format!("unknown strand {code:?}"))),
        }
    }
}

/// One germline gene segment.
///
/// Genomic coordinates are half-open on the reference. `exons` are half-open
/// intervals relative to the segment span, expressed on the sense strand and
/// ordered in transcription order. `seq` is the sense-strand sequence of the
/// whole span, materialized from the reference at load time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub locus: Locus,
    pub role: SegmentRole,
    pub chromosome: String,
    pub strand: Strand,
    pub start: u64,
    pub end: u64,
    pub exons: Vec<(u64, u64)>,
    pub allele: String,
    #[serde(skip)]
    pub seq: Dna,
}

impl Segment {
    /// Concatenation of the exon sequences in transcription order.
    pub fn spliced(&self) -> Dna {
        let mut rna = Dna::new();
        for &(s, e) in &self.exons {
            rna.extend(&self.seq.extract_subsequence(s as usize, e as usize));
        }
        rna
    }

    /// True when `self` lies further along the transcription direction than
    /// `other`, on the same chromosome and strand.
    pub fn is_downstream_of(&self, other: &Segment) -> bool {
        if self.chromosome != other.chromosome || self.strand != other.strand {
            return false;
        }
        match self.strand {
            Strand::Forward => self.start >= other.end,
            Strand::Reverse => self.end <= other.start,
        }
    }

    fn check(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(SimulationError::data(format!(
                "segment {} has an empty genomic span",
                self.name
            )));
        }
        let span = self.end - self.start;
        let mut previous_end = 0u64;
        for (i, &(s, e)) in self.exons.iter().enumerate() {
            if e <= s || e > span {
                return Err(SimulationError::data(format!(
                    "segment {} exon {} ({}..{}) is outside the segment span",
                    self.name, i, s, e
                )));
            }
            if i > 0 && s < previous_end {
                return Err(SimulationError::data(format!(
                    "segment {} exons overlap or are out of order",
                    self.name
                )));
            }
            previous_end = e;
        }
        if !self.seq.is_empty() && self.seq.len() != span as usize {
            return Err(SimulationError::data(format!(
                "segment {} sequence length {} does not match its span {}",
                self.name,
                self.seq.len(),
                span
            )));
        }
        Ok(())
    }
}

/// Immutable index of germline segments, keyed by segment name.
#[derive(Clone, Debug, Default)]
pub struct SegmentCatalog {
    segments: Vec<Segment>,
    by_name: HashMap<String, usize>,
}

impl SegmentCatalog {
    pub fn from_segments(segments: Vec<Segment>) -> Result<SegmentCatalog> {
        let mut by_name = HashMap::with_capacity(segments.len());
        for (i, seg) in segments.iter().enumerate() {
            seg.check()?;
            if by_name.insert(seg.name.clone(), i).is_some() {
                return Err(SimulationError::data(format!(
                    "segment {} defined twice",
                    seg.name
                )));
            }
        }
        Ok(SegmentCatalog { segments, by_name })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Segment> {
        self.by_name.get(name).map(|&i| &self.segments[i])
    }

    /// Look a segment up, raising a data error when the name is unknown.
    /// This is the thaw path for snapshots, which reference segments by name.
    pub fn resolve(&self, name: &str) -> Result<&Segment> {
        self.get(name).ok_or_else(|| {
            SimulationError::Data(format!("segment {name} not present in catalog")).into()
        })
    }

    pub fn segments_of(&self, locus: Locus, role: SegmentRole) -> Vec<&Segment> {
        self.segments
            .iter()
            .filter(|s| s.locus == locus && s.role == role)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Fill in the sense-strand sequence of every segment living on the given
    /// chromosome. `reference` is the full plus-strand chromosome sequence.
    pub fn materialize(&mut self, chromosome: &str, reference: &Dna) -> Result<()> {
        for seg in self.segments.iter_mut() {
            if seg.chromosome != chromosome {
                continue;
            }
            if seg.end as usize > reference.len() {
                return Err(SimulationError::data(format!(
                    "segment {} ({}..{}) extends past the end of chromosome {} ({} bases)",
                    seg.name,
                    seg.start,
                    seg.end,
                    chromosome,
                    reference.len()
                )));
            }
            let plus = reference.extract_subsequence(seg.start as usize, seg.end as usize);
            seg.seq = match seg.strand {
                Strand::Forward => plus,
                Strand::Reverse => plus.reverse_complement(),
            };
        }
        Ok(())
    }

    /// Chromosomes referenced by at least one segment, in first-seen order.
    pub fn chromosomes(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|s| s.chromosome.clone())
            .unique()
            .collect()
    }
}
