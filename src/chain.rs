//! Construction of a single recombined TCR chain: segment selection,
//! junctional chewback, N-addition, DNA assembly and RNA splicing.
use crate::catalog::{Locus, Segment, SegmentCatalog, SegmentRole};
use crate::distributions::{random_dna, CategoricalDistribution};
use crate::errors::SimulationError;
use crate::model::RecombinationModel;
use crate::sequence::Dna;
use anyhow::Result;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Junctional insertions: a single N-region for α/γ chains, two for β/δ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Insertions {
    Vj(Dna),
    Vdj { vd: Dna, dj: Dna },
}

/// The sampled recombination event behind a chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub v3_chewback: usize,
    pub j5_chewback: usize,
    pub d5_chewback: Option<usize>,
    pub d3_chewback: Option<usize>,
    pub insertions: Insertions,
}

/// One recombined TCR chain. Segments are referenced by name so the chain
/// survives freezing and thawing against a freshly loaded catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub locus: Locus,
    pub v_name: String,
    pub d_name: Option<String>,
    pub j_name: String,
    pub c_name: String,
    pub junction: Junction,
    pub dna: Dna,
    pub rna: Dna,
    /// Half-open span of the CDR3 on the RNA, absent for chains where an
    /// anchor could not be located.
    pub cdr3_span: Option<(usize, usize)>,
    pub productive: bool,
}

impl Chain {
    pub fn cdr3(&self) -> Option<Dna> {
        self.cdr3_span
            .map(|(s, e)| self.rna.extract_subsequence(s, e))
    }
}

// Conserved cysteine in V through the F/W-G-X-G motif in J, anchored to the
// reading frame of the transcript.
const CDR3_PATTERN: &str =
    r"^((?:[ACGT]{3})+)(TG[TC])((?:[ACGT]{3}){5,32})((?:TT[TC]|TGG)GG[ACGT][ACGT]{3}GG[ACGT])";

pub struct ChainBuilder<'a> {
    catalog: &'a SegmentCatalog,
    model: &'a RecombinationModel,
    v_chewback: CategoricalDistribution,
    d5_chewback: CategoricalDistribution,
    d3_chewback: CategoricalDistribution,
    j_chewback: CategoricalDistribution,
    vd_addition: CategoricalDistribution,
    dj_addition: CategoricalDistribution,
    vj_addition: CategoricalDistribution,
    cdr3: Regex,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(catalog: &'a SegmentCatalog, model: &'a RecombinationModel) -> Result<Self> {
        Ok(ChainBuilder {
            catalog,
            model,
            v_chewback: CategoricalDistribution::from_indexed(&model.v_chewback, "Vchewback")?,
            d5_chewback: CategoricalDistribution::from_indexed(&model.d5_chewback, "D5chewback")?,
            d3_chewback: CategoricalDistribution::from_indexed(&model.d3_chewback, "D3chewback")?,
            j_chewback: CategoricalDistribution::from_indexed(&model.j_chewback, "Jchewback")?,
            vd_addition: CategoricalDistribution::from_indexed(&model.vd_addition, "VDaddition")?,
            dj_addition: CategoricalDistribution::from_indexed(&model.dj_addition, "DJaddition")?,
            vj_addition: CategoricalDistribution::from_indexed(&model.vj_addition, "VJaddition")?,
            cdr3: Regex::new(CDR3_PATTERN).unwrap(),
        })
    }

    /// Simulate one V(D)J recombination on the given locus.
    pub fn build<R: Rng>(&mut self, locus: Locus, rng: &mut R) -> Result<Chain> {
        let v = self.choose_v(locus, rng)?;
        let (d, j) = if locus.has_d_segment() {
            let d = self.choose_d(locus, v, rng)?;
            let j = self.choose_j(locus, v, Some(d), rng)?;
            (Some(d), j)
        } else {
            (None, self.choose_j(locus, v, None, rng)?)
        };
        let c = self.choose_c(locus, j)?;

        let v3 = self.v_chewback.sample(rng);
        let j5 = self.j_chewback.sample(rng);
        let (d5, d3) = match d {
            Some(_) => (Some(self.d5_chewback.sample(rng)), Some(self.d3_chewback.sample(rng))),
            None => (None, None),
        };
        let insertions = match d {
            Some(_) => Insertions::Vdj {
                vd: random_dna(self.vd_addition.sample(rng), rng),
                dj: random_dna(self.dj_addition.sample(rng), rng),
            },
            None => Insertions::Vj(random_dna(self.vj_addition.sample(rng), rng)),
        };

        let junction = Junction {
            v3_chewback: v3,
            j5_chewback: j5,
            d5_chewback: d5,
            d3_chewback: d3,
            insertions,
        };
        self.assemble(locus, v, d, j, c, junction)
    }

    fn assemble(
        &self,
        locus: Locus,
        v: &Segment,
        d: Option<&Segment>,
        j: &Segment,
        c: &Segment,
        junction: Junction,
    ) -> Result<Chain> {
        let v3 = junction.v3_chewback.min(v.seq.len());
        let j5 = junction.j5_chewback.min(j.seq.len());

        let v_dna = v.seq.extract_subsequence(0, v.seq.len() - v3);
        let j_dna = j.seq.extract_subsequence(j5, j.seq.len());
        let d_dna = match (d, junction.d5_chewback, junction.d3_chewback) {
            (Some(d), Some(d5), Some(d3)) => {
                let d5 = d5.min(d.seq.len());
                let d3 = d3.min(d.seq.len() - d5);
                Some(d.seq.extract_subsequence(d5, d.seq.len() - d3))
            }
            (None, None, None) => None,
            _ => {
                return Err(SimulationError::data(format!(
                    "junction for locus {locus} mixes D chewback with a missing D segment"
                )))
            }
        };

        // Exonic projection. Chewback happens at the recombining end of the
        // terminal V exon / initial J exon, so trimming the spliced product
        // is equivalent to trimming the exon itself.
        let v_spliced = v.spliced();
        let v3_rna = v3.min(v_spliced.len());
        let v_rna = v_spliced.extract_subsequence(0, v_spliced.len() - v3_rna);
        let j_spliced = j.spliced();
        let j5_rna = j5.min(j_spliced.len());
        let j_rna = j_spliced.extract_subsequence(j5_rna, j_spliced.len());

        let mut dna = Dna::new();
        let mut rna = Dna::new();
        dna.extend(&v_dna);
        rna.extend(&v_rna);
        match (&junction.insertions, &d_dna) {
            (Insertions::Vdj { vd, dj }, Some(d_dna)) => {
                dna.extend(vd);
                dna.extend(d_dna);
                dna.extend(dj);
                rna.extend(vd);
                rna.extend(d_dna);
                rna.extend(dj);
            }
            (Insertions::Vj(vj), None) => {
                dna.extend(vj);
                rna.extend(vj);
            }
            _ => {
                return Err(SimulationError::data(format!(
                    "junction insertions do not match the segment layout of {locus}"
                )))
            }
        }
        dna.extend(&j_dna);
        rna.extend(&j_rna);
        dna.extend(&c.seq);
        rna.extend(&c.spliced());

        let cdr3_span = self.locate_cdr3(&rna);
        let productive = cdr3_span.is_some() && in_frame_without_stop(&rna);

        Ok(Chain {
            locus,
            v_name: v.name.clone(),
            d_name: d.map(|d| d.name.clone()),
            j_name: j.name.clone(),
            c_name: c.name.clone(),
            junction,
            dna,
            rna,
            cdr3_span,
            productive,
        })
    }

    fn choose_v<R: Rng>(&self, locus: Locus, rng: &mut R) -> Result<&'a Segment> {
        let candidates = self.catalog.segments_of(locus, SegmentRole::V);
        self.choose_segment(&candidates, rng, &format!("{locus}V"), |name| {
            self.model.single_weight(name)
        })
    }

    fn choose_d<R: Rng>(&self, locus: Locus, v: &Segment, rng: &mut R) -> Result<&'a Segment> {
        let candidates: Vec<&Segment> = self
            .catalog
            .segments_of(locus, SegmentRole::D)
            .into_iter()
            .filter(|d| d.is_downstream_of(v))
            .collect();
        self.choose_segment(&candidates, rng, &format!("{locus}D"), |name| {
            self.model.pair_weight(&v.name, name)
        })
    }

    fn choose_j<R: Rng>(
        &self,
        locus: Locus,
        v: &Segment,
        d: Option<&Segment>,
        rng: &mut R,
    ) -> Result<&'a Segment> {
        let upstream = d.unwrap_or(v);
        let candidates: Vec<&Segment> = self
            .catalog
            .segments_of(locus, SegmentRole::J)
            .into_iter()
            .filter(|j| j.is_downstream_of(upstream))
            .collect();
        self.choose_segment(&candidates, rng, &format!("{locus}J"), |name| match d {
            Some(d) => self.model.triple_weight(&v.name, &d.name, name),
            None => self.model.pair_weight(&v.name, name),
        })
    }

    /// The constant region is not a recombination choice: take the nearest
    /// C segment downstream of J.
    fn choose_c(&self, locus: Locus, j: &Segment) -> Result<&'a Segment> {
        self.catalog
            .segments_of(locus, SegmentRole::C)
            .into_iter()
            .filter(|c| c.is_downstream_of(j))
            .min_by_key(|c| match c.strand {
                crate::catalog::Strand::Forward => c.start as i64 - j.end as i64,
                crate::catalog::Strand::Reverse => j.start as i64 - c.end as i64,
            })
            .ok_or_else(|| {
                SimulationError::Data(format!(
                    "no constant segment downstream of {} on locus {locus}",
                    j.name
                ))
                .into()
            })
    }

    /// Weighted pick over candidate segments. Entries with a probability in
    /// the selection table come first, in table declaration order; the rest
    /// share the leftover mass.
    fn choose_segment<R, F>(
        &self,
        candidates: &[&'a Segment],
        rng: &mut R,
        label: &str,
        weight_of: F,
    ) -> Result<&'a Segment>
    where
        R: Rng,
        F: Fn(&str) -> Option<(usize, f64)>,
    {
        if candidates.is_empty() {
            return Err(SimulationError::data(format!(
                "no candidate segments to join for {label}"
            )));
        }
        let mut defined: Vec<(usize, usize, f64)> = Vec::new();
        let mut residual: Vec<usize> = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            match weight_of(&candidate.name) {
                Some((rank, w)) => defined.push((rank, i, w)),
                None => residual.push(i),
            }
        }
        defined.sort_by_key(|&(rank, _, _)| rank);

        let mut order: Vec<usize> = Vec::with_capacity(candidates.len());
        let mut weights: Vec<Option<f64>> = Vec::with_capacity(candidates.len());
        for (_, i, w) in &defined {
            order.push(*i);
            weights.push(Some(*w));
        }
        for i in residual {
            order.push(i);
            weights.push(None);
        }
        let mut distribution = CategoricalDistribution::from_partial(&weights, label)?;
        Ok(candidates[order[distribution.sample(rng)]])
    }

    fn locate_cdr3(&self, rna: &Dna) -> Option<(usize, usize)> {
        let text = rna.get_string();
        let captures = self.cdr3.captures(&text)?;
        let start = captures.get(2)?.start();
        let end = captures.get(4)?.end();
        Some((start, end))
    }
}

/// Transcript sanity for a productive chain: starts at a start codon, stays
/// in frame, and carries no premature stop.
fn in_frame_without_stop(rna: &Dna) -> bool {
    if rna.len() % 3 != 0 || !rna.seq.starts_with(b"ATG") {
        return false;
    }
    match rna.translate() {
        Ok(aa) if !aa.is_empty() => !aa.seq[..aa.len() - 1].contains(&b'*'),
        _ => false,
    }
}
