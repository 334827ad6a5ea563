#![allow(dead_code)]

use ndarray::array;
use tcrsim::{
    Dna, Locus, RecombinationModel, Segment, SegmentCatalog, SegmentRole, SelectionTuple, Strand,
};

pub fn segment(
    name: &str,
    locus: Locus,
    role: SegmentRole,
    chromosome: &str,
    start: u64,
    end: u64,
    exons: Vec<(u64, u64)>,
    seq: &str,
) -> Segment {
    Segment {
        name: name.to_string(),
        locus,
        role,
        chromosome: chromosome.to_string(),
        strand: Strand::Forward,
        start,
        end,
        exons,
        allele: "01".to_string(),
        seq: Dna::from_string(seq).unwrap(),
    }
}

// Hand-designed αβ loci. Both V segments carry a leader exon with the start
// codon, an intron, and a V exon ending near the conserved cysteine; both J
// segments carry the F-G-X-G motif; both constant regions splice two exons.
// With zero chewback and zero N-addition the recombined transcripts are in
// frame and stop-free.
pub const TRBV_SEQ: &str = "ATGCTGGTAAGTGCCGTCACCTGTGCCAGCAGC";
pub const TRBD_SEQ: &str = "GGGACAGGGGGC";
pub const TRBJ_SEQ: &str = "AACTTTGGACAAGGCACC";
pub const TRBC_SEQ: &str = "GAGGACCTGAACGTCAGTAAGGTGTTCCCACCC";
pub const TRAV_SEQ: &str = "ATGCTGGTAAGTGCAGTGACCTGTGCTGTGAGC";
pub const TRAJ_SEQ: &str = "AACTACTTCGGAGCAGGC";
pub const TRAC_SEQ: &str = "AACATCCAGAACGTGAGTCTGCCCAAGGCC";

pub const TRB_CDR3: &str = "TGTGCCAGCAGCGGGACAGGGGGCAACTTTGGACAAGGC";

pub fn test_catalog() -> SegmentCatalog {
    SegmentCatalog::from_segments(vec![
        segment(
            "TRBV20-1",
            Locus::Trb,
            SegmentRole::V,
            "7",
            1000,
            1033,
            vec![(0, 6), (12, 33)],
            TRBV_SEQ,
        ),
        segment(
            "TRBD1",
            Locus::Trb,
            SegmentRole::D,
            "7",
            2000,
            2012,
            vec![(0, 12)],
            TRBD_SEQ,
        ),
        segment(
            "TRBJ1-1",
            Locus::Trb,
            SegmentRole::J,
            "7",
            3000,
            3018,
            vec![(0, 18)],
            TRBJ_SEQ,
        ),
        segment(
            "TRBC1",
            Locus::Trb,
            SegmentRole::C,
            "7",
            4000,
            4033,
            vec![(0, 12), (18, 33)],
            TRBC_SEQ,
        ),
        segment(
            "TRAV1",
            Locus::Tra,
            SegmentRole::V,
            "14",
            1000,
            1033,
            vec![(0, 6), (12, 33)],
            TRAV_SEQ,
        ),
        segment(
            "TRAJ1",
            Locus::Tra,
            SegmentRole::J,
            "14",
            3000,
            3018,
            vec![(0, 18)],
            TRAJ_SEQ,
        ),
        segment(
            "TRAC",
            Locus::Tra,
            SegmentRole::C,
            "14",
            4000,
            4030,
            vec![(0, 12), (18, 30)],
            TRAC_SEQ,
        ),
    ])
    .unwrap()
}

/// Model with deterministic zero-base chewback and N-addition everywhere.
pub fn quiet_model() -> RecombinationModel {
    RecombinationModel {
        selection: vec![
            SelectionTuple {
                names: vec!["TRBV20-1".to_string()],
                probability: 1.0,
            },
            SelectionTuple {
                names: vec!["TRBV20-1".to_string(), "TRBD1".to_string()],
                probability: 1.0,
            },
            SelectionTuple {
                names: vec![
                    "TRBV20-1".to_string(),
                    "TRBD1".to_string(),
                    "TRBJ1-1".to_string(),
                ],
                probability: 1.0,
            },
            SelectionTuple {
                names: vec!["TRAV1".to_string()],
                probability: 1.0,
            },
            SelectionTuple {
                names: vec!["TRAV1".to_string(), "TRAJ1".to_string()],
                probability: 1.0,
            },
        ],
        v_chewback: array![1.0],
        d5_chewback: array![1.0],
        d3_chewback: array![1.0],
        j_chewback: array![1.0],
        vd_addition: array![1.0],
        dj_addition: array![1.0],
        vj_addition: array![1.0],
    }
}

/// Model pinning every junction draw to a fixed nonzero count: one base off
/// the V, two off the J, one off each D end, two VD / one DJ / three VJ
/// insertions.
pub fn active_model() -> RecombinationModel {
    RecombinationModel {
        selection: Vec::new(),
        v_chewback: array![0.0, 1.0],
        d5_chewback: array![0.0, 1.0],
        d3_chewback: array![0.0, 1.0],
        j_chewback: array![0.0, 0.0, 1.0],
        vd_addition: array![0.0, 0.0, 1.0],
        dj_addition: array![0.0, 1.0],
        vj_addition: array![0.0, 0.0, 0.0, 1.0],
    }
}
