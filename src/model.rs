//! Recombination probability tables: segment-selection tuples and the seven
//! length-indexed chewback/addition distributions.
use crate::catalog::SegmentCatalog;
use crate::errors::SimulationError;
use anyhow::Result;
use log::warn;
use ndarray::Array1;

/// An entry of the segment-selection table. Tuples hold one, two or three
/// segment names ((V), (V, D) / (V, J) or (V, D, J)) and the absolute
/// probability of that prefix being chosen.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionTuple {
    pub names: Vec<String>,
    pub probability: f64,
}

#[derive(Clone, Debug, Default)]
pub struct RecombinationModel {
    /// Declaration order matters: when defined probabilities exceed one, the
    /// excess is clipped by consuming entries in this order.
    pub selection: Vec<SelectionTuple>,
    pub v_chewback: Array1<f64>,
    pub d5_chewback: Array1<f64>,
    pub d3_chewback: Array1<f64>,
    pub j_chewback: Array1<f64>,
    pub vd_addition: Array1<f64>,
    pub dj_addition: Array1<f64>,
    pub vj_addition: Array1<f64>,
}

impl RecombinationModel {
    /// Check internal consistency and cross-check every tuple against the
    /// catalog. Unknown segment names are a data error; arrays summing past
    /// one get a warning (the tail indices become unreachable when drawing).
    pub fn validate(&self, catalog: &SegmentCatalog) -> Result<()> {
        for tuple in &self.selection {
            if tuple.names.is_empty() || tuple.names.len() > 3 {
                return Err(SimulationError::data(format!(
                    "selection tuple {:?} must name one to three segments",
                    tuple.names
                )));
            }
            if tuple.probability < 0.0 || tuple.probability > 1.0 {
                return Err(SimulationError::data(format!(
                    "selection tuple {:?} has probability {} outside [0, 1]",
                    tuple.names, tuple.probability
                )));
            }
            for name in &tuple.names {
                catalog.resolve(name)?;
            }
        }
        for (label, array) in self.junction_arrays() {
            if array.is_empty() {
                return Err(SimulationError::data(format!("{label} array is empty")));
            }
            if array.iter().any(|&p| p < 0.0) {
                return Err(SimulationError::data(format!(
                    "{label} array contains a negative probability"
                )));
            }
            let total: f64 = array.sum();
            if total > 1.0 + 1e-9 {
                warn!("{label} probabilities sum to {total:.6} > 1; trailing mass is unreachable");
            }
        }
        Ok(())
    }

    fn junction_arrays(&self) -> [(&'static str, &Array1<f64>); 7] {
        [
            ("Vchewback", &self.v_chewback),
            ("D5chewback", &self.d5_chewback),
            ("D3chewback", &self.d3_chewback),
            ("Jchewback", &self.j_chewback),
            ("VDaddition", &self.vd_addition),
            ("DJaddition", &self.dj_addition),
            ("VJaddition", &self.vj_addition),
        ]
    }

    /// Probability defined for a single-segment tuple, with its declaration
    /// rank in the table.
    pub fn single_weight(&self, name: &str) -> Option<(usize, f64)> {
        self.tuple_weight(&[name])
    }

    pub fn pair_weight(&self, first: &str, second: &str) -> Option<(usize, f64)> {
        self.tuple_weight(&[first, second])
    }

    pub fn triple_weight(&self, first: &str, second: &str, third: &str) -> Option<(usize, f64)> {
        self.tuple_weight(&[first, second, third])
    }

    fn tuple_weight(&self, names: &[&str]) -> Option<(usize, f64)> {
        self.selection
            .iter()
            .enumerate()
            .find(|(_, t)| t.names.len() == names.len() && t.names.iter().eq(names.iter()))
            .map(|(rank, t)| (rank, t.probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Locus, Segment, SegmentCatalog, SegmentRole, Strand};
    use crate::sequence::Dna;
    use ndarray::array;

    fn one_segment_catalog() -> SegmentCatalog {
        SegmentCatalog::from_segments(vec![Segment {
            name: "TRBV1".to_string(),
            locus: Locus::Trb,
            role: SegmentRole::V,
            chromosome: "7".to_string(),
            strand: Strand::Forward,
            start: 0,
            end: 4,
            exons: vec![(0, 4)],
            allele: "01".to_string(),
            seq: Dna::from_string("ACGT").unwrap(),
        }])
        .unwrap()
    }

    fn minimal_model(selection: Vec<SelectionTuple>) -> RecombinationModel {
        RecombinationModel {
            selection,
            v_chewback: array![1.0],
            d5_chewback: array![1.0],
            d3_chewback: array![1.0],
            j_chewback: array![1.0],
            vd_addition: array![1.0],
            dj_addition: array![1.0],
            vj_addition: array![1.0],
        }
    }

    #[test]
    fn unknown_segment_in_tuple_is_a_data_error() {
        let model = minimal_model(vec![SelectionTuple {
            names: vec!["TRBV9".to_string()],
            probability: 0.5,
        }]);
        assert!(model.validate(&one_segment_catalog()).is_err());
    }

    #[test]
    fn tuple_lookup_reports_declaration_rank() {
        let model = minimal_model(vec![
            SelectionTuple {
                names: vec!["TRBV1".to_string(), "TRBJ1".to_string()],
                probability: 0.25,
            },
            SelectionTuple {
                names: vec!["TRBV1".to_string()],
                probability: 0.5,
            },
        ]);
        assert_eq!(model.single_weight("TRBV1"), Some((1, 0.5)));
        assert_eq!(model.pair_weight("TRBV1", "TRBJ1"), Some((0, 0.25)));
        assert_eq!(model.pair_weight("TRBJ1", "TRBV1"), None);
        assert_eq!(model.single_weight("TRBV9"), None);
    }

    #[test]
    fn out_of_range_probability_rejected() {
        let model = minimal_model(vec![SelectionTuple {
            names: vec!["TRBV1".to_string()],
            probability: 1.5,
        }]);
        assert!(model.validate(&one_segment_catalog()).is_err());
    }
}
