//! Loaders for the working-directory inputs: the segment table, the
//! recombination tables, reference chromosomes and quality corpora.
use crate::catalog::{Locus, Segment, SegmentCatalog, SegmentRole, Strand};
use crate::errors::SimulationError;
use crate::model::{RecombinationModel, SelectionTuple};
use crate::quality::validate_phred;
use crate::sequence::Dna;
use anyhow::{Context, Result};
use log::{info, warn};
use ndarray::Array1;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const SEGMENT_TABLE: &str = "tcell_receptor.tsv";
pub const RECOMBINATION_TABLE: &str = "tcell_recombination.yaml";

/// Load and materialize the full catalog from a working directory:
/// `tcell_receptor.tsv` plus one `chr<id>.fa` per referenced chromosome.
pub fn load_catalog(dir: &Path) -> Result<SegmentCatalog> {
    let table = dir.join(SEGMENT_TABLE);
    let raw = std::fs::read_to_string(&table)
        .with_context(|| format!("could not read segment table {}", table.display()))?;
    let mut catalog = parse_segment_table(&raw)?;

    for chromosome in catalog.chromosomes() {
        let file = dir.join(format!("chr{}.fa", chromosome_file_id(&chromosome)?));
        let reference = read_chromosome(&file)?;
        catalog.materialize(&chromosome, &reference)?;
    }
    info!("catalog loaded: {} segments", catalog.len());
    Ok(catalog)
}

pub fn load_model(dir: &Path) -> Result<RecombinationModel> {
    let table = dir.join(RECOMBINATION_TABLE);
    let raw = std::fs::read_to_string(&table)
        .with_context(|| format!("could not read recombination table {}", table.display()))?;
    parse_recombination_yaml(&raw)
}

/// Parse the tab-separated segment table. Blank lines and `#` comments are
/// skipped; malformed rows are skipped with a warning, mirroring how sloppy
/// these hand-curated tables tend to be. Duplicate names are fatal.
pub fn parse_segment_table(raw: &str) -> Result<SegmentCatalog> {
    let name_pattern = Regex::new(r"^TR[ABGD](?:[VDJ]\d+(?:-\d+)?|C\d*)$").unwrap();
    let mut segments = Vec::new();
    for (line_number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 9 {
            warn!(
                "line {}: expected 9 tab-separated fields, found {}; skipping",
                line_number + 1,
                fields.len()
            );
            continue;
        }
        match parse_segment_row(&fields, &name_pattern) {
            Ok(segment) => segments.push(segment),
            Err(e) => warn!("line {}: {e}; skipping", line_number + 1),
        }
    }
    SegmentCatalog::from_segments(segments)
}

fn parse_segment_row(fields: &[&str], name_pattern: &Regex) -> Result<Segment> {
    let name = fields[0].to_string();
    if !name_pattern.is_match(&name) {
        return Err(SimulationError::data(format!(
            "invalid segment name {name:?}"
        )));
    }
    let locus = Locus::from_code(fields[1])?;
    let role = SegmentRole::from_code(fields[2])?;
    let strand = Strand::from_code(fields[4])?;
    let start: u64 = fields[5]
        .parse()
        .map_err(|_| SimulationError::Data(format!("invalid start {:?}", fields[5])))?;
    let end: u64 = fields[6]
        .parse()
        .map_err(|_| SimulationError::Data(format!("invalid end {:?}", fields[6])))?;
    let exons = parse_exons(fields[7])?;
    Ok(Segment {
        name,
        locus,
        role,
        chromosome: fields[3].to_string(),
        strand,
        start,
        end,
        exons,
        allele: fields[8].to_string(),
        seq: Dna::new(),
    })
}

/// Exon intervals as `start-end` pairs joined with `;`, half-open and
/// relative to the segment span.
fn parse_exons(field: &str) -> Result<Vec<(u64, u64)>> {
    field
        .split(';')
        .map(|interval| {
            let (s, e) = interval.split_once('-').ok_or_else(|| {
                SimulationError::Data(format!("invalid exon interval {interval:?}"))
            })?;
            let s = s
                .parse()
                .map_err(|_| SimulationError::Data(format!("invalid exon start {s:?}")))?;
            let e = e
                .parse()
                .map_err(|_| SimulationError::Data(format!("invalid exon end {e:?}")))?;
            Ok((s, e))
        })
        .collect()
}

#[derive(Deserialize)]
struct RawRecombination {
    segments: Vec<Vec<serde_yaml::Value>>,
    recombination: HashMap<String, Vec<f64>>,
}

/// Parse the YAML recombination tables: selection tuples under `segments`
/// (one to three names followed by a probability) and the seven junction
/// arrays under `recombination`.
pub fn parse_recombination_yaml(raw: &str) -> Result<RecombinationModel> {
    let mut parsed: RawRecombination =
        serde_yaml::from_str(raw).map_err(|e| SimulationError::data(format!("bad YAML: {e}")))?;

    let mut selection = Vec::with_capacity(parsed.segments.len());
    for entry in &parsed.segments {
        if entry.len() < 2 || entry.len() > 4 {
            return Err(SimulationError::data(format!(
                "selection entry must hold 1-3 segment names and a probability, found {entry:?}"
            )));
        }
        let (names, probability) = entry.split_at(entry.len() - 1);
        let names: Vec<String> = names
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SimulationError::data(format!("segment name {v:?} is not a string")))
            })
            .collect::<Result<_>>()?;
        let probability = probability[0].as_f64().ok_or_else(|| {
            SimulationError::Data(format!("probability {:?} is not a number", probability[0]))
        })?;
        selection.push(SelectionTuple {
            names,
            probability,
        });
    }

    let mut take = |key: &str| -> Result<Array1<f64>> {
        parsed
            .recombination
            .remove(key)
            .map(Array1::from_vec)
            .ok_or_else(|| SimulationError::Data(format!("missing {key} array")).into())
    };
    let model = RecombinationModel {
        selection,
        v_chewback: take("Vchewback")?,
        d5_chewback: take("D5chewback")?,
        d3_chewback: take("D3chewback")?,
        j_chewback: take("Jchewback")?,
        vd_addition: take("VDaddition")?,
        dj_addition: take("DJaddition")?,
        vj_addition: take("VJaddition")?,
    };
    for leftover in parsed.recombination.keys() {
        warn!("ignoring unknown recombination array {leftover:?}");
    }
    Ok(model)
}

/// Leading numeric part of a chromosome id ("14q11.2" -> "14"), which is how
/// reference files are named.
fn chromosome_file_id(chromosome: &str) -> Result<&str> {
    let end = chromosome
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(chromosome.len());
    if end == 0 {
        return Err(SimulationError::data(format!(
            "chromosome id {chromosome:?} has no leading number"
        )));
    }
    Ok(&chromosome[..end])
}

/// Whole plus-strand sequence of the first record in a FASTA file.
fn read_chromosome(path: &Path) -> Result<Dna> {
    let reader = bio::io::fasta::Reader::from_file(path)
        .map_err(|e| SimulationError::data(format!("cannot open {}: {e}", path.display())))?;
    let record = reader
        .records()
        .next()
        .ok_or_else(|| SimulationError::Data(format!("{} holds no sequence", path.display())))?
        .map_err(|e| SimulationError::data(format!("cannot parse {}: {e}", path.display())))?;
    Dna::from_string(&String::from_utf8_lossy(record.seq()).to_ascii_uppercase())
}

/// Quality strings from the fourth line of each FASTQ record. Records with
/// characters outside the Phred+33 range are skipped with a warning.
pub fn load_quality_corpus(path: &Path) -> Result<Vec<String>> {
    let reader = bio::io::fastq::Reader::from_file(path)
        .map_err(|e| SimulationError::data(format!("cannot open {}: {e}", path.display())))?;
    let mut qualities = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| SimulationError::data(format!("cannot parse {}: {e}", path.display())))?;
        let quality = String::from_utf8_lossy(record.qual()).to_string();
        match validate_phred(&quality) {
            Ok(()) => qualities.push(quality),
            Err(e) => warn!("{}: {e}; skipping record", path.display()),
        }
    }
    if qualities.is_empty() {
        return Err(SimulationError::data(format!(
            "{} holds no usable quality strings",
            path.display()
        )));
    }
    Ok(qualities)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
# name\tlocus\trole\tchromosome\tstrand\tstart\tend\texons\tallele
TRBV1\tTRB\tV\t7\t+\t100\t133\t0-6;12-33\t01
TRBD1\tTRB\tD\t7\t+\t200\t212\t0-12\t01
not-a-segment\tTRB\tV\t7\t+\t1\t2\t0-1\t01
";

    #[test]
    fn parses_valid_rows_and_skips_bad_ones() {
        let catalog = parse_segment_table(TABLE).unwrap();
        assert_eq!(catalog.len(), 2);
        let v = catalog.get("TRBV1").unwrap();
        assert_eq!(v.locus, Locus::Trb);
        assert_eq!(v.exons, vec![(0, 6), (12, 33)]);
        assert!(catalog.get("not-a-segment").is_none());
    }

    #[test]
    fn duplicate_segment_is_fatal() {
        let doubled = format!("{TABLE}TRBV1\tTRB\tV\t7\t+\t100\t133\t0-33\t01\n");
        assert!(parse_segment_table(&doubled).is_err());
    }

    const YAML: &str = "\
segments:
  - [TRBV1, 0.6]
  - [TRBV1, TRBD1, 0.3]
  - [TRBV1, TRBD1, TRBJ1, 0.1]
recombination:
  Vchewback: [0.5, 0.5]
  D5chewback: [1.0]
  D3chewback: [1.0]
  Jchewback: [1.0]
  VDaddition: [0.9, 0.1]
  DJaddition: [1.0]
  VJaddition: [1.0]
";

    #[test]
    fn parses_recombination_tables() {
        let model = parse_recombination_yaml(YAML).unwrap();
        assert_eq!(model.selection.len(), 3);
        assert_eq!(model.selection[0].names, vec!["TRBV1"]);
        assert_eq!(model.selection[2].names.len(), 3);
        assert!((model.selection[1].probability - 0.3).abs() < 1e-12);
        assert_eq!(model.v_chewback.len(), 2);
        assert_eq!(model.vd_addition[1], 0.1);
    }

    #[test]
    fn missing_array_is_a_data_error() {
        let truncated = YAML.replace("  VJaddition: [1.0]\n", "");
        assert!(parse_recombination_yaml(&truncated).is_err());
    }

    #[test]
    fn chromosome_file_ids() {
        assert_eq!(chromosome_file_id("14q11.2").unwrap(), "14");
        assert_eq!(chromosome_file_id("7").unwrap(), "7");
        assert!(chromosome_file_id("chrX").is_err());
    }
}
