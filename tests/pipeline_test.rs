//! End-to-end runs against a real working directory: segment table,
//! recombination YAML and chromosome references on disk.
mod common;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs;
use std::path::PathBuf;
use tcrsim::distributions::BoundedGaussian;
use tcrsim::{
    output, parser, ChainBuilder, Dna, OutputPaths, PopulationDistribution, ReadConfig,
    ReadSimulator, ReadSpace, ReadType, Repertoire, RepertoireConfig, Uniqueness,
};

fn write_working_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tcrsim-workdir-{tag}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let table = "\
# name\tlocus\trole\tchromosome\tstrand\tstart\tend\texons\tallele
TRBV20-1\tTRB\tV\t7\t+\t1000\t1033\t0-6;12-33\t01
TRBD1\tTRB\tD\t7\t+\t2000\t2012\t0-12\t01
TRBJ1-1\tTRB\tJ\t7\t+\t3000\t3018\t0-18\t01
TRBC1\tTRB\tC\t7\t+\t4000\t4033\t0-12;18-33\t01
TRAV1\tTRA\tV\t14q11.2\t+\t1000\t1033\t0-6;12-33\t01
TRAJ1\tTRA\tJ\t14q11.2\t+\t3000\t3018\t0-18\t01
TRAC\tTRA\tC\t14q11.2\t+\t4000\t4030\t0-12;18-30\t01
";
    fs::write(dir.join(parser::SEGMENT_TABLE), table).unwrap();

    let yaml = "\
segments:
  - [TRBV20-1, 1.0]
recombination:
  Vchewback: [1.0]
  D5chewback: [1.0]
  D3chewback: [1.0]
  Jchewback: [1.0]
  VDaddition: [1.0]
  DJaddition: [1.0]
  VJaddition: [1.0]
";
    fs::write(dir.join(parser::RECOMBINATION_TABLE), yaml).unwrap();

    fs::write(dir.join("chr7.fa"), chromosome_fasta("chr7", &[
        (1000, common::TRBV_SEQ),
        (2000, common::TRBD_SEQ),
        (3000, common::TRBJ_SEQ),
        (4000, common::TRBC_SEQ),
    ])).unwrap();
    fs::write(dir.join("chr14.fa"), chromosome_fasta("chr14", &[
        (1000, common::TRAV_SEQ),
        (3000, common::TRAJ_SEQ),
        (4000, common::TRAC_SEQ),
    ])).unwrap();
    dir
}

/// A synthetic chromosome: filler bases with segment sequences spliced in at
/// their genomic coordinates.
fn chromosome_fasta(name: &str, placements: &[(usize, &str)]) -> String {
    let mut sequence = vec![b'A'; 4100];
    for &(offset, seq) in placements {
        sequence[offset..offset + seq.len()].copy_from_slice(seq.as_bytes());
    }
    format!(">{name}\n{}\n", String::from_utf8(sequence).unwrap())
}

#[test]
fn catalog_materializes_from_reference_files() {
    let dir = write_working_dir("catalog");
    let catalog = parser::load_catalog(&dir).unwrap();
    assert_eq!(catalog.len(), 7);
    assert_eq!(
        catalog.get("TRBV20-1").unwrap().seq.get_string(),
        common::TRBV_SEQ
    );
    assert_eq!(catalog.get("TRAC").unwrap().seq.get_string(), common::TRAC_SEQ);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn single_clonotype_run_reports_the_pinned_v_segment() {
    let dir = write_working_dir("tiny");
    let catalog = parser::load_catalog(&dir).unwrap();
    let model = parser::load_model(&dir).unwrap();
    model.validate(&catalog).unwrap();

    let mut builder = ChainBuilder::new(&catalog, &model).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(30);
    let repertoire = Repertoire::generate(
        &mut builder,
        &RepertoireConfig {
            size: 1,
            alpha_beta_ratio: 1.0,
            uniqueness: Uniqueness::None,
            require_productive: true,
            strict_retries: false,
        },
        &mut rng,
    )
    .unwrap();
    let population = PopulationDistribution::LogisticCdf {
        scale: 1.0,
        cutoff: 3.0,
    }
    .distribute(1, repertoire.len(), &mut rng)
    .unwrap();
    assert_eq!(population, vec![1]);

    // weight 1.0 on TRBV20-1 pins the β V segment
    assert_eq!(repertoire.clonotypes[0].chains[1].v_name, "TRBV20-1");

    let paths = OutputPaths::new(&dir, "run");
    output::write_statistics(&paths, &repertoire, &population).unwrap();
    let statistics = fs::read_to_string(paths.statistics()).unwrap();
    let lines: Vec<&str> = statistics.trim_end().lines().collect();
    assert_eq!(lines.len(), 2, "header plus exactly one data row");
    assert!(lines[1].contains("TRBV20-1"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn perfect_fastq_records_use_the_j_quality() {
    let dir = write_working_dir("fastq");
    let catalog = parser::load_catalog(&dir).unwrap();
    let model = parser::load_model(&dir).unwrap();

    let mut builder = ChainBuilder::new(&catalog, &model).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(31);
    let repertoire = Repertoire::generate(
        &mut builder,
        &RepertoireConfig {
            size: 1,
            alpha_beta_ratio: 1.0,
            uniqueness: Uniqueness::None,
            require_productive: true,
            strict_retries: false,
        },
        &mut rng,
    )
    .unwrap();

    let config = ReadConfig {
        count: 10,
        space: ReadSpace::Dna,
        read_type: ReadType::Single,
        read_length: BoundedGaussian::new(48.0, 0.0, 4.0).unwrap(),
        insert_length: BoundedGaussian::new(100.0, 8.0, 4.0).unwrap(),
        amplicon_probe: Dna::new(),
    };
    let reads = ReadSimulator::new(&repertoire, &[5], &config)
        .unwrap()
        .simulate(&mut rng)
        .unwrap();

    let paths = OutputPaths::new(&dir, "run");
    output::write_reads(&paths, ReadType::Single, &reads).unwrap();

    let fastq = fs::read_to_string(dir.join("run.fastq")).unwrap();
    let lines: Vec<&str> = fastq.lines().collect();
    assert_eq!(lines.len(), 40, "four lines per record");
    for record in lines.chunks(4) {
        assert!(record[0].starts_with("@tcrsim:readnum="));
        assert_eq!(record[1].len(), 48);
        assert_eq!(record[2], "+");
        assert_eq!(record[3], "J".repeat(48));
    }

    fs::remove_dir_all(&dir).ok();
}
