//! Command-line entry point: parse the run configuration, drive the
//! generation phases in order and map failures to distinct exit codes.
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::PathBuf;
use std::process::ExitCode;
use tcrsim::distributions::BoundedGaussian;
use tcrsim::errors::exit_code_for;
use tcrsim::quality::{phred_char, DegradationMethod, LogisticCurve, QualityCorpus};
use tcrsim::{
    output, parser, ChainBuilder, Dna, OutputPaths, PopulationDistribution, QualityDegrader,
    ReadConfig, ReadSimulator, ReadSpace, ReadType, Repertoire, RepertoireConfig,
    SimulationError, Snapshot, Uniqueness,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DistributionKind {
    Equal,
    Stripe,
    Unimodal,
    Chisquare,
    Logisticcdf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SpaceKind {
    Dna,
    Rna,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReadKind {
    Single,
    Paired,
    Amplicon,
}

#[derive(Parser, Debug)]
#[command(name = "tcrsim", version, about = "Simulate T-cell receptor sequencing reads")]
struct Cli {
    /// Directory holding tcell_receptor.tsv, tcell_recombination.yaml and the
    /// chr*.fa references; outputs land here too
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,

    /// Basename of every produced artifact
    #[arg(long, short = 'o', default_value = "tcrsim")]
    output: String,

    /// Resume from a previously written population snapshot instead of
    /// generating a fresh repertoire
    #[arg(long)]
    load_population: Option<PathBuf>,

    /// Number of distinct clonotypes to generate
    #[arg(long, default_value_t = 10)]
    repertoire_size: usize,

    /// Probability that a clonotype is αβ rather than γδ
    #[arg(long, default_value_t = 0.9)]
    alpha_beta_ratio: f64,

    /// Reject clonotypes whose chain pair was already generated
    #[arg(long)]
    unique_tcr: bool,

    /// Reject clonotypes sharing any single chain (implies --unique-tcr)
    #[arg(long)]
    unique_chain: bool,

    /// Reject clonotypes sharing a CDR3 (implies --unique-chain)
    #[arg(long)]
    unique_cdr3: bool,

    /// Let unproductive rebuilds consume the uniqueness retry budget
    #[arg(long)]
    strict_retries: bool,

    /// Number of cells to spread over the repertoire
    #[arg(long, default_value_t = 100)]
    population_size: usize,

    #[arg(long, value_enum, default_value = "logisticcdf")]
    population_distribution: DistributionKind,

    /// Scale of the logisticcdf population distribution
    #[arg(long, default_value_t = 1.0)]
    logistic_scale: f64,

    /// Cutoff of the logisticcdf population distribution
    #[arg(long, default_value_t = 3.0)]
    logistic_cutoff: f64,

    /// Standard deviations spanned by the unimodal population distribution
    #[arg(long, default_value_t = 3.0)]
    gaussian_cutoff: f64,

    /// Degrees of freedom of the chisquare population distribution
    #[arg(long, default_value_t = 2.0)]
    chisquare_k: f64,

    /// Largest x evaluated by the chisquare population distribution
    #[arg(long, default_value_t = 8.0)]
    chisquare_cutoff: f64,

    /// Number of reads (or read pairs) to emit
    #[arg(long, default_value_t = 1000)]
    sequence_count: usize,

    /// Draw reads from the recombined DNA or the spliced RNA
    #[arg(long, value_enum, default_value = "dna")]
    space: SpaceKind,

    #[arg(long, value_enum, default_value = "single")]
    read_type: ReadKind,

    #[arg(long, default_value_t = 48.0)]
    read_length_mean: f64,

    /// Standard deviation of read lengths; zero pins the length to the mean
    #[arg(long, default_value_t = 4.0)]
    read_length_sd: f64,

    #[arg(long, default_value_t = 4.0)]
    read_length_sd_cutoff: f64,

    #[arg(long, default_value_t = 100.0)]
    insert_length_mean: f64,

    #[arg(long, default_value_t = 8.0)]
    insert_length_sd: f64,

    #[arg(long, default_value_t = 4.0)]
    insert_length_sd_cutoff: f64,

    /// 5'→3' probe anchoring amplicon reads; the default sits in the β
    /// constant region on the reverse strand
    #[arg(long, default_value = "GATCTCTGCTTCTGATGGCTCAAACAC")]
    amplicon_probe: String,

    /// Logistic degradation parameters as baseline:ceiling:steepness:midpoint
    #[arg(long)]
    degrade_logistic: Option<String>,

    /// Degrade every read with this fixed Phred+33 string
    #[arg(long)]
    degrade_phred: Option<String>,

    /// Degrade with quality strings taken sequentially from one FASTQ file
    /// (single-end) or two comma-separated files (paired/amplicon)
    #[arg(long)]
    degrade_fastq: Option<String>,

    /// Like --degrade-fastq but picking quality strings at random
    #[arg(long)]
    degrade_fastq_random: Option<String>,

    /// Relative jitter applied to every per-base error rate
    #[arg(long, default_value_t = 0.0)]
    degrade_variability: f64,

    /// Print the logistic error-rate table for one read and exit
    #[arg(long)]
    display_degradation: bool,

    /// Seed for the run; omitted means seeded from system entropy
    #[arg(long)]
    seed: Option<u64>,

    /// error, warn, info, debug or trace
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level.clone()),
    )
    .init();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tcrsim: {err:#}");
            ExitCode::from(exit_code_for(&err) as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let degrader = build_degrader(&cli)?;

    if cli.display_degradation {
        let degrader = degrader.ok_or_else(|| {
            SimulationError::Config(
                "--display-degradation needs --degrade-logistic parameters".to_string(),
            )
        })?;
        let profile = degrader.error_profile(cli.read_length_mean.round() as usize)?;
        for (position, error_rate) in profile.iter().enumerate() {
            println!(
                "Position {position:02}: error rate {error_rate:.4}, Phred+33 {}",
                phred_char(*error_rate)
            );
        }
        return Ok(());
    }

    let read_type = match cli.read_type {
        ReadKind::Single => ReadType::Single,
        ReadKind::Paired => ReadType::Paired,
        ReadKind::Amplicon => ReadType::Amplicon,
    };

    let catalog = parser::load_catalog(&cli.working_dir)?;
    let model = parser::load_model(&cli.working_dir)?;
    model.validate(&catalog)?;
    let mut builder = ChainBuilder::new(&catalog, &model)?;

    let (repertoire, population, mut rng) = match &cli.load_population {
        Some(path) => {
            info!("thawing repertoire from {}", path.display());
            let snapshot = Snapshot::load(path)?;
            snapshot.validate(&catalog)?;
            (snapshot.repertoire, snapshot.population, snapshot.rng)
        }
        None => {
            let mut rng = match cli.seed {
                Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
                None => Xoshiro256PlusPlus::from_entropy(),
            };
            let config = RepertoireConfig {
                size: cli.repertoire_size,
                alpha_beta_ratio: cli.alpha_beta_ratio,
                uniqueness: uniqueness_of(&cli),
                require_productive: true,
                strict_retries: cli.strict_retries,
            };
            let repertoire = Repertoire::generate(&mut builder, &config, &mut rng)?;
            info!("repertoire of {} clonotypes generated", repertoire.len());
            let population = population_distribution(&cli)?.distribute(
                cli.population_size,
                repertoire.len(),
                &mut rng,
            )?;
            (repertoire, population, rng)
        }
    };

    let paths = OutputPaths::new(&cli.working_dir, &cli.output);
    // freeze before any read is drawn, so a thawed run continues exactly here
    Snapshot {
        repertoire: repertoire.clone(),
        population: population.clone(),
        rng: rng.clone(),
    }
    .save(&paths.snapshot())?;
    output::write_statistics(&paths, &repertoire, &population)?;

    if cli.sequence_count > 0 {
        let read_config = ReadConfig {
            count: cli.sequence_count,
            space: match cli.space {
                SpaceKind::Dna => ReadSpace::Dna,
                SpaceKind::Rna => ReadSpace::Rna,
            },
            read_type,
            read_length: BoundedGaussian::new(
                cli.read_length_mean,
                cli.read_length_sd,
                cli.read_length_sd_cutoff,
            )?,
            insert_length: BoundedGaussian::new(
                cli.insert_length_mean,
                cli.insert_length_sd,
                cli.insert_length_sd_cutoff,
            )?,
            amplicon_probe: Dna::from_string(&cli.amplicon_probe)
                .map_err(|e| SimulationError::Config(format!("bad amplicon probe: {e}")))?,
        };
        let simulator = ReadSimulator::new(&repertoire, &population, &read_config)?;
        let reads = simulator.simulate(&mut rng)?;
        info!("{} reads generated", reads.len());
        output::write_reads(&paths, read_type, &reads)?;
        if let Some(degrader) = &degrader {
            output::write_degraded_reads(&paths, read_type, &reads, degrader, &mut rng)?;
        }
    }
    Ok(())
}

fn uniqueness_of(cli: &Cli) -> Uniqueness {
    if cli.unique_cdr3 {
        Uniqueness::Cdr3
    } else if cli.unique_chain {
        Uniqueness::Chain
    } else if cli.unique_tcr {
        Uniqueness::Tcr
    } else {
        Uniqueness::None
    }
}

fn population_distribution(cli: &Cli) -> Result<PopulationDistribution> {
    Ok(match cli.population_distribution {
        DistributionKind::Equal => PopulationDistribution::Equal,
        DistributionKind::Stripe => PopulationDistribution::Stripe,
        DistributionKind::Unimodal => PopulationDistribution::Unimodal {
            cutoff: cli.gaussian_cutoff,
        },
        DistributionKind::Chisquare => PopulationDistribution::ChiSquare {
            k: cli.chisquare_k,
            cutoff: cli.chisquare_cutoff,
        },
        DistributionKind::Logisticcdf => PopulationDistribution::LogisticCdf {
            scale: cli.logistic_scale,
            cutoff: cli.logistic_cutoff,
        },
    })
}

/// Build the degrader from whichever degradation flag was given. More than
/// one method, or corpus file counts that disagree with the read type, are
/// configuration errors.
fn build_degrader(cli: &Cli) -> Result<Option<QualityDegrader>> {
    let chosen = [
        cli.degrade_logistic.is_some(),
        cli.degrade_phred.is_some(),
        cli.degrade_fastq.is_some(),
        cli.degrade_fastq_random.is_some(),
    ]
    .iter()
    .filter(|&&given| given)
    .count();
    if chosen > 1 {
        return Err(SimulationError::config(
            "give at most one of --degrade-logistic, --degrade-phred, \
             --degrade-fastq and --degrade-fastq-random",
        ));
    }

    let method = if let Some(spec) = &cli.degrade_logistic {
        Some(DegradationMethod::Logistic(parse_logistic(spec)?))
    } else if let Some(quality) = &cli.degrade_phred {
        Some(DegradationMethod::Phred(quality.clone()))
    } else if let Some(files) = &cli.degrade_fastq {
        Some(DegradationMethod::Fastq {
            corpus: load_corpus(cli, files)?,
            random: false,
        })
    } else if let Some(files) = &cli.degrade_fastq_random {
        Some(DegradationMethod::Fastq {
            corpus: load_corpus(cli, files)?,
            random: true,
        })
    } else {
        None
    };
    method
        .map(|m| QualityDegrader::new(m, cli.degrade_variability))
        .transpose()
}

fn parse_logistic(spec: &str) -> Result<LogisticCurve> {
    let parts: Vec<f64> = spec
        .split(':')
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| SimulationError::config(format!("bad logistic parameter {p:?}")))
        })
        .collect::<Result<_>>()?;
    if parts.len() != 4 {
        return Err(SimulationError::config(format!(
            "--degrade-logistic takes baseline:ceiling:steepness:midpoint, found {spec:?}"
        )));
    }
    Ok(LogisticCurve {
        base: parts[0],
        max: parts[1],
        steepness: parts[2],
        midpoint: parts[3],
    })
}

fn load_corpus(cli: &Cli, files: &str) -> Result<QualityCorpus> {
    let paths: Vec<&str> = files.split(',').collect();
    let paired = cli.read_type != ReadKind::Single;
    match (paths.len(), paired) {
        (1, false) => Ok(QualityCorpus {
            r1: parser::load_quality_corpus(&cli.working_dir.join(paths[0]))?,
            r2: Vec::new(),
        }),
        (2, true) => Ok(QualityCorpus {
            r1: parser::load_quality_corpus(&cli.working_dir.join(paths[0]))?,
            r2: parser::load_quality_corpus(&cli.working_dir.join(paths[1]))?,
        }),
        (n, false) => Err(SimulationError::config(format!(
            "single-end degradation takes exactly one FASTQ file, found {n}"
        ))),
        (n, true) => Err(SimulationError::config(format!(
            "paired and amplicon degradation take exactly two FASTQ files, found {n}"
        ))),
    }
}
