//! Degradation of perfect reads into error-bearing FASTQ records.
use crate::distributions::random_other_nucleotide;
use crate::errors::SimulationError;
use crate::sequence::Dna;
use anyhow::Result;
use rand::Rng;

pub const PHRED_OFFSET: u8 = 33;
pub const PHRED_MAX: i32 = 41;

/// Which mate of a pair a quality string is being picked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MateSide {
    R1,
    R2,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogisticCurve {
    /// Baseline error rate.
    pub base: f64,
    /// Error-rate ceiling added on top of the baseline.
    pub max: f64,
    pub steepness: f64,
    /// Base position where half the ceiling is reached.
    pub midpoint: f64,
}

impl LogisticCurve {
    pub fn error_rate(&self, position: usize) -> f64 {
        self.base + self.max / (1.0 + (-self.steepness * (position as f64 - self.midpoint)).exp())
    }
}

/// Per-read-side corpus of Phred+33 strings harvested from real FASTQ files.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QualityCorpus {
    pub r1: Vec<String>,
    pub r2: Vec<String>,
}

impl QualityCorpus {
    fn strings_for(&self, side: MateSide) -> &[String] {
        match side {
            MateSide::R1 => &self.r1,
            MateSide::R2 => &self.r2,
        }
    }
}

/// The four ways of deriving per-base error rates. A tagged variant rather
/// than anything open-ended: each alternative carries exactly the parameters
/// it needs.
#[derive(Clone, Debug, PartialEq)]
pub enum DegradationMethod {
    Logistic(LogisticCurve),
    Phred(String),
    Fastq { corpus: QualityCorpus, random: bool },
}

pub struct QualityDegrader {
    method: DegradationMethod,
    variability: f64,
}

impl QualityDegrader {
    pub fn new(method: DegradationMethod, variability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&variability) {
            return Err(SimulationError::config(format!(
                "degrade variability {variability} outside [0, 1]"
            )));
        }
        match &method {
            DegradationMethod::Logistic(curve) => {
                if curve.base < 0.0 || curve.max < 0.0 || curve.base + curve.max > 1.0 {
                    return Err(SimulationError::config(format!(
                        "logistic error rates must stay within [0, 1] \
                         (baseline {}, ceiling {})",
                        curve.base, curve.max
                    )));
                }
            }
            DegradationMethod::Phred(quality) => validate_phred(quality)?,
            DegradationMethod::Fastq { corpus, .. } => {
                if corpus.r1.is_empty() {
                    return Err(SimulationError::config(
                        "quality corpus holds no usable strings",
                    ));
                }
                for quality in corpus.r1.iter().chain(corpus.r2.iter()) {
                    validate_phred(quality)?;
                }
            }
        }
        Ok(QualityDegrader {
            method,
            variability,
        })
    }

    /// The logistic error-rate table for a read of the given length, used by
    /// the display mode.
    pub fn error_profile(&self, length: usize) -> Result<Vec<f64>> {
        match &self.method {
            DegradationMethod::Logistic(curve) => {
                Ok((0..length).map(|i| curve.error_rate(i)).collect())
            }
            _ => Err(SimulationError::config(
                "degradation display is only defined for the logistic method",
            )),
        }
    }

    /// Mutate a perfect read and emit its Phred+33 quality string.
    /// `read_index` drives sequential corpus selection.
    pub fn degrade<R: Rng>(
        &self,
        read: &Dna,
        read_index: usize,
        side: MateSide,
        rng: &mut R,
    ) -> Result<(Dna, String)> {
        let phred: Option<&str> = match &self.method {
            DegradationMethod::Logistic(_) => None,
            DegradationMethod::Phred(q) => Some(q),
            DegradationMethod::Fastq { corpus, random } => {
                let strings = corpus.strings_for(side);
                if strings.is_empty() {
                    return Err(SimulationError::config(format!(
                        "no quality corpus loaded for {side:?}"
                    )));
                }
                let index = if *random {
                    rng.gen_range(0..strings.len())
                } else {
                    read_index % strings.len()
                };
                Some(strings[index].as_str())
            }
        };

        let mut bases = Vec::with_capacity(read.len());
        let mut quality = String::with_capacity(read.len());
        for (i, &base) in read.seq.iter().enumerate() {
            let mut error_rate = match (&self.method, phred) {
                (DegradationMethod::Logistic(curve), _) => curve.error_rate(i),
                (_, Some(q)) => {
                    let bytes = q.as_bytes();
                    let score = bytes[i.min(bytes.len() - 1)] - PHRED_OFFSET;
                    10f64.powf(-(score as f64) / 10.0)
                }
                _ => unreachable!(),
            };
            if self.variability > 0.0 {
                error_rate *= 1.0 + (rng.gen::<f64>() * 2.0 - 1.0) * self.variability;
            }
            error_rate = error_rate.clamp(0.0, 1.0);

            if rng.gen::<f64>() < error_rate {
                bases.push(random_other_nucleotide(base, rng));
            } else {
                bases.push(base);
            }
            quality.push(phred_char(error_rate));
        }
        Ok((Dna { seq: bases }, quality))
    }
}

/// Phred+33 character for an error rate, clamped to the Illumina 1.8+ range.
pub fn phred_char(error_rate: f64) -> char {
    let score = if error_rate <= 0.0 {
        PHRED_MAX
    } else {
        ((-10.0 * error_rate.log10()).round() as i32).clamp(0, PHRED_MAX)
    };
    (score as u8 + PHRED_OFFSET) as char
}

pub fn validate_phred(quality: &str) -> Result<()> {
    if quality.is_empty() {
        return Err(SimulationError::config("empty Phred quality string"));
    }
    for &byte in quality.as_bytes() {
        if !(PHRED_OFFSET..=PHRED_OFFSET + PHRED_MAX as u8).contains(&byte) {
            return Err(SimulationError::config(format!(
                "quality character {:?} outside the Phred+33 range [!, J]",
                byte as char
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn phred_encoding_clamps() {
        assert_eq!(phred_char(1.0), '!');
        assert_eq!(phred_char(0.1), '+');
        assert_eq!(phred_char(0.0), 'J');
        assert_eq!(phred_char(1e-10), 'J');
    }

    #[test]
    fn short_phred_string_repeats_its_last_character() {
        let degrader =
            QualityDegrader::new(DegradationMethod::Phred("J".to_string()), 0.0).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let read = Dna::from_string("ACGTACGTAC").unwrap();
        let (_, quality) = degrader.degrade(&read, 0, MateSide::R1, &mut rng).unwrap();
        assert_eq!(quality, "JJJJJJJJJJ");
    }

    #[test]
    fn logistic_profile_is_monotone() {
        let degrader = QualityDegrader::new(
            DegradationMethod::Logistic(LogisticCurve {
                base: 0.001,
                max: 0.2,
                steepness: 0.25,
                midpoint: 24.0,
            }),
            0.0,
        )
        .unwrap();
        let profile = degrader.error_profile(48).unwrap();
        assert_eq!(profile.len(), 48);
        for pair in profile.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!((profile[24] - (0.001 + 0.1)).abs() < 1e-6);
    }

    #[test]
    fn certain_error_always_mutates() {
        let degrader =
            QualityDegrader::new(DegradationMethod::Phred("!".to_string()), 0.0).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let read = Dna::from_string("AAAAAAAAAA").unwrap();
        // '!' encodes an error rate of 1: every base must change
        let (bases, quality) = degrader.degrade(&read, 0, MateSide::R1, &mut rng).unwrap();
        assert!(bases.seq.iter().all(|&b| b != b'A'));
        assert_eq!(quality, "!!!!!!!!!!");
    }

    #[test]
    fn sequential_corpus_selection_wraps() {
        let corpus = QualityCorpus {
            r1: vec!["JJJJ".to_string(), "!!!!".to_string()],
            r2: vec![],
        };
        let degrader = QualityDegrader::new(
            DegradationMethod::Fastq {
                corpus,
                random: false,
            },
            0.0,
        )
        .unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let read = Dna::from_string("ACGT").unwrap();
        let (_, q0) = degrader.degrade(&read, 0, MateSide::R1, &mut rng).unwrap();
        let (_, q2) = degrader.degrade(&read, 2, MateSide::R1, &mut rng).unwrap();
        let (_, q1) = degrader.degrade(&read, 1, MateSide::R1, &mut rng).unwrap();
        assert_eq!(q0, "JJJJ");
        assert_eq!(q2, "JJJJ");
        assert_eq!(q1, "!!!!");
    }

    #[test]
    fn fastq_method_requires_r2_corpus_for_mates() {
        let corpus = QualityCorpus {
            r1: vec!["JJJJ".to_string()],
            r2: vec![],
        };
        let degrader = QualityDegrader::new(
            DegradationMethod::Fastq {
                corpus,
                random: false,
            },
            0.0,
        )
        .unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let read = Dna::from_string("ACGT").unwrap();
        assert!(degrader.degrade(&read, 0, MateSide::R2, &mut rng).is_err());
    }
}
