//! Species census by strided sampling
//!
//! Walks the grid's cells at a fixed odd stride, fingerprints each tape,
//! and ranks the sampled species. Pure observation: no PRNG draws, and a
//! deterministic order (count descending, fingerprint order on ties) so
//! identical soups always census identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::{genome_entropy, sample_stride};

/// Ranked species kept per census.
pub const TOP_SPECIES: usize = 5;

/// One ranked species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// 1-based rank by sampled count.
    pub rank: usize,
    /// Canonical serialization: decimal byte values joined by commas.
    pub code: String,
    /// Estimated population across the whole grid.
    pub count: usize,
    /// Fraction of the sample this species occupies.
    pub dominance: f64,
    /// Shannon entropy of the genome's bytes, in bits.
    pub entropy: f64,
}

/// Species inventory from one sampling pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Census {
    /// Unique tape fingerprints in the sample.
    pub species_count: usize,
    pub top_species: Vec<Species>,
}

/// Canonical fingerprint of a tape. Injective over byte sequences of one
/// length: two tapes collide exactly when their bytes match.
pub fn fingerprint(tape: &[u8]) -> String {
    tape.iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Sample every stride-th cell and rank the species found.
pub fn take_census(soup: &[u8], tape_size: usize, cell_count: usize) -> Census {
    let step = sample_stride();
    let mut counts: BTreeMap<&[u8], usize> = BTreeMap::new();
    let mut sampled = 0usize;
    let mut i = 0;
    while i < cell_count {
        let start = i * tape_size;
        *counts.entry(&soup[start..start + tape_size]).or_insert(0) += 1;
        sampled += 1;
        i += step;
    }
    if sampled == 0 {
        return Census::default();
    }

    let species_count = counts.len();
    let mut ranked: Vec<(&[u8], usize)> = counts.into_iter().collect();
    // Stable sort keeps the BTreeMap's byte order on equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let top_species = ranked
        .into_iter()
        .take(TOP_SPECIES)
        .enumerate()
        .map(|(idx, (tape, count))| {
            let dominance = count as f64 / sampled as f64;
            Species {
                rank: idx + 1,
                code: fingerprint(tape),
                count: (dominance * cell_count as f64).round() as usize,
                dominance,
                entropy: genome_entropy(tape),
            }
        })
        .collect();

    Census {
        species_count,
        top_species,
    }
}
