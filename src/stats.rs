//! Epoch metrics and the compressed stats history
//!
//! Grid-wide measurements walk the soup at a fixed arithmetic stride
//! instead of drawing from the physics PRNG, so the observation schedule
//! never shifts the simulation timeline. The stride is forced odd to stay
//! coprime with power-of-two tape sizes.
//!
//! The Brotli compression ratio of the sampled cells doubles as a cheap
//! complexity proxy: repetitive self-replicators compress far better than
//! random soup.

use serde::{Deserialize, Serialize};

use crate::census::Census;

/// Fraction of the soup (bytes or cells) each sampling pass visits.
pub const SAMPLE_RATE: f64 = 0.1;
/// Epochs between census passes.
pub const CENSUS_INTERVAL: usize = 50;

/// Entropy movement that forces a history entry.
const ENTROPY_DELTA: f64 = 0.1;
/// Zero-density movement that forces a history entry.
const ZERO_DENSITY_DELTA: f64 = 0.05;

/// Sampling stride: floor(1/SAMPLE_RATE), bumped to the next odd number
/// when even.
pub fn sample_stride() -> usize {
    let mut step = (1.0 / SAMPLE_RATE) as usize;
    if step % 2 == 0 {
        step += 1;
    }
    step
}

/// Point-in-time view of the soup, as exposed to hosts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub epoch: usize,
    /// Mean recognized opcodes executed per interaction this epoch.
    pub avg_complexity: f64,
    /// Mean copies per interaction this epoch.
    pub replication_rate: f64,
    /// Mean neighbor-half copies per interaction this epoch.
    pub effective_replication: f64,
    /// Shannon entropy of sampled byte values, in bits.
    pub entropy: f64,
    /// Fraction of sampled bytes equal to the terminator.
    pub zero_density: f64,
    /// Brotli ratio of the sampled cells; refreshed on census epochs.
    pub compression_ratio: f64,
    /// Latest species inventory; refreshed on census epochs.
    pub census: Option<Census>,
    pub last_census_epoch: usize,
}

/// Strided single-pass grid measurement: (entropy, zero_density).
pub fn grid_metrics(soup: &[u8]) -> (f64, f64) {
    let step = sample_stride();
    let mut histogram = [0u64; 256];
    let mut samples = 0u64;
    let mut i = 0;
    while i < soup.len() {
        histogram[soup[i] as usize] += 1;
        samples += 1;
        i += step;
    }
    if samples == 0 {
        return (0.0, 0.0);
    }
    let total = samples as f64;
    let mut entropy = 0.0;
    for &count in &histogram {
        if count > 0 {
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }
    }
    (entropy, histogram[0] as f64 / total)
}

/// Shannon entropy of one genome over its 256-bin byte histogram, in bits.
pub fn genome_entropy(genome: &[u8]) -> f64 {
    if genome.is_empty() {
        return 0.0;
    }
    let mut histogram = [0u32; 256];
    for &b in genome {
        histogram[b as usize] += 1;
    }
    let total = genome.len() as f64;
    let mut entropy = 0.0;
    for &count in &histogram {
        if count > 0 {
            let p = f64::from(count) / total;
            entropy -= p * p.log2();
        }
    }
    entropy
}

/// Bytes of every stride-sampled cell, concatenated. Feeds
/// `compression_ratio` with the same population the census sees.
pub fn sampled_cells(soup: &[u8], tape_size: usize, cell_count: usize) -> Vec<u8> {
    let step = sample_stride();
    let mut out = Vec::with_capacity(tape_size * (cell_count / step + 1));
    let mut i = 0;
    while i < cell_count {
        let start = i * tape_size;
        out.extend_from_slice(&soup[start..start + tape_size]);
        i += step;
    }
    out
}

/// Brotli compression ratio (raw / compressed), quality 4.
pub fn compression_ratio(data: &[u8]) -> f64 {
    use brotli::enc::BrotliEncoderParams;

    if data.is_empty() {
        return 1.0;
    }
    let mut compressed = Vec::new();
    let mut params = BrotliEncoderParams::default();
    params.quality = 4;
    match brotli::BrotliCompress(&mut std::io::Cursor::new(data), &mut compressed, &params) {
        Ok(_) => data.len() as f64 / compressed.len() as f64,
        Err(_) => 1.0,
    }
}

/// History compression policy: census epochs always record; otherwise only
/// meaningful movement in entropy or zero density does.
pub fn should_record(last: &StatsSnapshot, current: &StatsSnapshot, census_epoch: bool) -> bool {
    census_epoch
        || (current.entropy - last.entropy).abs() > ENTROPY_DELTA
        || (current.zero_density - last.zero_density).abs() > ZERO_DENSITY_DELTA
}
