//! bff-soup - a primordial soup of BFF tapes on a toroidal grid
//!
//! The engine keeps W·H fixed-length byte tapes in one flat buffer,
//! stochastically pairs them, runs a two-headed Brainfuck-variant program
//! over each concatenated pair, and tracks the statistics that reveal
//! when self-replicators take over the soup: per-epoch replication rates,
//! sampled entropy, a periodic species census, and a compressed history
//! of snapshots.
//!
//! Runs are a pure function of the configuration: the same seed replays
//! bit for bit. Hosts drive the engine with `step(n)` and observe it
//! through `stats`, `history`, the raw soup buffer, and the fixed RGBA
//! palette.

pub mod census;
pub mod config;
pub mod palette;
pub mod rng;
pub mod simulation;
pub mod stats;
pub mod vm;

pub use census::{Census, Species};
pub use config::{ConfigError, SeedingMode, SoupConfig, Topology};
pub use simulation::Simulation;
pub use stats::StatsSnapshot;
