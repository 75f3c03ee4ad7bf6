//! Foreground driver for the soup engine
//!
//! Thin loop: load a config, run one epoch's worth of interactions per
//! iteration, print status lines, optionally dump PNG frames and the
//! stats history. All simulation state lives in the library.

use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::process;
use std::time::Instant;

use bff_soup::{Simulation, SoupConfig};

struct DriverArgs {
    config_path: Option<String>,
    epochs: usize,
    seed: Option<u32>,
    status_interval: usize,
    frames_dir: Option<String>,
    frame_interval: usize,
    history_out: Option<String>,
}

fn usage() -> ! {
    eprintln!("Usage: bff-soup [config.yaml] [options]");
    eprintln!("  --epochs N            epochs to run (default 1000)");
    eprintln!("  --seed N              override the config seed");
    eprintln!("  --status-interval N   epochs between status lines (default 10)");
    eprintln!("  --frames DIR          dump PNG frames to DIR");
    eprintln!("  --frame-interval N    epochs between frames (default 50)");
    eprintln!("  --history-out FILE    write the stats history as YAML on exit");
    process::exit(1);
}

fn parse_args() -> DriverArgs {
    let mut args = DriverArgs {
        config_path: None,
        epochs: 1000,
        seed: None,
        status_interval: 10,
        frames_dir: None,
        frame_interval: 50,
        history_out: None,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--epochs" => {
                args.epochs = iter.next().and_then(|v| v.parse().ok()).unwrap_or_else(|| usage())
            }
            "--seed" => {
                args.seed = Some(iter.next().and_then(|v| v.parse().ok()).unwrap_or_else(|| usage()))
            }
            "--status-interval" => {
                args.status_interval =
                    iter.next().and_then(|v| v.parse().ok()).unwrap_or_else(|| usage())
            }
            "--frames" => args.frames_dir = Some(iter.next().unwrap_or_else(|| usage())),
            "--frame-interval" => {
                args.frame_interval =
                    iter.next().and_then(|v| v.parse().ok()).unwrap_or_else(|| usage())
            }
            "--history-out" => args.history_out = Some(iter.next().unwrap_or_else(|| usage())),
            "--help" | "-h" => usage(),
            other if !other.starts_with('-') && args.config_path.is_none() => {
                args.config_path = Some(other.to_string())
            }
            other => {
                eprintln!("unknown argument: {other}");
                usage();
            }
        }
    }
    args
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();

    let mut config: SoupConfig = match &args.config_path {
        Some(path) => serde_yaml::from_str(&fs::read_to_string(path)?)?,
        None => SoupConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    } else if args.config_path.is_none() {
        config.seed = rand::random();
    }

    println!(
        "Soup {}x{} | tape {} | seed {} | mutation {} | limit {} | {:?}/{:?}",
        config.grid_width,
        config.grid_height,
        config.tape_size,
        config.seed,
        config.mutation_rate,
        config.instruction_limit,
        config.topology,
        config.seeding,
    );

    let mut sim = Simulation::new(config)?;
    let per_epoch = sim.config().cell_count() as u32;

    if let Some(dir) = &args.frames_dir {
        fs::create_dir_all(dir)?;
    }

    let start = Instant::now();
    for epoch in 1..=args.epochs {
        sim.step(per_epoch);

        if epoch % args.status_interval == 0 {
            let s = sim.stats();
            println!(
                "Epoch {:6} | complexity {:8.2} | copies {:8.2} | viable {:7.2} | H {:6.4} bits | zero {:5.1}% | ratio {:5.2}",
                s.epoch,
                s.avg_complexity,
                s.replication_rate,
                s.effective_replication,
                s.entropy,
                s.zero_density * 100.0,
                s.compression_ratio,
            );
        }
        if let Some(dir) = &args.frames_dir {
            if epoch % args.frame_interval == 0 {
                save_frame(&sim, dir, epoch)?;
            }
        }
    }
    println!("{} epochs in {:.1}s", args.epochs, start.elapsed().as_secs_f64());

    let s = sim.stats();
    if let Some(census) = &s.census {
        println!(
            "Census at epoch {}: {} species",
            s.last_census_epoch, census.species_count
        );
        for species in &census.top_species {
            println!(
                "  #{} x{:<6} ({:5.1}%) H {:.3} | {}",
                species.rank,
                species.count,
                species.dominance * 100.0,
                species.entropy,
                code_glyphs(&species.code),
            );
        }
    }

    if let Some(path) = &args.history_out {
        fs::write(path, serde_yaml::to_string(sim.history())?)?;
        println!(
            "History ({} snapshots) written to {}",
            sim.history().len(),
            path
        );
    }
    Ok(())
}

/// Render a census code (comma-separated decimal bytes) as glyphs.
fn code_glyphs(code: &str) -> String {
    code.split(',')
        .map(|v| match v.parse::<u8>() {
            Ok(0) => '␀',
            Ok(b) if b.is_ascii_graphic() || b == b' ' => b as char,
            _ => ' ',
        })
        .collect()
}

/// Render the soup as one PNG frame, one tile per cell, palette colors.
fn save_frame(sim: &Simulation, dir: &str, epoch: usize) -> Result<(), Box<dyn Error>> {
    let config = sim.config();
    let t = config.tape_size;
    // Square-ish tile: T is a power of two, so split its bits in half.
    let tile_w = 1usize << (t.trailing_zeros() / 2);
    let tile_h = t / tile_w;
    let img_w = config.grid_width * tile_w;
    let img_h = config.grid_height * tile_h;
    let palette = sim.palette();
    let soup = sim.soup();

    let mut pixels = vec![0u8; img_w * img_h * 3];
    for cy in 0..config.grid_height {
        for cx in 0..config.grid_width {
            let cell = &soup[(cy * config.grid_width + cx) * t..][..t];
            for (i, &byte) in cell.iter().enumerate() {
                let px = cx * tile_w + i % tile_w;
                let py = cy * tile_h + i / tile_w;
                let src = byte as usize * 4;
                let dst = (py * img_w + px) * 3;
                pixels[dst..dst + 3].copy_from_slice(&palette[src..src + 3]);
            }
        }
    }

    let path = Path::new(dir).join(format!("{epoch:08}.png"));
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, img_w as u32, img_h as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);
    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&pixels)?;
    Ok(())
}
