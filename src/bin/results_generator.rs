use clap::Parser;
use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

const NAMES: [&str; 3] = ["hashmap", "stack", "log-append"];
const RS: [&str; 3] = ["One", "Socket", "L1"];
const TM: [&str; 2] = ["Sequential", "Interleave"];
const BS: [u32; 2] = [1, 8];
const THREADS: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Writes a synthetic benchmark results CSV
#[derive(Debug, Parser)]
struct Args {
    /// Output CSV file
    #[arg(default_value = "data/results.csv")]
    path: PathBuf,

    /// Repeated trials per configuration
    #[arg(long, default_value_t = 3)]
    trials: u32,

    /// Nominal experiment duration in seconds
    #[arg(long, default_value_t = 10)]
    duration: u32,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    if let Some(parent) = args.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&args.path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "name,rs,tm,batch_size,threads,duration,exp_time_in_sec,iterations"
    )?;

    let mut rng = rand::rng();
    let mut rows = 0;
    for name in NAMES {
        for rs in RS {
            for tm in TM {
                for bs in BS {
                    for threads in THREADS {
                        for _ in 0..args.trials {
                            let exp_time =
                                args.duration as f64 + rng.random_range(0.0..0.05);
                            let per_thread = rng.random_range(800_000..1_200_000u64) * bs as u64;
                            let iterations = (per_thread as f64
                                * (threads as f64).sqrt()
                                * exp_time) as u64;
                            writeln!(
                                writer,
                                "{},{},{},{},{},{},{:.6},{}",
                                name, rs, tm, bs, threads, args.duration, exp_time, iterations
                            )?;
                            rows += 1;
                        }
                    }
                }
            }
        }
    }
    writer.flush()?;

    println!("Sample CSV generated: {} ({} rows)", args.path.display(), rows);
    Ok(())
}
