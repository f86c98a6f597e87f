//! Create the unsigned synthetic dataset used by the rbs demo: a million
//! 10-dimensional vectors with coordinates uniform in {0..4}, the first
//! eight rows pinned to known values so queries have documented answers.
use anyhow::Result;
use clap::Parser;
use lshbox::prelude::*;
use rand::Rng;
use std::path::PathBuf;

const SIZE: usize = 1_000_000;
const DIM: usize = 10;
const COORD_BOUND: u32 = 5;

const PINNED: [[u32; DIM]; 8] = [
    [1, 3, 2, 0, 1, 4, 4, 1, 3, 4],
    [1, 2, 3, 0, 0, 4, 3, 1, 3, 3],
    [0, 3, 3, 0, 0, 4, 4, 1, 4, 4],
    [0, 2, 3, 0, 0, 4, 4, 0, 3, 4],
    [3, 0, 0, 4, 3, 0, 1, 2, 1, 0],
    [3, 0, 0, 3, 2, 0, 1, 3, 0, 0],
    [3, 0, 0, 3, 3, 1, 1, 2, 0, 0],
    [4, 0, 1, 4, 3, 0, 1, 2, 0, 0],
];

#[derive(Parser)]
#[command(about = "Create unsigned test data for the rbs index")]
struct Args {
    /// Output data file
    data_file: PathBuf,
    /// RNG seed; 0 seeds from entropy
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut rng = create_rng(args.seed);
    let mut data: Matrix<u32> = Matrix::new();
    data.reset(DIM, SIZE);
    for (i, row) in PINNED.iter().enumerate() {
        data.row_mut(i as u32).copy_from_slice(row);
    }
    for i in PINNED.len()..SIZE {
        for v in data.row_mut(i as u32) {
            *v = rng.gen_range(0..COORD_BOUND);
        }
    }
    data.save(&args.data_file)?;
    println!("wrote {} x {} vectors to {}", SIZE, DIM, args.data_file.display());
    Ok(())
}
