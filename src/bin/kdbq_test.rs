//! Example of using the k-means double-bit quantization index.
use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use lshbox::prelude::*;
use statrs::statistics::Statistics;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(about = "Evaluate the k-means double-bit quantization index on a benchmark")]
struct Args {
    /// Input data file
    data_file: PathBuf,
    /// Index file; loaded when present, otherwise trained and written
    lsh_file: PathBuf,
    /// Benchmark file produced by create_benchmark
    benchmark_file: PathBuf,
    /// Family seed; 0 seeds from entropy
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("loading data ...");
    let mut timer = Instant::now();
    let data: Matrix<f32> = Matrix::open(&args.data_file)?;
    println!("load time: {:.3}s", timer.elapsed().as_secs_f64());

    println!("constructing index ...");
    timer = Instant::now();
    let mut lsh: KdbqLsh<f32> = KdbqLsh::default();
    if args.lsh_file.exists() {
        lsh.load(&args.lsh_file)?;
    } else {
        let param = KdbqParam {
            m: 521,
            l: 5,
            d: data.dim() as u32,
            n: 4,
            i: 50,
        };
        lsh.reset(param, args.seed);
        lsh.train(&data)?;
        lsh.save(&args.lsh_file)?;
    }
    println!("constructing time: {:.3}s", timer.elapsed().as_secs_f64());

    let mut bench = Benchmark::new();
    bench.load(&args.benchmark_file)?;
    let metric = Metric::new(data.dim(), MetricKind::L2);
    let mut scanner = Scanner::new(data.accessor(), metric, bench.k());

    println!("running queries ...");
    timer = Instant::now();
    let mut recalls = Vec::with_capacity(bench.q());
    let mut costs = Vec::with_capacity(bench.q());
    let pd = ProgressBar::new(bench.q() as u64);
    for i in 0..bench.q() {
        lsh.query(data.row(bench.query(i)), &mut scanner);
        recalls.push(scanner.topk().recall(bench.answer(i)) as f64);
        costs.push(scanner.cnt() as f64 / data.size() as f64);
        pd.inc(1);
    }
    pd.finish();
    println!(
        "mean query time: {:.6}s",
        timer.elapsed().as_secs_f64() / bench.q() as f64
    );
    println!("recall: {:.4} +/- {:.4}", (&recalls).mean(), (&recalls).std_dev());
    println!("cost:   {:.4} +/- {:.4}", (&costs).mean(), (&costs).std_dev());
    Ok(())
}
