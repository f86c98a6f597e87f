//! Linear-scan a dataset and write the ground-truth benchmark file.
use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use lshbox::prelude::*;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(about = "Linear scan a dataset and construct a benchmark")]
struct Args {
    /// Input data file
    data_file: PathBuf,
    /// Output benchmark file
    benchmark_file: PathBuf,
    /// Number of sampled queries
    #[arg(default_value_t = 200)]
    q: usize,
    /// Nearest neighbors kept per query
    #[arg(default_value_t = 50)]
    k: usize,
    /// Query sampling seed
    #[arg(long, default_value_t = 2)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let data: Matrix<f32> = Matrix::open(&args.data_file)?;
    let metric = Metric::new(data.dim(), MetricKind::L2);
    let mut bench = Benchmark::new();
    bench.init(args.q, args.k, data.size() as u32, args.seed);

    let pd = ProgressBar::new(args.q as u64);
    let answers: Vec<TopK> = (0..args.q)
        .into_par_iter()
        .map(|i| {
            let q = bench.query(i);
            let mut topk = TopK::new(args.k);
            for id in 0..data.size() as u32 {
                // the query is sampled from the dataset; skip itself
                if id != q {
                    topk.push(id, metric.dist(data.row(q), data.row(id)));
                }
            }
            topk.gen_topk();
            pd.inc(1);
            topk
        })
        .collect();
    pd.finish();
    for (i, topk) in answers.into_iter().enumerate() {
        *bench.answer_mut(i) = topk;
    }
    bench.save(&args.benchmark_file)?;
    println!(
        "mean query time: {:.6}s",
        start.elapsed().as_secs_f64() / args.q as f64
    );
    Ok(())
}
