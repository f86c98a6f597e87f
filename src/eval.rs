//! Benchmark storage: sampled query ids plus their ground-truth K-NN.
//!
//! The ground truth itself is produced by a linear scan (see the
//! `create_benchmark` binary); this type owns the storage contract. The
//! text format is one header line `Q<TAB>K`, then one line per query:
//! the query id followed by K `(distance, id)` pairs. Query points are
//! sampled from the database, so a query's own id never appears among its
//! answers.
use crate::error::{Error, Result};
use crate::topk::TopK;
use crate::utils::{create_rng, sample_distinct};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Benchmark {
    k: usize,
    queries: Vec<u32>,
    answers: Vec<TopK>,
}

impl Benchmark {
    pub fn new() -> Self {
        Benchmark::default()
    }

    pub fn resize(&mut self, q: usize, k: usize) {
        self.k = k;
        self.queries.clear();
        self.queries.resize(q, 0);
        self.answers.clear();
        self.answers.resize(q, TopK::new(k));
    }

    /// Sample `q` pairwise-distinct query ids uniformly from `[0, max_id)`.
    pub fn init(&mut self, q: usize, k: usize, max_id: u32, seed: u64) {
        self.resize(q, k);
        let mut rng = create_rng(seed);
        self.queries = sample_distinct(&mut rng, q, max_id);
    }

    pub fn q(&self) -> usize {
        self.queries.len()
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Id of the `n`th query.
    pub fn query(&self, n: usize) -> u32 {
        self.queries[n]
    }

    /// Ground-truth nearest neighbors of the `n`th query.
    pub fn answer(&self, n: usize) -> &TopK {
        &self.answers[n]
    }

    pub fn answer_mut(&mut self, n: usize) -> &mut TopK {
        &mut self.answers[n]
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = String::new();
        let _ = writeln!(out, "{}\t{}", self.q(), self.k);
        for (i, &query) in self.queries.iter().enumerate() {
            let _ = write!(out, "{}\t", query);
            for n in self.answers[i].topk() {
                let _ = write!(out, "\t\t{}\t{}", n.dist, n.id);
            }
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Pairs are parsed in the order they were written: distance first,
    /// then id.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let text = fs::read_to_string(path)?;
        let mut tokens = text.split_whitespace();
        let mut next = |what: &str| {
            tokens
                .next()
                .ok_or_else(|| Error::InvalidFormat(format!("benchmark file ends before {}", what)))
        };
        let q: usize = parse(next("Q")?)?;
        let k: usize = parse(next("K")?)?;
        self.resize(q, k);
        for i in 0..q {
            self.queries[i] = parse(next("query id")?)?;
            for _ in 0..k {
                let dist: f32 = parse(next("distance")?)?;
                let id: u32 = parse(next("answer id")?)?;
                self.answers[i].push(id, dist);
            }
            self.answers[i].gen_topk();
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(token: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| Error::InvalidFormat(format!("bad benchmark token: {:?}", token)))
}
