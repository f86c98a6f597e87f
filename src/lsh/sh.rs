//! Spectral hashing.
//!
//! Per table: PCA over a random sample, then sinusoidal eigenfunctions of
//! the bounding box of the projected sample. The `N` lowest-frequency
//! modes (skipping the constant-like smallest one) become the bits.
//!
//! See Weiss, Torralba & Fergus, "Spectral Hashing" (NIPS '08).
use crate::data::Element;
use crate::error::{Error, Result};
use crate::lsh::pca::top_eigenvectors;
use crate::lsh::{compute_all_keys, fill_tables, scan_tables, HashIndex};
use crate::matrix::Matrix;
use crate::table::HashTable;
use crate::topk::Scanner;
use crate::utils::{create_rng, sample_distinct};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use faer::Mat;
use itertools::Itertools;
use log::{debug, info};
use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;
use std::f32::consts::FRAC_PI_2;
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShParam {
    /// Hash table size.
    pub m: u32,
    /// Number of hash tables.
    pub l: u32,
    /// Dimension of the vectors.
    pub d: u32,
    /// Binary code length per table, also the number of principal
    /// components kept.
    pub n: u32,
    /// Training sample size per table.
    pub s: u32,
}

#[derive(Debug, Clone)]
pub struct ShLsh<T> {
    param: ShParam,
    rng: SmallRng,
    /// Per-table minima of the projected sample, one per component.
    mins: Vec<Vec<f64>>,
    /// `N x D` principal components per table.
    pcs: Vec<Array2<f32>>,
    /// `N x N` active eigenfunction frequencies per table.
    omegas: Vec<Array2<f32>>,
    rnd_array: Vec<Vec<u32>>,
    tables: Vec<HashTable>,
    phantom: PhantomData<T>,
}

impl<T: Element> Default for ShLsh<T> {
    fn default() -> Self {
        ShLsh {
            param: ShParam::default(),
            rng: create_rng(0),
            mins: Vec::new(),
            pcs: Vec::new(),
            omegas: Vec::new(),
            rnd_array: Vec::new(),
            tables: Vec::new(),
            phantom: PhantomData,
        }
    }
}

impl<T: Element> ShLsh<T> {
    pub fn new(param: ShParam, seed: u64) -> Self {
        let mut index = ShLsh::default();
        index.reset(param, seed);
        index
    }

    pub fn reset(&mut self, param: ShParam, seed: u64) {
        self.rng = create_rng(seed);
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.mins.clear();
        self.pcs.clear();
        self.omegas.clear();
        let rng = &mut self.rng;
        self.rnd_array = (0..param.l)
            .map(|_| (0..param.n).map(|_| rng.gen_range(0..param.m)).collect())
            .collect();
    }

    pub fn param(&self) -> &ShParam {
        &self.param
    }

    fn trained(&self) -> bool {
        self.pcs.len() == self.param.l as usize
    }

    /// Train one table: sample, PCA, then the mode table that ranks the
    /// sinusoidal eigenfunctions by frequency.
    fn train_table(&mut self, data: &Matrix<T>) -> Result<(Vec<f64>, Array2<f32>, Array2<f32>)> {
        let npca = self.param.n as usize;
        let s = self.param.s as usize;
        let d = data.dim();
        let mut seqs = sample_distinct(&mut self.rng, s, data.size() as u32);
        seqs.sort_unstable();

        let tmp = Mat::from_fn(s, d, |i, j| data.row(seqs[i])[j].to_f32());
        let mean: Vec<f32> = (0..d)
            .map(|j| (0..s).map(|i| tmp[(i, j)]).sum::<f32>() / s as f32)
            .collect();
        let centered = Mat::from_fn(s, d, |i, j| tmp[(i, j)] - mean[j]);
        let gram = centered.transpose() * centered.as_ref();
        let cov = Mat::from_fn(d, d, |i, j| gram[(i, j)] / (s - 1) as f32);
        let pcs = top_eigenvectors(&cov, npca)?;

        // Project the raw (uncentered) sample onto the components.
        let mat_c = Mat::from_fn(s, npca, |i, q| {
            (0..d).map(|j| tmp[(i, j)] * pcs[(q, j)]).sum::<f32>()
        });

        let mut mins = vec![0f64; npca];
        let mut omega0 = vec![0f64; npca];
        let mut ranges = vec![0f64; npca];
        let mut max_r = 0f64;
        for i in 0..npca {
            let lo = (0..s).map(|r| mat_c[(r, i)]).fold(f32::INFINITY, f32::min) as f64;
            let hi = (0..s).map(|r| mat_c[(r, i)]).fold(f32::NEG_INFINITY, f32::max) as f64;
            mins[i] = lo;
            ranges[i] = hi - lo;
            omega0[i] = PI / ranges[i];
            max_r = max_r.max(ranges[i]);
        }

        let max_mode: Vec<usize> = ranges
            .iter()
            .map(|r| ((npca + 1) as f64 * r / max_r).ceil() as usize)
            .collect();
        let n_modes = max_mode.iter().sum::<usize>() - npca + 1;

        // Mode table: all ones, then each dimension enumerates its higher
        // frequencies in its own column span.
        let mut modes = vec![vec![1.0f32; n_modes]; npca];
        let mut m = 1;
        for i in 0..npca {
            for j in 0..max_mode[i] - 1 {
                modes[i][m + j] = (j + 2) as f32;
            }
            m += max_mode[i] - 1;
        }
        let omegas_full: Vec<Vec<f32>> = (0..npca)
            .map(|i| modes[i].iter().map(|&x| (x as f64 * omega0[i]) as f32).collect())
            .collect();

        // Rank the candidate eigenfunctions by total squared frequency and
        // keep columns 1..=N, skipping the smallest.
        let scores: Vec<f32> = (0..n_modes)
            .map(|j| (0..npca).map(|i| omegas_full[i][j] * omegas_full[i][j]).sum())
            .collect();
        let order: Vec<usize> = (0..n_modes)
            .sorted_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)))
            .collect();
        if order.len() <= npca {
            return Err(Error::Failed(
                "not enough eigenfunction modes; is the sample degenerate?".to_string(),
            ));
        }
        let omegas = Array2::from_shape_fn((npca, npca), |(i, j)| omegas_full[i][order[j + 1]]);
        Ok((mins, pcs, omegas))
    }

    pub fn hash_key(&self, k: usize, v: &[T]) -> u32 {
        let n = self.param.n as usize;
        let q: Array1<f32> = v.iter().map(|x| x.to_f32().unwrap()).collect();
        let mut y = self.pcs[k].dot(&q);
        for i in 0..n {
            y[i] -= self.mins[k][i] as f32;
        }
        let mut sum = 0u32;
        for i in 0..n {
            let mut product = 1.0f32;
            for j in 0..n {
                product *= (y[j] * self.omegas[k][(i, j)] + FRAC_PI_2).sin();
            }
            if product > 0.0 {
                sum = sum.wrapping_add(self.rnd_array[k][i]);
            }
        }
        sum % self.param.m
    }
}

impl<T: Element> HashIndex<T> for ShLsh<T> {
    fn train(&mut self, data: &Matrix<T>) -> Result<()> {
        self.mins.clear();
        self.pcs.clear();
        self.omegas.clear();
        for k in 0..self.param.l {
            info!("training spectral table {} of {}", k + 1, self.param.l);
            let (mins, pcs, omegas) = self.train_table(data)?;
            self.mins.push(mins);
            self.pcs.push(pcs);
            self.omegas.push(omegas);
        }
        Ok(())
    }

    fn hash(&mut self, data: &Matrix<T>) -> Result<()> {
        if !self.trained() {
            return Err(Error::Failed("spectral index must be trained before hashing".to_string()));
        }
        debug!("hashing {} rows into {} tables", data.size(), self.param.l);
        let keys = compute_all_keys(data, self.param.l as usize, |k, v| self.hash_key(k, v));
        fill_tables(&mut self.tables, keys);
        Ok(())
    }

    fn insert(&mut self, id: u32, v: &[T]) -> Result<()> {
        if !self.trained() {
            return Err(Error::Failed("spectral index must be trained before hashing".to_string()));
        }
        for k in 0..self.param.l as usize {
            let key = self.hash_key(k, v);
            self.tables[k].insert(key, id);
        }
        Ok(())
    }

    fn query(&self, v: &[T], scanner: &mut Scanner<'_, T>) {
        scan_tables(&self.tables, v, scanner, |k, v| self.hash_key(k, v));
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let (n, d) = (self.param.n as usize, self.param.d as usize);
        let mut w = BufWriter::new(File::create(path)?);
        w.write_u32::<LittleEndian>(self.param.m)?;
        w.write_u32::<LittleEndian>(self.param.l)?;
        w.write_u32::<LittleEndian>(self.param.d)?;
        w.write_u32::<LittleEndian>(self.param.n)?;
        w.write_u32::<LittleEndian>(self.param.s)?;
        for k in 0..self.param.l as usize {
            crate::io::write_u32_slice(&mut w, &self.rnd_array[k])?;
            self.tables[k].write_block(&mut w)?;
            crate::io::write_f64_slice(&mut w, &self.mins[k])?;
            for j in 0..n {
                for jj in 0..d {
                    w.write_f32::<LittleEndian>(self.pcs[k][(j, jj)])?;
                }
                for jj in 0..n {
                    w.write_f32::<LittleEndian>(self.omegas[k][(j, jj)])?;
                }
            }
        }
        Ok(())
    }

    fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut r = BufReader::new(File::open(path)?);
        self.param.m = r.read_u32::<LittleEndian>()?;
        self.param.l = r.read_u32::<LittleEndian>()?;
        self.param.d = r.read_u32::<LittleEndian>()?;
        self.param.n = r.read_u32::<LittleEndian>()?;
        self.param.s = r.read_u32::<LittleEndian>()?;
        let (n, d) = (self.param.n as usize, self.param.d as usize);
        self.rnd_array.clear();
        self.tables.clear();
        self.mins.clear();
        self.pcs.clear();
        self.omegas.clear();
        for _ in 0..self.param.l {
            self.rnd_array.push(crate::io::read_u32_vec(&mut r, n)?);
            self.tables.push(HashTable::read_block(&mut r, self.param.m)?);
            self.mins.push(crate::io::read_f64_vec(&mut r, n)?);
            let mut pcs = Array2::zeros((n, d));
            let mut omegas = Array2::zeros((n, n));
            for j in 0..n {
                for (jj, x) in crate::io::read_f32_vec(&mut r, d)?.into_iter().enumerate() {
                    pcs[(j, jj)] = x;
                }
                for (jj, x) in crate::io::read_f32_vec(&mut r, n)?.into_iter().enumerate() {
                    omegas[(j, jj)] = x;
                }
            }
            self.pcs.push(pcs);
            self.omegas.push(omegas);
        }
        Ok(())
    }
}
