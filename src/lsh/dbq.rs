//! Double-bit quantization.
//!
//! The PCA-plus-rotation pipeline of `itq`, but every projected dimension
//! is cut into three regions by two thresholds found with a 1-D sweep;
//! the outer regions each contribute one tag, the middle contributes
//! nothing. Projections are centered by their column mean before
//! thresholding, and the means are kept for query-time centering.
//!
//! See Kong & Li, "Double-Bit Quantization for Hashing" (AAAI '12).
use crate::data::Element;
use crate::error::Result;
use crate::lsh::pca::{itq_rotation, project, stage, top_eigenvectors};
use crate::lsh::{scan_tables, HashIndex};
use crate::matrix::Matrix;
use crate::table::HashTable;
use crate::topk::Scanner;
use crate::utils::create_rng;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::info;
use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct DbqParam {
    /// Hash table size.
    pub m: u32,
    /// Number of hash tables.
    pub l: u32,
    /// Dimension of the vectors.
    pub d: u32,
    /// Projected dimensions per table; each contributes two tag slots.
    pub n: u32,
    /// Rotation refinement iterations. Training-only, not persisted.
    pub i: u32,
}

#[derive(Debug, Clone)]
pub struct DbqLsh<T> {
    param: DbqParam,
    rng: SmallRng,
    /// `N x D` principal components per table.
    pcs: Vec<Array2<f32>>,
    /// `N x N` rotations per table, stored transposed.
    omegas: Vec<Array2<f32>>,
    /// Random tags per table, two per projected dimension.
    rnd_array: Vec<Vec<u32>>,
    /// Left threshold per (table, dimension).
    a: Vec<Vec<f32>>,
    /// Right threshold per (table, dimension).
    b: Vec<Vec<f32>>,
    /// Projection column means per (table, dimension).
    col_means: Vec<Vec<f32>>,
    tables: Vec<HashTable>,
    phantom: PhantomData<T>,
}

impl<T: Element> Default for DbqLsh<T> {
    fn default() -> Self {
        DbqLsh {
            param: DbqParam::default(),
            rng: create_rng(0),
            pcs: Vec::new(),
            omegas: Vec::new(),
            rnd_array: Vec::new(),
            a: Vec::new(),
            b: Vec::new(),
            col_means: Vec::new(),
            tables: Vec::new(),
            phantom: PhantomData,
        }
    }
}

/// Find the two cut points of one centered projection column.
///
/// Start from `S0 = {v <= 0}`, `S2 = {v > 0}`, `S1` empty, and greedily
/// move the smallest-magnitude boundary element into `S1` -- from `S0`
/// while `sum(S1) > 0`, else from `S2`. Track
/// `F = sum(S0)^2/|S0| + sum(S2)^2/|S2|` and report the boundary elements
/// of the shrunken sets at its maximum.
pub(crate) fn dbq_thresholds(col: &[f32]) -> (f32, f32) {
    let mut s0: Vec<f32> = col.iter().copied().filter(|&v| v <= 0.0).collect();
    let mut s2: Vec<f32> = col.iter().copied().filter(|&v| v > 0.0).collect();
    s0.sort_by(f32::total_cmp);
    s2.sort_by(f32::total_cmp);

    let mut sums0: f32 = s0.iter().sum();
    let mut sums2: f32 = s2.iter().sum();
    let mut sums1: f32 = 0.0;
    // remaining sets are s0[..i0] and s2[i2..]
    let mut i0 = s0.len();
    let mut i2 = 0;

    let mut a_thr = if s0.is_empty() { f32::NEG_INFINITY } else { s0[i0 - 1] };
    let mut b_thr = if s2.is_empty() { f32::INFINITY } else { s2[i2] };
    let mut f_max = {
        let mut f = 0.0;
        if !s0.is_empty() {
            f += sums0 * sums0 / s0.len() as f32;
        }
        if !s2.is_empty() {
            f += sums2 * sums2 / s2.len() as f32;
        }
        f
    };

    loop {
        let can0 = i0 > 0;
        let can2 = i2 < s2.len();
        if !can0 && !can2 {
            break;
        }
        if (sums1 > 0.0 && can0) || !can2 {
            i0 -= 1;
            sums1 += s0[i0];
            sums0 -= s0[i0];
        } else {
            sums1 += s2[i2];
            sums2 -= s2[i2];
            i2 += 1;
        }
        let (na, nb) = (i0, s2.len() - i2);
        let f = if na > 0 && nb > 0 {
            sums0 * sums0 / na as f32 + sums2 * sums2 / nb as f32
        } else if nb > 0 {
            sums2 * sums2 / nb as f32
        } else if na > 0 {
            sums0 * sums0 / na as f32
        } else {
            0.0
        };
        if f > f_max && na > 0 && nb > 0 {
            f_max = f;
            a_thr = s0[i0 - 1];
            b_thr = s2[i2];
        }
    }
    (a_thr, b_thr)
}

impl<T: Element> DbqLsh<T> {
    pub fn new(param: DbqParam, seed: u64) -> Self {
        let mut index = DbqLsh::default();
        index.reset(param, seed);
        index
    }

    pub fn reset(&mut self, param: DbqParam, seed: u64) {
        self.rng = create_rng(seed);
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.pcs.clear();
        self.omegas.clear();
        self.a.clear();
        self.b.clear();
        self.col_means.clear();
        let rng = &mut self.rng;
        self.rnd_array = (0..param.l)
            .map(|_| (0..2 * param.n).map(|_| rng.gen_range(0..param.m)).collect())
            .collect();
    }

    pub fn param(&self) -> &DbqParam {
        &self.param
    }

    pub fn hash_key(&self, k: usize, v: &[T]) -> u32 {
        let n = self.param.n as usize;
        let q: Array1<f32> = v.iter().map(|x| x.to_f32().unwrap()).collect();
        let p = self.pcs[k].dot(&q);
        let mut sum = 0u32;
        for i in 0..n {
            let product = self.omegas[k].row(i).dot(&p) - self.col_means[k][i];
            if product <= self.a[k][i] {
                sum = sum.wrapping_add(self.rnd_array[k][2 * i + 1]);
            }
            if product >= self.b[k][i] {
                sum = sum.wrapping_add(self.rnd_array[k][2 * i]);
            }
        }
        sum % self.param.m
    }
}

impl<T: Element> HashIndex<T> for DbqLsh<T> {
    /// Training also allocates every row to its buckets; there is no
    /// separate hashing pass.
    fn train(&mut self, data: &Matrix<T>) -> Result<()> {
        let n = self.param.n as usize;
        let x = stage(data);
        let rows = x.nrows();
        let cov = x.transpose() * x.as_ref();
        let pcs = top_eigenvectors(&cov, n)?;
        let mat_c = project(&x, &pcs);

        self.pcs.clear();
        self.omegas.clear();
        self.a.clear();
        self.b.clear();
        self.col_means.clear();
        for k in 0..self.param.l as usize {
            info!("computing rotation matrix for table {} of {}", k + 1, self.param.l);
            let r = itq_rotation(&mat_c, n, self.param.i, &mut self.rng)?;
            let omega = Array2::from_shape_fn((n, n), |(i, j)| r[(j, i)]);
            let rotated = mat_c.as_ref() * r.as_ref();

            let means: Vec<f32> = (0..n)
                .map(|q| (0..rows).map(|i| rotated[(i, q)]).sum::<f32>() / rows as f32)
                .collect();
            let mut a_row = Vec::with_capacity(n);
            let mut b_row = Vec::with_capacity(n);
            for q in 0..n {
                let col: Vec<f32> = (0..rows).map(|i| rotated[(i, q)] - means[q]).collect();
                let (a, b) = dbq_thresholds(&col);
                a_row.push(a);
                b_row.push(b);
            }

            let table = &mut self.tables[k];
            for row in 0..rows {
                let mut sum = 0u32;
                for q in 0..n {
                    let val = rotated[(row, q)] - means[q];
                    if val <= a_row[q] {
                        sum = sum.wrapping_add(self.rnd_array[k][2 * q + 1]);
                    }
                    if val >= b_row[q] {
                        sum = sum.wrapping_add(self.rnd_array[k][2 * q]);
                    }
                }
                table.insert(sum % self.param.m, row as u32);
            }

            self.pcs.push(pcs.clone());
            self.omegas.push(omega);
            self.a.push(a_row);
            self.b.push(b_row);
            self.col_means.push(means);
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
        for k in 0..self.param.l as usize {
            crate::io::write_u32_slice(&mut w, &self.rnd_array[k])?;
            self.tables[k].write_block(&mut w)?;
            for j in 0..n {
                for jj in 0..d {
                    w.write_f32::<LittleEndian>(self.pcs[k][(j, jj)])?;
                }
                for jj in 0..n {
                    w.write_f32::<LittleEndian>(self.omegas[k][(j, jj)])?;
                }
            }
        }
        for row in &self.a {
            crate::io::write_f32_slice(&mut w, row)?;
        }
        for row in &self.b {
            crate::io::write_f32_slice(&mut w, row)?;
        }
        for row in &self.col_means {
            crate::io::write_f32_slice(&mut w, row)?;
        }
        Ok(())
    }

    fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut r = BufReader::new(File::open(path)?);
        self.param.m = r.read_u32::<LittleEndian>()?;
        self.param.l = r.read_u32::<LittleEndian>()?;
        self.param.d = r.read_u32::<LittleEndian>()?;
        self.param.n = r.read_u32::<LittleEndian>()?;
        let (n, d) = (self.param.n as usize, self.param.d as usize);
        let l = self.param.l as usize;
        self.rnd_array.clear();
        self.tables.clear();
        self.pcs.clear();
        self.omegas.clear();
        for _ in 0..l {
            self.rnd_array.push(crate::io::read_u32_vec(&mut r, 2 * n)?);
            self.tables.push(HashTable::read_block(&mut r, self.param.m)?);
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
        self.a.clear();
        self.b.clear();
        self.col_means.clear();
        for _ in 0..l {
            self.a.push(crate::io::read_f32_vec(&mut r, n)?);
        }
        for _ in 0..l {
            self.b.push(crate::io::read_f32_vec(&mut r, n)?);
        }
        for _ in 0..l {
            self.col_means.push(crate::io::read_f32_vec(&mut r, n)?);
        }
        Ok(())
    }
}
