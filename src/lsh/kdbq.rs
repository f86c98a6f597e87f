//! K-means double-bit quantization.
//!
//! Like `dbq`, but the three regions of each projected dimension come
//! from a 1-D 3-means clustering seeded at (min, mean, max) and run until
//! the total squared distortion stops changing. Query-time bits pick the
//! nearest centroid: the low cluster adds one tag, the high cluster the
//! other, the middle none.
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
pub struct KdbqParam {
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
pub struct KdbqLsh<T> {
    param: KdbqParam,
    rng: SmallRng,
    /// `N x D` principal components per table.
    pcs: Vec<Array2<f32>>,
    /// `N x N` rotations per table, stored transposed.
    omegas: Vec<Array2<f32>>,
    /// Random tags per table, two per projected dimension.
    rnd_array: Vec<Vec<u32>>,
    /// Cluster centroids per (table, dimension).
    u0: Vec<Vec<f32>>,
    u1: Vec<Vec<f32>>,
    u2: Vec<Vec<f32>>,
    tables: Vec<HashTable>,
    phantom: PhantomData<T>,
}

impl<T: Element> Default for KdbqLsh<T> {
    fn default() -> Self {
        KdbqLsh {
            param: KdbqParam::default(),
            rng: create_rng(0),
            pcs: Vec::new(),
            omegas: Vec::new(),
            rnd_array: Vec::new(),
            u0: Vec::new(),
            u1: Vec::new(),
            u2: Vec::new(),
            tables: Vec::new(),
            phantom: PhantomData,
        }
    }
}

/// Nearest of the three centroids, lowest label on ties.
fn nearest_centroid(x: f32, u: &[f32; 3]) -> usize {
    let mut label = 0;
    let mut best = (x - u[0]).abs();
    for t in 1..3 {
        let d = (x - u[t]).abs();
        if d < best {
            best = d;
            label = t;
        }
    }
    label
}

fn assign(col: &[f32], u: &[f32; 3]) -> (Vec<u8>, f32) {
    let mut labels = Vec::with_capacity(col.len());
    let mut distortion = 0.0f32;
    for &x in col {
        let label = nearest_centroid(x, u);
        labels.push(label as u8);
        let d = (x - u[label]).abs();
        distortion += d * d;
    }
    (labels, distortion)
}

/// 1-D 3-means over one projected column, seeded at (min, mean, max).
/// Runs until the total squared distortion repeats. Returns the centroids
/// and the final labels.
pub(crate) fn kmeans3(col: &[f32]) -> ([f32; 3], Vec<u8>) {
    let min = col.iter().copied().fold(f32::INFINITY, f32::min);
    let max = col.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = col.iter().sum::<f32>() / col.len() as f32;
    let mut u = [min, mean, max];
    let (mut labels, mut var) = assign(col, &u);
    loop {
        let mut sum = [0.0f32; 3];
        let mut count = [0usize; 3];
        for (&x, &label) in col.iter().zip(&labels) {
            sum[label as usize] += x;
            count[label as usize] += 1;
        }
        for t in 0..3 {
            // an emptied cluster keeps its centroid
            if count[t] > 0 {
                u[t] = sum[t] / count[t] as f32;
            }
        }
        let (new_labels, new_var) = assign(col, &u);
        labels = new_labels;
        if new_var == var {
            break;
        }
        var = new_var;
    }
    (u, labels)
}

impl<T: Element> KdbqLsh<T> {
    pub fn new(param: KdbqParam, seed: u64) -> Self {
        let mut index = KdbqLsh::default();
        index.reset(param, seed);
        index
    }

    pub fn reset(&mut self, param: KdbqParam, seed: u64) {
        self.rng = create_rng(seed);
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.pcs.clear();
        self.omegas.clear();
        self.u0.clear();
        self.u1.clear();
        self.u2.clear();
        let rng = &mut self.rng;
        self.rnd_array = (0..param.l)
            .map(|_| (0..2 * param.n).map(|_| rng.gen_range(0..param.m)).collect())
            .collect();
    }

    pub fn param(&self) -> &KdbqParam {
        &self.param
    }

    pub fn hash_key(&self, k: usize, v: &[T]) -> u32 {
        let n = self.param.n as usize;
        let q: Array1<f32> = v.iter().map(|x| x.to_f32().unwrap()).collect();
        let p = self.pcs[k].dot(&q);
        let mut sum = 0u32;
        for i in 0..n {
            let product = self.omegas[k].row(i).dot(&p);
            let u = [self.u0[k][i], self.u1[k][i], self.u2[k][i]];
            match nearest_centroid(product, &u) {
                0 => sum = sum.wrapping_add(self.rnd_array[k][2 * i + 1]),
                2 => sum = sum.wrapping_add(self.rnd_array[k][2 * i]),
                _ => {}
            }
        }
        sum % self.param.m
    }
}

impl<T: Element> HashIndex<T> for KdbqLsh<T> {
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
        self.u0.clear();
        self.u1.clear();
        self.u2.clear();
        for k in 0..self.param.l as usize {
            info!("computing rotation matrix for table {} of {}", k + 1, self.param.l);
            let r = itq_rotation(&mat_c, n, self.param.i, &mut self.rng)?;
            let omega = Array2::from_shape_fn((n, n), |(i, j)| r[(j, i)]);
            let rotated = mat_c.as_ref() * r.as_ref();

            let mut u0_row = Vec::with_capacity(n);
            let mut u1_row = Vec::with_capacity(n);
            let mut u2_row = Vec::with_capacity(n);
            let mut labels = Vec::with_capacity(n);
            for q in 0..n {
                let col: Vec<f32> = (0..rows).map(|i| rotated[(i, q)]).collect();
                let (u, l) = kmeans3(&col);
                u0_row.push(u[0]);
                u1_row.push(u[1]);
                u2_row.push(u[2]);
                labels.push(l);
            }

            let table = &mut self.tables[k];
            for row in 0..rows {
                let mut sum = 0u32;
                for q in 0..n {
                    match labels[q][row] {
                        0 => sum = sum.wrapping_add(self.rnd_array[k][2 * q + 1]),
                        2 => sum = sum.wrapping_add(self.rnd_array[k][2 * q]),
                        _ => {}
                    }
                }
                table.insert(sum % self.param.m, row as u32);
            }

            self.pcs.push(pcs.clone());
            self.omegas.push(omega);
            self.u0.push(u0_row);
            self.u1.push(u1_row);
            self.u2.push(u2_row);
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
        for row in &self.u0 {
            crate::io::write_f32_slice(&mut w, row)?;
        }
        for row in &self.u1 {
            crate::io::write_f32_slice(&mut w, row)?;
        }
        for row in &self.u2 {
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
        self.u0.clear();
        self.u1.clear();
        self.u2.clear();
        for _ in 0..l {
            self.u0.push(crate::io::read_f32_vec(&mut r, n)?);
        }
        for _ in 0..l {
            self.u1.push(crate::io::read_f32_vec(&mut r, n)?);
        }
        for _ in 0..l {
            self.u2.push(crate::io::read_f32_vec(&mut r, n)?);
        }
        Ok(())
    }
}
