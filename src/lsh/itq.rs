//! Iterative quantization.
//!
//! A global PCA (uncentered, deliberately: training pipelines depend on
//! the Gram-matrix form) followed by one refined orthogonal rotation per
//! table; a bit is the sign of a rotated projection. Training fills the
//! tables directly.
//!
//! See Gong & Lazebnik, "Iterative Quantization" (CVPR '11).
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
pub struct ItqParam {
    /// Hash table size.
    pub m: u32,
    /// Number of hash tables.
    pub l: u32,
    /// Dimension of the vectors.
    pub d: u32,
    /// Binary code length per table, also the number of principal
    /// components kept.
    pub n: u32,
    /// Rotation refinement iterations. Training-only, not persisted.
    pub i: u32,
}

#[derive(Debug, Clone)]
pub struct ItqLsh<T> {
    param: ItqParam,
    rng: SmallRng,
    /// `N x D` principal components per table.
    pcs: Vec<Array2<f32>>,
    /// `N x N` rotations per table, stored transposed.
    omegas: Vec<Array2<f32>>,
    rnd_array: Vec<Vec<u32>>,
    tables: Vec<HashTable>,
    phantom: PhantomData<T>,
}

impl<T: Element> Default for ItqLsh<T> {
    fn default() -> Self {
        ItqLsh {
            param: ItqParam::default(),
            rng: create_rng(0),
            pcs: Vec::new(),
            omegas: Vec::new(),
            rnd_array: Vec::new(),
            tables: Vec::new(),
            phantom: PhantomData,
        }
    }
}

impl<T: Element> ItqLsh<T> {
    pub fn new(param: ItqParam, seed: u64) -> Self {
        let mut index = ItqLsh::default();
        index.reset(param, seed);
        index
    }

    pub fn reset(&mut self, param: ItqParam, seed: u64) {
        self.rng = create_rng(seed);
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.pcs.clear();
        self.omegas.clear();
        let rng = &mut self.rng;
        self.rnd_array = (0..param.l)
            .map(|_| (0..param.n).map(|_| rng.gen_range(0..param.m)).collect())
            .collect();
    }

    pub fn param(&self) -> &ItqParam {
        &self.param
    }

    pub fn hash_key(&self, k: usize, v: &[T]) -> u32 {
        let n = self.param.n as usize;
        let q: Array1<f32> = v.iter().map(|x| x.to_f32().unwrap()).collect();
        let p = self.pcs[k].dot(&q);
        let mut sum = 0u32;
        for i in 0..n {
            if self.omegas[k].row(i).dot(&p) > 0.0 {
                sum = sum.wrapping_add(self.rnd_array[k][i]);
            }
        }
        sum % self.param.m
    }
}

impl<T: Element> HashIndex<T> for ItqLsh<T> {
    /// Training also allocates every row to its buckets; there is no
    /// separate hashing pass.
    fn train(&mut self, data: &Matrix<T>) -> Result<()> {
        let n = self.param.n as usize;
        let x = stage(data);
        let cov = x.transpose() * x.as_ref();
        let pcs = top_eigenvectors(&cov, n)?;
        let mat_c = project(&x, &pcs);

        self.pcs.clear();
        self.omegas.clear();
        for k in 0..self.param.l as usize {
            info!("computing rotation matrix for table {} of {}", k + 1, self.param.l);
            let r = itq_rotation(&mat_c, n, self.param.i, &mut self.rng)?;
            let omega = Array2::from_shape_fn((n, n), |(i, j)| r[(j, i)]);
            let rotated = mat_c.as_ref() * r.as_ref();
            let table = &mut self.tables[k];
            for row in 0..rotated.nrows() {
                let mut sum = 0u32;
                for i in 0..n {
                    if rotated[(row, i)] > 0.0 {
                        sum = sum.wrapping_add(self.rnd_array[k][i]);
                    }
                }
                table.insert(sum % self.param.m, row as u32);
            }
            self.pcs.push(pcs.clone());
            self.omegas.push(omega);
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
        Ok(())
    }

    fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut r = BufReader::new(File::open(path)?);
        self.param.m = r.read_u32::<LittleEndian>()?;
        self.param.l = r.read_u32::<LittleEndian>()?;
        self.param.d = r.read_u32::<LittleEndian>()?;
        self.param.n = r.read_u32::<LittleEndian>()?;
        let (n, d) = (self.param.n as usize, self.param.d as usize);
        self.rnd_array.clear();
        self.tables.clear();
        self.pcs.clear();
        self.omegas.clear();
        for _ in 0..self.param.l {
            self.rnd_array.push(crate::io::read_u32_vec(&mut r, n)?);
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
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::create_rng;
    use rand_distr::{Distribution, StandardNormal};

    #[test]
    fn test_train_is_consistent_with_query_keys() {
        let mut rng = create_rng(31);
        let data: Vec<f32> = (0..400 * 6).map(|_| StandardNormal.sample(&mut rng)).collect();
        let data = Matrix::from_vec(data, 400, 6).unwrap();
        let param = ItqParam {
            m: 127,
            l: 2,
            d: 6,
            n: 4,
            i: 20,
        };
        let mut index: ItqLsh<f32> = ItqLsh::new(param, 8);
        index.train(&data).unwrap();
        // the key computed at query time lands on the bucket the row was
        // put in during training
        for &row in &[0u32, 17, 211, 399] {
            for k in 0..2 {
                let key = index.hash_key(k, data.row(row));
                assert!(index.tables[k].get(key).unwrap().contains(&row));
            }
        }
    }
}
