//! Locality-Sensitive Hashing based on random hyperplanes.
//!
//! Each table draws `N` Gaussian vectors; a query bit is the sign of the
//! dot product with the corresponding vector, so collision probability
//! follows the angle between inputs (Charikar, STOC '02).
use crate::data::Element;
use crate::error::{Error, Result};
use crate::lsh::{compute_all_keys, fill_tables, scan_tables, HashIndex};
use crate::matrix::Matrix;
use crate::table::HashTable;
use crate::topk::Scanner;
use crate::utils::create_rng;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use ndarray::prelude::*;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct RhpParam {
    /// Hash table size.
    pub m: u32,
    /// Number of hash tables.
    pub l: u32,
    /// Dimension of the vectors.
    pub d: u32,
    /// Binary code length per table.
    pub n: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RhpLsh<T> {
    param: RhpParam,
    /// `N x D` hyperplane normals per table.
    planes: Vec<Array2<f32>>,
    rnd_array: Vec<Vec<u32>>,
    tables: Vec<HashTable>,
    phantom: PhantomData<T>,
}

impl<T: Element> RhpLsh<T> {
    pub fn new(param: RhpParam, seed: u64) -> Self {
        let mut index = RhpLsh::default();
        index.reset(param, seed);
        index
    }

    pub fn reset(&mut self, param: RhpParam, seed: u64) {
        let mut rng = create_rng(seed);
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.planes = (0..param.l)
            .map(|_| Array::random_using((param.n as usize, param.d as usize), StandardNormal, &mut rng))
            .collect();
        self.rnd_array = (0..param.l)
            .map(|_| (0..param.n).map(|_| rng.gen_range(0..param.m)).collect())
            .collect();
    }

    pub fn param(&self) -> &RhpParam {
        &self.param
    }

    pub fn hash_key(&self, k: usize, v: &[T]) -> u32 {
        let q: Array1<f32> = v.iter().map(|x| x.to_f32().unwrap()).collect();
        let proj = self.planes[k].dot(&q);
        let mut sum = 0u32;
        for (i, &flag) in proj.iter().enumerate() {
            if flag > 0.0 {
                sum = sum.wrapping_add(self.rnd_array[k][i]);
            }
        }
        sum % self.param.m
    }
}

impl<T: Element> HashIndex<T> for RhpLsh<T> {
    fn hash(&mut self, data: &Matrix<T>) -> Result<()> {
        debug!("hashing {} rows into {} tables", data.size(), self.param.l);
        let keys = compute_all_keys(data, self.param.l as usize, |k, v| self.hash_key(k, v));
        fill_tables(&mut self.tables, keys);
        Ok(())
    }

    fn insert(&mut self, id: u32, v: &[T]) -> Result<()> {
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
        let mut w = BufWriter::new(File::create(path)?);
        w.write_u32::<LittleEndian>(self.param.m)?;
        w.write_u32::<LittleEndian>(self.param.l)?;
        w.write_u32::<LittleEndian>(self.param.d)?;
        w.write_u32::<LittleEndian>(self.param.n)?;
        for k in 0..self.param.l as usize {
            crate::io::write_u32_slice(&mut w, &self.rnd_array[k])?;
            for &x in self.planes[k].iter() {
                w.write_f32::<LittleEndian>(x)?;
            }
            self.tables[k].write_block(&mut w)?;
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
        self.planes.clear();
        self.tables.clear();
        for _ in 0..self.param.l {
            self.rnd_array.push(crate::io::read_u32_vec(&mut r, n)?);
            let flat = crate::io::read_f32_vec(&mut r, n * d)?;
            let planes = Array2::from_shape_vec((n, d), flat)
                .map_err(|e| Error::InvalidFormat(e.to_string()))?;
            self.planes.push(planes);
            self.tables.push(HashTable::read_block(&mut r, self.param.m)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_close_vectors_collide() {
        let param = RhpParam {
            m: 521,
            l: 1,
            d: 4,
            n: 2,
        };
        let index: RhpLsh<f32> = RhpLsh::new(param, 5);
        let a = [1.0f32, 2.0, 3.0, 4.0];
        // some small enough perturbation keeps every projection sign
        let collides = [1e-2f32, 1e-4, 1e-6].iter().any(|eps| {
            let b = [1.0f32, 2.0, 3.0, 4.0 + eps];
            index.hash_key(0, &a) == index.hash_key(0, &b)
        });
        assert!(collides);
    }

    #[test]
    fn test_scaling_invariant() {
        // sign(u . x) is invariant under positive scaling of x
        let param = RhpParam {
            m: 127,
            l: 3,
            d: 8,
            n: 6,
        };
        let index: RhpLsh<f32> = RhpLsh::new(param, 9);
        let x = [0.5f32, -1.0, 2.0, 0.1, -0.4, 1.5, -2.5, 0.9];
        let scaled: Vec<f32> = x.iter().map(|v| v * 3.0).collect();
        for k in 0..3 {
            assert_eq!(index.hash_key(k, &x), index.hash_key(k, &scaled));
        }
    }
}
