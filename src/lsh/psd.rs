//! Locality-Sensitive Hashing based on p-stable distributions.
//!
//! Each table projects onto one random vector drawn from a p-stable
//! distribution (Cauchy for L1, Gaussian for L2), shifts by a uniform
//! offset and quantizes with window `W`. No bit composition; the
//! quantized projection is the bucket key directly.
//!
//! See Datar, Immorlica, Indyk & Mirrokni (SoCG '04).
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
use rand::Rng;
use rand_distr::{Cauchy, Distribution, StandardNormal};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;

/// The p-stable distribution the projection vectors are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StableKind {
    /// 1-stable, matches L1 distance.
    Cauchy,
    /// 2-stable, matches L2 distance.
    Gaussian,
}

impl StableKind {
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            1 => Ok(StableKind::Cauchy),
            2 => Ok(StableKind::Gaussian),
            t => Err(Error::UnknownDistribution(t)),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            StableKind::Cauchy => 1,
            StableKind::Gaussian => 2,
        }
    }
}

impl Default for StableKind {
    fn default() -> Self {
        StableKind::Gaussian
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PsdParam {
    /// Hash table size.
    pub m: u32,
    /// Number of hash tables.
    pub l: u32,
    /// Dimension of the vectors.
    pub d: u32,
    /// Projection distribution. Not part of the persisted form; an index
    /// must be loaded with the kind it was built with.
    pub kind: StableKind,
    /// Quantization window.
    pub w: f32,
}

#[derive(Debug, Clone, Default)]
pub struct PsdLsh<T> {
    param: PsdParam,
    /// Uniform offsets, one per table.
    rnd_bs: Vec<f32>,
    /// Projection vector per table.
    stable: Vec<Array1<f32>>,
    tables: Vec<HashTable>,
    phantom: PhantomData<T>,
}

impl<T: Element> PsdLsh<T> {
    pub fn new(param: PsdParam, seed: u64) -> Self {
        let mut index = PsdLsh::default();
        index.reset(param, seed);
        index
    }

    pub fn reset(&mut self, param: PsdParam, seed: u64) {
        let mut rng = create_rng(seed);
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.stable.clear();
        self.rnd_bs.clear();
        let d = param.d as usize;
        for _ in 0..param.l {
            let a: Array1<f32> = match param.kind {
                StableKind::Cauchy => {
                    let cauchy = Cauchy::<f32>::new(0.0, 1.0).unwrap();
                    (0..d).map(|_| cauchy.sample(&mut rng)).collect()
                }
                StableKind::Gaussian => (0..d).map(|_| StandardNormal.sample(&mut rng)).collect(),
            };
            self.stable.push(a);
            self.rnd_bs.push(rng.gen_range(0.0..param.w));
        }
    }

    pub fn param(&self) -> &PsdParam {
        &self.param
    }

    pub fn hash_key(&self, k: usize, v: &[T]) -> u32 {
        let q: Array1<f32> = v.iter().map(|x| x.to_f32().unwrap()).collect();
        let sum = self.stable[k].dot(&q);
        let quantized = ((sum + self.rnd_bs[k]) / self.param.w).floor() as i64;
        quantized.rem_euclid(self.param.m as i64) as u32
    }
}

impl<T: Element> HashIndex<T> for PsdLsh<T> {
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
        w.write_f32::<LittleEndian>(self.param.w)?;
        crate::io::write_f32_slice(&mut w, &self.rnd_bs)?;
        for k in 0..self.param.l as usize {
            for &x in self.stable[k].iter() {
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
        self.param.w = r.read_f32::<LittleEndian>()?;
        let (l, d) = (self.param.l as usize, self.param.d as usize);
        self.rnd_bs = crate::io::read_f32_vec(&mut r, l)?;
        self.stable.clear();
        self.tables.clear();
        for _ in 0..l {
            self.stable.push(Array1::from(crate::io::read_f32_vec(&mut r, d)?));
            self.tables.push(HashTable::read_block(&mut r, self.param.m)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identical_vectors_collide() {
        for kind in [StableKind::Cauchy, StableKind::Gaussian] {
            let param = PsdParam {
                m: 521,
                l: 5,
                d: 16,
                kind,
                w: 0.5,
            };
            let index: PsdLsh<f32> = PsdLsh::new(param, 13);
            let x: Vec<f32> = (0..16).map(|i| (i as f32).sin()).collect();
            let y = x.clone();
            for k in 0..5 {
                assert_eq!(index.hash_key(k, &x), index.hash_key(k, &y));
            }
        }
    }

    #[test]
    fn test_negative_projection_in_range() {
        let param = PsdParam {
            m: 97,
            l: 1,
            d: 2,
            kind: StableKind::Gaussian,
            w: 1.0,
        };
        let index: PsdLsh<f32> = PsdLsh::new(param, 21);
        // push the projection strongly negative
        let x = [-1000.0f32, -1000.0];
        assert!(index.hash_key(0, &x) < 97);
    }

    #[test]
    fn test_distribution_tags() {
        assert_eq!(StableKind::from_tag(1).unwrap(), StableKind::Cauchy);
        assert_eq!(StableKind::from_tag(2).unwrap(), StableKind::Gaussian);
        assert!(StableKind::from_tag(9).is_err());
    }
}
