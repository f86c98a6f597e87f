//! Locality-Sensitive Hashing based on coordinate thresholding.
//!
//! Each table samples `N` distinct coordinates and one threshold drawn
//! uniformly from `[min, max]`; a bit is set when the coordinate exceeds
//! the threshold. The single table-scoped threshold is the historical
//! behavior; `per_bit_thresholds` draws an independent threshold per
//! sampled coordinate instead.
use crate::data::Element;
use crate::error::Result;
use crate::lsh::{compute_all_keys, fill_tables, scan_tables, HashIndex};
use crate::matrix::Matrix;
use crate::table::HashTable;
use crate::topk::Scanner;
use crate::utils::{create_rng, sample_distinct};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct ThParam {
    /// Hash table size.
    pub m: u32,
    /// Number of hash tables.
    pub l: u32,
    /// Dimension of the vectors.
    pub d: u32,
    /// Binary code length per table.
    pub n: u32,
    /// Upper bound of the threshold draw.
    pub max: f32,
    /// Lower bound of the threshold draw.
    pub min: f32,
    /// Draw one threshold per sampled coordinate instead of one per
    /// table. Indexes persisted with this set must be loaded with it set.
    pub per_bit_thresholds: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ThLsh<T> {
    param: ThParam,
    /// Per table: one threshold, or `N` in per-bit mode.
    thresholds: Vec<Vec<f32>>,
    /// Sampled coordinates per table, ascending.
    rnd_bits: Vec<Vec<u32>>,
    rnd_array: Vec<Vec<u32>>,
    tables: Vec<HashTable>,
    phantom: PhantomData<T>,
}

impl<T: Element> ThLsh<T> {
    pub fn new(param: ThParam, seed: u64) -> Self {
        let mut index = ThLsh::default();
        index.reset(param, seed);
        index
    }

    pub fn reset(&mut self, param: ThParam, seed: u64) {
        let mut rng = create_rng(seed);
        let per_table = if param.per_bit_thresholds { param.n } else { 1 };
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.rnd_bits = (0..param.l)
            .map(|_| {
                let mut bits = sample_distinct(&mut rng, param.n as usize, param.d);
                bits.sort_unstable();
                bits
            })
            .collect();
        self.thresholds = (0..param.l)
            .map(|_| {
                (0..per_table)
                    .map(|_| rng.gen_range(param.min..param.max))
                    .collect()
            })
            .collect();
        self.rnd_array = (0..param.l)
            .map(|_| (0..param.n).map(|_| rng.gen_range(0..param.m)).collect())
            .collect();
    }

    pub fn param(&self) -> &ThParam {
        &self.param
    }

    fn threshold(&self, k: usize, seq: usize) -> f32 {
        if self.param.per_bit_thresholds {
            self.thresholds[k][seq]
        } else {
            self.thresholds[k][0]
        }
    }

    pub fn hash_key(&self, k: usize, v: &[T]) -> u32 {
        let mut sum = 0u32;
        for (seq, &coord) in self.rnd_bits[k].iter().enumerate() {
            if v[coord as usize].to_f32() > self.threshold(k, seq) {
                sum = sum.wrapping_add(self.rnd_array[k][seq]);
            }
        }
        sum % self.param.m
    }
}

impl<T: Element> HashIndex<T> for ThLsh<T> {
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
        w.write_f32::<LittleEndian>(self.param.max)?;
        w.write_f32::<LittleEndian>(self.param.min)?;
        for t in &self.thresholds {
            crate::io::write_f32_slice(&mut w, t)?;
        }
        for k in 0..self.param.l as usize {
            crate::io::write_u32_slice(&mut w, &self.rnd_bits[k])?;
            crate::io::write_u32_slice(&mut w, &self.rnd_array[k])?;
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
        self.param.max = r.read_f32::<LittleEndian>()?;
        self.param.min = r.read_f32::<LittleEndian>()?;
        let n = self.param.n as usize;
        let per_table = if self.param.per_bit_thresholds { n } else { 1 };
        self.thresholds.clear();
        for _ in 0..self.param.l {
            self.thresholds.push(crate::io::read_f32_vec(&mut r, per_table)?);
        }
        self.rnd_bits.clear();
        self.rnd_array.clear();
        self.tables.clear();
        for _ in 0..self.param.l {
            self.rnd_bits.push(crate::io::read_u32_vec(&mut r, n)?);
            self.rnd_array.push(crate::io::read_u32_vec(&mut r, n)?);
            self.tables.push(HashTable::read_block(&mut r, self.param.m)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn param() -> ThParam {
        ThParam {
            m: 521,
            l: 4,
            d: 32,
            n: 12,
            max: 1.0,
            min: -1.0,
            per_bit_thresholds: false,
        }
    }

    #[test]
    fn test_unselected_coordinate_ignored() {
        let index: ThLsh<f32> = ThLsh::new(param(), 17);
        let x = [0.3f32; 32];
        for k in 0..4 {
            // flip a coordinate the table did not sample
            let skipped = (0..32u32).find(|c| !index.rnd_bits[k].contains(c)).unwrap();
            let mut y = x;
            y[skipped as usize] = 100.0;
            assert_eq!(index.hash_key(k, &x), index.hash_key(k, &y));
        }
    }

    #[test]
    fn test_table_scoped_threshold() {
        let index: ThLsh<f32> = ThLsh::new(param(), 17);
        for t in &index.thresholds {
            assert_eq!(t.len(), 1);
            assert!(-1.0 <= t[0] && t[0] < 1.0);
        }
    }

    #[test]
    fn test_per_bit_thresholds() {
        let mut p = param();
        p.per_bit_thresholds = true;
        let index: ThLsh<f32> = ThLsh::new(p, 17);
        for t in &index.thresholds {
            assert_eq!(t.len(), 12);
        }
    }
}
