//! Locality-Sensitive Hashing based on random bits sampling.
//!
//! Vectors are unsigned with every coordinate in `[0, C)`; the implicit
//! feature space is the `D * C`-bit unary expansion in which coordinate
//! value `v` sets its first `v + 1` bits. Each table samples `N` distinct
//! bit positions and composes the sampled bits into a bucket key with the
//! table's random tags.
//!
//! See Indyk & Motwani (STOC '98) and Gionis, Indyk & Motwani (VLDB '99).
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
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct RbsParam {
    /// Hash table size.
    pub m: u32,
    /// Number of hash tables.
    pub l: u32,
    /// Dimension of the vectors.
    pub d: u32,
    /// Binary code length per table.
    pub n: u32,
    /// Upper bound (exclusive) of the coordinate values.
    pub c: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RbsLsh {
    param: RbsParam,
    /// Sampled bit positions per table, ascending.
    rnd_bits: Vec<Vec<u32>>,
    /// Random tags per table, one per sampled bit.
    rnd_array: Vec<Vec<u32>>,
    tables: Vec<HashTable>,
}

impl RbsLsh {
    pub fn new(param: RbsParam, seed: u64) -> Self {
        let mut index = RbsLsh::default();
        index.reset(param, seed);
        index
    }

    /// Re-draw all random state for `param`. Seed 0 seeds from entropy.
    pub fn reset(&mut self, param: RbsParam, seed: u64) {
        let mut rng = create_rng(seed);
        self.param = param;
        self.tables = (0..param.l).map(|_| HashTable::new(param.m)).collect();
        self.rnd_bits = (0..param.l)
            .map(|_| {
                let mut bits = sample_distinct(&mut rng, param.n as usize, param.d * param.c);
                bits.sort_unstable();
                bits
            })
            .collect();
        self.rnd_array = (0..param.l)
            .map(|_| (0..param.n).map(|_| rng.gen_range(0..param.m)).collect())
            .collect();
    }

    pub fn param(&self) -> &RbsParam {
        &self.param
    }

    /// Bucket key of `v` in table `k`.
    pub fn hash_key(&self, k: usize, v: &[u32]) -> u32 {
        let mut sum = 0u32;
        for (seq, &bit) in self.rnd_bits[k].iter().enumerate() {
            if bit % self.param.c <= v[(bit / self.param.c) as usize] {
                sum = sum.wrapping_add(self.rnd_array[k][seq]);
            }
        }
        sum % self.param.m
    }
}

impl HashIndex<u32> for RbsLsh {
    fn hash(&mut self, data: &Matrix<u32>) -> Result<()> {
        debug!("hashing {} rows into {} tables", data.size(), self.param.l);
        let keys = compute_all_keys(data, self.param.l as usize, |k, v| self.hash_key(k, v));
        fill_tables(&mut self.tables, keys);
        Ok(())
    }

    fn insert(&mut self, id: u32, v: &[u32]) -> Result<()> {
        for k in 0..self.param.l as usize {
            let key = self.hash_key(k, v);
            self.tables[k].insert(key, id);
        }
        Ok(())
    }

    fn query(&self, v: &[u32], scanner: &mut Scanner<'_, u32>) {
        scan_tables(&self.tables, v, scanner, |k, v| self.hash_key(k, v));
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        w.write_u32::<LittleEndian>(self.param.m)?;
        w.write_u32::<LittleEndian>(self.param.l)?;
        w.write_u32::<LittleEndian>(self.param.d)?;
        w.write_u32::<LittleEndian>(self.param.n)?;
        w.write_u32::<LittleEndian>(self.param.c)?;
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
        self.param.c = r.read_u32::<LittleEndian>()?;
        let n = self.param.n as usize;
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

    fn param() -> RbsParam {
        RbsParam {
            m: 521,
            l: 5,
            d: 10,
            n: 20,
            c: 5,
        }
    }

    #[test]
    fn test_bit_positions_distinct_sorted() {
        let index = RbsLsh::new(param(), 11);
        for bits in &index.rnd_bits {
            assert_eq!(bits.len(), 20);
            assert!(bits.windows(2).all(|w| w[0] < w[1]));
            assert!(bits.iter().all(|&b| b < 10 * 5));
        }
    }

    #[test]
    fn test_reset_deterministic() {
        let a = RbsLsh::new(param(), 42);
        let b = RbsLsh::new(param(), 42);
        assert_eq!(a.rnd_bits, b.rnd_bits);
        assert_eq!(a.rnd_array, b.rnd_array);
    }

    #[test]
    fn test_key_in_range() {
        let index = RbsLsh::new(param(), 3);
        let v = [1u32, 3, 2, 0, 1, 4, 4, 1, 3, 4];
        for k in 0..5 {
            assert!(index.hash_key(k, &v) < 521);
        }
    }
}
