//! Bucket storage for one hash table.
use crate::error::{Error, Result};
use crate::io::{read_u32_vec, write_u32_slice};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Buckets of dataset ids, indexed by hash key in `[0, m)`.
///
/// The modulus is small (a prime around the expected bucket count), so a
/// dense array beats a general map. Ids within a bucket keep insertion
/// order; that order is observable through the persisted form only.
#[derive(Debug, Clone, Default)]
pub struct HashTable {
    buckets: Vec<Option<Vec<u32>>>,
}

impl HashTable {
    pub fn new(m: u32) -> Self {
        HashTable {
            buckets: vec![None; m as usize],
        }
    }

    pub fn insert(&mut self, key: u32, id: u32) {
        self.buckets[key as usize].get_or_insert_with(Vec::new).push(id);
    }

    pub fn get(&self, key: u32) -> Option<&[u32]> {
        self.buckets[key as usize].as_deref()
    }

    /// Number of distinct keys with at least one member.
    pub fn bucket_count(&self) -> u32 {
        self.buckets.iter().filter(|b| b.is_some()).count() as u32
    }

    /// Occupied buckets in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u32])> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(k, b)| b.as_deref().map(|ids| (k as u32, ids)))
    }

    /// Persisted form: `[count:u32]`, then per occupied bucket
    /// `[key:u32, len:u32, ids:u32 x len]`, keys ascending.
    pub(crate) fn write_block<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.bucket_count())?;
        for (key, ids) in self.iter() {
            w.write_u32::<LittleEndian>(key)?;
            w.write_u32::<LittleEndian>(ids.len() as u32)?;
            write_u32_slice(w, ids)?;
        }
        Ok(())
    }

    pub(crate) fn read_block<R: Read>(r: &mut R, m: u32) -> Result<Self> {
        let mut table = HashTable::new(m);
        let count = r.read_u32::<LittleEndian>()?;
        for _ in 0..count {
            let key = r.read_u32::<LittleEndian>()?;
            if key >= m {
                return Err(Error::InvalidFormat(format!(
                    "bucket key {} out of range for table size {}",
                    key, m
                )));
            }
            let len = r.read_u32::<LittleEndian>()? as usize;
            let ids = read_u32_vec(r, len)?;
            table.buckets[key as usize] = Some(ids);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut t = HashTable::new(11);
        t.insert(3, 9);
        t.insert(3, 4);
        t.insert(3, 7);
        assert_eq!(t.get(3), Some(&[9, 4, 7][..]));
        assert_eq!(t.get(5), None);
        assert_eq!(t.bucket_count(), 1);
    }

    #[test]
    fn test_block_roundtrip() {
        let mut t = HashTable::new(7);
        t.insert(6, 1);
        t.insert(0, 2);
        t.insert(6, 3);
        let mut buf = Vec::new();
        t.write_block(&mut buf).unwrap();
        let t2 = HashTable::read_block(&mut buf.as_slice(), 7).unwrap();
        assert_eq!(t2.get(0), Some(&[2][..]));
        assert_eq!(t2.get(6), Some(&[1, 3][..]));
        assert_eq!(t2.bucket_count(), 2);
    }

    #[test]
    fn test_bad_key_rejected() {
        let mut buf = Vec::new();
        let mut t = HashTable::new(100);
        t.insert(50, 1);
        t.write_block(&mut buf).unwrap();
        assert!(HashTable::read_block(&mut buf.as_slice(), 10).is_err());
    }
}
