//! The LSH index families.
//!
//! Every family maintains `L` hash tables over bucket keys in `[0, M)` and
//! answers queries by unioning the matching bucket of each table into a
//! [`Scanner`](crate::topk::Scanner). The stateless families (`rbs`, `rhp`,
//! `th`, `psd`) hash straight from random projections; `sh` needs a
//! training pass before hashing; `itq`, `dbq` and `kdbq` populate their
//! tables as part of training.
use crate::data::Element;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::table::HashTable;
use crate::topk::Scanner;
use std::path::Path;

pub mod dbq;
pub mod itq;
pub mod kdbq;
mod pca;
pub mod psd;
pub mod rbs;
pub mod rhp;
pub mod sh;
pub mod th;

mod test;

pub use dbq::DbqLsh;
pub use itq::ItqLsh;
pub use kdbq::KdbqLsh;
pub use psd::PsdLsh;
pub use rbs::RbsLsh;
pub use rhp::RhpLsh;
pub use sh::ShLsh;
pub use th::ThLsh;

/// Uniform contract over the index families.
///
/// Families leave the operations they do not support at the default
/// implementations, which return [`Error::NotImplemented`].
pub trait HashIndex<T: Element> {
    /// Learn data-dependent parameters from the dataset. For `itq`, `dbq`
    /// and `kdbq` this also fills the hash tables. Default is a no-op for
    /// the families that need no training.
    fn train(&mut self, _data: &Matrix<T>) -> Result<()> {
        Ok(())
    }

    /// Insert every dataset row into all tables.
    fn hash(&mut self, _data: &Matrix<T>) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Insert a single vector under the given id.
    fn insert(&mut self, _id: u32, _v: &[T]) -> Result<()> {
        Err(Error::NotImplemented)
    }

    /// Gather the candidates of all tables into `scanner` and finalize
    /// its TopK.
    fn query(&self, v: &[T], scanner: &mut Scanner<'_, T>);

    /// Persist the trained index, tables included.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    /// Replace this index with the one persisted at `path`.
    fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;
}

/// The per-query gather loop shared by all families: compute one bucket
/// key per table, scan the members of existing buckets, finalize.
pub(crate) fn scan_tables<T, F>(
    tables: &[HashTable],
    v: &[T],
    scanner: &mut Scanner<'_, T>,
    key_of: F,
) where
    T: Element,
    F: Fn(usize, &[T]) -> u32,
{
    scanner.reset(v);
    for (k, table) in tables.iter().enumerate() {
        let key = key_of(k, v);
        if let Some(bucket) = table.get(key) {
            for &id in bucket {
                scanner.visit(id);
            }
        }
    }
    scanner.topk_mut().gen_topk();
}

/// Bucket keys for every dataset row, one `Vec` of `l` keys per row.
/// Rows are hashed in parallel; insertion stays in row order so bucket
/// contents are identical to a sequential pass.
pub(crate) fn compute_all_keys<T, F>(data: &Matrix<T>, l: usize, key_of: F) -> Vec<Vec<u32>>
where
    T: Element,
    F: Fn(usize, &[T]) -> u32 + Sync,
{
    use rayon::prelude::*;
    (0..data.size())
        .into_par_iter()
        .map(|i| {
            let row = data.row(i as u32);
            (0..l).map(|k| key_of(k, row)).collect()
        })
        .collect()
}

pub(crate) fn fill_tables(tables: &mut [HashTable], keys: Vec<Vec<u32>>) {
    for (i, row_keys) in keys.into_iter().enumerate() {
        for (k, key) in row_keys.into_iter().enumerate() {
            tables[k].insert(key, i as u32);
        }
    }
}
