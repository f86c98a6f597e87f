//! Dataset management. A dataset is maintained as a row-major matrix in
//! memory and read from a compact binary file.
use crate::data::Element;
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::warn;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// `size` vectors of `dim` elements each, stored contiguously with row
/// stride `dim`. Read-only while indexes hash or query it.
///
/// The file layout is a header of three little-endian `u32` values
/// `[element width, size, dim]` followed by `size * dim` little-endian
/// elements.
#[derive(Debug, Clone, Default)]
pub struct Matrix<T> {
    dim: usize,
    size: usize,
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    pub fn new() -> Self {
        Matrix {
            dim: 0,
            size: 0,
            data: Vec::new(),
        }
    }

    /// Reset the shape, zero-filling the storage.
    pub fn reset(&mut self, dim: usize, size: usize) {
        self.dim = dim;
        self.size = size;
        self.data.clear();
        self.data.resize(dim * size, T::default());
    }

    /// Take ownership of an existing row-major buffer.
    pub fn from_vec(data: Vec<T>, size: usize, dim: usize) -> Result<Self> {
        if data.len() != size * dim {
            return Err(Error::Failed(format!(
                "buffer holds {} elements, expected {} x {}",
                data.len(),
                size,
                dim
            )));
        }
        Ok(Matrix { dim, size, data })
    }

    /// Read a matrix from a binary file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut m = Matrix::new();
        m.load(path)?;
        Ok(m)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// The `i`th vector.
    pub fn row(&self, i: u32) -> &[T] {
        let start = i as usize * self.dim;
        &self.data[start..start + self.dim]
    }

    pub fn row_mut(&mut self, i: u32) -> &mut [T] {
        let start = i as usize * self.dim;
        &mut self.data[start..start + self.dim]
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut r = BufReader::new(File::open(path)?);
        let width = r.read_u32::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()? as usize;
        let dim = r.read_u32::<LittleEndian>()? as usize;
        // The stored width is advisory; the caller's element type wins.
        if width != T::WIDTH {
            warn!(
                "matrix header declares {}-byte elements, reading as {}-byte",
                width,
                T::WIDTH
            );
        }
        self.reset(dim, size);
        for v in self.data.iter_mut() {
            *v = T::read_from(&mut r)?;
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        w.write_u32::<LittleEndian>(T::WIDTH)?;
        w.write_u32::<LittleEndian>(self.size as u32)?;
        w.write_u32::<LittleEndian>(self.dim as u32)?;
        for &v in &self.data {
            v.write_to(&mut w)?;
        }
        Ok(())
    }

    /// An accessor to be handed to a query scanner.
    pub fn accessor(&self) -> Accessor<'_, T> {
        Accessor::new(self)
    }
}

/// Borrow of a matrix plus a visited-bit set, so a query touches each
/// candidate id at most once.
#[derive(Debug)]
pub struct Accessor<'a, T> {
    matrix: &'a Matrix<T>,
    flags: Vec<bool>,
}

impl<'a, T: Element> Accessor<'a, T> {
    pub fn new(matrix: &'a Matrix<T>) -> Self {
        Accessor {
            matrix,
            flags: vec![false; matrix.size()],
        }
    }

    /// Clear all visited bits. Invoked at the start of each query.
    pub fn reset(&mut self) {
        self.flags.clear();
        self.flags.resize(self.matrix.size(), false);
    }

    /// True only the first time `id` is marked since the last `reset`.
    pub fn mark(&mut self, id: u32) -> bool {
        if self.flags[id as usize] {
            return false;
        }
        self.flags[id as usize] = true;
        true
    }

    pub fn vec(&self, id: u32) -> &[T] {
        self.matrix.row(id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_row_access() {
        let m = Matrix::from_vec(vec![1u32, 2, 3, 4, 5, 6], 2, 3).unwrap();
        assert_eq!(m.row(0), &[1, 2, 3]);
        assert_eq!(m.row(1), &[4, 5, 6]);
    }

    #[test]
    fn test_mark_once() {
        let m = Matrix::from_vec(vec![0.0f32; 12], 4, 3).unwrap();
        let mut acc = m.accessor();
        assert!(acc.mark(2));
        assert!(!acc.mark(2));
        acc.reset();
        assert!(acc.mark(2));
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let m = Matrix::from_vec(vec![1.5f32, -2.0, 0.25, 8.0], 2, 2).unwrap();
        m.save(&path).unwrap();
        let m2: Matrix<f32> = Matrix::open(&path).unwrap();
        assert_eq!(m2.size(), 2);
        assert_eq!(m2.dim(), 2);
        assert_eq!(m.data(), m2.data());
    }
}
