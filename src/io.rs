//! Little-endian helpers for the binary index formats.
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result, Write};

pub(crate) fn read_u32_vec<R: Read>(r: &mut R, n: usize) -> Result<Vec<u32>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(r.read_u32::<LittleEndian>()?);
    }
    Ok(out)
}

pub(crate) fn write_u32_slice<W: Write>(w: &mut W, xs: &[u32]) -> Result<()> {
    for &x in xs {
        w.write_u32::<LittleEndian>(x)?;
    }
    Ok(())
}

pub(crate) fn read_f32_vec<R: Read>(r: &mut R, n: usize) -> Result<Vec<f32>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(r.read_f32::<LittleEndian>()?);
    }
    Ok(out)
}

pub(crate) fn write_f32_slice<W: Write>(w: &mut W, xs: &[f32]) -> Result<()> {
    for &x in xs {
        w.write_f32::<LittleEndian>(x)?;
    }
    Ok(())
}

pub(crate) fn read_f64_vec<R: Read>(r: &mut R, n: usize) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(r.read_f64::<LittleEndian>()?);
    }
    Ok(out)
}

pub(crate) fn write_f64_slice<W: Write>(w: &mut W, xs: &[f64]) -> Result<()> {
    for &x in xs {
        w.write_f64::<LittleEndian>(x)?;
    }
    Ok(())
}
