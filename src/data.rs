//! The sealed set of element types a dataset matrix can hold.
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num::{FromPrimitive, NumCast, ToPrimitive};
use std::fmt::{Debug, Display};
use std::io::{Read, Write};

mod private {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Element type of a dataset vector.
///
/// The matrix file header identifies the element by its encoded width, so
/// the set of types is closed: `u32`, `f32` and `f64`.
pub trait Element:
    private::Sealed
    + Copy
    + Default
    + PartialOrd
    + NumCast
    + ToPrimitive
    + FromPrimitive
    + Send
    + Sync
    + Debug
    + Display
    + 'static
{
    /// Width of the encoded value in bytes.
    const WIDTH: u32;

    fn to_f32(self) -> f32;

    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self>;

    fn write_to<W: Write>(self, w: &mut W) -> std::io::Result<()>;
}

impl Element for u32 {
    const WIDTH: u32 = 4;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        r.read_u32::<LittleEndian>()
    }

    fn write_to<W: Write>(self, w: &mut W) -> std::io::Result<()> {
        w.write_u32::<LittleEndian>(self)
    }
}

impl Element for f32 {
    const WIDTH: u32 = 4;

    fn to_f32(self) -> f32 {
        self
    }

    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        r.read_f32::<LittleEndian>()
    }

    fn write_to<W: Write>(self, w: &mut W) -> std::io::Result<()> {
        w.write_f32::<LittleEndian>(self)
    }
}

impl Element for f64 {
    const WIDTH: u32 = 8;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        r.read_f64::<LittleEndian>()
    }

    fn write_to<W: Write>(self, w: &mut W) -> std::io::Result<()> {
        w.write_f64::<LittleEndian>(self)
    }
}
