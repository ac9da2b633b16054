use crate::axes::AxisOrder;
use crate::error::Error;
use ndarray::Array2;
use num::{FromPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::any::type_name;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

/// Pixel types as numbered by bioformats, bit images are read as u8
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
    BIT,
}

impl PixelType {
    pub fn bytes(&self) -> usize {
        match self {
            PixelType::I8 | PixelType::U8 | PixelType::BIT => 1,
            PixelType::I16 | PixelType::U16 => 2,
            PixelType::I32 | PixelType::U32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PixelType::F32 | PixelType::F64)
    }
}

impl TryFrom<i32> for PixelType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PixelType::I8),
            1 => Ok(PixelType::U8),
            2 => Ok(PixelType::I16),
            3 => Ok(PixelType::U16),
            4 => Ok(PixelType::I32),
            5 => Ok(PixelType::U32),
            6 => Ok(PixelType::F32),
            7 => Ok(PixelType::F64),
            8 => Ok(PixelType::BIT),
            _ => Err(Error::UnknownPixelType(value.to_string())),
        }
    }
}

impl FromStr for PixelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int8" | "i8" => Ok(PixelType::I8),
            "uint8" | "u8" => Ok(PixelType::U8),
            "int16" | "i16" => Ok(PixelType::I16),
            "uint16" | "u16" => Ok(PixelType::U16),
            "int32" | "i32" => Ok(PixelType::I32),
            "uint32" | "u32" => Ok(PixelType::U32),
            "float" | "f32" | "float32" => Ok(PixelType::F32),
            "double" | "f64" | "float64" => Ok(PixelType::F64),
            "bit" => Ok(PixelType::BIT),
            _ => Err(Error::UnknownPixelType(s.to_string())),
        }
    }
}

/// One (Y, X) plane in the pixel type of the source. Cast to `Array2<T>` using try_into.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    I8(Array2<i8>),
    U8(Array2<u8>),
    I16(Array2<i16>),
    U16(Array2<u16>),
    I32(Array2<i32>),
    U32(Array2<u32>),
    F32(Array2<f32>),
    F64(Array2<f64>),
}

macro_rules! impl_frame_cast {
    ($($t:tt: $s:ident $(,)?)*) => {
        $(
            impl From<Array2<$t>> for Frame {
                fn from(value: Array2<$t>) -> Self {
                    Frame::$s(value)
                }
            }
        )*
    };
}

impl_frame_cast! {
    i8: I8
    u8: U8
    i16: I16
    u16: U16
    i32: I32
    u32: U32
    f32: F32
    f64: F64
}

impl Frame {
    /// (size y, size x)
    pub fn shape(&self) -> &[usize] {
        match self {
            Frame::I8(a) => a.shape(),
            Frame::U8(a) => a.shape(),
            Frame::I16(a) => a.shape(),
            Frame::U16(a) => a.shape(),
            Frame::I32(a) => a.shape(),
            Frame::U32(a) => a.shape(),
            Frame::F32(a) => a.shape(),
            Frame::F64(a) => a.shape(),
        }
    }
}

impl<T> TryInto<Array2<T>> for Frame
where
    T: FromPrimitive + Zero + 'static,
{
    type Error = Error;

    fn try_into(self) -> Result<Array2<T>, Self::Error> {
        let mut err = Ok(());
        macro_rules! cast {
            ($v:ident, $from:ident) => {
                $v.mapv_into_any(|x| {
                    T::$from(x).unwrap_or_else(|| {
                        err = Err(Error::Cast(x.to_string(), type_name::<T>().to_string()));
                        T::zero()
                    })
                })
            };
        }
        let arr = match self {
            Frame::I8(v) => cast!(v, from_i8),
            Frame::U8(v) => cast!(v, from_u8),
            Frame::I16(v) => cast!(v, from_i16),
            Frame::U16(v) => cast!(v, from_u16),
            Frame::I32(v) => cast!(v, from_i32),
            Frame::U32(v) => cast!(v, from_u32),
            Frame::F32(v) => cast!(v, from_f32),
            Frame::F64(v) => cast!(v, from_f64),
        };
        err.map(|_| arr)
    }
}

/// Decode the raw bytes of a plane as returned by bioformats.
pub fn bytes_to_frame(
    bytes: &[u8],
    pixel_type: PixelType,
    little_endian: bool,
    size_y: usize,
    size_x: usize,
) -> Result<Frame, Error> {
    macro_rules! get_frame {
        ($t:tt, $from:ident) => {{
            const N: usize = std::mem::size_of::<$t>();
            let data = bytes
                .chunks_exact(N)
                .map(|x| {
                    let mut b = [0u8; N];
                    b.copy_from_slice(x);
                    $t::$from(b)
                })
                .collect();
            Ok(Frame::from(Array2::from_shape_vec((size_y, size_x), data)?))
        }};
        ($t:tt) => {
            if little_endian {
                get_frame!($t, from_le_bytes)
            } else {
                get_frame!($t, from_be_bytes)
            }
        };
    }

    match pixel_type {
        PixelType::I8 => get_frame!(i8),
        PixelType::U8 | PixelType::BIT => get_frame!(u8),
        PixelType::I16 => get_frame!(i16),
        PixelType::U16 => get_frame!(u16),
        PixelType::I32 => get_frame!(i32),
        PixelType::U32 => get_frame!(u32),
        PixelType::F32 => get_frame!(f32),
        PixelType::F64 => get_frame!(f64),
    }
}

/// A multi-series image file. Sizes are given per axis in the native axis order of a series,
/// planes are always (Y, X).
pub trait ImageSource {
    fn series_count(&self) -> Result<usize, Error>;

    fn axis_order(&self, series: usize) -> Result<AxisOrder, Error>;

    fn sizes(&self, series: usize) -> Result<Vec<usize>, Error>;

    fn pixel_type(&self, series: usize) -> Result<PixelType, Error>;

    /// Retrieve the frame at channel c, slice z and time t.
    fn read_plane(&self, series: usize, c: usize, z: usize, t: usize) -> Result<Frame, Error>;

    /// ome metadata for the whole file
    fn ome_xml(&self) -> Result<String, Error>;

    fn check_series(&self, series: usize) -> Result<(), Error> {
        let count = self.series_count()?;
        if series < count {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "series {series} out of range, the file has {count} series"
            )))
        }
    }
}

impl<S: ImageSource + ?Sized> ImageSource for &S {
    fn series_count(&self) -> Result<usize, Error> {
        (**self).series_count()
    }

    fn axis_order(&self, series: usize) -> Result<AxisOrder, Error> {
        (**self).axis_order(series)
    }

    fn sizes(&self, series: usize) -> Result<Vec<usize>, Error> {
        (**self).sizes(series)
    }

    fn pixel_type(&self, series: usize) -> Result<PixelType, Error> {
        (**self).pixel_type(series)
    }

    fn read_plane(&self, series: usize, c: usize, z: usize, t: usize) -> Result<Frame, Error> {
        (**self).read_plane(series, c, z, t)
    }

    fn ome_xml(&self) -> Result<String, Error> {
        (**self).ome_xml()
    }
}

/// Length in bytes of the xml metadata in the header of a lif file.
pub fn lif_metadata_string_size<P: AsRef<Path>>(path: P) -> Result<i32, Error> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(9))?;
    let mut buffer = [0u8; 4];
    file.read_exact(&mut buffer)?;
    Ok(i32::from_le_bytes(buffer))
}
