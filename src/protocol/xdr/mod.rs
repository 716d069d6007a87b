//! XDR (External Data Representation, RFC 4506) encoding used by ONC RPC and NFSv4.
//!
//! Every XDR item is a multiple of four bytes long and integers are big endian.
//! The Rust mapping used throughout the crate is:
//!
//! - `int` / `unsigned int` → `i32` / `u32`
//! - `hyper` / `unsigned hyper` → `i64` / `u64`
//! - `opaque<>` → `Vec<u8>` (serialized from `[u8]`)
//! - `opaque[n]` → `[u8; N]`
//! - `string<>` → `String`
//! - `T<>` → `Vec<T>`, `T *` → `Option<T>`
//! - `enum` → a `#[repr(u32)]` Rust enum wired up with [`XdrEnum!`]
//!
//! Structures are wired up with [`SerializeStruct!`] and [`DeserializeStruct!`],
//! which process the fields in declaration order.

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};
use num_traits::ToPrimitive;

pub mod nfs4;
pub mod rpc;
mod utils;

pub use utils::{invalid_data, padding_len, ALIGNMENT};

/// XDR assumes big endian encoding.
pub type XDREndian = BigEndian;

pub trait Serialize {
    /// Writes the XDR representation of `self` into `dest`.
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

pub trait Deserialize {
    /// Replaces `self` with a value read from `src`.
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Reads a fresh `T` from `src`, starting from `T::default()`.
pub fn deserialize<T>(src: &mut impl Read) -> std::io::Result<T>
where
    T: Deserialize + Default,
{
    let mut val = T::default();
    val.deserialize(src)?;
    Ok(val)
}

/// Serializes a value into a freshly allocated buffer.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.serialize(&mut buf)?;
    Ok(buf)
}

impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(u32::from(*self))
    }
}

impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match src.read_u32::<XDREndian>()? {
            0 => false,
            1 => true,
            _ => return Err(invalid_data("Invalid value for bool enum")),
        };
        Ok(())
    }
}

macro_rules! xdr_primitive {
    ($t:ty, $write:ident, $read:ident) => {
        impl Serialize for $t {
            fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                dest.$write::<XDREndian>(*self)
            }
        }

        impl Deserialize for $t {
            fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                *self = src.$read::<XDREndian>()?;
                Ok(())
            }
        }
    };
}

xdr_primitive!(i32, write_i32, read_i32);
xdr_primitive!(u32, write_u32, read_u32);
xdr_primitive!(i64, write_i64, read_i64);
xdr_primitive!(u64, write_u64, read_u64);

/// Fixed-length opaque data, `opaque identifier[n]`.
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)?;
        utils::write_padding(N, dest)
    }
}

impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)?;
        utils::read_padding(N, src)
    }
}

/// Writes an XDR length word, rejecting lengths that do not fit in `u32`.
pub fn write_len<W: Write>(len: usize, dest: &mut W) -> std::io::Result<()> {
    let Some(len) = len.to_u32() else {
        return Err(invalid_data("cannot cast `usize` to `u32`"));
    };
    dest.write_u32::<XDREndian>(len)
}

pub fn read_len<R: Read>(src: &mut R) -> std::io::Result<usize> {
    let len = src.read_u32::<XDREndian>()?;
    usize::try_from(len).map_err(|_| invalid_data("cannot cast `u32` to `usize`"))
}

/// Variable-length opaque data, `opaque identifier<>`.
impl Serialize for [u8] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        write_len(self.len(), dest)?;
        dest.write_all(self)?;
        utils::write_padding(self.len(), dest)
    }
}

impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = read_len(src)?;
        // Read through `take` so a bogus length cannot force a huge allocation.
        self.clear();
        let read = src.by_ref().take(length as u64).read_to_end(self)?;
        if read != length {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        }
        utils::read_padding(length, src)
    }
}

impl Serialize for Vec<u8> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_slice().serialize(dest)
    }
}

/// NFSv4 strings (`utf8string`, `component4`) are UTF-8 on the wire.
impl Serialize for str {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_bytes().serialize(dest)
    }
}

impl Serialize for String {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_str().serialize(dest)
    }
}

impl Deserialize for String {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let bytes = deserialize::<Vec<u8>>(src)?;
        *self = String::from_utf8(bytes).map_err(|_| invalid_data("Not UTF-8 string"))?;
        Ok(())
    }
}

/// Counted arrays, `T identifier<>`.
///
/// `Vec<u8>` has its own opaque implementation above, so array support is
/// spelled out per element type instead of with a blanket impl.
#[macro_export]
macro_rules! XdrArray {
    ($($t:ty),*) => {
        $(
            impl $crate::xdr::Serialize for Vec<$t> {
                fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                    $crate::xdr::write_len(self.len(), dest)?;
                    for item in self {
                        $crate::xdr::Serialize::serialize(item, dest)?;
                    }
                    Ok(())
                }
            }

            impl $crate::xdr::Deserialize for Vec<$t> {
                fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                    let length = $crate::xdr::read_len(src)?;
                    self.clear();
                    for _ in 0..length {
                        self.push($crate::xdr::deserialize::<$t>(src)?);
                    }
                    Ok(())
                }
            }
        )*
    };
}

XdrArray!(u32, u64, String);

/// Optional data, `T *identifier`.
impl<T: Serialize> Serialize for Option<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            Some(data) => {
                true.serialize(dest)?;
                data.serialize(dest)
            }
            None => false.serialize(dest),
        }
    }
}

impl<T: Deserialize + Default> Deserialize for Option<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = if deserialize::<bool>(src)? { Some(deserialize::<T>(src)?) } else { None };
        Ok(())
    }
}

/// Implements [`Serialize`] for a struct by serializing each listed field in order.
#[macro_export]
macro_rules! SerializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $($crate::xdr::Serialize::serialize(&self.$element, dest)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Deserialize`] for a struct by deserializing each listed field in order.
#[macro_export]
macro_rules! DeserializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $($crate::xdr::Deserialize::deserialize(&mut self.$element, src)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Serialize`] and [`Deserialize`] for a C-like enum deriving
/// `ToPrimitive` and `FromPrimitive`. XDR enums travel as 32-bit integers.
#[macro_export]
macro_rules! XdrEnum {
    ($t:ident) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                match num_traits::ToPrimitive::to_u32(self) {
                    Some(val) => $crate::xdr::Serialize::serialize(&val, dest),
                    None => Err($crate::xdr::invalid_data("Invalid enum value")),
                }
            }
        }

        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                let val = $crate::xdr::deserialize::<u32>(src)?;
                match <$t as num_traits::FromPrimitive>::from_u32(val) {
                    Some(val) => {
                        *self = val;
                        Ok(())
                    }
                    None => Err($crate::xdr::invalid_data(&format!(
                        "Invalid value {} for enum {}",
                        val,
                        stringify!($t)
                    ))),
                }
            }
        }
    };
}

pub use crate::DeserializeStruct;
pub use crate::SerializeStruct;
pub use crate::XdrArray;
pub use crate::XdrEnum;
