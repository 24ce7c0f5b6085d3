//! Decoding and encoding of the base64 binary arrays embedded in mzML and mzXML.
//!
//! A binary array is a base64 string over a (possibly zlib-compressed) buffer of
//! homogeneous IEEE-754 floats. mzML stores them little-endian while mzXML defaults
//! to network byte order, so decoding normalizes the byte order of each element at
//! its own width before reading it.
use std::fmt::Display;
use std::io::prelude::*;
use std::{io, mem};

use base64_simd;
use bytemuck::Pod;
use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use num_traits::AsPrimitive;
use thiserror::Error;

pub type Bytes = Vec<u8>;

/// The floating point width of the values in a binary array
#[derive(Debug, Clone, Copy, PartialEq, Hash, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryDataArrayType {
    #[default]
    Float32,
    Float64,
}

impl BinaryDataArrayType {
    /// Get the size in bytes of a single value of this type
    pub const fn size_of(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

impl Display for BinaryDataArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Hash, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryCompressionType {
    #[default]
    NoCompression,
    Zlib,
}

#[derive(Debug, Clone, Copy, PartialEq, Hash, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// What a binary array holds, as declared by its controlled vocabulary terms
#[derive(Debug, Clone, Copy, PartialEq, Hash, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayType {
    #[default]
    Unknown,
    MZArray,
    IntensityArray,
    TimeArray,
}

#[derive(Debug, Error)]
pub enum BinaryDecodeError {
    #[error("Failed to decode base64 array: {0}")]
    Base64(String),
    #[error("An error occurred while decompressing: {0}")]
    DecompressionError(#[source] io::Error),
    #[error("Expected {expected} bytes of array data but found {found}")]
    SizeMismatch { expected: usize, found: usize },
}

pub fn compress_zlib(bytestring: &[u8]) -> io::Result<Bytes> {
    let result = Bytes::new();
    let mut compressor = ZlibEncoder::new(result, Compression::best());
    compressor.write_all(bytestring)?;
    compressor.finish()
}

pub fn decompress_zlib(bytestring: &[u8]) -> Result<Bytes, BinaryDecodeError> {
    let result = Bytes::new();
    let mut decompressor = ZlibDecoder::new(result);
    decompressor
        .write_all(bytestring)
        .map_err(BinaryDecodeError::DecompressionError)?;
    decompressor
        .finish()
        .map_err(BinaryDecodeError::DecompressionError)
}

fn base64_decode(encoded: &[u8]) -> Result<Bytes, BinaryDecodeError> {
    let result = if encoded.iter().any(u8::is_ascii_whitespace) {
        let compact: Bytes = encoded
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        base64_simd::STANDARD.decode_type::<Bytes>(&compact)
    } else {
        base64_simd::STANDARD.decode_type::<Bytes>(encoded)
    };
    result.map_err(|e| BinaryDecodeError::Base64(e.to_string()))
}

fn read_values<T: Pod + AsPrimitive<f64>>(
    buffer: &mut [u8],
    count: usize,
    byte_order: ByteOrder,
) -> Vec<f64> {
    let width = mem::size_of::<T>();
    buffer[..count * width]
        .chunks_exact_mut(width)
        .map(|chunk| {
            if byte_order == ByteOrder::BigEndian {
                chunk.reverse();
            }
            bytemuck::pod_read_unaligned::<T>(chunk).as_()
        })
        .collect()
}

/**
Decode `element_count` values from a base64 string.

When `compression` is [`BinaryCompressionType::Zlib`], the inflated buffer must hold
exactly `element_count` values of `dtype`. An uncompressed buffer must hold at least
that many.
*/
pub fn decode_array(
    encoded: &[u8],
    element_count: usize,
    dtype: BinaryDataArrayType,
    compression: BinaryCompressionType,
    byte_order: ByteOrder,
) -> Result<Vec<f64>, BinaryDecodeError> {
    if element_count == 0 {
        return Ok(Vec::new());
    }
    let mut buffer = base64_decode(encoded)?;
    let expected = match element_count.checked_mul(dtype.size_of()) {
        Some(expected) => expected,
        None => {
            return Err(BinaryDecodeError::SizeMismatch {
                expected: usize::MAX,
                found: buffer.len(),
            })
        }
    };
    if compression == BinaryCompressionType::Zlib {
        buffer = decompress_zlib(&buffer)?;
        if buffer.len() != expected {
            return Err(BinaryDecodeError::SizeMismatch {
                expected,
                found: buffer.len(),
            });
        }
    } else if buffer.len() < expected {
        return Err(BinaryDecodeError::SizeMismatch {
            expected,
            found: buffer.len(),
        });
    }

    let values = match dtype {
        BinaryDataArrayType::Float32 => read_values::<f32>(&mut buffer, element_count, byte_order),
        BinaryDataArrayType::Float64 => read_values::<f64>(&mut buffer, element_count, byte_order),
    };
    Ok(values)
}

fn encode_bytes(bytestring: &[u8], compression: BinaryCompressionType) -> io::Result<Bytes> {
    match compression {
        BinaryCompressionType::NoCompression => {
            Ok(base64_simd::STANDARD.encode_type::<Bytes>(bytestring))
        }
        BinaryCompressionType::Zlib => {
            let compressed = compress_zlib(bytestring)?;
            Ok(base64_simd::STANDARD.encode_type::<Bytes>(&compressed))
        }
    }
}

/// Encode little-endian 64-bit floats as a base64 string
pub fn encode_f64(values: &[f64], compression: BinaryCompressionType) -> io::Result<Bytes> {
    let bytestring: Bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_bytes(&bytestring, compression)
}

/// Encode little-endian 32-bit floats as a base64 string
pub fn encode_f32(values: &[f32], compression: BinaryCompressionType) -> io::Result<Bytes> {
    let bytestring: Bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_bytes(&bytestring, compression)
}

/// Encode `values` at the width and byte order of `dtype` and `byte_order`, the inverse of [`decode_array`]
pub fn encode_array(
    values: &[f64],
    dtype: BinaryDataArrayType,
    compression: BinaryCompressionType,
    byte_order: ByteOrder,
) -> io::Result<Bytes> {
    let mut bytestring = Bytes::with_capacity(values.len() * dtype.size_of());
    for v in values {
        match (dtype, byte_order) {
            (BinaryDataArrayType::Float64, ByteOrder::LittleEndian) => {
                bytestring.extend(v.to_le_bytes())
            }
            (BinaryDataArrayType::Float64, ByteOrder::BigEndian) => {
                bytestring.extend(v.to_be_bytes())
            }
            (BinaryDataArrayType::Float32, ByteOrder::LittleEndian) => {
                bytestring.extend((*v as f32).to_le_bytes())
            }
            (BinaryDataArrayType::Float32, ByteOrder::BigEndian) => {
                bytestring.extend((*v as f32).to_be_bytes())
            }
        }
    }
    encode_bytes(&bytestring, compression)
}
