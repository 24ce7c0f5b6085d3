//! A flat, fixed-order binary encoding of spectra and chromatograms for passing them
//! between processes.
//!
//! The layout is compatible with a .NET `BinaryWriter` using UTF-16 strings: integers and
//! floats are little-endian, booleans are a single byte, and strings are a 7-bit encoded
//! byte length followed by UTF-16LE code units.
//!
//! A spectrum is written as:
//!
//! | field | type |
//! |-------|------|
//! | scan number | i32 |
//! | ms level | i32 |
//! | centroid | bool |
//! | retention time, start m/z, end m/z, TIC, base peak intensity | f64 |
//! | FAIMS state | bool |
//! | FAIMS CV | f64 |
//! | analyzer | string |
//! | ion injection time | f64 |
//! | scan type | string |
//! | master scan number, master index (extended only) | i32 |
//! | scan filter | string |
//! | precursor count, then `{isolation m/z, width, monoisotopic m/z: f64, charge: i32}` | i32 |
//! | peak count, then peak records | i32 |
use std::io::{self, prelude::*};

use thiserror::Error;

use super::chromatogram::{Chromatogram, ChromatogramPoint};
use super::peaks::PeakRecord;
use super::scan_properties::{PrecursorIon, SpectrumHeader};
use super::spectrum_types::SpectrumType;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("An IO error occurred during serialization: {0}")]
    IOError(#[from] io::Error),
    #[error("A string payload was not valid UTF-16")]
    InvalidString,
    #[error("A string length prefix was malformed")]
    MalformedLength,
    #[error("Encountered a negative element count {0}")]
    NegativeCount(i32),
}

/// Little-endian primitive writers
pub trait BinaryWriteExt: Write {
    fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_f64(&mut self, value: f64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.write_all(&[value as u8])
    }

    fn write_7bit_length(&mut self, value: u32) -> io::Result<()> {
        let mut value = value;
        while value >= 0x80 {
            self.write_all(&[(value as u8) | 0x80])?;
            value >>= 7;
        }
        self.write_all(&[value as u8])
    }

    fn write_string(&mut self, value: &str) -> io::Result<()> {
        let bytes: Vec<u8> = value.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        self.write_7bit_length(bytes.len() as u32)?;
        self.write_all(&bytes)
    }
}

impl<W: Write + ?Sized> BinaryWriteExt for W {}

/// Little-endian primitive readers mirroring [`BinaryWriteExt`]
pub trait BinaryReadExt: Read {
    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> io::Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    fn read_bool(&mut self) -> io::Result<bool> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0] != 0)
    }

    fn read_7bit_length(&mut self) -> Result<u32, SerializationError> {
        let mut value: u32 = 0;
        let mut shift = 0;
        loop {
            let mut buf = [0u8; 1];
            self.read_exact(&mut buf)?;
            let byte = buf[0];
            value |= ((byte & 0x7f) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 28 {
                return Err(SerializationError::MalformedLength);
            }
        }
    }

    fn read_string(&mut self) -> Result<String, SerializationError> {
        let n = self.read_7bit_length()? as usize;
        if n % 2 != 0 {
            return Err(SerializationError::InvalidString);
        }
        let mut bytes = vec![0u8; n];
        self.read_exact(&mut bytes)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| SerializationError::InvalidString)
    }
}

impl<R: Read + ?Sized> BinaryReadExt for R {}

fn read_count<R: Read>(reader: &mut R) -> Result<usize, SerializationError> {
    let n = reader.read_i32()?;
    if n < 0 {
        Err(SerializationError::NegativeCount(n))
    } else {
        Ok(n as usize)
    }
}

fn write_precursor<W: Write>(writer: &mut W, precursor: &PrecursorIon) -> io::Result<()> {
    writer.write_f64(precursor.isolation_mz)?;
    writer.write_f64(precursor.isolation_width)?;
    writer.write_f64(precursor.monoisotopic_mz)?;
    writer.write_i32(precursor.charge)
}

fn read_precursor<R: Read>(reader: &mut R) -> io::Result<PrecursorIon> {
    Ok(PrecursorIon {
        isolation_mz: reader.read_f64()?,
        isolation_width: reader.read_f64()?,
        monoisotopic_mz: reader.read_f64()?,
        charge: reader.read_i32()?,
        ..Default::default()
    })
}

/// Write `spectrum` to `writer`, using the extended layout when `P` is an extended peak type
pub fn write_spectrum<W: Write, P: PeakRecord>(
    writer: &mut W,
    spectrum: &SpectrumType<P>,
) -> Result<(), SerializationError> {
    let header = &spectrum.header;
    writer.write_i32(header.scan_number as i32)?;
    writer.write_i32(header.ms_level as i32)?;
    writer.write_bool(header.centroid)?;
    writer.write_f64(header.retention_time)?;
    writer.write_f64(header.start_mz)?;
    writer.write_f64(header.end_mz)?;
    writer.write_f64(header.total_ion_current)?;
    writer.write_f64(header.base_peak_intensity)?;
    writer.write_bool(header.faims_state)?;
    writer.write_f64(header.faims_cv)?;
    writer.write_string(&header.analyzer)?;
    writer.write_f64(header.ion_injection_time)?;
    writer.write_string(&header.scan_type)?;
    if P::EXTENDED {
        writer.write_i32(header.precursor_master_scan_number)?;
        writer.write_i32(header.master_index)?;
    }
    writer.write_string(&header.scan_filter)?;

    writer.write_i32(header.precursors.len() as i32)?;
    for precursor in header.precursors.iter() {
        write_precursor(writer, precursor)?;
    }

    writer.write_i32(spectrum.peaks.len() as i32)?;
    for peak in spectrum.peaks.iter() {
        peak.write_record(writer)?;
    }
    Ok(())
}

/// Read a spectrum previously written by [`write_spectrum`] with the same peak type
pub fn read_spectrum<R: Read, P: PeakRecord>(
    reader: &mut R,
) -> Result<SpectrumType<P>, SerializationError> {
    let mut header = SpectrumHeader {
        scan_number: reader.read_i32()?.max(0) as u32,
        ms_level: reader.read_i32()?.clamp(0, u8::MAX as i32) as u8,
        centroid: reader.read_bool()?,
        retention_time: reader.read_f64()?,
        start_mz: reader.read_f64()?,
        end_mz: reader.read_f64()?,
        total_ion_current: reader.read_f64()?,
        base_peak_intensity: reader.read_f64()?,
        faims_state: reader.read_bool()?,
        faims_cv: reader.read_f64()?,
        analyzer: reader.read_string()?,
        ion_injection_time: reader.read_f64()?,
        scan_type: reader.read_string()?,
        ..Default::default()
    };
    if P::EXTENDED {
        header.precursor_master_scan_number = reader.read_i32()?;
        header.master_index = reader.read_i32()?;
    }
    header.scan_filter = reader.read_string()?;

    let n_precursors = read_count(reader)?;
    header.precursors = (0..n_precursors)
        .map(|_| read_precursor(reader))
        .collect::<io::Result<Vec<_>>>()?;

    let n_peaks = read_count(reader)?;
    let peaks = (0..n_peaks)
        .map(|_| P::read_record(reader))
        .collect::<io::Result<Vec<_>>>()?;
    Ok(SpectrumType::new(header, peaks))
}

/// Serialize `spectrum` into a fresh byte buffer
pub fn spectrum_to_bytes<P: PeakRecord>(
    spectrum: &SpectrumType<P>,
) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::new();
    write_spectrum(&mut buf, spectrum)?;
    Ok(buf)
}

pub fn spectrum_from_bytes<P: PeakRecord>(
    data: &[u8],
) -> Result<SpectrumType<P>, SerializationError> {
    let mut cursor = io::Cursor::new(data);
    read_spectrum(&mut cursor)
}

/// Write the points of `chromatogram`. The identifier is not part of the encoding.
pub fn write_chromatogram<W: Write>(
    writer: &mut W,
    chromatogram: &Chromatogram,
) -> Result<(), SerializationError> {
    writer.write_i32(chromatogram.count() as i32)?;
    for pt in chromatogram.points.iter() {
        writer.write_f64(pt.retention_time)?;
        writer.write_f64(pt.intensity)?;
    }
    Ok(())
}

pub fn read_chromatogram<R: Read>(reader: &mut R) -> Result<Chromatogram, SerializationError> {
    let n = read_count(reader)?;
    let mut points = Vec::with_capacity(n);
    for _ in 0..n {
        let retention_time = reader.read_f64()?;
        let intensity = reader.read_f64()?;
        points.push(ChromatogramPoint {
            retention_time,
            intensity,
        });
    }
    Ok(Chromatogram::new(String::new(), points))
}
