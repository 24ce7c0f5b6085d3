use std::fmt;
use std::io;

use mzpeaks::{CoordinateLike, IntensityMeasurement, MZ};

use super::serialization::{BinaryReadExt, BinaryWriteExt};

/// A single observed data point, as parsed from any of the supported formats.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    pub mz: f64,
    pub intensity: f32,
}

impl Peak {
    pub fn new(mz: f64, intensity: f32) -> Self {
        Self { mz, intensity }
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peak({}, {})", self.mz, self.intensity)
    }
}

/**
A data point carrying the additional per-peak values that centroid streams
from vendor files provide.

mzML and mzXML sources leave `noise`, `baseline`, `charge` and `resolution` at zero.
*/
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakEx {
    pub mz: f64,
    pub intensity: f32,
    pub noise: f64,
    pub baseline: f64,
    pub charge: i32,
    pub resolution: f64,
}

impl PeakEx {
    pub fn new(mz: f64, intensity: f32) -> Self {
        Self {
            mz,
            intensity,
            ..Default::default()
        }
    }
}

impl fmt::Display for PeakEx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PeakEx({}, {}, z={}, res={})",
            self.mz, self.intensity, self.charge, self.resolution
        )
    }
}

impl CoordinateLike<MZ> for Peak {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for Peak {
    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

impl CoordinateLike<MZ> for PeakEx {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for PeakEx {
    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

/**
The behaviors the readers, the binary serializer and the scoring engine need from
a peak type, shared by [`Peak`] and [`PeakEx`].
*/
pub trait PeakRecord: Default + Clone + fmt::Debug + PartialEq {
    /// Whether spectra of this peak type use the extended serialization layout
    const EXTENDED: bool;

    fn mz(&self) -> f64;
    fn set_mz(&mut self, mz: f64);
    fn intensity(&self) -> f32;
    fn set_intensity(&mut self, intensity: f32);

    fn write_record<W: io::Write>(&self, writer: &mut W) -> io::Result<()>;
    fn read_record<R: io::Read>(reader: &mut R) -> io::Result<Self>;
}

impl PeakRecord for Peak {
    const EXTENDED: bool = false;

    #[inline]
    fn mz(&self) -> f64 {
        self.mz
    }

    #[inline]
    fn set_mz(&mut self, mz: f64) {
        self.mz = mz;
    }

    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity
    }

    #[inline]
    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    fn write_record<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_f64(self.mz)?;
        writer.write_f64(self.intensity as f64)
    }

    fn read_record<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let mz = reader.read_f64()?;
        let intensity = reader.read_f64()? as f32;
        Ok(Self { mz, intensity })
    }
}

impl PeakRecord for PeakEx {
    const EXTENDED: bool = true;

    #[inline]
    fn mz(&self) -> f64 {
        self.mz
    }

    #[inline]
    fn set_mz(&mut self, mz: f64) {
        self.mz = mz;
    }

    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity
    }

    #[inline]
    fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    fn write_record<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_f64(self.mz)?;
        writer.write_f64(self.intensity as f64)?;
        writer.write_f64(self.noise)?;
        writer.write_f64(self.baseline)?;
        writer.write_i32(self.charge)?;
        writer.write_f64(self.resolution)
    }

    fn read_record<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            mz: reader.read_f64()?,
            intensity: reader.read_f64()? as f32,
            noise: reader.read_f64()?,
            baseline: reader.read_f64()?,
            charge: reader.read_i32()?,
            resolution: reader.read_f64()?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_peak_ordering() {
        let a = Peak::new(200.5, 10.0);
        let b = Peak::new(300.1, 1.0);
        assert!(a < b);
        assert_eq!(CoordinateLike::<MZ>::coordinate(&b), 300.1);
        assert_eq!(IntensityMeasurement::intensity(&a), 10.0);
    }

    #[test]
    fn test_extended_defaults() {
        let p = PeakEx::new(445.12, 5000.0);
        assert_eq!(p.charge, 0);
        assert_eq!(p.noise, 0.0);
        assert!(PeakEx::EXTENDED);
        assert!(!Peak::EXTENDED);
    }
}
