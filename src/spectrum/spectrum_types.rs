use std::cmp::Ordering;

use super::peaks::{Peak, PeakEx, PeakRecord};
use super::scan_properties::SpectrumHeader;

/**
A parsed scan: its [`SpectrumHeader`] and its peak list, sorted by m/z.

The peak type decides which flavor of spectrum this is, see [`Spectrum`]
and [`SpectrumEx`].
*/
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumType<P: PeakRecord> {
    pub header: SpectrumHeader,
    pub peaks: Vec<P>,
}

/// A spectrum of basic (m/z, intensity) peaks
pub type Spectrum = SpectrumType<Peak>;

/// A spectrum of extended peaks carrying noise, baseline, charge and resolution
pub type SpectrumEx = SpectrumType<PeakEx>;

impl<P: PeakRecord> SpectrumType<P> {
    pub fn new(header: SpectrumHeader, peaks: Vec<P>) -> Self {
        Self { header, peaks }
    }

    /// Create a spectrum with `count` zeroed peaks
    pub fn with_capacity(count: usize) -> Self {
        let mut this = Self::default();
        this.resize(count);
        this
    }

    /// The empty sentinel spectrum, with a scan number of 0 and no peaks
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    pub fn scan_number(&self) -> u32 {
        self.header.scan_number
    }

    pub fn ms_level(&self) -> u8 {
        self.header.ms_level
    }

    /// The number of peaks in the spectrum
    pub fn count(&self) -> usize {
        self.peaks.len()
    }

    /// Discard the current peaks and replace them with `count` zeroed peaks
    pub fn resize(&mut self, count: usize) {
        self.peaks = vec![P::default(); count];
    }

    /**
    Find the index of the peak nearest `mz` within `ppm` parts-per-million.

    An exact hit is returned directly. Otherwise the neighbor just below the query
    is tested before the neighbor just above it.
    */
    pub fn get_mz(&self, mz: f64, ppm: f64) -> Option<usize> {
        if self.peaks.is_empty() {
            return None;
        }
        let upper = match self
            .peaks
            .binary_search_by(|p| p.mz().partial_cmp(&mz).unwrap_or(Ordering::Less))
        {
            Ok(i) => return Some(i),
            Err(i) => i,
        };

        let tol = mz / 1e6 * ppm;
        let (min, max) = (mz - tol, mz + tol);
        let within = |i: usize| {
            let x = self.peaks[i].mz();
            x >= min && x <= max
        };

        if upper > 0 && within(upper - 1) {
            return Some(upper - 1);
        }
        if upper < self.peaks.len() && within(upper) {
            return Some(upper);
        }
        None
    }

    /// The most intense peak, if any
    pub fn base_peak(&self) -> Option<&P> {
        self.peaks.iter().max_by(|a, b| {
            a.intensity()
                .partial_cmp(&b.intensity())
                .unwrap_or(Ordering::Equal)
        })
    }
}

impl From<SpectrumEx> for Spectrum {
    fn from(value: SpectrumEx) -> Self {
        let peaks = value
            .peaks
            .into_iter()
            .map(|p| Peak::new(p.mz, p.intensity))
            .collect();
        Self::new(value.header, peaks)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_spectrum() -> Spectrum {
        let mut spec = Spectrum::with_capacity(4);
        for (i, mz) in [100.0, 200.0, 300.0, 400.0].into_iter().enumerate() {
            spec.peaks[i] = Peak::new(mz, (i + 1) as f32 * 10.0);
        }
        spec.header.scan_number = 7;
        spec
    }

    #[test]
    fn test_get_mz() {
        let spec = make_spectrum();
        assert_eq!(spec.get_mz(200.0, 0.0), Some(1));
        assert_eq!(spec.get_mz(200.001, 10.0), Some(1));
        assert_eq!(spec.get_mz(299.999, 10.0), Some(2));
        assert_eq!(spec.get_mz(250.0, 10.0), None);
        assert_eq!(spec.get_mz(50.0, 10.0), None);
        assert_eq!(spec.get_mz(400.002, 10.0), Some(3));
        assert_eq!(Spectrum::empty().get_mz(200.0, 10.0), None);
    }

    #[test]
    fn test_resize_discards() {
        let mut spec = make_spectrum();
        spec.resize(2);
        assert_eq!(spec.count(), 2);
        assert!(spec.peaks.iter().all(|p| p.mz == 0.0));
        assert_eq!(spec.base_peak().map(|p| p.intensity), Some(0.0));
    }

    #[test]
    fn test_sentinel() {
        let spec = Spectrum::empty();
        assert!(spec.is_empty());
        assert_eq!(spec.count(), 0);
        let spec = make_spectrum();
        assert!(!spec.is_empty());
        assert_eq!(spec.base_peak().map(|p| p.mz), Some(400.0));
    }
}
