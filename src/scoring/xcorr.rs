/*!
A cross-correlation score between an observed MS/MS spectrum and a list of
theoretical fragment ion m/z values, computed with the "fast XCorr" preprocessing
popularized by Comet.

The observed peaks are binned, normalized to a fixed height within each of ten
windows, and then have a flanking mean subtracted. A theoretical ion's contribution
is the value of the processed array at its bin.
*/
use log::trace;

use crate::spectrum::SpectrumEx;

/// Width and offset of the m/z bins a spectrum is projected onto
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinSettings {
    pub bin_size: f64,
    pub bin_offset: f64,
}

impl BinSettings {
    /// Bins for high resolution analyzers
    pub const HIGH_RES: BinSettings = BinSettings {
        bin_size: 0.02,
        bin_offset: 0.0,
    };

    /// Bins for ion trap analyzers
    pub const LOW_RES: BinSettings = BinSettings {
        bin_size: 1.0005,
        bin_offset: 0.4,
    };

    /// Choose the bins for a spectrum measured by `analyzer`
    pub fn for_analyzer(analyzer: &str) -> BinSettings {
        if analyzer.contains("IT") {
            Self::LOW_RES
        } else {
            Self::HIGH_RES
        }
    }

    /// The bin `mz` falls into. May be negative for negative input.
    #[inline]
    pub fn bin_of(&self, mz: f64) -> i64 {
        (mz / self.bin_size + (1.0 - self.bin_offset)) as i64
    }
}

/// A single bin of the projected spectrum
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct BinPoint {
    mz: f64,
    intensity: f32,
}

#[derive(Debug, Default, Clone)]
struct BinnedSpectrum {
    bins: Vec<BinPoint>,
    highest_ion: i64,
    highest_intensity: f64,
}

/**
The XCorr scoring engine.

An `XCorr` value carries only its configuration. Every call to [`XCorr::score`]
builds its working arrays from scratch, so scores are reproducible and an engine
may be shared freely.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XCorr {
    /// The largest peptide mass the binned array must accommodate
    pub max_peptide_mass: f64,
    /// Bins added beyond the precursor mass
    pub mass_padding: f64,
    /// The height each normalization window is scaled to
    pub window_scale: f64,
    pub num_windows: usize,
    /// Half the width of the flanking window subtracted from each bin
    pub flank_offset: usize,
    pub flanking_peaks: bool,
}

impl Default for XCorr {
    fn default() -> Self {
        Self {
            max_peptide_mass: 4000.0,
            mass_padding: 100.0,
            window_scale: 50.0,
            num_windows: 10,
            flank_offset: 75,
            flanking_peaks: true,
        }
    }
}

impl XCorr {
    pub fn new() -> Self {
        Self::default()
    }

    /**
    Score `ions` against `spectrum`.

    Returns 0 when there is no spectrum or when it is not an MSn scan. Ions whose bin
    lies outside the processed array contribute nothing.
    */
    pub fn score(&self, spectrum: Option<&SpectrumEx>, ions: &[f64]) -> f64 {
        let spectrum = match spectrum {
            Some(spectrum) if spectrum.ms_level() >= 2 => spectrum,
            _ => return 0.0,
        };
        let settings = BinSettings::for_analyzer(&spectrum.header.analyzer);
        let fast_xcorr = self.preprocess(spectrum, settings);

        let total: f64 = ions
            .iter()
            .map(|ion| settings.bin_of(*ion))
            .filter_map(|i| usize::try_from(i).ok())
            .filter_map(|i| fast_xcorr.get(i))
            .map(|v| *v as f64)
            .sum();
        total * 0.005
    }

    /// Build the processed correlation array for `spectrum`
    pub fn preprocess(&self, spectrum: &SpectrumEx, settings: BinSettings) -> Vec<f32> {
        let max_size = ((self.max_peptide_mass + self.mass_padding) / settings.bin_size) as usize;
        let mut binned = self.bin_ions(spectrum, settings, max_size);
        self.normalize_windows(&mut binned);
        trace!(
            "Binned scan {} into {} bins, highest ion bin {}",
            spectrum.scan_number(),
            binned.bins.len(),
            binned.highest_ion
        );
        self.fast_xcorr(&binned.bins)
    }

    /// The largest `isolation_mz * charge` over the precursors, assuming 4+ when the charge is unknown
    fn precursor_mass(spectrum: &SpectrumEx) -> f64 {
        spectrum
            .header
            .precursors
            .iter()
            .map(|p| p.isolation_mz * p.effective_charge(4) as f64)
            .fold(0.0, f64::max)
    }

    fn bin_ions(&self, spectrum: &SpectrumEx, settings: BinSettings, max_size: usize) -> BinnedSpectrum {
        let precursor = Self::precursor_mass(spectrum);
        let size = (((precursor + self.mass_padding) / settings.bin_size) as usize).min(max_size);
        let mut binned = BinnedSpectrum {
            bins: vec![BinPoint::default(); size],
            ..Default::default()
        };

        for peak in spectrum.peaks.iter() {
            if peak.intensity <= 0.0 || peak.mz >= precursor + 50.0 {
                continue;
            }
            let ibin = settings.bin_of(peak.mz);
            let intensity = (peak.intensity as f64).sqrt();
            if ibin > binned.highest_ion {
                binned.highest_ion = ibin;
            }
            let Some(bin) = usize::try_from(ibin)
                .ok()
                .and_then(|i| binned.bins.get_mut(i))
            else {
                continue;
            };
            if intensity > bin.intensity as f64 {
                // The stored m/z doubles as a threshold a replacement must also exceed
                if intensity > bin.mz {
                    bin.intensity = intensity as f32;
                    bin.mz = peak.mz;
                }
                if bin.intensity as f64 > binned.highest_intensity {
                    binned.highest_intensity = bin.intensity as f64;
                }
            }
        }
        binned
    }

    fn normalize_windows(&self, binned: &mut BinnedSpectrum) {
        let scale = if binned.highest_intensity > 0.000001 {
            100.0 / binned.highest_intensity
        } else {
            1.0
        };

        let mut max_overall = 0.0f64;
        let raw: Vec<f64> = binned
            .bins
            .iter_mut()
            .map(|bin| {
                let v = bin.intensity as f64 * scale;
                bin.intensity = 0.0;
                if v > max_overall {
                    max_overall = v;
                }
                v
            })
            .collect();

        let window_size = (binned.highest_ion as f64 / self.num_windows as f64).ceil();
        let window_size = if window_size > 0.0 { window_size as usize } else { 0 };
        let floor = 0.05 * max_overall;

        for window in 0..self.num_windows {
            let start = (window * window_size).min(raw.len());
            let end = ((window + 1) * window_size).min(raw.len());
            let window_max = raw[start..end].iter().copied().fold(0.0, f64::max);
            if window_max <= 0.0 {
                continue;
            }
            let factor = self.window_scale / window_max;
            for (bin, v) in binned.bins[start..end].iter_mut().zip(&raw[start..end]) {
                if *v > floor {
                    bin.intensity = (v * factor) as f32;
                }
            }
        }
    }

    fn fast_xcorr(&self, bins: &[BinPoint]) -> Vec<f32> {
        let size = bins.len();
        let offset = self.flank_offset;
        let span = 2 * offset + 1;
        let dm = 1.0 / (span - 1) as f64;
        let intensity = |i: usize| bins.get(i).map(|b| b.intensity as f64).unwrap_or_default();

        let mut flank_mean = vec![0.0f64; size];
        let mut sum: f64 = (0..offset).map(intensity).sum();
        for i in offset..size + offset {
            if i < size && bins[i].intensity > 0.0 {
                sum += bins[i].intensity as f64;
            }
            if i >= span && bins[i - span].intensity > 0.0 {
                sum -= bins[i - span].intensity as f64;
            }
            flank_mean[i - offset] = (sum - intensity(i - offset)) * dm;
        }

        let mut result = vec![0.0f32; size];
        let delta = |i: usize| intensity(i) - flank_mean[i];
        for i in 1..size.saturating_sub(1) {
            let mut v = delta(i) as f32;
            if self.flanking_peaks {
                v += (delta(i - 1) * 0.5) as f32;
                v += (delta(i + 1) * 0.5) as f32;
            }
            result[i] = v;
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::{PeakEx, PrecursorIon};

    fn ion_trap_spectrum(peaks: &[(f64, f32)]) -> SpectrumEx {
        let mut spec = SpectrumEx::with_capacity(0);
        spec.header.scan_number = 7;
        spec.header.ms_level = 2;
        spec.header.analyzer = "ITMS".into();
        spec.header.precursors.push(PrecursorIon {
            isolation_mz: 500.0,
            charge: 2,
            ..Default::default()
        });
        spec.peaks = peaks.iter().map(|(mz, i)| PeakEx::new(*mz, *i)).collect();
        spec
    }

    #[test]
    fn test_bin_settings() {
        assert_eq!(BinSettings::for_analyzer("ITMS"), BinSettings::LOW_RES);
        assert_eq!(BinSettings::for_analyzer("FTMS"), BinSettings::HIGH_RES);
        assert_eq!(BinSettings::LOW_RES.bin_of(95.0), 95);
        assert_eq!(BinSettings::LOW_RES.bin_of(94.0), 94);
    }

    #[test]
    fn test_single_peak_profile() {
        let spec = ion_trap_spectrum(&[(95.0, 400.0)]);
        let engine = XCorr::new();
        let processed = engine.preprocess(&spec, BinSettings::LOW_RES);
        // (500 * 2 + 100) / 1.0005
        assert_eq!(processed.len(), 1099);

        // The lone peak is scaled to 50 and loses a third from its flanking mean
        assert!((processed[95] - (50.0 - 1.0 / 3.0)).abs() < 1e-4);
        assert!((processed[94] - 24.5).abs() < 1e-4);
        assert!((processed[96] - 24.5).abs() < 1e-4);
        assert!((processed[20] + 0.5).abs() < 1e-4);
        assert_eq!(processed[0], 0.0);
        assert_eq!(processed[500], 0.0);
    }

    #[test]
    fn test_score() {
        let spec = ion_trap_spectrum(&[(95.0, 400.0)]);
        let engine = XCorr::new();
        let score = engine.score(Some(&spec), &[95.0, 94.0, 5000.0, -3.0]);
        let expected = ((50.0 - 1.0 / 3.0) + 24.5) * 0.005;
        assert!((score - expected).abs() < 1e-6, "{score} != {expected}");

        // No hidden state between calls
        assert_eq!(score, engine.score(Some(&spec), &[95.0, 94.0, 5000.0, -3.0]));
    }

    #[test]
    fn test_replacement_threshold() {
        // sqrt(8100) = 90 is louder than the stored 20 but does not exceed the stored m/z of 95
        let quiet = ion_trap_spectrum(&[(95.0, 400.0)]);
        let masked = ion_trap_spectrum(&[(95.0, 400.0), (95.2, 8100.0)]);
        let engine = XCorr::new();
        assert_eq!(
            engine.preprocess(&quiet, BinSettings::LOW_RES),
            engine.preprocess(&masked, BinSettings::LOW_RES)
        );
    }

    #[test]
    fn test_last_window_excluded() {
        // With the highest bin at 100 the ten windows of width 10 stop at bin 99
        let spec = ion_trap_spectrum(&[(95.0, 400.0), (100.0, 400.0)]);
        let engine = XCorr::new();
        let processed = engine.preprocess(&spec, BinSettings::LOW_RES);
        assert_eq!(BinSettings::LOW_RES.bin_of(100.0), 100);
        assert!(processed[95] > 49.0);
        assert!(processed[100] < 1.0);
    }

    #[test]
    fn test_non_msn_scores_zero() {
        let engine = XCorr::new();
        assert_eq!(engine.score(None, &[95.0]), 0.0);
        let mut spec = ion_trap_spectrum(&[(95.0, 400.0)]);
        spec.header.ms_level = 1;
        assert_eq!(engine.score(Some(&spec), &[95.0]), 0.0);
    }
}
