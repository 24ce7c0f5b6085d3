//! Scoring observed spectra against theoretical fragment ions.
pub mod xcorr;

pub use xcorr::{BinSettings, XCorr};
