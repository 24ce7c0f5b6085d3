//! `novaio` reads mass spectrometry data files through indexed, random access readers
//! and scores MS/MS spectra against theoretical fragment ions with XCorr.
//!
//! The [`FileReader`](crate::io::FileReader) facade opens mzML, mzXML and, given a
//! [`RawDataProvider`](crate::io::RawDataProvider), Thermo RAW files by extension:
//!
//! ```no_run
//! use novaio::io::{FileReader, MsFilter};
//! use novaio::scoring::XCorr;
//!
//! let mut reader = FileReader::new();
//! reader.set_filter(MsFilter::MS2);
//! let engine = XCorr::new();
//! let spectrum = reader.read_spectrum_ex("./run.mzML", None, true);
//! let score = engine.score(Some(&spectrum), &[175.119, 304.161, 401.214]);
//! ```
pub mod io;
pub mod scoring;
pub mod spectrum;

pub use crate::io::{FileReader, MsFilter, MzMLReader, MzMLWriter, MzXMLReader, ReaderError};
pub use crate::scoring::XCorr;
pub use crate::spectrum::{Chromatogram, Peak, PeakEx, Spectrum, SpectrumEx};
