use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::io::filter::MsFilter;
use crate::io::mzml::MzMLParserError;
use crate::io::mzxml::MzXMLParserError;
use crate::io::xml_index::IndexError;
use crate::spectrum::{Chromatogram, PeakRecord, Spectrum, SpectrumEx, SpectrumType};

/// Errors that may occur while opening a file or reading from it
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("An I/O error occurred: {0}")]
    IOError(#[from] io::Error),
    #[error("No offset index could be read from {0}: {1}")]
    NoIndex(PathBuf, #[source] IndexError),
    #[error("No file is open")]
    NotOpen,
    #[error("The file {0} does not exist")]
    FileNotFound(PathBuf),
    #[error("No file name was given and no file is open")]
    NoFileOpen,
    #[error("Could not determine the format of {0}")]
    UnknownFormat(PathBuf),
    #[error("The {0} format is not supported")]
    UnsupportedFormat(String),
    #[error("Failed to parse mzML: {0}")]
    MzMLError(#[from] MzMLParserError),
    #[error("Failed to parse mzXML: {0}")]
    MzXMLError(#[from] MzXMLParserError),
}

impl From<ReaderError> for io::Error {
    fn from(value: ReaderError) -> Self {
        let s = value.to_string();
        match value {
            ReaderError::IOError(e) => e,
            ReaderError::FileNotFound(_) => io::Error::new(io::ErrorKind::NotFound, s),
            ReaderError::NotOpen | ReaderError::NoFileOpen => {
                io::Error::new(io::ErrorKind::Other, s)
            }
            ReaderError::UnknownFormat(_) | ReaderError::UnsupportedFormat(_) => {
                io::Error::new(io::ErrorKind::Unsupported, s)
            }
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/**
The position of a reader within its run.

`current` is the scan number most recently visited, 0 before the first read. The
chromatogram position is tracked independently and starts before the first entry.
*/
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub current: u32,
    pub chromatogram: Option<usize>,
}

impl ScanCursor {
    /// Rewind the scan position. The chromatogram position is left alone.
    pub fn reset(&mut self) {
        self.current = 0;
    }

    /**
    Move to the requested scan and read it with `parse`, applying `filter`.

    With `scan == None` the cursor advances by one and keeps advancing past scans that
    fail the filter or fail to parse. With an explicit scan number, a scan failing the
    filter yields the empty spectrum and a parse failure is returned. Either way, moving
    beyond `last_scan` yields the empty spectrum.
    */
    pub fn next_matching<P: PeakRecord, E, F>(
        &mut self,
        scan: Option<u32>,
        last_scan: u32,
        filter: MsFilter,
        mut parse: F,
    ) -> Result<SpectrumType<P>, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<SpectrumType<P>, E>,
    {
        let pinned = scan.is_some();
        match scan {
            Some(scan) => self.current = scan,
            None => self.current = self.current.saturating_add(1),
        }
        loop {
            if self.current > last_scan {
                return Ok(SpectrumType::empty());
            }
            let spectrum = match parse(self.current) {
                Ok(spectrum) => spectrum,
                Err(e) if pinned => return Err(e),
                Err(e) => {
                    warn!("Skipping scan {}: {e}", self.current);
                    self.current += 1;
                    continue;
                }
            };
            if filter.accepts(spectrum.ms_level()) {
                return Ok(spectrum);
            }
            if pinned {
                return Ok(SpectrumType::empty());
            }
            self.current += 1;
        }
    }

    /// Move the chromatogram position, returning it if it addresses one of `count` entries
    pub fn next_chromatogram(&mut self, index: Option<usize>, count: usize) -> Option<usize> {
        let position = match index {
            Some(i) => i,
            None => self.chromatogram.map(|i| i + 1).unwrap_or_default(),
        };
        self.chromatogram = Some(position);
        (position < count).then_some(position)
    }
}

/**
The common interface of every indexed spectrum file reader.

Reading never fails because a scan is filtered out or absent: those cases
return the empty sentinel, whose scan number is 0. Errors are reserved for
I/O and decoding failures.
*/
pub trait SpectrumFileReader {
    /// Open `path` and build its scan index, replacing any file already open
    fn open(&mut self, path: &Path) -> Result<(), ReaderError>;

    /// Release the underlying file. Closing twice is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Rewind the scan cursor so the next read without a scan number starts over
    fn reset(&mut self);

    /// Read the next spectrum, or spectrum `scan` when one is given
    fn get_spectrum(&mut self, scan: Option<u32>, centroid: bool) -> Result<Spectrum, ReaderError>;

    /// As [`SpectrumFileReader::get_spectrum`], with extended peak records
    fn get_spectrum_ex(
        &mut self,
        scan: Option<u32>,
        centroid: bool,
    ) -> Result<SpectrumEx, ReaderError>;

    /// Read the next chromatogram, or chromatogram `index` when one is given
    fn get_chromatogram(&mut self, index: Option<usize>) -> Result<Chromatogram, ReaderError>;

    fn filter(&self) -> MsFilter;

    fn set_filter(&mut self, filter: MsFilter);

    fn first_scan(&self) -> u32;

    fn last_scan(&self) -> u32;

    /// The number of scans present in the file
    fn scan_count(&self) -> usize;

    fn chromatogram_count(&self) -> usize;

    /// The retention time of the last scan, in minutes
    fn max_retention_time(&self) -> f64;

    /// The scan number most recently visited
    fn current_scan(&self) -> u32;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::Spectrum;

    fn fake_scan(scan: u32) -> Result<Spectrum, ReaderError> {
        let mut spec = Spectrum::empty();
        // Scan 4 is missing from this run
        if scan != 4 {
            spec.header.scan_number = scan;
            spec.header.ms_level = if scan % 3 == 0 { 2 } else { 1 };
        }
        Ok(spec)
    }

    #[test]
    fn test_advance_with_filter() {
        let mut cursor = ScanCursor::default();
        let mut seen = Vec::new();
        loop {
            let spec = cursor
                .next_matching(None, 10, MsFilter::MS2, fake_scan)
                .unwrap();
            if spec.is_empty() {
                break;
            }
            seen.push(spec.scan_number());
        }
        assert_eq!(seen, vec![3, 6, 9]);
        assert_eq!(cursor.current, 11);
    }

    #[test]
    fn test_pinned_miss() {
        let mut cursor = ScanCursor::default();
        let spec = cursor
            .next_matching(Some(2), 10, MsFilter::MS2, fake_scan)
            .unwrap();
        assert!(spec.is_empty());
        assert_eq!(cursor.current, 2);

        let spec = cursor
            .next_matching(Some(4), 10, MsFilter::all(), fake_scan)
            .unwrap();
        assert!(spec.is_empty());

        let spec = cursor
            .next_matching(None, 10, MsFilter::all(), fake_scan)
            .unwrap();
        assert_eq!(spec.scan_number(), 5);

        let spec = cursor
            .next_matching(Some(11), 10, MsFilter::all(), fake_scan)
            .unwrap();
        assert!(spec.is_empty());
    }

    #[test_log::test]
    fn test_unreadable_scan_skipped() {
        let parse = |scan: u32| -> Result<Spectrum, ReaderError> {
            if scan == 3 {
                Err(ReaderError::NotOpen)
            } else {
                fake_scan(scan)
            }
        };
        let mut cursor = ScanCursor::default();
        let mut seen = Vec::new();
        loop {
            let spec = cursor
                .next_matching(None, 6, MsFilter::all(), parse)
                .unwrap();
            if spec.is_empty() {
                break;
            }
            seen.push(spec.scan_number());
        }
        assert_eq!(seen, vec![1, 2, 5, 6]);

        assert!(cursor
            .next_matching(Some(3), 6, MsFilter::all(), parse)
            .is_err());
        assert_eq!(cursor.current, 3);
        let spec = cursor
            .next_matching(None, 6, MsFilter::all(), parse)
            .unwrap();
        assert_eq!(spec.scan_number(), 5);
    }

    #[test]
    fn test_chromatogram_cursor() {
        let mut cursor = ScanCursor::default();
        assert_eq!(cursor.next_chromatogram(None, 2), Some(0));
        assert_eq!(cursor.next_chromatogram(None, 2), Some(1));
        assert_eq!(cursor.next_chromatogram(None, 2), None);
        cursor.reset();
        assert_eq!(cursor.chromatogram, Some(2));
        assert_eq!(cursor.next_chromatogram(Some(0), 2), Some(0));
    }
}
