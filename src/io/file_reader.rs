use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error};

use crate::io::filter::MsFilter;
use crate::io::infer_format::{infer_readable_format, MassSpectrometryFormat};
use crate::io::mzml::MzMLReader;
use crate::io::mzxml::MzXMLReader;
use crate::io::thermo::{RawProviderFactory, ThermoRawReader};
use crate::io::traits::{ReaderError, SpectrumFileReader};
use crate::spectrum::{Chromatogram, PeakRecord, Spectrum, SpectrumEx, SpectrumType};

/**
A single entry point over every supported format.

The reader for a file is chosen by its extension and opened lazily: each read
names the file it wants, and the facade reopens only when that name changes.
Reads never fail. Any error is logged and the empty sentinel is returned in
its place.

```no_run
use novaio::io::FileReader;

let mut reader = FileReader::new();
let first = reader.read_spectrum("run.mzML", None, true);
for spectrum in reader.iter() {
    println!("{} {}", spectrum.scan_number(), spectrum.count());
}
```
*/
#[derive(Default)]
pub struct FileReader {
    reader: Option<Box<dyn SpectrumFileReader>>,
    current_file: Option<PathBuf>,
    filter: MsFilter,
    raw_factory: Option<Arc<dyn RawProviderFactory>>,
}

impl Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("current_file", &self.current_file)
            .field("filter", &self.filter)
            .field("has_raw_factory", &self.raw_factory.is_some())
            .finish()
    }
}

impl FileReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory used to open `.raw` files
    pub fn with_raw_factory(mut self, factory: Arc<dyn RawProviderFactory>) -> Self {
        self.set_raw_factory(factory);
        self
    }

    pub fn set_raw_factory(&mut self, factory: Arc<dyn RawProviderFactory>) {
        self.raw_factory = Some(factory);
    }

    /// The path of the open file, if there is one
    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| r.is_open())
    }

    /**
    Decide whether reading from `name` requires opening a new file.

    An empty name refers to the file already open. Naming the open file again is not
    a reason to reopen it.
    */
    pub fn check_file<P: AsRef<Path>>(&self, name: P) -> Result<bool, ReaderError> {
        let name = name.as_ref();
        if name.as_os_str().is_empty() {
            return match self.current_file {
                Some(_) if self.is_open() => Ok(false),
                _ => Err(ReaderError::NoFileOpen),
            };
        }
        if self.is_open() && self.current_file.as_deref() == Some(name) {
            return Ok(false);
        }
        if !name.exists() {
            return Err(ReaderError::FileNotFound(name.to_path_buf()));
        }
        Ok(true)
    }

    fn make_reader(
        &self,
        format: MassSpectrometryFormat,
    ) -> Result<Box<dyn SpectrumFileReader>, ReaderError> {
        let reader: Box<dyn SpectrumFileReader> = match format {
            MassSpectrometryFormat::MzML => Box::new(MzMLReader::new(self.filter)),
            MassSpectrometryFormat::MzXML => Box::new(MzXMLReader::new(self.filter)),
            MassSpectrometryFormat::ThermoRaw => match self.raw_factory.clone() {
                Some(factory) => {
                    let mut reader = ThermoRawReader::with_factory(factory);
                    reader.set_filter(self.filter);
                    Box::new(reader)
                }
                None => return Err(ReaderError::UnsupportedFormat(format.to_string())),
            },
            form => return Err(ReaderError::UnsupportedFormat(form.to_string())),
        };
        Ok(reader)
    }

    /// Open `name` with the reader its extension calls for, closing any file already open
    pub fn open_spectrum_file<P: AsRef<Path>>(&mut self, name: P) -> Result<(), ReaderError> {
        let name = name.as_ref();
        self.close();
        let format = infer_readable_format(name)?;
        let mut reader = self.make_reader(format)?;
        reader.open(name)?;
        debug!("Opened {} as {}", name.display(), format);
        self.reader = Some(reader);
        self.current_file = Some(name.to_path_buf());
        Ok(())
    }

    fn active_reader<P: AsRef<Path>>(
        &mut self,
        name: P,
    ) -> Result<&mut Box<dyn SpectrumFileReader>, ReaderError> {
        let name = name.as_ref();
        if self.check_file(name)? {
            self.open_spectrum_file(name)?;
        }
        self.reader.as_mut().ok_or(ReaderError::NoFileOpen)
    }

    /**
    Read the next spectrum of `name`, or spectrum `scan` when one is given.

    Returns the empty spectrum when the scan is absent or filtered out, at the end
    of the run, and on any error.
    */
    pub fn read_spectrum<P: AsRef<Path>>(
        &mut self,
        name: P,
        scan: Option<u32>,
        centroid: bool,
    ) -> Spectrum {
        let result = self
            .active_reader(name.as_ref())
            .and_then(|reader| reader.get_spectrum(scan, centroid));
        unwrap_or_log(result, name.as_ref())
    }

    /// As [`FileReader::read_spectrum`], with extended peak records
    pub fn read_spectrum_ex<P: AsRef<Path>>(
        &mut self,
        name: P,
        scan: Option<u32>,
        centroid: bool,
    ) -> SpectrumEx {
        let result = self
            .active_reader(name.as_ref())
            .and_then(|reader| reader.get_spectrum_ex(scan, centroid));
        unwrap_or_log(result, name.as_ref())
    }

    /// Read the next chromatogram of `name`, or chromatogram `index` when one is given
    pub fn read_chromatogram<P: AsRef<Path>>(&mut self, name: P, index: Option<usize>) -> Chromatogram {
        let result = self
            .active_reader(name.as_ref())
            .and_then(|reader| reader.get_chromatogram(index));
        match result {
            Ok(chrom) => chrom,
            Err(e) => {
                error!(
                    "Failed to read a chromatogram from {}: {e}",
                    name.as_ref().display()
                );
                Chromatogram::empty()
            }
        }
    }

    pub fn filter(&self) -> MsFilter {
        self.filter
    }

    /// Set the MS levels to read, for the open file and any opened later
    pub fn set_filter(&mut self, filter: MsFilter) {
        self.filter = filter;
        if let Some(reader) = self.reader.as_mut() {
            reader.set_filter(filter);
        }
    }

    /// Rewind the open file so the next read starts at its first scan
    pub fn reset(&mut self) {
        if let Some(reader) = self.reader.as_mut() {
            reader.reset();
        }
    }

    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.close();
        }
        self.current_file = None;
    }

    /// Iterate over the open file's spectra from its first scan
    pub fn iter(&mut self) -> FileSpectrumIter<'_, crate::spectrum::Peak> {
        FileSpectrumIter::new(self)
    }

    /// As [`FileReader::iter`], with extended peak records
    pub fn iter_ex(&mut self) -> FileSpectrumIter<'_, crate::spectrum::PeakEx> {
        FileSpectrumIter::new(self)
    }

    fn read_next<P: ReadablePeak>(&mut self) -> SpectrumType<P> {
        P::read_from(self)
    }

    pub fn first_scan(&self) -> u32 {
        self.reader.as_ref().map(|r| r.first_scan()).unwrap_or_default()
    }

    pub fn last_scan(&self) -> u32 {
        self.reader.as_ref().map(|r| r.last_scan()).unwrap_or_default()
    }

    pub fn scan_count(&self) -> usize {
        self.reader.as_ref().map(|r| r.scan_count()).unwrap_or_default()
    }

    pub fn chromatogram_count(&self) -> usize {
        self.reader
            .as_ref()
            .map(|r| r.chromatogram_count())
            .unwrap_or_default()
    }

    pub fn max_retention_time(&self) -> f64 {
        self.reader
            .as_ref()
            .map(|r| r.max_retention_time())
            .unwrap_or_default()
    }

    pub fn current_scan(&self) -> u32 {
        self.reader.as_ref().map(|r| r.current_scan()).unwrap_or_default()
    }
}

fn unwrap_or_log<P: PeakRecord>(
    result: Result<SpectrumType<P>, ReaderError>,
    name: &Path,
) -> SpectrumType<P> {
    match result {
        Ok(spec) => spec,
        Err(e) => {
            error!("Failed to read a spectrum from {}: {e}", name.display());
            SpectrumType::empty()
        }
    }
}

/// The peak types the facade can read spectra of
pub trait ReadablePeak: PeakRecord {
    fn read_from(reader: &mut FileReader) -> SpectrumType<Self>;
}

impl ReadablePeak for crate::spectrum::Peak {
    fn read_from(reader: &mut FileReader) -> SpectrumType<Self> {
        reader.read_spectrum("", None, true)
    }
}

impl ReadablePeak for crate::spectrum::PeakEx {
    fn read_from(reader: &mut FileReader) -> SpectrumType<Self> {
        reader.read_spectrum_ex("", None, true)
    }
}

/**
Iterates over the spectra of the file open in a [`FileReader`].

The reader is rewound before the first spectrum and again once the run is
exhausted, so iterating a second time starts over.
*/
pub struct FileSpectrumIter<'a, P: ReadablePeak> {
    reader: &'a mut FileReader,
    started: bool,
    _p: std::marker::PhantomData<P>,
}

impl<'a, P: ReadablePeak> FileSpectrumIter<'a, P> {
    fn new(reader: &'a mut FileReader) -> Self {
        Self {
            reader,
            started: false,
            _p: std::marker::PhantomData,
        }
    }
}

impl<P: ReadablePeak> Iterator for FileSpectrumIter<'_, P> {
    type Item = SpectrumType<P>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.reader.reset();
            self.started = true;
        }
        let spec = self.reader.read_next::<P>();
        if spec.is_empty() {
            self.reader.reset();
            None
        } else {
            Some(spec)
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;
    use crate::io::test_fixtures::{synthetic_run, write_mzml, write_mzxml};
    use crate::spectrum::PeakEx;

    #[derive(Debug, Default, PartialEq)]
    struct Tally {
        total: usize,
        ms1: usize,
        ms2: usize,
        first_peaks: usize,
    }

    fn tally<P: ReadablePeak>(spectra: impl Iterator<Item = SpectrumType<P>>) -> Tally {
        let mut counts = Tally::default();
        for spec in spectra {
            if counts.total == 0 {
                counts.first_peaks = spec.count();
            }
            counts.total += 1;
            match spec.ms_level() {
                1 => counts.ms1 += 1,
                2 => counts.ms2 += 1,
                _ => {}
            }
        }
        counts
    }

    const EXPECTED: Tally = Tally {
        total: 314,
        ms1: 308,
        ms2: 6,
        first_peaks: 406,
    };

    fn check_run(path: &Path) {
        let mut reader = FileReader::new();
        let first = reader.read_spectrum(path, None, true);
        assert_eq!(first.scan_number(), 1);
        assert_eq!(reader.first_scan(), 1);
        assert_eq!(reader.last_scan(), 314);
        assert_eq!(reader.scan_count(), 314);
        assert!((reader.max_retention_time() - 314.0 * 0.05).abs() < 1e-6);

        assert_eq!(tally(reader.iter()), EXPECTED);
        // Iteration rewinds, so a second pass sees the same run
        assert_eq!(tally(reader.iter_ex()), EXPECTED);

        reader.set_filter(MsFilter::MS2);
        let dependent: Vec<u32> = reader.iter().map(|s| s.scan_number()).collect();
        assert_eq!(dependent, vec![51, 52, 151, 152, 251, 252]);

        let spec: SpectrumEx = reader.read_spectrum_ex("", Some(151), true);
        assert_eq!(spec.header.precursors.len(), 1);
        assert_eq!(spec.header.precursors[0].charge, 2);
        assert_eq!(spec.header.precursor_master_scan_number, 150);
        let _: &[PeakEx] = &spec.peaks;

        assert!(reader.read_spectrum("", Some(150), true).is_empty());
        reader.set_filter(MsFilter::all());
        assert_eq!(reader.read_spectrum("", Some(150), true).scan_number(), 150);
        assert!(reader.read_spectrum("", Some(315), true).is_empty());

        reader.close();
        assert!(!reader.is_open());
        assert!(reader.read_spectrum("", None, true).is_empty());
    }

    #[test_log::test]
    fn test_mzml_tally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.mzML");
        write_mzml(fs::File::create(&path).unwrap(), &synthetic_run()).unwrap();
        check_run(&path);
    }

    #[test_log::test]
    fn test_mzxml_tally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.mzXML");
        let mut buffer = Vec::new();
        write_mzxml(&mut buffer, &synthetic_run()).unwrap();
        fs::write(&path, buffer).unwrap();
        check_run(&path);
    }

    #[test_log::test]
    fn test_check_file() {
        let dir = tempfile::tempdir().unwrap();
        let reader = FileReader::new();
        assert!(matches!(reader.check_file(""), Err(ReaderError::NoFileOpen)));
        assert!(matches!(
            reader.check_file(dir.path().join("missing.mzML")),
            Err(ReaderError::FileNotFound(_))
        ));

        let path = dir.path().join("run.mzML");
        write_mzml(fs::File::create(&path).unwrap(), &synthetic_run()[..3]).unwrap();
        assert!(reader.check_file(&path).unwrap());

        let mut reader = FileReader::new();
        reader.open_spectrum_file(&path).unwrap();
        assert_eq!(reader.current_file(), Some(path.as_path()));
        assert!(!reader.check_file(&path).unwrap());
        assert!(!reader.check_file("").unwrap());
    }

    #[test_log::test]
    fn test_unreadable_formats() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = FileReader::new();
        for name in ["peaks.mgf", "run.raw", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        assert!(matches!(
            reader.open_spectrum_file(dir.path().join("peaks.mgf")),
            Err(ReaderError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            reader.open_spectrum_file(dir.path().join("run.raw")),
            Err(ReaderError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            reader.open_spectrum_file(dir.path().join("notes.txt")),
            Err(ReaderError::UnknownFormat(_))
        ));
        assert!(reader
            .read_spectrum(dir.path().join("notes.txt"), None, true)
            .is_empty());
        assert!(reader
            .read_chromatogram(dir.path().join("peaks.mgf"), None)
            .is_empty());
    }
}
