use std::fs;
use std::io::{self, prelude::*, BufReader, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, trace, warn};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Error as XMLError, Reader};
use thiserror::Error;

use crate::io::filter::MsFilter;
use crate::io::offset_index::ScanIndex;
use crate::io::traits::{ReaderError, ScanCursor, SpectrumFileReader};
use crate::io::xml_index::{IndexDialect, IndexError, IndexedXMLIndexExtractor};
use crate::spectrum::bindata::{self, BinaryDecodeError};
use crate::spectrum::{
    BinaryCompressionType, BinaryDataArrayType, ByteOrder, Chromatogram, FragmentationType, Peak,
    PeakRecord, PrecursorIon, ScanPolarity, Spectrum, SpectrumEx, SpectrumHeader, SpectrumType,
};

pub type Bytes = Vec<u8>;

const BUFFER_SIZE: usize = 10000;

/// The states the [`MzXMLReaderType`] passes through while parsing one `<scan>`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum MzXMLParserState {
    Start = 0,
    Scan,
    Peaks,
    PrecursorMz,
    ScanDone,
    ParserError,
    EOF,
}

/// All the ways mzXML parsing can go wrong
#[derive(Debug, Error)]
pub enum MzXMLParserError {
    #[error("An error occurred outside of normal conditions {0:?}")]
    UnknownError(MzXMLParserState),
    #[error("An incomplete scan was parsed, ending in {0:?}")]
    IncompleteElement(MzXMLParserState),
    #[error("The attribute {1} could not be read in {0:?}: {2:?}")]
    MalformedAttribute(MzXMLParserState, String, String),
    #[error("The text of {1} could not be read as a number in {0:?}: {2:?}")]
    MalformedText(MzXMLParserState, String, String),
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(MzXMLParserState, #[source] XMLError),
    #[error("Failed to decode the peaks in {0:?}: {1}")]
    ArrayDecodingError(MzXMLParserState, #[source] BinaryDecodeError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(MzXMLParserState, #[source] io::Error),
}

impl From<MzXMLParserError> for io::Error {
    fn from(value: MzXMLParserError) -> Self {
        match value {
            MzXMLParserError::IOError(_, ref e) => io::Error::new(e.kind(), value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type ParserResult = Result<MzXMLParserState, MzXMLParserError>;

/**
Convert an `xs:duration` such as `PT1M2.5S` to minutes.

Year and month designators have no fixed length and are rejected.
*/
pub fn parse_duration_minutes(text: &str) -> Option<f64> {
    let text = text.trim();
    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text),
    };
    let mut rest = text.strip_prefix('P')?;
    let mut seconds = 0.0;
    let mut in_time = false;
    let mut seen_any = false;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('T') {
            in_time = true;
            rest = after;
            continue;
        }
        let end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
        let value: f64 = rest[..end].parse().ok()?;
        let designator = rest[end..].chars().next()?;
        seconds += match (designator, in_time) {
            ('D', false) => value * 86400.0,
            ('H', true) => value * 3600.0,
            ('M', true) => value * 60.0,
            ('S', true) => value,
            _ => return None,
        };
        seen_any = true;
        rest = &rest[end + designator.len_utf8()..];
    }
    seen_any.then_some(sign * seconds / 60.0)
}

fn parse_attribute<T: FromStr>(
    name: &[u8],
    value: &str,
    state: MzXMLParserState,
) -> Result<T, MzXMLParserError> {
    value.trim().parse::<T>().map_err(|_| {
        MzXMLParserError::MalformedAttribute(
            state,
            String::from_utf8_lossy(name).to_string(),
            value.to_string(),
        )
    })
}

/// The encoding of the `<peaks>` element currently being read
#[derive(Debug, Default, Clone)]
pub struct PeaksContext {
    pub bit64: bool,
    pub zlib: bool,
    pub byte_order: ByteOrder,
    pub peaks_count: usize,
}

impl PeaksContext {
    fn dtype(&self) -> BinaryDataArrayType {
        if self.bit64 {
            BinaryDataArrayType::Float64
        } else {
            BinaryDataArrayType::Float32
        }
    }

    fn compression(&self) -> BinaryCompressionType {
        if self.zlib {
            BinaryCompressionType::Zlib
        } else {
            BinaryCompressionType::NoCompression
        }
    }

    /// Decode the interleaved (m/z, intensity) pairs
    fn decode(&self, encoded: &[u8]) -> Result<Vec<f64>, BinaryDecodeError> {
        bindata::decode_array(
            encoded,
            self.peaks_count.saturating_mul(2),
            self.dtype(),
            self.compression(),
            self.byte_order,
        )
    }
}

/// An accumulator for the attributes of a single `<scan>` element
#[derive(Debug, Default)]
pub struct MzXMLSpectrumBuilder<P: PeakRecord> {
    pub header: SpectrumHeader,
    pub peaks: Vec<P>,
    pub precursor: PrecursorIon,
    pub context: PeaksContext,
    /// The `precursorScanNum` of the precursor being read
    master_scan: Option<i32>,
}

impl<P: PeakRecord> MzXMLSpectrumBuilder<P> {
    fn start_scan(&mut self, event: &BytesStart, state: MzXMLParserState) -> ParserResult {
        let header = &mut self.header;
        header.polarity = ScanPolarity::Positive;
        for attr_parsed in event.attributes() {
            let attr = attr_parsed.map_err(|e| MzXMLParserError::XMLError(state, e.into()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| MzXMLParserError::XMLError(state, e))?;
            let key = attr.key.as_ref();
            match key {
                b"num" => header.scan_number = parse_attribute(key, &value, state)?,
                b"centroided" => header.centroid = value.starts_with('1'),
                b"msLevel" => header.ms_level = parse_attribute(key, &value, state)?,
                b"peaksCount" => {
                    self.context.peaks_count = parse_attribute(key, &value, state)?;
                }
                b"polarity" => {
                    if value.starts_with('-') {
                        header.polarity = ScanPolarity::Negative;
                    }
                }
                b"retentionTime" => {
                    header.retention_time = parse_duration_minutes(&value).ok_or_else(|| {
                        MzXMLParserError::MalformedAttribute(
                            state,
                            "retentionTime".into(),
                            value.to_string(),
                        )
                    })?;
                }
                b"lowMz" => header.lowest_mz = parse_attribute(key, &value, state)?,
                b"highMz" => header.highest_mz = parse_attribute(key, &value, state)?,
                b"startMz" => header.start_mz = parse_attribute(key, &value, state)?,
                b"endMz" => header.end_mz = parse_attribute(key, &value, state)?,
                b"basePeakMz" => header.base_peak_mz = parse_attribute(key, &value, state)?,
                b"basePeakIntensity" => {
                    header.base_peak_intensity = parse_attribute(key, &value, state)?
                }
                b"totIonCurrent" => {
                    header.total_ion_current = parse_attribute(key, &value, state)?
                }
                b"filterLine" => header.scan_filter = value.to_string(),
                _ => {}
            }
        }
        if header.scan_filter.contains("FTMS") {
            header.analyzer = "FTMS".into();
        } else if header.scan_filter.contains("ITMS") {
            header.analyzer = "ITMS".into();
        }
        self.peaks.clear();
        header.precursors.clear();
        Ok(MzXMLParserState::Scan)
    }

    fn start_peaks(&mut self, event: &BytesStart, state: MzXMLParserState) -> ParserResult {
        self.context.bit64 = false;
        self.context.zlib = false;
        self.context.byte_order = ByteOrder::BigEndian;
        for attr_parsed in event.attributes() {
            let attr = attr_parsed.map_err(|e| MzXMLParserError::XMLError(state, e.into()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| MzXMLParserError::XMLError(state, e))?;
            match attr.key.as_ref() {
                b"precision" => self.context.bit64 = value == "64",
                b"compressionType" => self.context.zlib = value == "zlib",
                b"byteOrder" => {
                    if value == "little" {
                        self.context.byte_order = ByteOrder::LittleEndian;
                    }
                }
                _ => {}
            }
        }
        Ok(MzXMLParserState::Peaks)
    }

    fn start_precursor(&mut self, event: &BytesStart, state: MzXMLParserState) -> ParserResult {
        self.precursor = PrecursorIon::default();
        self.master_scan = None;
        for attr_parsed in event.attributes() {
            let attr = attr_parsed.map_err(|e| MzXMLParserError::XMLError(state, e.into()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| MzXMLParserError::XMLError(state, e))?;
            let key = attr.key.as_ref();
            match key {
                b"precursorScanNum" => {
                    self.master_scan = Some(parse_attribute(key, &value, state)?)
                }
                b"precursorIntensity" => {
                    self.precursor.intensity = parse_attribute(key, &value, state)?
                }
                b"precursorCharge" => {
                    if !value.trim().is_empty() {
                        self.precursor.charge = parse_attribute(key, &value, state)?;
                    }
                }
                b"activationMethod" => match &*value {
                    "HCD" => self.precursor.fragmentation_method = FragmentationType::HCD,
                    "CID" => self.precursor.fragmentation_method = FragmentationType::CID,
                    "ETD" => self.precursor.fragmentation_method = FragmentationType::ETD,
                    other => trace!("Unmapped activation method {other}"),
                },
                b"windowWideness" => {
                    if !value.trim().is_empty() {
                        self.precursor.isolation_width = parse_attribute(key, &value, state)?;
                    }
                }
                _ => {}
            }
        }
        Ok(MzXMLParserState::PrecursorMz)
    }

    pub fn start_element(&mut self, event: &BytesStart, state: MzXMLParserState) -> ParserResult {
        match event.name().as_ref() {
            b"scan" => {
                if state == MzXMLParserState::Start {
                    self.start_scan(event, state)
                } else {
                    // A nested scan belongs to the next entry of the index
                    Ok(MzXMLParserState::ScanDone)
                }
            }
            b"peaks" => self.start_peaks(event, state),
            b"precursorMz" => self.start_precursor(event, state),
            _ => Ok(state),
        }
    }

    pub fn end_element(&mut self, event: &BytesEnd, state: MzXMLParserState) -> ParserResult {
        match event.name().as_ref() {
            b"scan" => Ok(MzXMLParserState::ScanDone),
            b"peaks" | b"precursorMz" => Ok(MzXMLParserState::Scan),
            _ => Ok(state),
        }
    }

    pub fn text(&mut self, event: &BytesText, state: MzXMLParserState) -> ParserResult {
        match state {
            MzXMLParserState::Peaks => {
                if self.context.peaks_count == 0 {
                    return Ok(state);
                }
                let values = self
                    .context
                    .decode(event)
                    .map_err(|e| MzXMLParserError::ArrayDecodingError(state, e))?;
                if self.peaks.len() < values.len() / 2 {
                    self.peaks.resize(values.len() / 2, P::default());
                }
                for (peak, pair) in self.peaks.iter_mut().zip(values.chunks_exact(2)) {
                    peak.set_mz(pair[0]);
                    peak.set_intensity(pair[1] as f32);
                }
                Ok(state)
            }
            MzXMLParserState::PrecursorMz => {
                let text = event
                    .unescape()
                    .map_err(|e| MzXMLParserError::XMLError(state, e))?;
                let mz: f64 = text.trim().parse().map_err(|_| {
                    MzXMLParserError::MalformedText(
                        state,
                        "precursorMz".into(),
                        text.to_string(),
                    )
                })?;
                let mut precursor = std::mem::take(&mut self.precursor);
                precursor.isolation_mz = mz;
                if precursor.charge != 0 {
                    precursor.monoisotopic_mz = mz;
                }
                if let Some(master) = self.master_scan.take() {
                    self.header.precursor_master_scan_number = master;
                }
                self.header.precursors.push(precursor);
                Ok(state)
            }
            _ => Ok(state),
        }
    }

    pub fn into_spectrum(self) -> SpectrumType<P> {
        SpectrumType::new(self.header, self.peaks)
    }
}

/**
An indexed mzXML reader that addresses scans by their `num`.

mzXML nests dependent scans inside their parent scan, so each read stops at the
first nested `<scan>` and each nested scan is reached through its own index entry.
*/
pub struct MzXMLReaderType<R: Read + Seek> {
    pub state: MzXMLParserState,
    handle: Option<BufReader<R>>,
    pub spectrum_index: ScanIndex,
    cursor: ScanCursor,
    filter: MsFilter,
    max_retention_time: f64,
    buffer: Bytes,
}

/// An mzXML reader over a file on disk
pub type MzXMLReader = MzXMLReaderType<fs::File>;

impl<R: Read + Seek> Default for MzXMLReaderType<R> {
    fn default() -> Self {
        Self::new(MsFilter::default())
    }
}

impl<R: Read + Seek> MzXMLReaderType<R> {
    pub fn new(filter: MsFilter) -> Self {
        Self {
            state: MzXMLParserState::Start,
            handle: None,
            spectrum_index: ScanIndex::new("scan".into()),
            cursor: ScanCursor::default(),
            filter,
            max_retention_time: 0.0,
            buffer: Bytes::with_capacity(BUFFER_SIZE),
        }
    }

    /// Create a reader over an already opened stream
    pub fn from_reader(file: R) -> Result<Self, ReaderError> {
        let mut this = Self::default();
        this.attach(file, PathBuf::new())?;
        Ok(this)
    }

    /// Take ownership of `file`, read its index and find the run's maximum retention time
    pub fn attach(&mut self, file: R, source: PathBuf) -> Result<(), ReaderError> {
        self.close_handle();
        let mut handle = BufReader::with_capacity(BUFFER_SIZE, file);
        let (spectrum_index, _) = match IndexedXMLIndexExtractor::new(IndexDialect::MzXML)
            .read_index_from_end(&mut handle)
        {
            Ok(indices) => indices,
            Err(IndexError::IOError(e)) => return Err(ReaderError::IOError(e)),
            Err(e) => return Err(ReaderError::NoIndex(source, e)),
        };
        self.handle = Some(handle);
        self.spectrum_index = spectrum_index;

        let last = self.read_scan::<Peak>(self.spectrum_index.last_scan)?;
        self.max_retention_time = last.header.retention_time;
        debug!(
            "Opened mzXML with {} scans ending at {:0.3} minutes",
            self.spectrum_index.scan_count(),
            self.max_retention_time
        );
        self.cursor.reset();
        Ok(())
    }

    fn close_handle(&mut self) {
        self.handle = None;
        self.spectrum_index = ScanIndex::new("scan".into());
        self.cursor = ScanCursor::default();
        self.max_retention_time = 0.0;
        self.state = MzXMLParserState::Start;
    }

    /// Parse the scan stored under `scan`. A scan missing from the index is empty.
    pub fn read_scan<P: PeakRecord>(
        &mut self,
        scan: u32,
    ) -> Result<SpectrumType<P>, MzXMLParserError> {
        let offset = match self.spectrum_index.get(scan) {
            Some(offset) => offset,
            None => return Ok(SpectrumType::empty()),
        };
        let handle = match self.handle.as_mut() {
            Some(handle) => handle,
            None => return Err(MzXMLParserError::UnknownError(self.state)),
        };
        handle
            .seek(SeekFrom::Start(offset))
            .map_err(|e| MzXMLParserError::IOError(self.state, e))?;

        let mut builder = MzXMLSpectrumBuilder::<P>::default();
        self.state = MzXMLParserState::Start;
        let mut reader = Reader::from_reader(handle);
        reader.trim_text(true);
        self.buffer.clear();
        loop {
            let outcome = match reader.read_event_into(&mut self.buffer) {
                Ok(Event::Start(ref e)) => builder.start_element(e, self.state),
                Ok(Event::Empty(ref e)) => match builder.start_element(e, self.state) {
                    // An empty <peaks/> or <precursorMz/> has no text to wait for
                    Ok(MzXMLParserState::Peaks | MzXMLParserState::PrecursorMz) => {
                        Ok(MzXMLParserState::Scan)
                    }
                    Ok(MzXMLParserState::Scan) if self.state == MzXMLParserState::Start => {
                        Ok(MzXMLParserState::ScanDone)
                    }
                    other => other,
                },
                Ok(Event::End(ref e)) => builder.end_element(e, self.state),
                Ok(Event::Text(ref e)) => builder.text(e, self.state),
                Ok(Event::Eof) => {
                    self.state = MzXMLParserState::EOF;
                    return Err(MzXMLParserError::IncompleteElement(self.state));
                }
                Err(quick_xml::Error::Io(e)) => Err(MzXMLParserError::IOError(
                    self.state,
                    io::Error::new(e.kind(), e.to_string()),
                )),
                Err(err) => Err(MzXMLParserError::XMLError(self.state, err)),
                _ => Ok(self.state),
            };
            match outcome {
                Ok(state) => self.state = state,
                Err(err) => {
                    self.state = MzXMLParserState::ParserError;
                    return Err(err);
                }
            }
            if self.state == MzXMLParserState::ScanDone {
                break;
            }
            self.buffer.clear();
        }
        self.buffer.clear();
        Ok(builder.into_spectrum())
    }

    fn read_next_matching<P: PeakRecord>(
        &mut self,
        scan: Option<u32>,
    ) -> Result<SpectrumType<P>, ReaderError> {
        if self.handle.is_none() {
            return Err(ReaderError::NotOpen);
        }
        let mut cursor = self.cursor;
        let last_scan = self.spectrum_index.last_scan;
        let filter = self.filter;
        let result = cursor.next_matching(scan, last_scan, filter, |n| self.read_scan::<P>(n));
        self.cursor = cursor;
        Ok(result?)
    }

    /// Iterate over the spectra passing the filter, starting after the current scan
    pub fn iter(&mut self) -> SpectrumIter<'_, R> {
        SpectrumIter { reader: self }
    }
}

/// A borrowing iterator over the spectra of an [`MzXMLReaderType`]
pub struct SpectrumIter<'a, R: Read + Seek> {
    reader: &'a mut MzXMLReaderType<R>,
}

impl<R: Read + Seek> Iterator for SpectrumIter<'_, R> {
    type Item = Spectrum;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_next_matching::<Peak>(None) {
            Ok(spec) if !spec.is_empty() => Some(spec),
            Ok(_) => None,
            Err(e) => {
                warn!("Stopping mzXML iteration: {e}");
                None
            }
        }
    }
}

impl SpectrumFileReader for MzXMLReaderType<fs::File> {
    fn open(&mut self, path: &Path) -> Result<(), ReaderError> {
        let file = fs::File::open(path)?;
        self.attach(file, path.to_path_buf())
    }

    fn close(&mut self) {
        self.close_handle();
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn get_spectrum(&mut self, scan: Option<u32>, _centroid: bool) -> Result<Spectrum, ReaderError> {
        self.read_next_matching(scan)
    }

    fn get_spectrum_ex(
        &mut self,
        scan: Option<u32>,
        _centroid: bool,
    ) -> Result<SpectrumEx, ReaderError> {
        self.read_next_matching(scan)
    }

    /// mzXML does not store chromatograms
    fn get_chromatogram(&mut self, _index: Option<usize>) -> Result<Chromatogram, ReaderError> {
        Ok(Chromatogram::empty())
    }

    fn filter(&self) -> MsFilter {
        self.filter
    }

    fn set_filter(&mut self, filter: MsFilter) {
        self.filter = filter;
    }

    fn first_scan(&self) -> u32 {
        self.spectrum_index.first_scan
    }

    fn last_scan(&self) -> u32 {
        self.spectrum_index.last_scan
    }

    fn scan_count(&self) -> usize {
        self.spectrum_index.scan_count()
    }

    fn chromatogram_count(&self) -> usize {
        0
    }

    fn max_retention_time(&self) -> f64 {
        self.max_retention_time
    }

    fn current_scan(&self) -> u32 {
        self.cursor.current
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::test_fixtures::{assign_master_scans, synthetic_spectrum, write_mzxml};

    fn make_document() -> io::Cursor<Vec<u8>> {
        let mut spectra: Vec<Spectrum> = [(1, 1), (2, 2), (3, 2), (4, 1), (5, 2)]
            .into_iter()
            .map(|(scan, level)| synthetic_spectrum(scan, level, 4))
            .collect();
        assign_master_scans(&mut spectra);
        let mut buffer = Vec::new();
        write_mzxml(&mut buffer, &spectra).unwrap();
        io::Cursor::new(buffer)
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_minutes("PT90S"), Some(1.5));
        assert_eq!(parse_duration_minutes("PT1M30S"), Some(1.5));
        assert_eq!(parse_duration_minutes("PT1H"), Some(60.0));
        assert_eq!(parse_duration_minutes("P1DT0S"), Some(1440.0));
        assert_eq!(parse_duration_minutes("-PT30S"), Some(-0.5));
        assert_eq!(parse_duration_minutes("PT"), None);
        assert_eq!(parse_duration_minutes("P1Y"), None);
        assert_eq!(parse_duration_minutes("12.5"), None);
    }

    #[test_log::test]
    fn test_index_and_nested_scans() {
        let mut reader = MzXMLReaderType::from_reader(make_document()).unwrap();
        assert_eq!(reader.spectrum_index.first_scan, 1);
        assert_eq!(reader.spectrum_index.last_scan, 5);
        assert_eq!(reader.spectrum_index.scan_count(), 5);

        // Scan 1 encloses scans 2 and 3 but must not absorb their peaks
        let parent: Spectrum = reader.read_scan(1).unwrap();
        let expected = synthetic_spectrum(1, 1, 4);
        assert_eq!(parent.ms_level(), 1);
        assert_eq!(parent.count(), 4);
        assert!(parent.header.precursors.is_empty());
        for (a, b) in parent.peaks.iter().zip(expected.peaks.iter()) {
            assert_eq!(a.mz, b.mz);
            assert_eq!(a.intensity, b.intensity);
        }

        let child: SpectrumEx = reader.read_scan(3).unwrap();
        let expected = synthetic_spectrum(3, 2, 4);
        assert_eq!(child.scan_number(), 3);
        assert_eq!(child.header.precursor_master_scan_number, 1);
        assert_eq!(child.header.precursors.len(), 1);
        let prec = &child.header.precursors[0];
        assert_eq!(prec.isolation_mz, expected.header.precursors[0].isolation_mz);
        assert_eq!(prec.charge, 2);
        assert_eq!(prec.monoisotopic_mz, prec.isolation_mz);
        assert_eq!(prec.fragmentation_method, FragmentationType::HCD);
        assert!((child.header.retention_time - expected.header.retention_time).abs() < 1e-6);
        assert_eq!(child.header.analyzer, "FTMS");
        assert_eq!(child.peaks[3].mz, expected.peaks[3].mz);
    }

    #[test_log::test]
    fn test_filter_and_bounds() {
        let mut reader = MzXMLReaderType::from_reader(make_document()).unwrap();
        assert!((reader.max_retention_time - synthetic_spectrum(5, 2, 4).header.retention_time).abs() < 1e-6);
        reader.filter = MsFilter::MS1;
        let scans: Vec<u32> = reader.iter().map(|s| s.scan_number()).collect();
        assert_eq!(scans, vec![1, 4]);
        assert_eq!(reader.cursor.current, 6);

        reader.cursor.reset();
        let spec: Spectrum = reader.read_next_matching(Some(2)).unwrap();
        assert!(spec.is_empty());
        let spec: Spectrum = reader.read_next_matching(None).unwrap();
        assert_eq!(spec.scan_number(), 4);
    }

    #[test]
    fn test_little_endian_peaks() {
        let mut builder = MzXMLSpectrumBuilder::<Peak>::default();
        builder.context.peaks_count = 2;
        builder.peaks = vec![Peak::default(); 2];
        builder.context.byte_order = ByteOrder::LittleEndian;
        builder.context.bit64 = true;
        let encoded = bindata::encode_array(
            &[100.5, 10.0, 200.25, 20.0],
            BinaryDataArrayType::Float64,
            BinaryCompressionType::NoCompression,
            ByteOrder::LittleEndian,
        )
        .unwrap();
        let text = BytesText::from_escaped(String::from_utf8(encoded).unwrap());
        builder.text(&text, MzXMLParserState::Peaks).unwrap();
        assert_eq!(builder.peaks[1], Peak::new(200.25, 20.0));
    }
}
