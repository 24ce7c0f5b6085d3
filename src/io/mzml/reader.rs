use std::fs;
use std::io::{self, prelude::*, BufReader, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, trace, warn};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Reader;

use super::reading_shared::{
    get_attribute, get_numeric_attribute, CVParamParse, ControlledVocabulary, MzMLParserError,
    MzMLParserState, MzMLSAX, Param, ParserResult, XMLParseBase,
};
use crate::io::filter::MsFilter;
use crate::io::offset_index::{OffsetIndex, ScanIndex};
use crate::io::traits::{ReaderError, ScanCursor, SpectrumFileReader};
use crate::io::xml_index::{
    scan_number_from_native_id, IndexDialect, IndexError, IndexedXMLIndexExtractor,
};
use crate::spectrum::bindata::{self, BinaryDecodeError};
use crate::spectrum::{
    ArrayType, BinaryCompressionType, BinaryDataArrayType, ByteOrder, Chromatogram,
    FragmentationType, Peak, PeakRecord, PrecursorIon, ScanPolarity,
    Spectrum, SpectrumEx, SpectrumHeader, SpectrumType,
};

pub type Bytes = Vec<u8>;

const BUFFER_SIZE: usize = 10000;

/// The unit accession of `second`. Times in seconds are converted to minutes.
const UNIT_SECOND: &str = "UO:0000010";

/// The user parameter Thermo converters emit when a trusted monoisotopic m/z exists
const MONOISOTOPIC_MZ_TRAILER: &str = "[Thermo Trailer Extra]Monoisotopic M/Z:";

/**
The state threaded through the parse of one `<spectrum>` or `<chromatogram>`.

Every `<binaryDataArray>` starts from 32-bit, uncompressed, unknown-kind defaults
that its own `<cvParam>` children then refine.
*/
#[derive(Debug, Default, Clone)]
pub struct ParserContext {
    pub bit64: bool,
    pub zlib: bool,
    pub array_type: ArrayType,
    pub encoded_length: usize,
    pub has_mono_mz: bool,
    pub default_array_length: usize,
}

impl ParserContext {
    fn start_array(&mut self, encoded_length: usize) {
        self.bit64 = false;
        self.zlib = false;
        self.array_type = ArrayType::Unknown;
        self.encoded_length = encoded_length;
    }

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

    fn decode(&self, encoded: &[u8]) -> Result<Vec<f64>, BinaryDecodeError> {
        if self.encoded_length > 0 && self.encoded_length != encoded.len() {
            trace!(
                "Binary array length {} differs from declared encodedLength {}",
                encoded.len(),
                self.encoded_length
            );
        }
        bindata::decode_array(
            encoded,
            self.default_array_length,
            self.dtype(),
            self.compression(),
            ByteOrder::LittleEndian,
        )
    }

    /// Apply the binary array descriptors. Returns `false` if `param` is not one of them.
    fn fill_array_param(&mut self, param: &Param) -> bool {
        match param.accession {
            Some(1000514) => self.array_type = ArrayType::MZArray,
            Some(1000515) => self.array_type = ArrayType::IntensityArray,
            Some(1000595) => self.array_type = ArrayType::TimeArray,
            Some(1000521) => self.bit64 = false,
            Some(1000523) => self.bit64 = true,
            Some(1000574) => self.zlib = true,
            _ => return false,
        }
        true
    }
}

/// An accumulator for the attributes of a spectrum as it is read from an
/// mzML document.
#[derive(Debug, Default)]
pub struct MzMLSpectrumBuilder<P: PeakRecord> {
    pub header: SpectrumHeader,
    pub peaks: Vec<P>,
    pub precursor: PrecursorIon,
    pub context: ParserContext,
}

impl<P: PeakRecord> XMLParseBase for MzMLSpectrumBuilder<P> {}
impl<P: PeakRecord> CVParamParse for MzMLSpectrumBuilder<P> {}

impl<P: PeakRecord> MzMLSpectrumBuilder<P> {
    /// Create a builder for the spectrum indexed under `scan_number`, used when the
    /// spectrum's native ID does not carry a scan number of its own
    pub fn new(scan_number: u32) -> Self {
        let mut this = Self::default();
        this.header.scan_number = scan_number;
        this
    }

    pub fn fill_param(&mut self, param: Param, state: MzMLParserState) -> Result<(), MzMLParserError> {
        if !matches!(param.controlled_vocabulary, Some(ControlledVocabulary::MS)) {
            return Ok(());
        }
        if self.context.fill_array_param(&param) {
            return Ok(());
        }
        let header = &mut self.header;
        match param.accession {
            Some(1000016) => {
                let mut rt: f64 = param.coerce(state)?;
                if param.unit_accession.as_deref() == Some(UNIT_SECOND) {
                    rt /= 60.0;
                }
                header.retention_time = rt;
            }
            Some(1000041) => self.precursor.charge = param.coerce(state)?,
            Some(1000045) => {
                let energy = param.coerce(state)?;
                self.precursor.collision_energy = energy;
                header.collision_energy = energy;
            }
            Some(1000127) => header.centroid = true,
            Some(1000129) => header.polarity = ScanPolarity::Negative,
            Some(1000130) => header.polarity = ScanPolarity::Positive,
            Some(1000133) => self.precursor.fragmentation_method = FragmentationType::CID,
            Some(1000285) => header.total_ion_current = param.coerce(state)?,
            Some(1000421) | Some(1000422) => {
                self.precursor.fragmentation_method = FragmentationType::HCD
            }
            Some(1000500) => header.end_mz = param.coerce(state)?,
            Some(1000501) => header.start_mz = param.coerce(state)?,
            Some(1000504) => header.base_peak_mz = param.coerce(state)?,
            Some(1000505) => header.base_peak_intensity = param.coerce(state)?,
            Some(1000511) => header.ms_level = param.coerce(state)?,
            Some(1000512) => {
                if param.value.contains("FTMS") {
                    header.analyzer = "FTMS".into();
                } else if param.value.contains("ITMS") {
                    header.analyzer = "ITMS".into();
                }
                header.scan_filter = param.value;
            }
            Some(1000527) => header.highest_mz = param.coerce(state)?,
            Some(1000528) => header.lowest_mz = param.coerce(state)?,
            Some(1000598) => self.precursor.fragmentation_method = FragmentationType::ETD,
            Some(1000599) => self.precursor.fragmentation_method = FragmentationType::PQD,
            Some(1000744) => {
                // Converters may fill the selected ion with the isolation target when no
                // monoisotopic peak was assigned
                if self.context.has_mono_mz {
                    self.precursor.monoisotopic_mz = param.coerce(state)?;
                }
            }
            Some(1000827) => self.precursor.isolation_mz = param.coerce(state)?,
            Some(1000828) | Some(1000829) => {
                self.precursor.isolation_width += param.coerce::<f64>(state)?
            }
            Some(1000927) => header.ion_injection_time += param.coerce::<f64>(state)?,
            _ => {}
        }
        Ok(())
    }

    fn fill_user_param(&mut self, param: Param, state: MzMLParserState) -> Result<(), MzMLParserError> {
        if param.name == MONOISOTOPIC_MZ_TRAILER {
            let value: f64 = param.coerce(state)?;
            if value > 1.0 {
                self.context.has_mono_mz = true;
            }
        }
        Ok(())
    }

    fn handle_element_param(&mut self, event: &BytesStart, state: MzMLParserState) -> Result<(), MzMLParserError> {
        match event.name().as_ref() {
            b"cvParam" => {
                let param = Self::handle_param(event, state)?;
                self.fill_param(param, state)
            }
            b"userParam" => {
                let param = Self::handle_param(event, state)?;
                self.fill_user_param(param, state)
            }
            _ => Ok(()),
        }
    }

    pub fn into_spectrum(self) -> SpectrumType<P> {
        SpectrumType::new(self.header, self.peaks)
    }
}

impl<P: PeakRecord> MzMLSAX for MzMLSpectrumBuilder<P> {
    fn start_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        let elt_name = event.name();
        match elt_name.as_ref() {
            b"spectrum" => {
                if let Some(id) = get_attribute(event, b"id", state)? {
                    match scan_number_from_native_id(&id) {
                        Some(scan) => self.header.scan_number = scan,
                        None => trace!("Spectrum id {id} has no scan number"),
                    }
                }
                let n: usize = get_numeric_attribute(event, b"defaultArrayLength", state)?;
                self.context.default_array_length = n;
                self.peaks.clear();
                self.header.precursors.clear();
                return Ok(MzMLParserState::Spectrum);
            }
            b"binaryDataArrayList" => return Ok(MzMLParserState::BinaryDataArrayList),
            b"binaryDataArray" => {
                let n = get_numeric_attribute(event, b"encodedLength", state)?;
                self.context.start_array(n);
                return Ok(MzMLParserState::BinaryDataArray);
            }
            b"binary" => return Ok(MzMLParserState::Binary),
            b"scanList" => return Ok(MzMLParserState::ScanList),
            b"scan" => return Ok(MzMLParserState::Scan),
            b"precursorList" => return Ok(MzMLParserState::PrecursorList),
            b"precursor" => {
                self.precursor = PrecursorIon::default();
                if let Some(sref) = get_attribute(event, b"spectrumRef", state)? {
                    if let Some(master) = scan_number_from_native_id(&sref) {
                        self.header.precursor_master_scan_number = master as i32;
                    }
                }
                return Ok(MzMLParserState::Precursor);
            }
            b"isolationWindow" => return Ok(MzMLParserState::IsolationWindow),
            b"selectedIonList" => return Ok(MzMLParserState::SelectedIonList),
            b"selectedIon" => return Ok(MzMLParserState::SelectedIon),
            b"activation" => return Ok(MzMLParserState::Activation),
            b"cvParam" | b"userParam" => self.handle_element_param(event, state)?,
            _ => {}
        }
        Ok(state)
    }

    fn empty_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        self.handle_element_param(event, state)?;
        Ok(state)
    }

    fn end_element(&mut self, event: &BytesEnd, state: MzMLParserState) -> ParserResult {
        match event.name().as_ref() {
            b"precursor" => {
                let precursor = std::mem::take(&mut self.precursor);
                self.header.precursors.push(precursor);
                Ok(MzMLParserState::PrecursorList)
            }
            b"binary" => Ok(MzMLParserState::BinaryDataArray),
            b"binaryDataArray" => Ok(MzMLParserState::BinaryDataArrayList),
            b"spectrum" => Ok(MzMLParserState::SpectrumDone),
            _ => Ok(state),
        }
    }

    fn text(&mut self, event: &BytesText, state: MzMLParserState) -> ParserResult {
        if state != MzMLParserState::Binary || self.context.default_array_length == 0 {
            return Ok(state);
        }
        let values = self
            .context
            .decode(event)
            .map_err(|e| MzMLParserError::ArrayDecodingError(state, e))?;
        // Sized from decoded data rather than the declared length
        if self.peaks.len() < values.len() {
            self.peaks.resize(values.len(), P::default());
        }
        match self.context.array_type {
            ArrayType::MZArray => {
                for (peak, mz) in self.peaks.iter_mut().zip(values) {
                    peak.set_mz(mz);
                }
            }
            ArrayType::IntensityArray => {
                for (peak, intensity) in self.peaks.iter_mut().zip(values) {
                    peak.set_intensity(intensity as f32);
                }
            }
            _ => {}
        }
        Ok(state)
    }
}

/// An accumulator for a `<chromatogram>` element's time and intensity arrays
#[derive(Debug, Default)]
pub struct MzMLChromatogramBuilder {
    pub chromatogram: Chromatogram,
    pub context: ParserContext,
}

impl XMLParseBase for MzMLChromatogramBuilder {}
impl CVParamParse for MzMLChromatogramBuilder {}

impl MzMLSAX for MzMLChromatogramBuilder {
    fn start_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        match event.name().as_ref() {
            b"chromatogram" => {
                self.chromatogram.id = get_attribute(event, b"id", state)?.unwrap_or_default();
                let n = get_numeric_attribute(event, b"defaultArrayLength", state)?;
                self.context.default_array_length = n;
                self.chromatogram.points.clear();
                Ok(MzMLParserState::Chromatogram)
            }
            b"binaryDataArray" => {
                let n = get_numeric_attribute(event, b"encodedLength", state)?;
                self.context.start_array(n);
                Ok(MzMLParserState::BinaryDataArray)
            }
            b"binary" => Ok(MzMLParserState::Binary),
            _ => self.empty_element(event, state),
        }
    }

    fn empty_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        if event.name().as_ref() == b"cvParam" {
            let param = Self::handle_param(event, state)?;
            self.context.fill_array_param(&param);
        }
        Ok(state)
    }

    fn end_element(&mut self, event: &BytesEnd, state: MzMLParserState) -> ParserResult {
        match event.name().as_ref() {
            b"binary" => Ok(MzMLParserState::BinaryDataArray),
            b"chromatogram" => Ok(MzMLParserState::ChromatogramDone),
            _ => Ok(state),
        }
    }

    fn text(&mut self, event: &BytesText, state: MzMLParserState) -> ParserResult {
        if state != MzMLParserState::Binary || self.context.default_array_length == 0 {
            return Ok(state);
        }
        let values = self
            .context
            .decode(event)
            .map_err(|e| MzMLParserError::ArrayDecodingError(state, e))?;
        if self.chromatogram.points.len() < values.len() {
            self.chromatogram.points.resize(values.len(), Default::default());
        }
        let points = self.chromatogram.points.iter_mut();
        match self.context.array_type {
            ArrayType::TimeArray => {
                points
                    .zip(values)
                    .for_each(|(pt, time)| pt.retention_time = time);
            }
            ArrayType::IntensityArray => {
                points
                    .zip(values)
                    .for_each(|(pt, intensity)| pt.intensity = intensity);
            }
            _ => {}
        }
        Ok(state)
    }
}

/**
An indexed mzML reader that addresses spectra by scan number.

The reader requires the `<indexList>` written at the end of an `<indexedmzML>`
document and will not open a file without one.
*/
pub struct MzMLReaderType<R: Read + Seek> {
    /// The state the parser was in last.
    pub state: MzMLParserState,
    handle: Option<BufReader<R>>,
    /// A scan number to byte offset table for random access
    pub spectrum_index: ScanIndex,
    pub chromatogram_index: OffsetIndex,
    cursor: ScanCursor,
    filter: MsFilter,
    max_retention_time: f64,
    buffer: Bytes,
}

/// An mzML reader over a file on disk
pub type MzMLReader = MzMLReaderType<fs::File>;

impl<R: Read + Seek> Default for MzMLReaderType<R> {
    fn default() -> Self {
        Self::new(MsFilter::default())
    }
}

impl<R: Read + Seek> MzMLReaderType<R> {
    /// Create a reader with no file attached yet
    pub fn new(filter: MsFilter) -> Self {
        Self {
            state: MzMLParserState::Start,
            handle: None,
            spectrum_index: ScanIndex::new("spectrum".into()),
            chromatogram_index: OffsetIndex::new("chromatogram".into()),
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

    /**
    Take ownership of `file`, read its index and find the run's maximum retention time.

    `source` only names the stream in errors.
    */
    pub fn attach(&mut self, file: R, source: PathBuf) -> Result<(), ReaderError> {
        self.close_handle();
        let mut handle = BufReader::with_capacity(BUFFER_SIZE, file);
        let (spectrum_index, chromatogram_index) = match IndexedXMLIndexExtractor::new(
            IndexDialect::MzML,
        )
        .read_index_from_end(&mut handle)
        {
            Ok(indices) => indices,
            Err(IndexError::IOError(e)) => return Err(ReaderError::IOError(e)),
            Err(e) => return Err(ReaderError::NoIndex(source, e)),
        };
        self.handle = Some(handle);
        self.spectrum_index = spectrum_index;
        self.chromatogram_index = chromatogram_index;
        self.cursor = ScanCursor::default();

        let last = self.read_scan::<Peak>(self.spectrum_index.last_scan)?;
        self.max_retention_time = last.header.retention_time;
        debug!(
            "Opened mzML with {} spectra ending at {:0.3} minutes",
            self.spectrum_index.scan_count(),
            self.max_retention_time
        );
        self.cursor.reset();
        Ok(())
    }

    fn close_handle(&mut self) {
        self.handle = None;
        self.spectrum_index = ScanIndex::new("spectrum".into());
        self.chromatogram_index = OffsetIndex::new("chromatogram".into());
        self.cursor = ScanCursor::default();
        self.max_retention_time = 0.0;
        self.state = MzMLParserState::Start;
    }

    fn _parse_into<B: MzMLSAX>(
        &mut self,
        offset: u64,
        accumulator: &mut B,
        done: MzMLParserState,
    ) -> Result<(), MzMLParserError> {
        let handle = match self.handle.as_mut() {
            Some(handle) => handle,
            None => return Err(MzMLParserError::UnknownError(self.state)),
        };
        handle
            .seek(SeekFrom::Start(offset))
            .map_err(|e| MzMLParserError::IOError(self.state, e))?;
        self.state = MzMLParserState::Start;
        let mut reader = Reader::from_reader(handle);
        reader.trim_text(true);
        self.buffer.clear();

        loop {
            let outcome = match reader.read_event_into(&mut self.buffer) {
                Ok(Event::Start(ref e)) => {
                    if log::log_enabled!(log::Level::Trace) {
                        trace!(
                            "Starting mzML element: {}",
                            String::from_utf8_lossy(e.name().as_ref())
                        );
                    }
                    accumulator.start_element(e, self.state)
                }
                Ok(Event::End(ref e)) => accumulator.end_element(e, self.state),
                Ok(Event::Text(ref e)) => accumulator.text(e, self.state),
                Ok(Event::Empty(ref e)) => accumulator.empty_element(e, self.state),
                Ok(Event::Eof) => {
                    trace!("Reached EOF");
                    self.state = MzMLParserState::EOF;
                    return Err(MzMLParserError::IncompleteElement(self.state));
                }
                Err(err) => Err(accumulator_error(self.state, err)),
                _ => Ok(self.state),
            };
            match outcome {
                Ok(state) => self.state = state,
                Err(err) => {
                    self.state = MzMLParserState::ParserError;
                    return Err(err);
                }
            }
            if self.state == done {
                break;
            }
            self.buffer.clear();
        }
        self.buffer.clear();
        Ok(())
    }

    /// Parse the spectrum stored under `scan`. A scan missing from the index is empty.
    pub fn read_scan<P: PeakRecord>(&mut self, scan: u32) -> Result<SpectrumType<P>, MzMLParserError> {
        let offset = match self.spectrum_index.get(scan) {
            Some(offset) => offset,
            None => return Ok(SpectrumType::empty()),
        };
        let mut builder = MzMLSpectrumBuilder::<P>::new(scan);
        self._parse_into(offset, &mut builder, MzMLParserState::SpectrumDone)?;
        Ok(builder.into_spectrum())
    }

    /// Parse the chromatogram at position `index` of the chromatogram index
    pub fn read_chromatogram_at(&mut self, index: usize) -> Result<Chromatogram, MzMLParserError> {
        let offset = match self.chromatogram_index.get_index(index) {
            Some((_, offset)) => offset,
            None => return Ok(Chromatogram::empty()),
        };
        let mut builder = MzMLChromatogramBuilder::default();
        self._parse_into(offset, &mut builder, MzMLParserState::ChromatogramDone)?;
        Ok(builder.chromatogram)
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

fn accumulator_error(state: MzMLParserState, err: quick_xml::Error) -> MzMLParserError {
    match err {
        quick_xml::Error::Io(e) => MzMLParserError::IOError(
            state,
            io::Error::new(e.kind(), e.to_string()),
        ),
        err => MzMLParserError::XMLError(state, err),
    }
}

/// A borrowing iterator over the spectra of an [`MzMLReaderType`]
pub struct SpectrumIter<'a, R: Read + Seek> {
    reader: &'a mut MzMLReaderType<R>,
}

impl<R: Read + Seek> Iterator for SpectrumIter<'_, R> {
    type Item = Spectrum;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_next_matching::<Peak>(None) {
            Ok(spec) if !spec.is_empty() => Some(spec),
            Ok(_) => None,
            Err(e) => {
                warn!("Stopping mzML iteration: {e}");
                None
            }
        }
    }
}

impl<R: Read + Seek> MzMLReaderType<R> {
    fn get_spectrum_impl(&mut self, scan: Option<u32>) -> Result<Spectrum, ReaderError> {
        self.read_next_matching(scan)
    }

    fn get_spectrum_ex_impl(&mut self, scan: Option<u32>) -> Result<SpectrumEx, ReaderError> {
        self.read_next_matching(scan)
    }

    fn get_chromatogram_impl(&mut self, index: Option<usize>) -> Result<Chromatogram, ReaderError> {
        if self.handle.is_none() {
            return Err(ReaderError::NotOpen);
        }
        match self
            .cursor
            .next_chromatogram(index, self.chromatogram_index.len())
        {
            Some(i) => Ok(self.read_chromatogram_at(i)?),
            None => Ok(Chromatogram::empty()),
        }
    }
}

impl SpectrumFileReader for MzMLReaderType<fs::File> {
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
        self.get_spectrum_impl(scan)
    }

    fn get_spectrum_ex(
        &mut self,
        scan: Option<u32>,
        _centroid: bool,
    ) -> Result<SpectrumEx, ReaderError> {
        self.get_spectrum_ex_impl(scan)
    }

    fn get_chromatogram(&mut self, index: Option<usize>) -> Result<Chromatogram, ReaderError> {
        self.get_chromatogram_impl(index)
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
        self.chromatogram_index.len()
    }

    fn max_retention_time(&self) -> f64 {
        self.max_retention_time
    }

    fn current_scan(&self) -> u32 {
        self.cursor.current
    }
}
