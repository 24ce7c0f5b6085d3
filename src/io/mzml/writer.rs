use std::fmt::Display;
use std::fs;
use std::io;
use std::io::{BufWriter, Seek, Write};

use log::{debug, warn};

use quick_xml::events::BytesDecl;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Error as XMLError;
use quick_xml::Writer;

use thiserror::Error;

use super::super::offset_index::OffsetIndex;
use super::super::utils::MD5HashingStream;

use crate::spectrum::bindata::{self, Bytes};
use crate::spectrum::{
    ArrayType, BinaryCompressionType, BinaryDataArrayType, Chromatogram, FragmentationType,
    PeakRecord, PrecursorIon, ScanPolarity, SpectrumHeader, SpectrumType,
};

const BUFFER_SIZE: usize = 10000;

/// The user parameter that tells readers the selected ion m/z is a trusted monoisotopic m/z
const MONOISOTOPIC_MZ_TRAILER: &str = "[Thermo Trailer Extra]Monoisotopic M/Z:";

macro_rules! bstart {
    ($e:tt) => {
        BytesStart::from_content($e, $e.len())
    };
}

macro_rules! attrib {
    ($name:expr, $value:expr, $elt:ident) => {
        let key = $name.as_bytes();
        let value = $value.as_bytes();
        $elt.push_attribute((key, value));
    };
}

macro_rules! start_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::Start($target.borrow()))?;
    };
}

macro_rules! end_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::End($target.to_end()))?;
    };
}

/// A controlled vocabulary term, identified by its CURIE and its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CVTerm {
    pub accession: &'static str,
    pub name: &'static str,
}

impl CVTerm {
    pub const fn new(accession: &'static str, name: &'static str) -> Self {
        Self { accession, name }
    }

    fn cv_ref(&self) -> &'static str {
        self.accession.split(':').next().unwrap_or("MS")
    }
}

const MS1_SPECTRUM: CVTerm = CVTerm::new("MS:1000579", "MS1 spectrum");
const MSN_SPECTRUM: CVTerm = CVTerm::new("MS:1000580", "MSn spectrum");
const MS_LEVEL: CVTerm = CVTerm::new("MS:1000511", "ms level");
const POSITIVE_SCAN: CVTerm = CVTerm::new("MS:1000130", "positive scan");
const NEGATIVE_SCAN: CVTerm = CVTerm::new("MS:1000129", "negative scan");
const CENTROID_SPECTRUM: CVTerm = CVTerm::new("MS:1000127", "centroid spectrum");
const PROFILE_SPECTRUM: CVTerm = CVTerm::new("MS:1000128", "profile spectrum");
const BASE_PEAK_MZ: CVTerm = CVTerm::new("MS:1000504", "base peak m/z");
const BASE_PEAK_INTENSITY: CVTerm = CVTerm::new("MS:1000505", "base peak intensity");
const TOTAL_ION_CURRENT: CVTerm = CVTerm::new("MS:1000285", "total ion current");
const LOWEST_MZ: CVTerm = CVTerm::new("MS:1000528", "lowest observed m/z");
const HIGHEST_MZ: CVTerm = CVTerm::new("MS:1000527", "highest observed m/z");

const SCAN_START_TIME: CVTerm = CVTerm::new("MS:1000016", "scan start time");
const FILTER_STRING: CVTerm = CVTerm::new("MS:1000512", "filter string");
const ION_INJECTION_TIME: CVTerm = CVTerm::new("MS:1000927", "ion injection time");
const SCAN_WINDOW_LOWER: CVTerm = CVTerm::new("MS:1000501", "scan window lower limit");
const SCAN_WINDOW_UPPER: CVTerm = CVTerm::new("MS:1000500", "scan window upper limit");

const ISOLATION_TARGET: CVTerm = CVTerm::new("MS:1000827", "isolation window target m/z");
const ISOLATION_LOWER: CVTerm = CVTerm::new("MS:1000828", "isolation window lower offset");
const ISOLATION_UPPER: CVTerm = CVTerm::new("MS:1000829", "isolation window upper offset");
const SELECTED_ION_MZ: CVTerm = CVTerm::new("MS:1000744", "selected ion m/z");
const CHARGE_STATE: CVTerm = CVTerm::new("MS:1000041", "charge state");
const PEAK_INTENSITY: CVTerm = CVTerm::new("MS:1000042", "peak intensity");
const COLLISION_ENERGY: CVTerm = CVTerm::new("MS:1000045", "collision energy");

const TIC_CHROMATOGRAM: CVTerm = CVTerm::new("MS:1000235", "total ion current chromatogram");
const BPC_CHROMATOGRAM: CVTerm = CVTerm::new("MS:1000628", "basepeak chromatogram");
const OTHER_CHROMATOGRAM: CVTerm = CVTerm::new("MS:1000626", "chromatogram type");

const MZ_UNIT: CVTerm = CVTerm::new("MS:1000040", "m/z");
const COUNTS_UNIT: CVTerm = CVTerm::new("MS:1000131", "number of detector counts");
const MINUTE_UNIT: CVTerm = CVTerm::new("UO:0000031", "minute");
const MILLISECOND_UNIT: CVTerm = CVTerm::new("UO:0000028", "millisecond");
const ELECTRONVOLT_UNIT: CVTerm = CVTerm::new("UO:0000266", "electronvolt");

fn activation_term(method: FragmentationType) -> Option<CVTerm> {
    let term = match method {
        FragmentationType::CID => CVTerm::new("MS:1000133", "collision-induced dissociation"),
        FragmentationType::HCD => {
            CVTerm::new("MS:1000422", "beam-type collision-induced dissociation")
        }
        FragmentationType::ETD => CVTerm::new("MS:1000598", "electron transfer dissociation"),
        FragmentationType::PQD => CVTerm::new("MS:1000599", "pulsed q dissociation"),
        FragmentationType::ECD => CVTerm::new("MS:1000250", "electron capture dissociation"),
        FragmentationType::IRMPD => {
            CVTerm::new("MS:1000262", "infrared multiphoton dissociation")
        }
        FragmentationType::SID => CVTerm::new("MS:1000136", "surface-induced dissociation"),
        FragmentationType::EThcD => {
            CVTerm::new("MS:1002631", "electron-transfer/higher-energy collision dissociation")
        }
        FragmentationType::ETDSA => {
            CVTerm::new("MS:1003182", "electron-transfer dissociation with supplemental activation")
        }
        FragmentationType::None => return None,
    };
    Some(term)
}

/// All the ways writing an mzML document can go wrong
#[derive(Debug, Error)]
pub enum MzMLWriterError {
    #[error("An XML error occurred: {0}")]
    XMLError(#[from] XMLError),
    #[error("Attempted to transition from {from_state:?} to {to_state:?}")]
    StateTransitionError {
        from_state: MzMLWriterState,
        to_state: MzMLWriterState,
    },
    #[error("Attempted to perform an invalid action {0:?}")]
    InvalidActionError(MzMLWriterState),
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
}

impl From<MzMLWriterError> for io::Error {
    fn from(value: MzMLWriterError) -> Self {
        match value {
            MzMLWriterError::IOError(e) => e,
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

pub type WriterResult = Result<(), MzMLWriterError>;

struct InnerXMLWriter<W: io::Write> {
    pub handle: Writer<BufWriter<MD5HashingStream<W>>>,
}

impl<W: io::Write> InnerXMLWriter<W> {
    const INDENT_SIZE: usize = 2;

    pub fn new(file: W) -> InnerXMLWriter<W> {
        let handle = BufWriter::with_capacity(BUFFER_SIZE, MD5HashingStream::new(file));
        Self {
            handle: Writer::new_with_indent(handle, b' ', Self::INDENT_SIZE),
        }
    }

    /// Flush the buffered bytes through the checksum and compute the digest so far
    pub fn digest(&mut self) -> io::Result<String> {
        self.handle.get_mut().flush()?;
        Ok(format!("{:x}", self.handle.get_mut().get_ref().compute()))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.handle.get_mut().flush()
    }

    pub fn write_param(
        &mut self,
        term: CVTerm,
        value: Option<&dyn Display>,
        unit: Option<CVTerm>,
    ) -> WriterResult {
        let mut elt = bstart!("cvParam");
        attrib!("cvRef", term.cv_ref(), elt);
        attrib!("accession", term.accession, elt);
        attrib!("name", term.name, elt);
        if let Some(value) = value {
            let value = value.to_string();
            attrib!("value", value, elt);
        }
        if let Some(unit) = unit {
            attrib!("unitCvRef", unit.cv_ref(), elt);
            attrib!("unitAccession", unit.accession, elt);
            attrib!("unitName", unit.name, elt);
        }
        self.handle.write_event(Event::Empty(elt))?;
        Ok(())
    }

    pub fn write_user_param(&mut self, name: &str, value: &str) -> WriterResult {
        let mut elt = bstart!("userParam");
        attrib!("name", name, elt);
        attrib!("value", value, elt);
        self.handle.write_event(Event::Empty(elt))?;
        Ok(())
    }

    pub fn write_event(&mut self, event: Event) -> WriterResult {
        self.handle.write_event(event)?;
        Ok(())
    }
}

/**
The different states that [`MzMLWriterType`] can enter while
writing an mzML document. This is only necessary for the module
consumer when determining where something may have gone wrong.
*/
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub enum MzMLWriterState {
    Start,
    DocumentOpen,
    Run,
    SpectrumList,
    SpectrumListClosed,
    ChromatogramList,
    ChromatogramListClosed,
    RunClosed,
    MzMLClosed,
    IndexList,
    IndexListClosed,
    End,
}

/**
An indexed mzML writer for [`SpectrumType`] and [`Chromatogram`].

Spectra are written out immediately. Writing the first chromatogram closes
the `<spectrumList>`, so all spectra must be written before any chromatogram.

The list `count` attributes are emitted when each list opens, so call
[`MzMLWriterType::set_spectrum_count`] and [`MzMLWriterType::set_chromatogram_count`]
before writing the first entry of each list. A declared count that disagrees with
the number of entries written is logged when the list closes.
*/
pub struct MzMLWriterType<W: Write + Seek> {
    /// The total number of spectra this mzML document will contain.
    /// This value will appear in the `spectrumList` element's count attribute
    pub spectrum_count: u64,
    /// The number of `spectrum` elements written so far.
    pub spectrum_counter: u64,

    /// The total number of chromatograms this mzML document will contain.
    pub chromatogram_count: u64,
    /// The number of chromatograms written so far
    pub chromatogram_counter: u64,

    /// The compression type to use when generating binary data arrays.
    pub data_array_compression: BinaryCompressionType,

    pub state: MzMLWriterState,
    pub spectrum_index: OffsetIndex,
    pub chromatogram_index: OffsetIndex,

    handle: InnerXMLWriter<W>,
}

/// An mzML writer over a file on disk
pub type MzMLWriter = MzMLWriterType<fs::File>;

impl<W: Write + Seek> MzMLWriterType<W> {
    const PSIMS_VERSION: &'static str = "4.1.57";
    const UNIT_VERSION: &'static str = "releases/2020-03-10";

    /// Wrap a new [`std::io::Write`]-able type, constructing a new [`MzMLWriterType`]
    pub fn new(file: W) -> MzMLWriterType<W> {
        let handle = InnerXMLWriter::new(file);
        MzMLWriterType {
            handle,
            spectrum_index: OffsetIndex::new("spectrum".into()),
            chromatogram_index: OffsetIndex::new("chromatogram".into()),
            state: MzMLWriterState::Start,
            spectrum_count: 0,
            spectrum_counter: 0,
            chromatogram_count: 0,
            chromatogram_counter: 0,
            data_array_compression: BinaryCompressionType::Zlib,
        }
    }

    fn transition_err(&self, to_state: MzMLWriterState) -> WriterResult {
        Err(MzMLWriterError::StateTransitionError {
            from_state: self.state,
            to_state,
        })
    }

    /// The byte position of the next write. The buffered bytes are flushed first.
    fn stream_position(&mut self) -> io::Result<u64> {
        self.handle.handle.get_mut().stream_position()
    }

    fn make_psi_ms_cv(&self) -> BytesStart<'static> {
        let mut cv = bstart!("cv");
        cv.push_attribute(("id", "MS"));
        cv.push_attribute(("fullName", "PSI-MS"));
        cv.push_attribute(("URI", "http://purl.obolibrary.org/obo/ms.obo"));
        cv.push_attribute(("version", Self::PSIMS_VERSION));
        cv
    }

    fn make_unit_cv(&self) -> BytesStart<'static> {
        let mut cv = bstart!("cv");
        cv.push_attribute(("id", "UO"));
        cv.push_attribute(("fullName", "UNIT-ONTOLOGY"));
        cv.push_attribute(("URI", "http://ontologies.berkeleybop.org/uo.obo"));
        cv.push_attribute(("version", Self::UNIT_VERSION));
        cv
    }

    fn write_cv_list(&mut self) -> WriterResult {
        let mut cv_list = bstart!("cvList");
        cv_list.push_attribute(("count", "2"));
        self.handle.write_event(Event::Start(cv_list))?;

        let cv = self.make_psi_ms_cv();
        self.handle.write_event(Event::Empty(cv))?;

        let cv = self.make_unit_cv();
        self.handle.write_event(Event::Empty(cv))?;

        self.handle
            .write_event(Event::End(BytesEnd::new("cvList")))?;
        Ok(())
    }

    fn start_document(&mut self) -> WriterResult {
        self.handle
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let mut indexed = bstart!("indexedmzML");
        indexed.push_attribute(("xmlns", "http://psi.hupo.org/ms/mzml"));
        indexed.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        indexed.push_attribute((
            "xsi:schemaLocation",
            "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.3_idx.xsd",
        ));
        self.handle.write_event(Event::Start(indexed))?;

        let mut mzml = bstart!("mzML");
        mzml.push_attribute(("xmlns", "http://psi.hupo.org/ms/mzml"));
        mzml.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        mzml.push_attribute((
            "xsi:schemaLocation",
            "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.1.xsd",
        ));
        mzml.push_attribute(("version", "1.1.1"));
        self.handle.write_event(Event::Start(mzml))?;
        self.write_cv_list()?;

        self.state = MzMLWriterState::DocumentOpen;
        Ok(())
    }

    fn start_run(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::DocumentOpen {
            self.start_document()?;
        } else if self.state >= MzMLWriterState::Run {
            return self.transition_err(MzMLWriterState::Run);
        }
        let mut run = bstart!("run");
        attrib!("id", "1", run);
        self.handle.write_event(Event::Start(run))?;
        self.state = MzMLWriterState::Run;
        Ok(())
    }

    fn start_spectrum_list(&mut self) -> WriterResult {
        match self.state {
            MzMLWriterState::SpectrumList => return Ok(()),
            state if state < MzMLWriterState::Run => {
                self.start_run()?;
            }
            MzMLWriterState::Run => {}
            _ => {
                return self.transition_err(MzMLWriterState::SpectrumList);
            }
        }
        let mut list = bstart!("spectrumList");
        let count = self.spectrum_count.to_string();
        attrib!("count", count, list);
        self.handle.write_event(Event::Start(list))?;
        self.state = MzMLWriterState::SpectrumList;
        Ok(())
    }

    fn close_spectrum_list(&mut self) -> WriterResult {
        if self.spectrum_count != self.spectrum_counter {
            warn!(
                "spectrumList declared {} spectra but {} were written",
                self.spectrum_count, self.spectrum_counter
            );
        }
        let tag = bstart!("spectrumList");
        end_event!(self, tag);
        self.state = MzMLWriterState::SpectrumListClosed;
        Ok(())
    }

    fn start_chromatogram_list(&mut self) -> WriterResult {
        match self.state {
            MzMLWriterState::ChromatogramList => return Ok(()),
            MzMLWriterState::SpectrumList => {
                self.close_spectrum_list()?;
            }
            state if state < MzMLWriterState::SpectrumList => {
                self.start_spectrum_list()?;
                self.close_spectrum_list()?;
            }
            MzMLWriterState::SpectrumListClosed => {}
            _ => {
                return self.transition_err(MzMLWriterState::ChromatogramList);
            }
        }
        let mut list = bstart!("chromatogramList");
        let count = self.chromatogram_count.to_string();
        attrib!("count", count, list);
        self.handle.write_event(Event::Start(list))?;
        self.state = MzMLWriterState::ChromatogramList;
        Ok(())
    }

    fn close_chromatogram_list(&mut self) -> WriterResult {
        if self.chromatogram_count != self.chromatogram_counter {
            warn!(
                "chromatogramList declared {} chromatograms but {} were written",
                self.chromatogram_count, self.chromatogram_counter
            );
        }
        let tag = bstart!("chromatogramList");
        end_event!(self, tag);
        self.state = MzMLWriterState::ChromatogramListClosed;
        Ok(())
    }

    fn close_run(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::SpectrumList {
            self.start_spectrum_list()?;
        }
        if self.state == MzMLWriterState::SpectrumList {
            self.close_spectrum_list()?;
        } else if self.state == MzMLWriterState::ChromatogramList {
            self.close_chromatogram_list()?;
        } else if self.state >= MzMLWriterState::RunClosed {
            return self.transition_err(MzMLWriterState::RunClosed);
        }
        let tag = bstart!("run");
        end_event!(self, tag);
        self.state = MzMLWriterState::RunClosed;
        Ok(())
    }

    fn close_mzml(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::RunClosed {
            self.close_run()?;
        }
        let tag = bstart!("mzML");
        end_event!(self, tag);
        self.state = MzMLWriterState::MzMLClosed;
        Ok(())
    }

    fn close_indexed_mzml(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::MzMLClosed {
            self.close_mzml()?;
        }
        self.write_index_list()?;
        let tag = bstart!("indexedmzML");
        end_event!(self, tag);
        self.handle.flush()?;
        self.state = MzMLWriterState::End;
        Ok(())
    }

    /**
    Close the wrapping `<indexedmzML>` document, which will trigger writing
    out the offset indices and file checksum at the tail of the document.
    */
    pub fn close(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::End {
            self.close_indexed_mzml()
        } else {
            Ok(())
        }
    }

    /// Close the document if needed and recover the wrapped stream
    pub fn into_inner(mut self) -> Result<W, MzMLWriterError> {
        self.close()?;
        let buffered = self.handle.handle.into_inner();
        let hashing = buffered.into_inner().map_err(|e| e.into_error())?;
        Ok(hashing.into_inner())
    }

    fn write_scan_list(&mut self, header: &SpectrumHeader) -> WriterResult {
        let mut scan_list_tag = bstart!("scanList");
        attrib!("count", "1", scan_list_tag);
        start_event!(self, scan_list_tag);

        let scan_tag = bstart!("scan");
        start_event!(self, scan_tag);
        self.handle.write_param(
            SCAN_START_TIME,
            Some(&header.retention_time),
            Some(MINUTE_UNIT),
        )?;
        if !header.scan_filter.is_empty() {
            self.handle
                .write_param(FILTER_STRING, Some(&header.scan_filter), None)?;
        }
        self.handle.write_param(
            ION_INJECTION_TIME,
            Some(&header.ion_injection_time),
            Some(MILLISECOND_UNIT),
        )?;
        if let Some(mono) = header
            .precursors
            .first()
            .map(|p| p.monoisotopic_mz)
            .filter(|mz| *mz > 0.0)
        {
            self.handle
                .write_user_param(MONOISOTOPIC_MZ_TRAILER, &format!("{mono:.4}"))?;
        }

        if header.end_mz > 0.0 {
            let mut window_list = bstart!("scanWindowList");
            attrib!("count", "1", window_list);
            start_event!(self, window_list);
            let window = bstart!("scanWindow");
            start_event!(self, window);
            self.handle
                .write_param(SCAN_WINDOW_LOWER, Some(&header.start_mz), Some(MZ_UNIT))?;
            self.handle
                .write_param(SCAN_WINDOW_UPPER, Some(&header.end_mz), Some(MZ_UNIT))?;
            end_event!(self, window);
            end_event!(self, window_list);
        }
        end_event!(self, scan_tag);
        end_event!(self, scan_list_tag);
        Ok(())
    }

    fn write_isolation_window(&mut self, precursor: &PrecursorIon) -> WriterResult {
        let iw_tag = bstart!("isolationWindow");
        start_event!(self, iw_tag);
        let half_width = precursor.isolation_width / 2.0;
        self.handle.write_param(
            ISOLATION_TARGET,
            Some(&precursor.isolation_mz),
            Some(MZ_UNIT),
        )?;
        self.handle
            .write_param(ISOLATION_LOWER, Some(&half_width), Some(MZ_UNIT))?;
        self.handle
            .write_param(ISOLATION_UPPER, Some(&half_width), Some(MZ_UNIT))?;
        end_event!(self, iw_tag);
        Ok(())
    }

    fn write_selected_ions(&mut self, precursor: &PrecursorIon) -> WriterResult {
        let mut outer = bstart!("selectedIonList");
        attrib!("count", "1", outer);
        start_event!(self, outer);
        let tag = bstart!("selectedIon");
        start_event!(self, tag);

        let mz = if precursor.monoisotopic_mz > 0.0 {
            precursor.monoisotopic_mz
        } else {
            precursor.isolation_mz
        };
        self.handle
            .write_param(SELECTED_ION_MZ, Some(&mz), Some(MZ_UNIT))?;
        if precursor.charge != 0 {
            self.handle
                .write_param(CHARGE_STATE, Some(&precursor.charge), None)?;
        }
        if precursor.intensity > 0.0 {
            self.handle.write_param(
                PEAK_INTENSITY,
                Some(&precursor.intensity),
                Some(COUNTS_UNIT),
            )?;
        }
        end_event!(self, tag);
        end_event!(self, outer);
        Ok(())
    }

    fn write_activation(&mut self, precursor: &PrecursorIon) -> WriterResult {
        let tag = bstart!("activation");
        start_event!(self, tag);
        if let Some(term) = activation_term(precursor.fragmentation_method) {
            self.handle.write_param(term, None, None)?;
        }
        self.handle.write_param(
            COLLISION_ENERGY,
            Some(&precursor.collision_energy),
            Some(ELECTRONVOLT_UNIT),
        )?;
        end_event!(self, tag);
        Ok(())
    }

    fn write_precursors(&mut self, header: &SpectrumHeader) -> WriterResult {
        let mut precursor_list_tag = bstart!("precursorList");
        let count = header.precursors.len().to_string();
        attrib!("count", count, precursor_list_tag);
        start_event!(self, precursor_list_tag);

        for precursor in header.precursors.iter() {
            let mut precursor_tag = bstart!("precursor");
            if header.precursor_master_scan_number > 0 {
                let prec_id = format!("scan={}", header.precursor_master_scan_number);
                attrib!("spectrumRef", prec_id, precursor_tag);
            }
            start_event!(self, precursor_tag);
            self.write_isolation_window(precursor)?;
            self.write_selected_ions(precursor)?;
            self.write_activation(precursor)?;
            end_event!(self, precursor_tag);
        }
        end_event!(self, precursor_list_tag);
        Ok(())
    }

    fn write_binary_data_array(
        &mut self,
        array_type: ArrayType,
        dtype: BinaryDataArrayType,
        encoded: &Bytes,
    ) -> WriterResult {
        let mut outer = bstart!("binaryDataArray");
        let encoded_len = encoded.len().to_string();
        attrib!("encodedLength", encoded_len, outer);
        start_event!(self, outer);

        match dtype {
            BinaryDataArrayType::Float32 => self.handle.write_param(
                CVTerm::new("MS:1000521", "32-bit float"),
                None,
                None,
            )?,
            BinaryDataArrayType::Float64 => self.handle.write_param(
                CVTerm::new("MS:1000523", "64-bit float"),
                None,
                None,
            )?,
        }
        match self.data_array_compression {
            BinaryCompressionType::NoCompression => self.handle.write_param(
                CVTerm::new("MS:1000576", "no compression"),
                None,
                None,
            )?,
            BinaryCompressionType::Zlib => self.handle.write_param(
                CVTerm::new("MS:1000574", "zlib compression"),
                None,
                None,
            )?,
        }
        match array_type {
            ArrayType::MZArray => self.handle.write_param(
                CVTerm::new("MS:1000514", "m/z array"),
                None,
                Some(MZ_UNIT),
            )?,
            ArrayType::IntensityArray => self.handle.write_param(
                CVTerm::new("MS:1000515", "intensity array"),
                None,
                Some(COUNTS_UNIT),
            )?,
            ArrayType::TimeArray => self.handle.write_param(
                CVTerm::new("MS:1000595", "time array"),
                None,
                Some(MINUTE_UNIT),
            )?,
            ArrayType::Unknown => {
                warn!("Writing a binary data array of unknown kind");
            }
        }

        let bin = bstart!("binary");
        start_event!(self, bin);
        self.handle.write_event(Event::Text(BytesText::new(
            String::from_utf8_lossy(encoded).as_ref(),
        )))?;
        end_event!(self, bin);
        end_event!(self, outer);
        Ok(())
    }

    fn write_peak_arrays<P: PeakRecord>(&mut self, peaks: &[P]) -> WriterResult {
        let mzs: Vec<f64> = peaks.iter().map(|p| p.mz()).collect();
        let intensities: Vec<f32> = peaks.iter().map(|p| p.intensity()).collect();
        let mz_bytes = bindata::encode_f64(&mzs, self.data_array_compression)?;
        let intensity_bytes = bindata::encode_f32(&intensities, self.data_array_compression)?;

        let mut outer = bstart!("binaryDataArrayList");
        attrib!("count", "2", outer);
        start_event!(self, outer);
        self.write_binary_data_array(ArrayType::MZArray, BinaryDataArrayType::Float64, &mz_bytes)?;
        self.write_binary_data_array(
            ArrayType::IntensityArray,
            BinaryDataArrayType::Float32,
            &intensity_bytes,
        )?;
        end_event!(self, outer);
        Ok(())
    }

    /**
    Write a spectrum out to the mzML file.

    ## Side-Effects
    If the writer has not already started writing the spectra, this opens the document and the
    `<spectrumList>` element. The spectrum count is written out at that point, so the value may no
    longer be changed.
    */
    pub fn write_spectrum<P: PeakRecord>(&mut self, spectrum: &SpectrumType<P>) -> WriterResult {
        match self.state {
            MzMLWriterState::SpectrumList => {}
            state if state < MzMLWriterState::SpectrumList => {
                self.start_spectrum_list()?;
            }
            _ => {
                // Spectra may not follow chromatograms
                return Err(MzMLWriterError::InvalidActionError(self.state));
            }
        }
        let header = &spectrum.header;
        let id = format!("scan={}", header.scan_number);
        let pos = self.stream_position()?;
        self.spectrum_index.insert(id.clone(), pos);

        let mut outer = bstart!("spectrum");
        let index = self.spectrum_counter.to_string();
        let default_array_len = spectrum.count().to_string();
        attrib!("index", index, outer);
        attrib!("id", id, outer);
        attrib!("defaultArrayLength", default_array_len, outer);
        start_event!(self, outer);
        self.spectrum_counter += 1;

        let ms_level = header.ms_level;
        if ms_level == 1 {
            self.handle.write_param(MS1_SPECTRUM, None, None)?;
        } else {
            self.handle.write_param(MSN_SPECTRUM, None, None)?;
        }
        self.handle.write_param(MS_LEVEL, Some(&ms_level), None)?;

        match header.polarity {
            ScanPolarity::Negative => self.handle.write_param(NEGATIVE_SCAN, None, None)?,
            ScanPolarity::Positive => self.handle.write_param(POSITIVE_SCAN, None, None)?,
            ScanPolarity::Unknown => {
                warn!(
                    "Could not determine scan polarity for {}, assuming positive",
                    header.scan_number
                );
                self.handle.write_param(POSITIVE_SCAN, None, None)?
            }
        }
        if header.centroid {
            self.handle.write_param(CENTROID_SPECTRUM, None, None)?;
        } else {
            self.handle.write_param(PROFILE_SPECTRUM, None, None)?;
        }
        self.handle
            .write_param(BASE_PEAK_MZ, Some(&header.base_peak_mz), Some(MZ_UNIT))?;
        self.handle.write_param(
            BASE_PEAK_INTENSITY,
            Some(&header.base_peak_intensity),
            Some(COUNTS_UNIT),
        )?;
        self.handle
            .write_param(TOTAL_ION_CURRENT, Some(&header.total_ion_current), None)?;
        self.handle
            .write_param(LOWEST_MZ, Some(&header.lowest_mz), Some(MZ_UNIT))?;
        self.handle
            .write_param(HIGHEST_MZ, Some(&header.highest_mz), Some(MZ_UNIT))?;

        self.write_scan_list(header)?;
        if !header.precursors.is_empty() {
            self.write_precursors(header)?;
        }
        self.write_peak_arrays(&spectrum.peaks)?;

        end_event!(self, outer);
        Ok(())
    }

    /// Write a chromatogram, closing the spectrum list if it is still open
    pub fn write_chromatogram(&mut self, chromatogram: &Chromatogram) -> WriterResult {
        if self.state != MzMLWriterState::ChromatogramList {
            self.start_chromatogram_list()?;
        }
        let pos = self.stream_position()?;
        self.chromatogram_index
            .insert(chromatogram.id.clone(), pos);

        let mut outer = bstart!("chromatogram");
        let index = self.chromatogram_counter.to_string();
        let default_array_len = chromatogram.count().to_string();
        attrib!("index", index, outer);
        attrib!("id", chromatogram.id, outer);
        attrib!("defaultArrayLength", default_array_len, outer);
        start_event!(self, outer);
        self.chromatogram_counter += 1;

        let term = match chromatogram.id.as_str() {
            "TIC" => TIC_CHROMATOGRAM,
            "BPC" => BPC_CHROMATOGRAM,
            _ => OTHER_CHROMATOGRAM,
        };
        self.handle.write_param(term, None, None)?;

        let times: Vec<f64> = chromatogram.points.iter().map(|p| p.retention_time).collect();
        let intensities: Vec<f64> = chromatogram.points.iter().map(|p| p.intensity).collect();
        let time_bytes = bindata::encode_f64(&times, self.data_array_compression)?;
        let intensity_bytes = bindata::encode_f64(&intensities, self.data_array_compression)?;

        let mut list = bstart!("binaryDataArrayList");
        attrib!("count", "2", list);
        start_event!(self, list);
        self.write_binary_data_array(
            ArrayType::TimeArray,
            BinaryDataArrayType::Float64,
            &time_bytes,
        )?;
        self.write_binary_data_array(
            ArrayType::IntensityArray,
            BinaryDataArrayType::Float64,
            &intensity_bytes,
        )?;
        end_event!(self, list);
        end_event!(self, outer);
        Ok(())
    }

    fn write_index(&mut self, index: &OffsetIndex) -> WriterResult {
        let mut outer = bstart!("index");
        attrib!("name", index.name, outer);
        start_event!(self, outer);
        for (id, offset) in index.iter() {
            let mut tag = bstart!("offset");
            attrib!("idRef", id, tag);
            start_event!(self, tag);
            let content = offset.to_string();
            let text = BytesText::new(&content);
            self.handle.write_event(Event::Text(text))?;
            end_event!(self, tag);
        }
        end_event!(self, outer);
        Ok(())
    }

    fn write_index_list(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::MzMLClosed {
            self.close_mzml()?;
        }
        self.state = MzMLWriterState::IndexList;
        let offset = self.stream_position()?;
        let spectrum_index = self.spectrum_index.clone();
        let chromatogram_index = self.chromatogram_index.clone();

        let mut outer = bstart!("indexList");
        let count = if chromatogram_index.is_empty() { "1" } else { "2" };
        attrib!("count", count, outer);
        start_event!(self, outer);
        self.write_index(&spectrum_index)?;
        if !chromatogram_index.is_empty() {
            self.write_index(&chromatogram_index)?;
        }
        end_event!(self, outer);

        let tag = bstart!("indexListOffset");
        start_event!(self, tag);
        let content = offset.to_string();
        let text = BytesText::new(&content);
        self.handle.write_event(Event::Text(text))?;
        end_event!(self, tag);

        let tag = bstart!("fileChecksum");
        start_event!(self, tag);
        let content = self.handle.digest()?;
        let text = BytesText::new(&content);
        self.handle.write_event(Event::Text(text))?;
        end_event!(self, tag);
        self.state = MzMLWriterState::IndexListClosed;
        debug!(
            "Wrote {} spectra and {} chromatograms, index at {}",
            self.spectrum_counter, self.chromatogram_counter, offset
        );
        Ok(())
    }

    /// Set the number of spectra the `<spectrumList>` declares. Must be called before
    /// the first spectrum is written to take effect.
    pub fn set_spectrum_count(&mut self, spectrum_count: u64) {
        self.spectrum_count = spectrum_count;
    }

    /// Set the number of chromatograms the `<chromatogramList>` declares. Must be called
    /// before the first chromatogram is written to take effect.
    pub fn set_chromatogram_count(&mut self, chromatogram_count: u64) {
        self.chromatogram_count = chromatogram_count;
    }
}

impl MzMLWriterType<fs::File> {
    /// Create a new file at `path` and write an mzML document into it
    pub fn create<P: AsRef<std::path::Path>>(path: P) -> io::Result<Self> {
        let file = fs::File::create(path)?;
        Ok(Self::new(file))
    }
}
