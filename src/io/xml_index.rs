//! Reading the trailing byte offset index of indexed mzML and mzXML documents.
//!
//! Both formats end with a pointer to an index of `<offset>` elements. The pointer is
//! always found near the end of the file, so only the tail of the file is scanned for it.
use std::io::{self, prelude::*, SeekFrom};
use std::mem;

use log::{debug, warn};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Error as XMLError, Reader};
use regex::bytes::Regex;
use thiserror::Error;

use super::offset_index::{OffsetIndex, ScanIndex};

const TAIL_SIZE: u64 = 200;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Offset index not found")]
    OffsetNotFound,
    #[error("The index offset {0} lies outside of the file")]
    MalformedOffset(u64),
    #[error("The index entry {0} has an implausible scan number")]
    ScanNumberOutOfRange(String),
    #[error("XML error {0} occurred while reading out the index")]
    XMLError(#[from] XMLError),
    #[error("IO error {0} occurred while reading out the index")]
    IOError(#[from] io::Error),
}

impl From<IndexError> for io::Error {
    fn from(value: IndexError) -> Self {
        match value {
            IndexError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The flavor of indexed XML document being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDialect {
    /// `<indexList>` holding `<index name="spectrum">` and `<index name="chromatogram">`,
    /// with `<offset idRef="...">` entries
    MzML,
    /// A single `<index name="scan">` with `<offset id="N">` entries
    MzXML,
}

impl IndexDialect {
    fn offset_pattern(&self) -> &'static str {
        match self {
            Self::MzML => r"<indexListOffset>\s*(\d+)\s*</indexListOffset>",
            Self::MzXML => r"<indexOffset>\s*(\d+)\s*</indexOffset>",
        }
    }

    fn id_attribute(&self) -> &'static [u8] {
        match self {
            Self::MzML => b"idRef",
            Self::MzXML => b"id",
        }
    }

    fn spectrum_index_name(&self) -> &'static str {
        match self {
            Self::MzML => "spectrum",
            Self::MzXML => "scan",
        }
    }

    fn scan_number_of(&self, id: &str) -> Option<u32> {
        match self {
            Self::MzML => scan_number_from_native_id(id),
            Self::MzXML => id.trim().parse().ok(),
        }
    }
}

/**
Extract the scan number from a Thermo-style native ID such as
`controllerType=0 controllerNumber=1 scan=42`.
*/
pub fn scan_number_from_native_id(id: &str) -> Option<u32> {
    let start = id.find("scan=")? + 5;
    let digits: &str = {
        let tail = &id[start..];
        let end = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        &tail[..end]
    };
    digits.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexParserState {
    Start,
    SpectrumIndexList,
    ChromatogramIndexList,
    OtherIndexList,
    Done,
}

#[derive(Debug, Clone)]
pub struct IndexedXMLIndexExtractor {
    pub dialect: IndexDialect,
    pub spectrum_index: ScanIndex,
    pub chromatogram_index: OffsetIndex,
    last_id: String,
}

impl IndexedXMLIndexExtractor {
    pub fn new(dialect: IndexDialect) -> Self {
        Self {
            dialect,
            spectrum_index: ScanIndex::new(dialect.spectrum_index_name().into()),
            chromatogram_index: OffsetIndex::new("chromatogram".into()),
            last_id: String::new(),
        }
    }

    /// Scan the tail of the file for the index offset pointer
    pub fn find_offset_from_reader<R: Read + Seek>(
        &self,
        reader: &mut R,
    ) -> io::Result<Option<u64>> {
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(end.saturating_sub(TAIL_SIZE)))?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let pattern = Regex::new(self.dialect.offset_pattern())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let offset = pattern
            .captures(&buf)
            .and_then(|captures| captures.get(1))
            .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
            .and_then(|s| s.parse::<u64>().ok());
        Ok(offset)
    }

    pub fn start_element(
        &mut self,
        event: &BytesStart,
        state: IndexParserState,
    ) -> Result<IndexParserState, XMLError> {
        match event.name().as_ref() {
            b"offset" => {
                for attr in event.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == self.dialect.id_attribute() {
                        self.last_id = attr.unescape_value()?.to_string();
                    }
                }
            }
            b"index" => {
                for attr in event.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"name" {
                        let index_name = attr.unescape_value()?;
                        if index_name == self.dialect.spectrum_index_name() {
                            return Ok(IndexParserState::SpectrumIndexList);
                        } else if index_name == "chromatogram"
                            && self.dialect == IndexDialect::MzML
                        {
                            return Ok(IndexParserState::ChromatogramIndexList);
                        } else {
                            return Ok(IndexParserState::OtherIndexList);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(state)
    }

    pub fn end_element(
        &mut self,
        event: &BytesEnd,
        state: IndexParserState,
    ) -> Result<IndexParserState, XMLError> {
        match (event.name().as_ref(), self.dialect) {
            (b"indexList", IndexDialect::MzML) => Ok(IndexParserState::Done),
            (b"index", IndexDialect::MzXML) => Ok(IndexParserState::Done),
            (b"index", IndexDialect::MzML) => Ok(IndexParserState::Start),
            _ => Ok(state),
        }
    }

    pub fn text(
        &mut self,
        event: &BytesText,
        state: IndexParserState,
    ) -> Result<IndexParserState, IndexError> {
        if !matches!(
            state,
            IndexParserState::SpectrumIndexList | IndexParserState::ChromatogramIndexList
        ) {
            return Ok(state);
        }
        let text = event.unescape()?;
        let offset = match text.trim().parse::<u64>() {
            Ok(offset) => offset,
            Err(_) => return Ok(state),
        };
        if self.last_id.is_empty() {
            warn!("Out of order text in index");
            return Ok(state);
        }
        let key = mem::take(&mut self.last_id);
        if state == IndexParserState::SpectrumIndexList {
            let scan = self.dialect.scan_number_of(&key);
            if self.spectrum_index.insert(scan, offset).is_none() {
                return Err(IndexError::ScanNumberOutOfRange(key));
            }
        } else {
            self.chromatogram_index.insert(key, offset);
        }
        Ok(state)
    }

    /// Locate and parse the complete index of `handle`, leaving the stream position unspecified
    pub fn read_index_from_end<R: BufRead + Seek>(
        mut self,
        handle: &mut R,
    ) -> Result<(ScanIndex, OffsetIndex), IndexError> {
        let end = handle.seek(SeekFrom::End(0))?;
        let offset = self
            .find_offset_from_reader(handle)?
            .ok_or(IndexError::OffsetNotFound)?;
        if offset >= end {
            return Err(IndexError::MalformedOffset(offset));
        }
        debug!("Reading {:?} index from offset {}", self.dialect, offset);
        handle.seek(SeekFrom::Start(offset))?;

        let mut reader = Reader::from_reader(handle);
        reader.trim_text(true);
        let mut buffer = Vec::new();
        let mut state = IndexParserState::Start;
        loop {
            match reader.read_event_into(&mut buffer)? {
                Event::Start(ref e) => {
                    state = self.start_element(e, state)?;
                }
                Event::End(ref e) => {
                    state = self.end_element(e, state)?;
                }
                Event::Text(ref e) => {
                    state = self.text(e, state)?;
                }
                Event::Eof => break,
                _ => {}
            }
            if state == IndexParserState::Done {
                break;
            }
            buffer.clear();
        }
        self.spectrum_index.finish();
        debug!(
            "Read {} scan offsets spanning scans {}-{} and {} chromatogram offsets",
            self.spectrum_index.scan_count(),
            self.spectrum_index.first_scan,
            self.spectrum_index.last_scan,
            self.chromatogram_index.len()
        );
        Ok((self.spectrum_index, self.chromatogram_index))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_native_id() {
        assert_eq!(
            scan_number_from_native_id("controllerType=0 controllerNumber=1 scan=1507"),
            Some(1507)
        );
        assert_eq!(scan_number_from_native_id("scan=12"), Some(12));
        assert_eq!(scan_number_from_native_id("index=3"), None);
        assert_eq!(scan_number_from_native_id("scan="), None);
    }

    #[test_log::test]
    fn test_read_mzxml_index() {
        let body = "<mzXML><msRun><scan num=\"1\"></scan></msRun>\n";
        let index_start = body.len();
        let doc = format!(
            "{body}<index name=\"scan\">\n<offset id=\"1\">7</offset>\n<offset id=\"3\">15</offset>\n</index>\n<indexOffset>{index_start}</indexOffset>\n</mzXML>\n"
        );
        let mut handle = io::Cursor::new(doc.into_bytes());
        let (index, chroms) = IndexedXMLIndexExtractor::new(IndexDialect::MzXML)
            .read_index_from_end(&mut handle)
            .unwrap();
        assert_eq!(index.first_scan, 1);
        assert_eq!(index.last_scan, 3);
        assert_eq!(index.scan_count(), 2);
        assert_eq!(index.get(3), Some(15));
        assert!(chroms.is_empty());
    }

    #[test_log::test]
    fn test_read_mzml_index() {
        let body = "<indexedmzML><mzML></mzML>\n";
        let index_start = body.len();
        let doc = format!(
            "{body}<indexList count=\"2\">\n<index name=\"spectrum\">\n<offset idRef=\"controllerType=0 controllerNumber=1 scan=2\">30</offset>\n<offset idRef=\"controllerType=0 controllerNumber=1 scan=5\">90</offset>\n</index>\n<index name=\"chromatogram\">\n<offset idRef=\"TIC\">120</offset>\n</index>\n</indexList>\n<indexListOffset>{index_start}</indexListOffset>\n</indexedmzML>\n"
        );
        let mut handle = io::Cursor::new(doc.into_bytes());
        let (index, chroms) = IndexedXMLIndexExtractor::new(IndexDialect::MzML)
            .read_index_from_end(&mut handle)
            .unwrap();
        assert_eq!(index.first_scan, 2);
        assert_eq!(index.last_scan, 5);
        assert_eq!(index.len(), 6);
        assert_eq!(index.get(5), Some(90));
        assert_eq!(chroms.get_index(0), Some(("TIC", 120)));
    }

    #[test]
    fn test_unnumbered_mzml_index() {
        let body = "<indexedmzML><mzML></mzML>\n";
        let index_start = body.len();
        let doc = format!(
            "{body}<indexList count=\"1\">\n<index name=\"spectrum\">\n<offset idRef=\"index=0\">10</offset>\n<offset idRef=\"index=1\">20</offset>\n</index>\n</indexList>\n<indexListOffset>{index_start}</indexListOffset>\n</indexedmzML>\n"
        );
        let mut handle = io::Cursor::new(doc.into_bytes());
        let (index, _) = IndexedXMLIndexExtractor::new(IndexDialect::MzML)
            .read_index_from_end(&mut handle)
            .unwrap();
        assert_eq!(index.first_scan, 1);
        assert_eq!(index.last_scan, 2);
        assert_eq!(index.get(1), Some(10));
        assert_eq!(index.get(2), Some(20));
    }

    #[test]
    fn test_huge_scan_number() {
        let body = "<mzXML><msRun></msRun>\n";
        let index_start = body.len();
        let doc = format!(
            "{body}<index name=\"scan\">\n<offset id=\"4000000000\">7</offset>\n</index>\n<indexOffset>{index_start}</indexOffset>\n</mzXML>\n"
        );
        let mut handle = io::Cursor::new(doc.into_bytes());
        let err = IndexedXMLIndexExtractor::new(IndexDialect::MzXML)
            .read_index_from_end(&mut handle)
            .unwrap_err();
        assert!(matches!(err, IndexError::ScanNumberOutOfRange(_)));
    }

    #[test]
    fn test_missing_marker() {
        let mut handle = io::Cursor::new(b"<mzML><run></run></mzML>".to_vec());
        let err = IndexedXMLIndexExtractor::new(IndexDialect::MzML)
            .read_index_from_end(&mut handle)
            .unwrap_err();
        assert!(matches!(err, IndexError::OffsetNotFound));
    }
}
