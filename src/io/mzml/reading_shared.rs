use std::io;
use std::str::FromStr;

use quick_xml::events::{BytesEnd, BytesStart, BytesText};
use quick_xml::Error as XMLError;

use thiserror::Error;

use crate::spectrum::BinaryDecodeError;

/**
The different states the [`MzMLReaderType`](super::MzMLReaderType) can enter while
parsing a single `<spectrum>` or `<chromatogram>` element. This information is really
only needed by the module consumer to determine where in the document an error occurred.
*/
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum MzMLParserState {
    Start = 0,

    Spectrum,
    SpectrumDone,

    BinaryDataArrayList,
    BinaryDataArray,
    Binary,

    ScanList,
    Scan,

    PrecursorList,
    Precursor,
    IsolationWindow,
    SelectedIonList,
    SelectedIon,
    Activation,

    Chromatogram,
    ChromatogramDone,

    ParserError,
    EOF,
}

/**
All the ways that mzML parsing can go wrong
*/
#[derive(Debug, Error)]
pub enum MzMLParserError {
    #[error("An error occurred outside of normal conditions {0:?}")]
    UnknownError(MzMLParserState),
    #[error("An incomplete element was parsed, ending in {0:?}")]
    IncompleteElement(MzMLParserState),
    #[error("The attribute {1} could not be read as a number in {0:?}: {2:?}")]
    MalformedAttribute(MzMLParserState, String, String),
    #[error("The value of {1} could not be read as a number in {0:?}: {2:?}")]
    MalformedParam(MzMLParserState, String, String),
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(MzMLParserState, #[source] XMLError),
    #[error("Failed to decode a binary data array in {0:?}: {1}")]
    ArrayDecodingError(MzMLParserState, #[source] BinaryDecodeError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(MzMLParserState, #[source] io::Error),
}

impl From<MzMLParserError> for io::Error {
    fn from(value: MzMLParserError) -> Self {
        match value {
            MzMLParserError::IOError(_, ref e) => io::Error::new(e.kind(), value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type ParserResult = Result<MzMLParserState, MzMLParserError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlledVocabulary {
    MS,
    UO,
    Unknown,
}

impl FromStr for ControlledVocabulary {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "MS" | "PSI-MS" => Self::MS,
            "UO" => Self::UO,
            _ => Self::Unknown,
        })
    }
}

/// Split a CURIE like `MS:1000511` into its vocabulary and its accession number
pub fn curie_to_num(curie: &str) -> (ControlledVocabulary, Option<u32>) {
    let mut parts = curie.splitn(2, ':');
    let prefix = parts
        .next()
        .map(|p| match p.parse::<ControlledVocabulary>() {
            Ok(cv) => cv,
            Err(never) => match never {},
        })
        .unwrap_or(ControlledVocabulary::Unknown);
    let accession = parts.next().and_then(|k| k.parse().ok());
    (prefix, accession)
}

/// A `<cvParam>` or `<userParam>` element, reduced to the attributes the reader uses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: String,
    pub accession: Option<u32>,
    pub controlled_vocabulary: Option<ControlledVocabulary>,
    pub unit_accession: Option<String>,
}

impl Param {
    /// Whether this is the PSI-MS term with accession number `accession`
    pub fn is_ms(&self, accession: u32) -> bool {
        self.accession == Some(accession)
            && matches!(self.controlled_vocabulary, Some(ControlledVocabulary::MS))
    }

    /// Parse the value, reporting the parameter name on failure
    pub fn coerce<T: FromStr>(&self, state: MzMLParserState) -> Result<T, MzMLParserError> {
        self.value.trim().parse::<T>().map_err(|_| {
            MzMLParserError::MalformedParam(state, self.name.clone(), self.value.clone())
        })
    }
}

/**
Common XML error handling behaviors
*/
pub trait XMLParseBase {
    fn handle_xml_error(&self, error: XMLError, state: MzMLParserState) -> MzMLParserError {
        MzMLParserError::XMLError(state, error)
    }
}

/**
Common `CVParam` parsing behaviors
*/
pub trait CVParamParse: XMLParseBase {
    fn handle_param(event: &BytesStart, state: MzMLParserState) -> Result<Param, MzMLParserError> {
        let mut param = Param::default();
        for attr_parsed in event.attributes() {
            let attr = attr_parsed.map_err(|e| MzMLParserError::XMLError(state, e.into()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| MzMLParserError::XMLError(state, e))?;
            match attr.key.as_ref() {
                b"name" => param.name = value.to_string(),
                b"value" => param.value = value.to_string(),
                b"accession" => {
                    let (cv, acc) = curie_to_num(&value);
                    param.controlled_vocabulary = Some(cv);
                    param.accession = acc;
                }
                b"unitAccession" => param.unit_accession = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(param)
    }
}

/// Read the value of attribute `name` from `event`, if it is present
pub fn get_attribute(
    event: &BytesStart,
    name: &[u8],
    state: MzMLParserState,
) -> Result<Option<String>, MzMLParserError> {
    for attr_parsed in event.attributes() {
        let attr = attr_parsed.map_err(|e| MzMLParserError::XMLError(state, e.into()))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| MzMLParserError::XMLError(state, e))?;
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

/// Read a numeric attribute, treating a missing attribute as `T::default()`
pub fn get_numeric_attribute<T: FromStr + Default>(
    event: &BytesStart,
    name: &[u8],
    state: MzMLParserState,
) -> Result<T, MzMLParserError> {
    match get_attribute(event, name, state)? {
        Some(value) => value.trim().parse::<T>().map_err(|_| {
            MzMLParserError::MalformedAttribute(
                state,
                String::from_utf8_lossy(name).to_string(),
                value,
            )
        }),
        None => Ok(T::default()),
    }
}

pub trait MzMLSAX {
    fn start_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult;

    fn empty_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult;

    fn end_element(&mut self, event: &BytesEnd, state: MzMLParserState) -> ParserResult;

    fn text(&mut self, event: &BytesText, state: MzMLParserState) -> ParserResult;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_curie() {
        assert_eq!(
            curie_to_num("MS:1000511"),
            (ControlledVocabulary::MS, Some(1000511))
        );
        assert_eq!(
            curie_to_num("UO:0000030"),
            (ControlledVocabulary::UO, Some(30))
        );
        assert_eq!(curie_to_num("bogus"), (ControlledVocabulary::Unknown, None));
    }

    #[test]
    fn test_handle_param() {
        struct Parser;
        impl XMLParseBase for Parser {}
        impl CVParamParse for Parser {}

        let event = BytesStart::from_content(
            r#"cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="90.5" unitAccession="UO:0000010""#,
            7,
        );
        let param = Parser::handle_param(&event, MzMLParserState::Scan).unwrap();
        assert!(param.is_ms(1000016));
        assert_eq!(param.coerce::<f64>(MzMLParserState::Scan).unwrap(), 90.5);
        assert_eq!(param.unit_accession.as_deref(), Some("UO:0000010"));

        let event = BytesStart::from_content(r#"cvParam accession="MS:1000511" value="two""#, 7);
        let param = Parser::handle_param(&event, MzMLParserState::Spectrum).unwrap();
        assert!(param.coerce::<u8>(MzMLParserState::Spectrum).is_err());
    }
}
