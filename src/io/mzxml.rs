//! Implements a reader for the indexed mzXML file format.

pub mod reader;

pub use crate::io::mzxml::reader::{
    parse_duration_minutes, MzXMLParserError, MzXMLParserState, MzXMLReader, MzXMLReaderType,
    MzXMLSpectrumBuilder, PeaksContext,
};
