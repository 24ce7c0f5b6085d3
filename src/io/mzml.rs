//! Implements a reader and a writer for the PSI-MS indexedmzML XML file format
//! for representing raw and processed mass spectra.

mod reading_shared;
pub mod reader;
pub mod writer;

pub use crate::io::mzml::reading_shared::{
    ControlledVocabulary, MzMLParserError, MzMLParserState, Param, ParserResult,
};

pub use crate::io::mzml::reader::{
    MzMLChromatogramBuilder, MzMLReader, MzMLReaderType, MzMLSpectrumBuilder, ParserContext,
};

pub use crate::io::mzml::writer::{
    MzMLWriter, MzMLWriterError, MzMLWriterState, MzMLWriterType, WriterResult,
};
