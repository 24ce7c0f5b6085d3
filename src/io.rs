//! Reading and writing mass spectrometry data file formats and abstractions over them.
//!
//! Each supported format has a reader implementing [`SpectrumFileReader`], which addresses
//! spectra by scan number through the offset index the file carries. [`FileReader`] picks
//! the right reader for a path and never lets a read fail.
//!
mod file_reader;
mod filter;
mod infer_format;
pub mod mzml;
pub mod mzxml;
mod offset_index;
pub mod thermo;
pub(crate) mod traits;
mod utils;
pub mod xml_index;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use crate::io::file_reader::{FileReader, FileSpectrumIter, ReadablePeak};
pub use crate::io::filter::MsFilter;
pub use crate::io::infer_format::{
    infer_from_path, infer_readable_format, MassSpectrometryFormat,
};
pub use crate::io::mzml::{
    MzMLParserError, MzMLReader, MzMLReaderType, MzMLWriter, MzMLWriterError, MzMLWriterType,
};
pub use crate::io::mzxml::{MzXMLParserError, MzXMLReader, MzXMLReaderType};
pub use crate::io::offset_index::{OffsetIndex, ScanIndex};
pub use crate::io::thermo::{
    MetaClass, MetaDictionary, RawDataProvider, RawProviderFactory, ThermoRawReader,
    ThermoRawReaderType,
};
pub use crate::io::traits::{ReaderError, ScanCursor, SpectrumFileReader};
pub use crate::io::xml_index::{IndexDialect, IndexError, IndexedXMLIndexExtractor};
