//! The in-memory representation of spectra, peaks and chromatograms, along with
//! the binary array codec and the flat serialization format.
pub mod bindata;
pub mod chromatogram;
pub mod peaks;
pub mod scan_properties;
pub mod serialization;
pub mod spectrum_types;

pub use crate::spectrum::bindata::{
    ArrayType, BinaryCompressionType, BinaryDataArrayType, BinaryDecodeError, ByteOrder,
};
pub use crate::spectrum::chromatogram::{Chromatogram, ChromatogramPoint};
pub use crate::spectrum::peaks::{Peak, PeakEx, PeakRecord};
pub use crate::spectrum::scan_properties::{
    FragmentationType, PrecursorIon, ScanPolarity, SpectrumHeader,
};
pub use crate::spectrum::serialization::{
    read_chromatogram, read_spectrum, spectrum_from_bytes, spectrum_to_bytes,
    write_chromatogram, write_spectrum, SerializationError,
};
pub use crate::spectrum::spectrum_types::{Spectrum, SpectrumEx, SpectrumType};
