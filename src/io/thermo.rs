//! Reader for Thermo RAW files, [`ThermoRawReaderType`].
//!
//! The vendor format is read through a [`RawDataProvider`], the seam an SDK binding
//! implements. The reader translates the provider's scan filters, statistics, reactions
//! and trailer extra values into [`Spectrum`](crate::spectrum::Spectrum)s.
//!
//! ```no_run
//! use std::io;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use novaio::io::{RawDataProvider, RawProviderFactory, SpectrumFileReader, ThermoRawReader};
//!
//! # fn open_with_sdk(path: &Path) -> io::Result<Box<dyn RawDataProvider>> { unimplemented!() }
//! # fn main() -> Result<(), novaio::io::ReaderError> {
//! let factory: Arc<dyn RawProviderFactory> = Arc::new(open_with_sdk);
//! let mut reader = ThermoRawReader::with_factory(factory);
//! reader.open(Path::new("./run.raw"))?;
//! let scan = reader.get_spectrum(None, true)?;
//! #    Ok(())
//! # }
//! ```
mod meta;
mod reader;

pub use meta::{MetaClass, MetaDictionary};
pub use reader::{
    CentroidStream, MassAnalyzer, RawDataProvider, RawProviderFactory, RawReaction,
    RawScanFilter, RawScanStatistics, SegmentedScan, SpectrumPacketType, ThermoRawReader,
    ThermoRawReaderType,
};
