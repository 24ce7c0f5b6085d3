use std::fmt::Display;
use std::path::Path;

use crate::io::traits::ReaderError;

/// Mass spectrometry file formats that [`novaio`](crate) recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MassSpectrometryFormat {
    ThermoRaw,
    MzML,
    MzXML,
    MGF,
    Unknown,
}

impl MassSpectrometryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MassSpectrometryFormat::ThermoRaw => "raw",
            MassSpectrometryFormat::MzML => "mzml",
            MassSpectrometryFormat::MzXML => "mzxml",
            MassSpectrometryFormat::MGF => "mgf",
            MassSpectrometryFormat::Unknown => "unknown",
        }
    }

    /// Whether a reader exists for this format
    pub fn is_readable(&self) -> bool {
        matches!(
            self,
            MassSpectrometryFormat::ThermoRaw
                | MassSpectrometryFormat::MzML
                | MassSpectrometryFormat::MzXML
        )
    }
}

impl Display for MassSpectrometryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Given a path, infer the file format from its extension, ignoring case
pub fn infer_from_path<P: AsRef<Path>>(path: P) -> MassSpectrometryFormat {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("raw") => MassSpectrometryFormat::ThermoRaw,
        Some("mzml") => MassSpectrometryFormat::MzML,
        Some("mzxml") => MassSpectrometryFormat::MzXML,
        Some("mgf") => MassSpectrometryFormat::MGF,
        _ => MassSpectrometryFormat::Unknown,
    }
}

/// As [`infer_from_path`], rejecting formats that cannot be read
pub fn infer_readable_format<P: AsRef<Path>>(path: P) -> Result<MassSpectrometryFormat, ReaderError> {
    let path = path.as_ref();
    match infer_from_path(path) {
        MassSpectrometryFormat::Unknown => Err(ReaderError::UnknownFormat(path.to_path_buf())),
        form if !form.is_readable() => Err(ReaderError::UnsupportedFormat(form.to_string())),
        form => Ok(form),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_infer_from_path() {
        assert_eq!(infer_from_path("run.mzML"), MassSpectrometryFormat::MzML);
        assert_eq!(infer_from_path("run.MZXML"), MassSpectrometryFormat::MzXML);
        assert_eq!(infer_from_path("/data/run.RAW"), MassSpectrometryFormat::ThermoRaw);
        assert_eq!(infer_from_path("run.mgf"), MassSpectrometryFormat::MGF);
        assert_eq!(infer_from_path("run.mzML.gz"), MassSpectrometryFormat::Unknown);
        assert_eq!(infer_from_path("run"), MassSpectrometryFormat::Unknown);
    }

    #[test]
    fn test_infer_readable_format() {
        assert_eq!(
            infer_readable_format("a.mzml").unwrap(),
            MassSpectrometryFormat::MzML
        );
        assert!(matches!(
            infer_readable_format("a.mgf"),
            Err(ReaderError::UnsupportedFormat(s)) if s == "mgf"
        ));
        assert!(matches!(
            infer_readable_format("a.txt"),
            Err(ReaderError::UnknownFormat(_))
        ));
    }
}
