use std::fmt::Display;
use std::str::FromStr;

use indexmap::IndexMap;

/**
Describes the polarity of a mass spectrum. A spectrum is either `Positive` (1+), `Negative` (-1)
or `Unknown` (0). The `Unknown` state is the default.
*/
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanPolarity {
    #[default]
    Unknown = 0,
    Positive = 1,
    Negative = -1,
}

impl ScanPolarity {
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }
}

/// The dissociation method used to fragment a precursor ion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FragmentationType {
    #[default]
    None,
    CID,
    ECD,
    ETD,
    EThcD,
    ETDSA,
    HCD,
    IRMPD,
    PQD,
    SID,
}

impl Display for FragmentationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized fragmentation method {0:?}")]
pub struct FragmentationTypeParseError(pub String);

impl FromStr for FragmentationType {
    type Err = FragmentationTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tp = match s.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Self::None,
            "CID" => Self::CID,
            "ECD" => Self::ECD,
            "ETD" => Self::ETD,
            "ETHCD" => Self::EThcD,
            "ETDSA" => Self::ETDSA,
            "HCD" => Self::HCD,
            "IRMPD" => Self::IRMPD,
            "PQD" => Self::PQD,
            "SID" => Self::SID,
            _ => return Err(FragmentationTypeParseError(s.to_string())),
        };
        Ok(tp)
    }
}

/// Describes a single ion isolated and fragmented to produce a dependent scan
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecursorIon {
    /// The isolation window target m/z
    pub isolation_mz: f64,
    /// The full width of the isolation window
    pub isolation_width: f64,
    /// The monoisotopic m/z, or 0 when the source did not report a trusted value
    pub monoisotopic_mz: f64,
    /// The charge state, or 0 when unknown
    pub charge: i32,
    pub intensity: f64,
    pub collision_energy: f64,
    pub fragmentation_method: FragmentationType,
}

impl PrecursorIon {
    /// The charge state to use for mass calculations, assuming `default` when
    /// the charge is not known.
    pub fn effective_charge(&self, default: i32) -> i32 {
        if self.charge == 0 {
            default
        } else {
            self.charge
        }
    }
}

/**
The scan-level metadata shared by every spectrum representation.

A header with a `scan_number` of 0 describes an empty spectrum, the sentinel
every read operation returns when there is nothing (more) to read.
*/
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumHeader {
    pub scan_number: u32,
    /// The MS level, 0 when unknown
    pub ms_level: u8,
    pub centroid: bool,
    pub polarity: ScanPolarity,
    /// Retention time in minutes
    pub retention_time: f64,
    pub start_mz: f64,
    pub end_mz: f64,
    pub lowest_mz: f64,
    pub highest_mz: f64,
    pub base_peak_mz: f64,
    pub base_peak_intensity: f64,
    pub total_ion_current: f64,
    /// Ion injection time in milliseconds
    pub ion_injection_time: f64,
    pub elapsed_scan_time: f64,
    pub faims_cv: f64,
    pub faims_state: bool,
    pub scan_filter: String,
    pub analyzer: String,
    pub scan_type: String,
    pub scan_description: String,
    pub scan_event: i32,
    pub master_index: i32,
    pub precursor_master_scan_number: i32,
    pub activation_method: String,
    pub detector_type: String,
    pub description: String,
    pub collision_energy: f64,
    pub precursors: Vec<PrecursorIon>,
    /// Values without a dedicated field, keyed by their source label
    pub metadata: IndexMap<String, String>,
}

impl SpectrumHeader {
    pub fn is_empty(&self) -> bool {
        self.scan_number == 0
    }
}
