use std::fmt::Display;

/// The kinds of trailer extra values the RAW reader knows how to apply
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaClass {
    #[default]
    None,
    Analyzer,
    ChargeState,
    FaimsState,
    FaimsCV,
    IIT,
    MasterScanNumber,
    MonoisotopicMZ,
    ScanDescription,
    ScanNumber,
    TIC,
}

impl Display for MetaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const META_TERMS: &[(&str, MetaClass)] = &[
    ("MassAnalyzer", MetaClass::Analyzer),
    ("Charge State", MetaClass::ChargeState),
    ("Charge State:", MetaClass::ChargeState),
    ("Charge", MetaClass::ChargeState),
    ("Z", MetaClass::ChargeState),
    ("FAIMS Voltage On", MetaClass::FaimsState),
    ("FAIMS Voltage On:", MetaClass::FaimsState),
    ("FAIMS Voltage", MetaClass::FaimsCV),
    ("FAIMS CV", MetaClass::FaimsCV),
    ("Ion Injection Time (ms)", MetaClass::IIT),
    ("Ion Injection Time (ms):", MetaClass::IIT),
    ("Master Scan Number", MetaClass::MasterScanNumber),
    ("Master Scan Number:", MetaClass::MasterScanNumber),
    ("Monoisotopic M/Z", MetaClass::MonoisotopicMZ),
    ("Monoisotopic M/Z:", MetaClass::MonoisotopicMZ),
    ("Monoisotopic", MetaClass::MonoisotopicMZ),
    ("Mono M/Z", MetaClass::MonoisotopicMZ),
    ("Scan Description", MetaClass::ScanDescription),
    ("Scan Description:", MetaClass::ScanDescription),
    ("Scan", MetaClass::ScanNumber),
    ("ScanNumber", MetaClass::ScanNumber),
    ("TIC", MetaClass::TIC),
    ("Total Ion Current", MetaClass::TIC),
];

/**
Classifies the free-form trailer labels vendor files attach to each scan.

Matching is exact, including case and any trailing colon, since different
instrument generations spell the same label with and without one.
*/
pub struct MetaDictionary;

impl MetaDictionary {
    pub fn find_meta(label: &str) -> MetaClass {
        META_TERMS
            .iter()
            .find(|(term, _)| *term == label)
            .map(|(_, class)| *class)
            .unwrap_or_default()
    }

    /// Every label known to belong to `class`
    pub fn labels_for(class: MetaClass) -> impl Iterator<Item = &'static str> {
        META_TERMS
            .iter()
            .filter(move |(_, c)| *c == class)
            .map(|(term, _)| *term)
    }
}
