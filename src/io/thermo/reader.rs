use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::io::filter::MsFilter;
use crate::io::traits::{ReaderError, ScanCursor, SpectrumFileReader};
use crate::spectrum::{
    Chromatogram, PeakEx, PrecursorIon, ScanPolarity, Spectrum, SpectrumEx,
};

use super::meta::{MetaClass, MetaDictionary};

/// The mass analyzer a vendor scan filter reports
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MassAnalyzer {
    FTMS,
    ITMS,
    ASTMS,
    #[default]
    Other,
}

impl MassAnalyzer {
    pub fn as_str(&self) -> &'static str {
        match self {
            MassAnalyzer::FTMS => "FTMS",
            MassAnalyzer::ITMS => "ITMS",
            MassAnalyzer::ASTMS => "Astral",
            MassAnalyzer::Other => "Unknown",
        }
    }
}

impl Display for MassAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a scan's peak data was recorded on the instrument
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumPacketType {
    FtProfile,
    FtCentroid,
    LinearTrapProfile,
    LinearTrapCentroid,
    #[default]
    Other,
}

/// The parts of a vendor scan filter the reader uses
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawScanFilter {
    pub ms_order: u8,
    pub polarity: ScanPolarity,
    pub mass_analyzer: MassAnalyzer,
    pub scan_mode: String,
    pub text: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawScanStatistics {
    pub scan_number: u32,
    pub is_centroid: bool,
    pub tic: f64,
    pub base_peak_mass: f64,
    pub base_peak_intensity: f64,
    pub low_mass: f64,
    pub high_mass: f64,
    pub packet_type: SpectrumPacketType,
}

/// The first reaction of a dependent scan
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RawReaction {
    pub precursor_mass: f64,
    pub isolation_width: f64,
}

/// Parallel arrays of picked peaks, as vendor centroid streams store them
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CentroidStream {
    pub masses: Vec<f64>,
    pub intensities: Vec<f64>,
    pub noises: Vec<f64>,
    pub baselines: Vec<f64>,
    pub resolutions: Vec<f64>,
    pub charges: Vec<i32>,
}

impl CentroidStream {
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    fn peak_at(&self, i: usize) -> PeakEx {
        let mut peak = PeakEx::new(self.masses[i], self.intensities[i] as f32);
        peak.noise = self.noises.get(i).copied().unwrap_or_default();
        peak.baseline = self.baselines.get(i).copied().unwrap_or_default();
        peak.resolution = self.resolutions.get(i).copied().unwrap_or_default();
        peak.charge = self.charges.get(i).copied().unwrap_or_default();
        peak
    }
}

/// The profile trace of a scan
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SegmentedScan {
    pub positions: Vec<f64>,
    pub intensities: Vec<f64>,
}

/**
The access a vendor SDK binding has to provide for [`ThermoRawReaderType`] to read
a RAW file. Scan numbers are the vendor's, starting at [`RawDataProvider::first_spectrum`].

Retention times are in minutes.
*/
pub trait RawDataProvider {
    fn first_spectrum(&self) -> u32;
    fn last_spectrum(&self) -> u32;
    fn spectra_count(&self) -> usize;

    fn retention_time(&mut self, scan: u32) -> io::Result<f64>;
    fn scan_filter(&mut self, scan: u32) -> io::Result<RawScanFilter>;
    fn scan_statistics(&mut self, scan: u32) -> io::Result<RawScanStatistics>;

    /// The first reaction of the scan, if it has one
    fn reaction(&mut self, scan: u32) -> io::Result<Option<RawReaction>>;

    /// The trailer extra label/value pairs of the scan, in file order
    fn trailer_extra(&mut self, scan: u32) -> io::Result<Vec<(String, String)>>;

    fn centroid_stream(&mut self, scan: u32) -> io::Result<CentroidStream>;
    fn segmented_scan(&mut self, scan: u32) -> io::Result<SegmentedScan>;

    fn chromatogram_count(&self) -> usize {
        0
    }

    fn chromatogram(&mut self, index: usize) -> io::Result<Option<Chromatogram>> {
        let _ = index;
        Ok(None)
    }

    /// Release the SDK's hold on the file
    fn close(&mut self) {}
}

impl<T: RawDataProvider + ?Sized> RawDataProvider for Box<T> {
    fn first_spectrum(&self) -> u32 {
        (**self).first_spectrum()
    }

    fn last_spectrum(&self) -> u32 {
        (**self).last_spectrum()
    }

    fn spectra_count(&self) -> usize {
        (**self).spectra_count()
    }

    fn retention_time(&mut self, scan: u32) -> io::Result<f64> {
        (**self).retention_time(scan)
    }

    fn scan_filter(&mut self, scan: u32) -> io::Result<RawScanFilter> {
        (**self).scan_filter(scan)
    }

    fn scan_statistics(&mut self, scan: u32) -> io::Result<RawScanStatistics> {
        (**self).scan_statistics(scan)
    }

    fn reaction(&mut self, scan: u32) -> io::Result<Option<RawReaction>> {
        (**self).reaction(scan)
    }

    fn trailer_extra(&mut self, scan: u32) -> io::Result<Vec<(String, String)>> {
        (**self).trailer_extra(scan)
    }

    fn centroid_stream(&mut self, scan: u32) -> io::Result<CentroidStream> {
        (**self).centroid_stream(scan)
    }

    fn segmented_scan(&mut self, scan: u32) -> io::Result<SegmentedScan> {
        (**self).segmented_scan(scan)
    }

    fn chromatogram_count(&self) -> usize {
        (**self).chromatogram_count()
    }

    fn chromatogram(&mut self, index: usize) -> io::Result<Option<Chromatogram>> {
        (**self).chromatogram(index)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Opens a [`RawDataProvider`] for a path. Any `Fn(&Path) -> io::Result<P>` is a factory.
pub trait RawProviderFactory<P: RawDataProvider = Box<dyn RawDataProvider>> {
    fn open_provider(&self, path: &Path) -> io::Result<P>;
}

impl<P: RawDataProvider, F> RawProviderFactory<P> for F
where
    F: Fn(&Path) -> io::Result<P>,
{
    fn open_provider(&self, path: &Path) -> io::Result<P> {
        (self)(path)
    }
}

fn parse_trailer_value<T: std::str::FromStr>(label: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Could not parse trailer value {label:?} = {value:?}");
            None
        }
    }
}

fn apply_trailer(spectrum: &mut SpectrumEx, label: &str, value: &str) {
    let header = &mut spectrum.header;
    match MetaDictionary::find_meta(label) {
        MetaClass::ChargeState => {
            if let (Some(prec), Some(z)) = (
                header.precursors.first_mut(),
                parse_trailer_value(label, value),
            ) {
                prec.charge = z;
            }
        }
        MetaClass::MonoisotopicMZ => {
            if let (Some(prec), Some(mz)) = (
                header.precursors.first_mut(),
                parse_trailer_value(label, value),
            ) {
                prec.monoisotopic_mz = mz;
            }
        }
        MetaClass::FaimsCV => {
            if let Some(cv) = parse_trailer_value(label, value) {
                header.faims_cv = cv;
            }
        }
        MetaClass::FaimsState => {
            header.faims_state = matches!(value.trim(), "true" | "True");
        }
        MetaClass::IIT => {
            if let Some(iit) = parse_trailer_value(label, value) {
                header.ion_injection_time = iit;
            }
        }
        MetaClass::MasterScanNumber => {
            if let Some(master) = parse_trailer_value(label, value) {
                header.precursor_master_scan_number = master;
            }
        }
        MetaClass::ScanDescription => {
            header.scan_description = value.trim().to_string();
        }
        // Already taken from the scan filter and statistics
        MetaClass::Analyzer | MetaClass::ScanNumber | MetaClass::TIC => {}
        MetaClass::None => {
            header
                .metadata
                .insert(label.to_string(), value.to_string());
        }
    }
}

/**
Read one scan from `provider`.

A scan whose MS order `filter` rejects is returned without being read further,
carrying only its MS level so the cursor can skip it.
*/
fn read_raw_scan<D: RawDataProvider + ?Sized>(
    provider: &mut D,
    scan: u32,
    centroid: bool,
    filter: MsFilter,
) -> io::Result<SpectrumEx> {
    let scan_filter = provider.scan_filter(scan)?;
    if !filter.accepts(scan_filter.ms_order) {
        let mut skipped = SpectrumEx::empty();
        skipped.header.ms_level = scan_filter.ms_order;
        return Ok(skipped);
    }

    let stats = provider.scan_statistics(scan)?;

    let mut centroid_peaks: Option<Vec<PeakEx>> = None;
    if centroid && (stats.is_centroid || stats.packet_type == SpectrumPacketType::FtProfile) {
        let stream = provider.centroid_stream(scan)?;
        if !stream.is_empty() {
            centroid_peaks = Some((0..stream.len()).map(|i| stream.peak_at(i)).collect());
        }
    }
    let used_stream = centroid_peaks.is_some();
    let peaks: Vec<PeakEx> = match centroid_peaks {
        Some(peaks) => peaks,
        None => {
            let profile = provider.segmented_scan(scan)?;
            profile
                .positions
                .iter()
                .zip(profile.intensities.iter())
                .map(|(mz, int)| PeakEx::new(*mz, *int as f32))
                .collect()
        }
    };

    let mut spectrum = SpectrumEx::with_capacity(0);
    spectrum.peaks = peaks;
    let header = &mut spectrum.header;
    header.scan_number = stats.scan_number;
    header.centroid = used_stream || stats.is_centroid;
    header.total_ion_current = stats.tic;
    header.base_peak_mz = stats.base_peak_mass;
    header.base_peak_intensity = stats.base_peak_intensity;
    header.start_mz = stats.low_mass;
    header.end_mz = stats.high_mass;

    header.retention_time = provider.retention_time(scan)?;
    header.ms_level = scan_filter.ms_order;
    header.polarity = scan_filter.polarity;
    header.analyzer = scan_filter.mass_analyzer.to_string();
    header.scan_type = scan_filter.scan_mode;
    header.scan_filter = scan_filter.text;

    if let (Some(first), Some(last)) = (spectrum.peaks.first(), spectrum.peaks.last()) {
        spectrum.header.lowest_mz = first.mz;
        spectrum.header.highest_mz = last.mz;
    }

    if scan_filter.ms_order > 1 {
        if let Some(reaction) = provider.reaction(scan)? {
            spectrum.header.precursors.push(PrecursorIon {
                isolation_mz: reaction.precursor_mass,
                isolation_width: reaction.isolation_width,
                ..Default::default()
            });
        }
    }

    for (label, value) in provider.trailer_extra(scan)? {
        apply_trailer(&mut spectrum, &label, &value);
    }
    Ok(spectrum)
}

/**
Reads Thermo RAW files through a [`RawDataProvider`].

The reader itself knows nothing of the vendor format. It either wraps a provider
directly with [`ThermoRawReaderType::from_provider`] or opens one per path through
a registered [`RawProviderFactory`].
*/
pub struct ThermoRawReaderType<P: RawDataProvider> {
    provider: Option<P>,
    factory: Option<Arc<dyn RawProviderFactory<P>>>,
    path: Option<PathBuf>,
    cursor: ScanCursor,
    filter: MsFilter,
    first_scan: u32,
    last_scan: u32,
    scan_count: usize,
    max_retention_time: f64,
}

/// A RAW reader over whatever provider the registered factory produces
pub type ThermoRawReader = ThermoRawReaderType<Box<dyn RawDataProvider>>;

impl<P: RawDataProvider> Default for ThermoRawReaderType<P> {
    fn default() -> Self {
        Self {
            provider: None,
            factory: None,
            path: None,
            cursor: ScanCursor::default(),
            filter: MsFilter::default(),
            first_scan: 0,
            last_scan: 0,
            scan_count: 0,
            max_retention_time: 0.0,
        }
    }
}

impl<P: RawDataProvider> ThermoRawReaderType<P> {
    pub fn with_factory(factory: Arc<dyn RawProviderFactory<P>>) -> Self {
        let mut this = Self::default();
        this.factory = Some(factory);
        this
    }

    /// Wrap an already opened provider
    pub fn from_provider(provider: P) -> Result<Self, ReaderError> {
        let mut this = Self::default();
        this.attach(provider, None)?;
        Ok(this)
    }

    fn attach(&mut self, mut provider: P, path: Option<PathBuf>) -> Result<(), ReaderError> {
        self.close_provider();
        self.first_scan = provider.first_spectrum();
        self.last_scan = provider.last_spectrum();
        self.scan_count = provider.spectra_count();
        self.max_retention_time = if self.scan_count > 0 {
            provider.retention_time(self.last_scan)?
        } else {
            0.0
        };
        debug!(
            "Opened RAW run {:?} with scans {}-{}",
            path, self.first_scan, self.last_scan
        );
        self.cursor = ScanCursor::default();
        self.provider = Some(provider);
        self.path = path;
        Ok(())
    }

    fn close_provider(&mut self) {
        if let Some(mut provider) = self.provider.take() {
            provider.close();
        }
        self.path = None;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read_next_matching(
        &mut self,
        scan: Option<u32>,
        centroid: bool,
    ) -> Result<SpectrumEx, ReaderError> {
        let provider = self.provider.as_mut().ok_or(ReaderError::NotOpen)?;
        let filter = self.filter;
        self.cursor
            .next_matching(scan, self.last_scan, filter, |n| {
                read_raw_scan(provider, n, centroid, filter)
            })
            .map_err(ReaderError::from)
    }
}

impl<P: RawDataProvider> SpectrumFileReader for ThermoRawReaderType<P> {
    fn open(&mut self, path: &Path) -> Result<(), ReaderError> {
        let factory = self
            .factory
            .clone()
            .ok_or_else(|| ReaderError::UnsupportedFormat("raw".to_string()))?;
        let provider = factory.open_provider(path)?;
        self.attach(provider, Some(path.to_path_buf()))
    }

    fn close(&mut self) {
        self.close_provider();
    }

    fn is_open(&self) -> bool {
        self.provider.is_some()
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn get_spectrum(&mut self, scan: Option<u32>, centroid: bool) -> Result<Spectrum, ReaderError> {
        self.read_next_matching(scan, centroid).map(Spectrum::from)
    }

    fn get_spectrum_ex(
        &mut self,
        scan: Option<u32>,
        centroid: bool,
    ) -> Result<SpectrumEx, ReaderError> {
        self.read_next_matching(scan, centroid)
    }

    fn get_chromatogram(&mut self, index: Option<usize>) -> Result<Chromatogram, ReaderError> {
        let provider = self.provider.as_mut().ok_or(ReaderError::NotOpen)?;
        match self
            .cursor
            .next_chromatogram(index, provider.chromatogram_count())
        {
            Some(i) => Ok(provider.chromatogram(i)?.unwrap_or_default()),
            None => Ok(Chromatogram::empty()),
        }
    }

    fn filter(&self) -> MsFilter {
        self.filter
    }

    fn set_filter(&mut self, filter: MsFilter) {
        self.filter = filter;
    }

    fn first_scan(&self) -> u32 {
        self.first_scan
    }

    fn last_scan(&self) -> u32 {
        self.last_scan
    }

    fn scan_count(&self) -> usize {
        self.scan_count
    }

    fn chromatogram_count(&self) -> usize {
        self.provider
            .as_ref()
            .map(|p| p.chromatogram_count())
            .unwrap_or_default()
    }

    fn max_retention_time(&self) -> f64 {
        self.max_retention_time
    }

    fn current_scan(&self) -> u32 {
        self.cursor.current
    }
}

impl<P: RawDataProvider> Drop for ThermoRawReaderType<P> {
    fn drop(&mut self) {
        self.close_provider();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::ChromatogramPoint;

    /// Scans 1, 4 and 7 are FT profile MS1 scans and the rest are centroided IT MS2 scans
    #[derive(Default)]
    struct MockRaw {
        closed: bool,
    }

    impl MockRaw {
        fn is_ms1(scan: u32) -> bool {
            scan % 3 == 1
        }
    }

    impl RawDataProvider for MockRaw {
        fn first_spectrum(&self) -> u32 {
            1
        }

        fn last_spectrum(&self) -> u32 {
            8
        }

        fn spectra_count(&self) -> usize {
            8
        }

        fn retention_time(&mut self, scan: u32) -> io::Result<f64> {
            Ok(scan as f64 * 0.5)
        }

        fn scan_filter(&mut self, scan: u32) -> io::Result<RawScanFilter> {
            let ms1 = Self::is_ms1(scan);
            Ok(RawScanFilter {
                ms_order: if ms1 { 1 } else { 2 },
                polarity: ScanPolarity::Positive,
                mass_analyzer: if ms1 {
                    MassAnalyzer::FTMS
                } else {
                    MassAnalyzer::ITMS
                },
                scan_mode: "Full".into(),
                text: format!("scan {scan}"),
            })
        }

        fn scan_statistics(&mut self, scan: u32) -> io::Result<RawScanStatistics> {
            let ms1 = Self::is_ms1(scan);
            Ok(RawScanStatistics {
                scan_number: scan,
                is_centroid: !ms1,
                tic: 1000.0,
                base_peak_mass: 500.0,
                base_peak_intensity: 600.0,
                low_mass: 100.0,
                high_mass: 2000.0,
                packet_type: if ms1 {
                    SpectrumPacketType::FtProfile
                } else {
                    SpectrumPacketType::LinearTrapCentroid
                },
            })
        }

        fn reaction(&mut self, scan: u32) -> io::Result<Option<RawReaction>> {
            Ok(Some(RawReaction {
                precursor_mass: 400.0 + scan as f64,
                isolation_width: 2.0,
            }))
        }

        fn trailer_extra(&mut self, scan: u32) -> io::Result<Vec<(String, String)>> {
            let master = scan - (scan - 1) % 3;
            Ok(vec![
                ("Charge State:".into(), "3".into()),
                ("Monoisotopic M/Z:".into(), format!("{}", 399.5 + scan as f64)),
                ("Ion Injection Time (ms):".into(), "12.5".into()),
                ("Master Scan Number:".into(), master.to_string()),
                ("FAIMS Voltage On:".into(), "True".into()),
                ("FAIMS CV".into(), "-45".into()),
                ("AGC Target:".into(), "50000".into()),
            ])
        }

        fn centroid_stream(&mut self, scan: u32) -> io::Result<CentroidStream> {
            Ok(CentroidStream {
                masses: vec![200.0, 300.0, 400.0 + scan as f64],
                intensities: vec![10.0, 20.0, 30.0],
                noises: vec![1.0; 3],
                baselines: vec![0.5; 3],
                resolutions: vec![60000.0; 3],
                charges: vec![0, 1, 2],
            })
        }

        fn segmented_scan(&mut self, _scan: u32) -> io::Result<SegmentedScan> {
            Ok(SegmentedScan {
                positions: vec![200.0, 200.01, 200.02, 200.03],
                intensities: vec![0.0, 5.0, 8.0, 0.0],
            })
        }

        fn chromatogram_count(&self) -> usize {
            1
        }

        fn chromatogram(&mut self, index: usize) -> io::Result<Option<Chromatogram>> {
            Ok((index == 0).then(|| {
                Chromatogram::new(
                    "TIC".into(),
                    vec![ChromatogramPoint {
                        retention_time: 0.5,
                        intensity: 1000.0,
                    }],
                )
            }))
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test_log::test]
    fn test_centroid_policy() {
        let mut reader = ThermoRawReaderType::from_provider(MockRaw::default()).unwrap();
        assert_eq!(reader.max_retention_time(), 4.0);

        // FT profile scans yield their centroid stream on request
        let spec = reader.get_spectrum_ex(Some(1), true).unwrap();
        assert!(spec.header.centroid);
        assert_eq!(spec.count(), 3);
        assert_eq!(spec.peaks[2].charge, 2);
        assert_eq!(spec.peaks[0].resolution, 60000.0);
        assert_eq!(spec.header.analyzer, "FTMS");
        assert!(spec.header.precursors.is_empty());

        let spec = reader.get_spectrum(Some(1), false).unwrap();
        assert!(!spec.header.centroid);
        assert_eq!(spec.count(), 4);
        assert_eq!(spec.header.lowest_mz, 200.0);
        assert_eq!(spec.header.highest_mz, 200.03);
    }

    #[test_log::test]
    fn test_precursor_and_trailer() {
        let mut reader = ThermoRawReaderType::from_provider(MockRaw::default()).unwrap();
        let spec = reader.get_spectrum(Some(3), true).unwrap();
        assert_eq!(spec.ms_level(), 2);
        assert_eq!(spec.header.analyzer, "ITMS");
        assert_eq!(spec.header.scan_type, "Full");
        assert_eq!(spec.header.scan_filter, "scan 3");
        assert_eq!(spec.header.retention_time, 1.5);
        assert_eq!(spec.header.precursor_master_scan_number, 1);
        assert_eq!(spec.header.ion_injection_time, 12.5);
        assert!(spec.header.faims_state);
        assert_eq!(spec.header.faims_cv, -45.0);
        assert_eq!(
            spec.header.metadata.get("AGC Target:").map(|s| s.as_str()),
            Some("50000")
        );

        let prec = &spec.header.precursors[0];
        assert_eq!(prec.isolation_mz, 403.0);
        assert_eq!(prec.isolation_width, 2.0);
        assert_eq!(prec.charge, 3);
        assert_eq!(prec.monoisotopic_mz, 402.5);
    }

    #[test_log::test]
    fn test_filtered_iteration() {
        let mut reader = ThermoRawReaderType::from_provider(MockRaw::default()).unwrap();
        reader.set_filter(MsFilter::MS1);
        let mut seen = Vec::new();
        loop {
            let spec = reader.get_spectrum(None, true).unwrap();
            if spec.is_empty() {
                break;
            }
            seen.push(spec.scan_number());
        }
        assert_eq!(seen, vec![1, 4, 7]);

        let spec = reader.get_spectrum(Some(2), true).unwrap();
        assert!(spec.is_empty());

        reader.reset();
        assert_eq!(reader.get_spectrum(None, true).unwrap().scan_number(), 1);
    }

    #[test_log::test]
    fn test_factory_and_chromatograms() {
        let mut reader = ThermoRawReader::default();
        assert!(matches!(
            reader.open(Path::new("run.raw")),
            Err(ReaderError::UnsupportedFormat(_))
        ));

        let factory: Arc<dyn RawProviderFactory> =
            Arc::new(|_: &Path| -> io::Result<Box<dyn RawDataProvider>> {
                Ok(Box::new(MockRaw::default()))
            });
        let mut reader = ThermoRawReader::with_factory(factory);
        reader.open(Path::new("run.raw")).unwrap();
        assert!(reader.is_open());
        assert_eq!(reader.path(), Some(Path::new("run.raw")));
        assert_eq!(reader.scan_count(), 8);
        assert_eq!(reader.chromatogram_count(), 1);

        let chrom = reader.get_chromatogram(None).unwrap();
        assert_eq!(chrom.id, "TIC");
        assert!(reader.get_chromatogram(None).unwrap().is_empty());

        reader.close();
        assert!(!reader.is_open());
        assert!(matches!(
            reader.get_spectrum(None, true),
            Err(ReaderError::NotOpen)
        ));
    }
}
