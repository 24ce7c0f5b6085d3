//! Synthetic runs and document emitters shared by the reader tests.
use std::fmt::Write as _;
use std::io::{self, Seek, Write};

use crate::io::mzml::{MzMLWriterError, MzMLWriterType};
use crate::spectrum::bindata;
use crate::spectrum::{
    BinaryCompressionType, BinaryDataArrayType, ByteOrder, FragmentationType, Peak, PeakRecord,
    PrecursorIon, ScanPolarity, Spectrum,
};

/// A centroided FTMS spectrum with `n_peaks` ascending peaks and, above MS1, one HCD precursor
pub fn synthetic_spectrum(scan: u32, ms_level: u8, n_peaks: usize) -> Spectrum {
    let mut spec = Spectrum::with_capacity(n_peaks);
    let header = &mut spec.header;
    header.scan_number = scan;
    header.ms_level = ms_level;
    header.centroid = true;
    header.polarity = ScanPolarity::Positive;
    header.retention_time = scan as f64 * 0.05;
    header.start_mz = 350.0;
    header.end_mz = 1800.0;
    header.ion_injection_time = 25.0;
    if ms_level > 1 {
        let isolation_mz = 400.0 + scan as f64 * 0.5;
        header.scan_filter = format!("FTMS + c NSI d Full ms{ms_level} {isolation_mz:.2}@hcd28.00");
        header.precursors.push(PrecursorIon {
            isolation_mz,
            isolation_width: 1.6,
            monoisotopic_mz: isolation_mz,
            charge: 2,
            collision_energy: 28.0,
            fragmentation_method: FragmentationType::HCD,
            ..Default::default()
        });
    } else {
        header.scan_filter = "FTMS + p NSI Full ms [350.00-1800.00]".into();
    }
    for (i, peak) in spec.peaks.iter_mut().enumerate() {
        *peak = Peak::new(
            350.0 + i as f64 * 3.25 + scan as f64 / 1024.0,
            ((i % 97) as f32 + 1.0) * 100.0,
        );
    }
    if let Some(base) = spec.base_peak().copied() {
        spec.header.base_peak_mz = base.mz;
        spec.header.base_peak_intensity = base.intensity as f64;
    }
    spec.header.total_ion_current = spec.peaks.iter().map(|p| p.intensity as f64).sum();
    if let (Some(first), Some(last)) = (spec.peaks.first(), spec.peaks.last()) {
        spec.header.lowest_mz = first.mz;
        spec.header.highest_mz = last.mz;
    }
    spec
}

/// Point each dependent scan at the closest preceding MS1 scan
pub fn assign_master_scans(spectra: &mut [Spectrum]) {
    let mut master = 0;
    for spec in spectra.iter_mut() {
        if spec.ms_level() == 1 {
            master = spec.scan_number() as i32;
        } else {
            spec.header.precursor_master_scan_number = master;
        }
    }
}

/// A 314-scan run of 308 MS1 and 6 MS2 scans, whose first scan has 406 peaks
pub fn synthetic_run() -> Vec<Spectrum> {
    let dependent = [51, 52, 151, 152, 251, 252];
    let mut spectra: Vec<Spectrum> = (1..=314u32)
        .map(|scan| {
            let ms_level = if dependent.contains(&scan) { 2 } else { 1 };
            let n_peaks = if scan == 1 { 406 } else { 20 + (scan as usize % 13) };
            synthetic_spectrum(scan, ms_level, n_peaks)
        })
        .collect();
    assign_master_scans(&mut spectra);
    spectra
}

/// Write `spectra` as an indexed mzML document
pub fn write_mzml<W: Write + Seek>(stream: W, spectra: &[Spectrum]) -> Result<W, MzMLWriterError> {
    let mut writer = MzMLWriterType::new(stream);
    writer.set_spectrum_count(spectra.len() as u64);
    for spec in spectra {
        writer.write_spectrum(spec)?;
    }
    writer.into_inner()
}

fn write_mzxml_scan(buffer: &mut String, spec: &Spectrum, indent: &str) -> io::Result<()> {
    let header = &spec.header;
    let retention_seconds = header.retention_time * 60.0;
    let _ = write!(
        buffer,
        "{indent}<scan num=\"{}\" scanType=\"Full\" centroided=\"{}\" msLevel=\"{}\" peaksCount=\"{}\" polarity=\"{}\" retentionTime=\"PT{retention_seconds}S\" lowMz=\"{}\" highMz=\"{}\" basePeakMz=\"{}\" basePeakIntensity=\"{}\" totIonCurrent=\"{}\" startMz=\"{}\" endMz=\"{}\" filterLine=\"{}\">\n",
        header.scan_number,
        if header.centroid { 1 } else { 0 },
        header.ms_level,
        spec.count(),
        if header.polarity == ScanPolarity::Negative { '-' } else { '+' },
        header.lowest_mz,
        header.highest_mz,
        header.base_peak_mz,
        header.base_peak_intensity,
        header.total_ion_current,
        header.start_mz,
        header.end_mz,
        header.scan_filter,
    );
    for prec in header.precursors.iter() {
        let _ = writeln!(
            buffer,
            "{indent}  <precursorMz precursorScanNum=\"{}\" precursorIntensity=\"{}\" precursorCharge=\"{}\" activationMethod=\"{}\" windowWideness=\"{}\">{}</precursorMz>",
            header.precursor_master_scan_number,
            prec.intensity,
            prec.charge,
            prec.fragmentation_method,
            prec.isolation_width,
            prec.isolation_mz,
        );
    }
    let values: Vec<f64> = spec
        .peaks
        .iter()
        .flat_map(|p| [p.mz(), p.intensity() as f64])
        .collect();
    // MS1 peaks are compressed and dependent scan peaks are not, so both paths are read
    let compression = if header.ms_level == 1 {
        BinaryCompressionType::Zlib
    } else {
        BinaryCompressionType::NoCompression
    };
    let encoded = bindata::encode_array(
        &values,
        BinaryDataArrayType::Float64,
        compression,
        ByteOrder::BigEndian,
    )?;
    let encoded = String::from_utf8_lossy(&encoded);
    let compression_type = match compression {
        BinaryCompressionType::Zlib => "zlib",
        BinaryCompressionType::NoCompression => "none",
    };
    let _ = writeln!(
        buffer,
        "{indent}  <peaks compressionType=\"{compression_type}\" compressedLen=\"{}\" precision=\"64\" byteOrder=\"network\" contentType=\"m/z-int\">{encoded}</peaks>",
        encoded.len(),
    );
    Ok(())
}

/**
Write `spectra` as an indexed mzXML document, nesting each dependent scan inside
the MS1 scan before it the way converters do.
*/
pub fn write_mzxml(out: &mut Vec<u8>, spectra: &[Spectrum]) -> io::Result<()> {
    let mut buffer = String::new();
    buffer.push_str("<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n");
    buffer.push_str("<mzXML xmlns=\"http://sashimi.sourceforge.net/schema_revision/mzXML_3.2\">\n");
    let _ = writeln!(buffer, " <msRun scanCount=\"{}\">", spectra.len());

    let mut offsets = Vec::with_capacity(spectra.len());
    let mut parent_open = false;
    for spec in spectra {
        if spec.ms_level() == 1 {
            if parent_open {
                buffer.push_str("  </scan>\n");
            }
            offsets.push((spec.scan_number(), buffer.len() + 2));
            write_mzxml_scan(&mut buffer, spec, "  ")?;
            parent_open = true;
        } else {
            let indent = if parent_open { "    " } else { "  " };
            offsets.push((spec.scan_number(), buffer.len() + indent.len()));
            write_mzxml_scan(&mut buffer, spec, indent)?;
            let _ = writeln!(buffer, "{indent}</scan>");
        }
    }
    if parent_open {
        buffer.push_str("  </scan>\n");
    }
    buffer.push_str(" </msRun>\n");

    let index_offset = buffer.len() + 1;
    buffer.push_str(" <index name=\"scan\">\n");
    for (scan, offset) in offsets {
        let _ = writeln!(buffer, "  <offset id=\"{scan}\">{offset}</offset>");
    }
    buffer.push_str(" </index>\n");
    let _ = writeln!(buffer, " <indexOffset>{index_offset}</indexOffset>");
    buffer.push_str("</mzXML>\n");
    out.write_all(buffer.as_bytes())
}
