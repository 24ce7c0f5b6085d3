use std::env;
use std::path;
use std::process::ExitCode;

use novaio::io::FileReader;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let path = match args.get(1) {
        Some(p) => path::PathBuf::from(p),
        None => {
            eprintln!("Usage: novaio <file.mzML|file.mzXML>");
            return ExitCode::FAILURE;
        }
    };

    let mut reader = FileReader::new();
    if let Err(e) = reader.open_spectrum_file(&path) {
        eprintln!("Failed to open {}: {e}", path.display());
        return ExitCode::FAILURE;
    }
    println!(
        "Path: {}\nScans {}-{} ({} total), max RT {:0.3} min",
        path.display(),
        reader.first_scan(),
        reader.last_scan(),
        reader.scan_count(),
        reader.max_retention_time()
    );

    let mut levels = [0usize; 4];
    for spectrum in reader.iter() {
        let level = (spectrum.ms_level() as usize).min(levels.len() - 1);
        levels[level] += 1;
        if let Some(bp) = spectrum.base_peak() {
            log::debug!(
                "Scan {} => MS{} BP {:0.4} ({:0.1})",
                spectrum.scan_number(),
                spectrum.ms_level(),
                bp.mz,
                bp.intensity
            );
        }
    }
    println!(
        "MS1: {}\nMS2: {}\nMS3+: {}\nunknown: {}",
        levels[1], levels[2], levels[3], levels[0]
    );

    if reader.chromatogram_count() > 0 {
        let tic = reader.read_chromatogram("", Some(0));
        println!("Chromatogram {:?} has {} points", tic.id, tic.count());
    }
    ExitCode::SUCCESS
}
