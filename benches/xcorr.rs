use criterion::{black_box, criterion_group, criterion_main, Criterion};

use novaio::scoring::XCorr;
use novaio::spectrum::{PeakEx, PrecursorIon, SpectrumEx};

fn make_spectrum(analyzer: &str) -> SpectrumEx {
    let mut spec = SpectrumEx::with_capacity(0);
    spec.header.scan_number = 1;
    spec.header.ms_level = 2;
    spec.header.analyzer = analyzer.to_string();
    spec.header.precursors.push(PrecursorIon {
        isolation_mz: 722.35,
        charge: 2,
        ..Default::default()
    });
    spec.peaks = (0..1200)
        .map(|i| {
            let mz = 120.0 + i as f64 * 1.137;
            PeakEx::new(mz, ((i * 7919) % 5003) as f32 + 10.0)
        })
        .collect();
    spec
}

fn make_ions() -> Vec<f64> {
    (1..40).map(|i| 100.0 + i as f64 * 57.021).collect()
}

fn xcorr_scoring(c: &mut Criterion) {
    let engine = XCorr::new();
    let ions = make_ions();
    let high_res = make_spectrum("FTMS");
    let low_res = make_spectrum("ITMS");
    c.bench_function("xcorr_high_res", |b| {
        b.iter(|| engine.score(black_box(Some(&high_res)), black_box(&ions)))
    });
    c.bench_function("xcorr_low_res", |b| {
        b.iter(|| engine.score(black_box(Some(&low_res)), black_box(&ions)))
    });
}

criterion_group!(benches, xcorr_scoring);
criterion_main!(benches);
