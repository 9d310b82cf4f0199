use std::hint::black_box;

use adresse_check::normalizer::normalize;
use adresse_check::{AddressParts, candidates, classifier};
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_classification(c: &mut Criterion) {
    let postcodes: Vec<String> = (0..200).map(|i| format!("{:05}", 75000 + i)).collect();
    let streets: Vec<String> = (0..200)
        .map(|i| format!("{i} Allée des Érables"))
        .collect();

    c.bench_function("classify_postcode_column", |b| {
        b.iter(|| classifier::classify(black_box(&postcodes)))
    });

    c.bench_function("classify_street_column", |b| {
        b.iter(|| classifier::classify(black_box(&streets)))
    });

    c.bench_function("normalize_accented", |b| {
        b.iter(|| normalize(black_box("  Boulevard Saint-Émilion à Sète ")))
    });
}

fn bench_candidates(c: &mut Criterion) {
    let mut parts = AddressParts::new();
    parts.number = Some("12 bis".to_string());
    parts.street = Some("rue de la Paix".to_string());
    parts.postcode = Some("75002".to_string());
    parts.city = Some("Paris".to_string());
    parts.mixed = vec!["Bâtiment B".to_string(), "12 bis rue de la Paix".to_string()];

    c.bench_function("build_candidates", |b| {
        b.iter(|| candidates::build(black_box(&parts)))
    });
}

criterion_group!(benches, bench_classification, bench_candidates);
criterion_main!(benches);
