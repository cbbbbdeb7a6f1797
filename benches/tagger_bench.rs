//! Benchmarks for title tagging and listing extraction.
//!
//! Tagging runs once per item on every listing and detail page, so it sits
//! on the hot path of every catalog call.
//!
//! Run with: `cargo bench --bench tagger_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reelfetch::site::profile::ProfileAdapter;
use reelfetch::site::profiles::GENERIC;
use reelfetch::site::{ExtractContext, SiteAdapter};
use reelfetch::tagger::{self, TitleTags};
use scraper::Html;

// ---------------------------------------------------------------------------
// Title datasets
// ---------------------------------------------------------------------------

const MOVIE_TITLES: &[&str] = &[
    "Dune: Part Two (2024) 2160p 4K WEB-DL x265 10-bit HEVC DDP5.1 Atmos",
    "Jawan (2023) Hindi + Tamil + Telugu 1080p BluRay x264 DD5.1",
    "Oppenheimer (2023) Dual Audio [Hindi-English] 720p WEBRip",
    "Movie (2023) 1080p BluRay x264",
];

const SERIES_TITLES: &[&str] = &[
    "The Family Man S02 Complete Hindi 1080p WEB-DL",
    "Panchayat Season 3 (2024) Multi Audio 720p HDRip",
    "Mirzapur S01E05 480p HDTV",
];

const PLAIN_TITLES: &[&str] = &["Untitled", "Trailer", "Coming soon"];

fn bench_title_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("title_tags");

    group.bench_function("movies", |b| {
        b.iter(|| {
            for title in MOVIE_TITLES {
                black_box(TitleTags::from_title(black_box(title)));
            }
        });
    });

    group.bench_function("series", |b| {
        b.iter(|| {
            for title in SERIES_TITLES {
                black_box(TitleTags::from_title(black_box(title)));
            }
        });
    });

    group.bench_function("untagged", |b| {
        b.iter(|| {
            for title in PLAIN_TITLES {
                black_box(TitleTags::from_title(black_box(title)));
            }
        });
    });

    group.finish();
}

fn bench_single_facets(c: &mut Criterion) {
    let mut group = c.benchmark_group("facets");
    let title = MOVIE_TITLES[1];

    group.bench_function("quality", |b| {
        b.iter(|| black_box(tagger::extract_quality_info(black_box(title))));
    });
    group.bench_function("language", |b| {
        b.iter(|| black_box(tagger::extract_language_info(black_box(title))));
    });
    group.bench_function("dual_audio", |b| {
        b.iter(|| black_box(tagger::is_dual_audio(black_box(title))));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Listing extraction
// ---------------------------------------------------------------------------

fn listing(items: usize) -> String {
    let mut html = String::from("<html><body><main>");
    for i in 0..items {
        html.push_str(&format!(
            r#"<article><h2><a href="/movies/feature-number-{i}/">Feature {i} (2024) Hindi 1080p WEB-DL</a></h2><img data-src="//img.example/{i}.jpg"></article>"#
        ));
    }
    html.push_str("</main></body></html>");
    html
}

fn bench_listing_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing");
    let adapter = ProfileAdapter::new(&GENERIC).expect("generic profile compiles");
    let ctx = ExtractContext {
        base_url: "https://demo.example/",
        page_url: "https://demo.example/",
        source_site: "demo",
    };
    let body = listing(40);

    group.bench_function("parse_and_extract_40", |b| {
        b.iter(|| {
            let document = Html::parse_document(black_box(&body));
            black_box(adapter.extract_catalog(&document, &ctx))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_title_tags,
    bench_single_facets,
    bench_listing_extraction
);
criterion_main!(benches);
