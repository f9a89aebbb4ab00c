use criterion::{criterion_group, criterion_main, Criterion};
use movie_catalog_core::{filter_by_year, find_by_imdb_id, seed_movies, Movie};

fn mk_catalog(size: usize) -> Vec<Movie> {
    let seed = seed_movies();
    (0..size)
        .map(|index| {
            let template = &seed[index % seed.len()];
            Movie {
                imdb_id: format!("tt{:07}", index % 10_000_000),
                year: template.year + i64::try_from(index % 5).unwrap_or(0),
                ..template.clone()
            }
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    let catalog = mk_catalog(10_000);

    c.bench_function("filter_by_year_10k", |b| {
        b.iter(|| filter_by_year(std::hint::black_box(&catalog), Some(1994)));
    });

    c.bench_function("filter_unfiltered_10k", |b| {
        b.iter(|| filter_by_year(std::hint::black_box(&catalog), None));
    });

    c.bench_function("find_by_imdb_id_last_10k", |b| {
        b.iter(|| find_by_imdb_id(std::hint::black_box(&catalog), "tt0009999"));
    });
}

criterion_group!(benches, bench_filter);
criterion_main!(benches);
