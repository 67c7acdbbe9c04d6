use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use termindex::kmeans::kmeans;
use termindex::{KMeansConfig, RawDocument, TotalIndex};

fn synthetic_index(documents: usize, vocabulary: usize) -> TotalIndex {
    let mut rng = StdRng::seed_from_u64(11);
    let mut index = TotalIndex::new();
    let docs = (0..documents).map(|i| {
        let tokens: Vec<String> = (0..rng.random_range(20..80))
            .map(|_| format!("term{}", rng.random_range(0..vocabulary)))
            .collect();
        RawDocument::from_tokens(format!("doc{i}"), vec![], tokens)
    });
    index.add_many(docs.collect::<Vec<_>>()).expect("synthetic corpus indexes");
    index
}

fn bench_kmeans(c: &mut Criterion) {
    let index = synthetic_index(2_000, 3_000);
    let config = KMeansConfig::new(8).with_max_iterations(5);
    c.bench_function("kmeans_2000_docs_k8", |b| {
        b.iter(|| {
            let mut index = index.clone();
            let mut rng = StdRng::seed_from_u64(5);
            kmeans(&mut index, &config, &mut rng).expect("clustering succeeds")
        })
    });
}

criterion_group!(benches, bench_kmeans);
criterion_main!(benches);
