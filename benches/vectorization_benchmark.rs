#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use sentence_vectors::pipelines::vectorization::{
    Embedding, EmbeddingModel, VectorizationPipeline,
};
use sentence_vectors::SentenceVectorsError;
use std::fs;
use std::path::Path;

static EMBEDDING_DIM: usize = 768;
static PAIRS: usize = 1_000;

/// Cheap deterministic model so the benchmark measures parsing, formatting and writing
struct HashingModel;

impl EmbeddingModel for HashingModel {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        let seed = text
            .bytes()
            .fold(17u32, |hash, byte| hash.wrapping_mul(31).wrapping_add(byte as u32));
        Ok((0..EMBEDDING_DIM)
            .map(|position| ((seed.wrapping_add(position as u32) % 2000) as f32 - 1000.0) / 997.0)
            .collect())
    }
}

fn write_input(path: &Path) {
    let content = (0..PAIRS)
        .map(|index| {
            format!("The cat number {index} sat on the mat.\tA dog ran after cat {index}.\n")
        })
        .collect::<String>();
    fs::write(path, content).unwrap();
}

fn bench_vectorization(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.txt");
    let output = dir.path().join("output.txt");
    write_input(&input);
    let pipeline = VectorizationPipeline::default();

    c.bench_function("vectorize 1000 pairs", |b| {
        b.iter(|| {
            pipeline
                .run(&HashingModel, black_box(&input), &output)
                .unwrap()
        })
    });
    c.bench_function("vectorize 1000 tokenized pairs", |b| {
        b.iter(|| {
            pipeline
                .run_tokenized(&HashingModel, black_box(&input), &output)
                .unwrap()
        })
    });
}

criterion_group! {
name = benches;
config = Criterion::default().sample_size(10);
targets = bench_vectorization
}

criterion_main!(benches);
