use std::fs;

use sentence_vectors::pipelines::sent2vec::{Sent2VecModel, FASTTEXT_FILEFORMAT_MAGIC};
use sentence_vectors::pipelines::vectorization::EmbeddingModel;

const WORDS: [&str; 3] = ["cat", "dog", "sat"];
const DIM: usize = 2;
const BUCKET: i32 = 4;

/// Builds a fastText-format model: 3 words, bigrams hashed into 4 buckets, row `i` of the
/// input matrix is `[i, 10 * i]`.
struct ModelFile {
    prune_index: Vec<(i32, i32)>,
    quantized: bool,
}

impl ModelFile {
    fn rows(&self) -> usize {
        let ngram_rows = if self.prune_index.is_empty() {
            BUCKET as usize
        } else {
            self.prune_index.len()
        };
        WORDS.len() + ngram_rows
    }

    fn bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(FASTTEXT_FILEFORMAT_MAGIC.to_le_bytes());
        bytes.extend(12i32.to_le_bytes());
        // dim, ws, epoch, minCount, neg, wordNgrams, loss, model, bucket, minn, maxn, lrUpdateRate
        for arg in [DIM as i32, 5, 5, 1, 5, 2, 1, 3, BUCKET, 0, 0, 100] {
            bytes.extend(arg.to_le_bytes());
        }
        bytes.extend(1e-4f64.to_le_bytes());

        bytes.extend((WORDS.len() as i32 + 1).to_le_bytes());
        bytes.extend((WORDS.len() as i32).to_le_bytes());
        bytes.extend(1i32.to_le_bytes());
        bytes.extend(1000i64.to_le_bytes());
        let prune_size = if self.prune_index.is_empty() {
            -1
        } else {
            self.prune_index.len() as i64
        };
        bytes.extend(prune_size.to_le_bytes());
        for (word, entry_type) in WORDS.iter().map(|word| (*word, 0i8)).chain([("__label__x", 1i8)]) {
            bytes.extend(word.as_bytes());
            bytes.push(0);
            bytes.extend(10i64.to_le_bytes());
            bytes.extend(entry_type.to_le_bytes());
        }
        for (from, to) in &self.prune_index {
            bytes.extend(from.to_le_bytes());
            bytes.extend(to.to_le_bytes());
        }

        bytes.push(u8::from(self.quantized));
        bytes.extend((self.rows() as i64).to_le_bytes());
        bytes.extend((DIM as i64).to_le_bytes());
        for row in 0..self.rows() {
            bytes.extend((row as f32).to_le_bytes());
            bytes.extend((10.0 * row as f32).to_le_bytes());
        }
        bytes
    }
}

fn load(file: &ModelFile) -> anyhow::Result<Sent2VecModel> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("model.bin");
    fs::write(&path, file.bytes())?;
    Ok(Sent2VecModel::load(&path)?)
}

fn plain() -> ModelFile {
    ModelFile {
        prune_index: Vec::new(),
        quantized: false,
    }
}

#[test]
fn header_is_read() -> anyhow::Result<()> {
    let model = load(&plain())?;
    assert_eq!(model.dim(), DIM);
    assert_eq!(model.args().word_ngrams, 2);
    assert_eq!(model.args().bucket, BUCKET);
    Ok(())
}

#[test]
fn sentence_vector_averages_words_and_bigrams() -> anyhow::Result<()> {
    let model = load(&plain())?;

    // cat = 0, dog = 1: bigram hash 0 * 116049371 + 1 = 1 -> row 3 + 1 % 4 = 4
    assert_eq!(model.sentence_rows("cat dog"), vec![0, 1, 4]);
    assert_eq!(model.embed("cat dog")?, vec![5.0 / 3.0, 50.0 / 3.0]);

    // unknown words are dropped before n-grams are built
    assert_eq!(model.sentence_rows("cat bird dog"), vec![0, 1, 4]);
    // dog = 1, sat = 2: 116049371 + 2 = 116049373 -> 3 + 1 = 4
    assert_eq!(model.sentence_rows("dog sat"), vec![1, 2, 4]);
    assert_eq!(model.sentence_rows("sat"), vec![2]);
    Ok(())
}

#[test]
fn empty_sentence_yields_zero_vector() -> anyhow::Result<()> {
    let model = load(&plain())?;
    assert_eq!(model.embed("")?, vec![0.0; DIM]);
    assert_eq!(model.embed("bird fish")?, vec![0.0; DIM]);
    let embeddings = model.embed_batch(&["cat", "dog"])?;
    assert_eq!(embeddings, vec![vec![0.0, 0.0], vec![1.0, 10.0]]);
    Ok(())
}

#[test]
fn pruned_buckets_are_remapped() -> anyhow::Result<()> {
    let model = load(&ModelFile {
        prune_index: vec![(1, 0)],
        quantized: false,
    })?;
    // bucket 1 is kept as pruned id 0 -> row 3
    assert_eq!(model.sentence_rows("cat dog"), vec![0, 1, 3]);
    // "cat sat": 0 * 116049371 + 2 = 2, bucket 2 was pruned
    assert_eq!(model.sentence_rows("cat sat"), vec![0, 2]);
    Ok(())
}

#[test]
fn invalid_files_are_rejected() -> anyhow::Result<()> {
    assert!(load(&ModelFile {
        prune_index: Vec::new(),
        quantized: true,
    })
    .is_err());

    let mut bytes = plain().bytes();
    bytes[0] ^= 0xff;
    assert!(Sent2VecModel::from_reader(bytes.as_slice()).is_err());

    let bytes = plain().bytes();
    assert!(Sent2VecModel::from_reader(&bytes[..bytes.len() - 3]).is_err());
    Ok(())
}
