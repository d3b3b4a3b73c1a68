mod common;

use common::write_vocab;
use sentence_vectors::pipelines::wordpiece::WordPieceTokenizer;

#[test]
fn words_are_split_into_word_pieces() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_vocab(dir.path())?;
    let tokenizer = WordPieceTokenizer::from_file(dir.path().join("vocab.txt"), true)?;

    assert_eq!(tokenizer.tokenize("unaffable"), vec!["un", "##aff", "##able"]);
    assert_eq!(tokenizer.tokenize_to_line("The cat sat."), "the cat sat .");
    assert_eq!(tokenizer.tokenize_to_line("UnAffable dog  "), "un ##aff ##able dog");
    assert_eq!(tokenizer.tokenize_to_line(""), "");
    Ok(())
}

#[test]
fn cased_tokenizer_keeps_capitals() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_vocab(dir.path())?;
    let tokenizer = WordPieceTokenizer::from_file(dir.path().join("vocab.txt"), false)?;

    assert_eq!(tokenizer.tokenize_to_line("The cat"), "[UNK] cat");
    Ok(())
}

#[test]
fn missing_vocabulary_is_an_error() {
    assert!(WordPieceTokenizer::from_file("does/not/exist/vocab.txt", true).is_err());
}
