// Copyright 2026 The sentence-vectors Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sentence_vectors::pipelines::bert_serving::{
    BertServingConfig, BertServingEncoder, PoolingLayers, PoolingStrategy, ServerConfig,
    ServerSession, DEFAULT_MAX_SEQ_LEN, DEFAULT_PORT,
};
use sentence_vectors::pipelines::flair::DocumentPoolEmbeddings;
use sentence_vectors::pipelines::hosted::UniversalSentenceEncoder;
use sentence_vectors::pipelines::sent2vec::Sent2VecModel;
use sentence_vectors::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModel,
};
use sentence_vectors::pipelines::vectorization::{
    MalformedLinePolicy, VectorizationConfig, VectorizationPipeline, VectorizationSummary,
};
use sentence_vectors::pipelines::wordpiece::WordPieceTokenizer;
use tch::Device;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Printed on stdout once a vectorization run has completed
const SUCCESS_MARKER: &str = "SCRIPTOK";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase logging verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Handling of input lines without a tab separator: fail or skip
    #[arg(long, default_value_t = MalformedLinePolicy::Fail, global = true)]
    on_malformed: MalformedLinePolicy,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sentence-Transformers model from a local directory or the Hugging Face hub
    Transformer {
        model: String,
        input: PathBuf,
        output: PathBuf,
        /// Skip copying the model files to downl_<model> before encoding
        #[arg(long)]
        no_local_copy: bool,
    },
    /// BERT checkpoint served by a local embedding server
    BertServer {
        pooling_strategy: PoolingStrategy,
        #[arg(allow_hyphen_values = true)]
        pooling_layer: PoolingLayers,
        model_dir: PathBuf,
        input: PathBuf,
        output: PathBuf,
        server_port: Option<u16>,
        checkpoint: Option<String>,
        fine_tuned_model_dir: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_MAX_SEQ_LEN)]
        max_seq_len: usize,
        /// Keep the input casing (cased checkpoints)
        #[arg(long)]
        cased: bool,
        /// Encode the sentences as raw text instead of space-separated WordPiece tokens
        #[arg(long)]
        raw: bool,
    },
    /// Stacked Flair language models, comma-separated model directories
    Flair {
        models: String,
        input: PathBuf,
        output: PathBuf,
    },
    /// sent2vec model in the fastText binary format
    Sent2vec {
        model: PathBuf,
        input: PathBuf,
        output: PathBuf,
    },
    /// Universal sentence encoder from a URL or a TorchScript file
    #[command(name = "use")]
    UniversalSentenceEncoder {
        model_url: String,
        input: PathBuf,
        output: PathBuf,
    },
    /// Print the WordPiece tokens of a sentence
    Wordpiece {
        vocab: PathBuf,
        sentence: String,
        #[arg(long)]
        cased: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_directive = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `downl_` directory name of a model reference, `/` replaced by `_`
fn local_copy_dir(model: &str) -> PathBuf {
    PathBuf::from(format!("downl_{}", model.trim_end_matches('/').replace('/', "_")))
}

fn run(args: Args) -> anyhow::Result<Option<VectorizationSummary>> {
    let pipeline = VectorizationPipeline::new(VectorizationConfig {
        on_malformed: args.on_malformed,
    });
    let device = Device::cuda_if_available();

    let summary = match args.command {
        Commands::Transformer {
            model,
            input,
            output,
            no_local_copy,
        } => {
            let config = SentenceEmbeddingsBuilder::from_reference(&model)
                .with_device(device)
                .config()
                .with_context(|| format!("could not resolve model {model}"))?;
            if !no_local_copy {
                let destination = config.save_local_copy(local_copy_dir(&model))?;
                info!(destination = %destination.display(), "local model copy saved");
            }
            let model = SentenceEmbeddingsModel::new(config)?;
            pipeline.run(&model, &input, &output)?
        }
        Commands::BertServer {
            pooling_strategy,
            pooling_layer,
            model_dir,
            input,
            output,
            server_port,
            checkpoint,
            fine_tuned_model_dir,
            max_seq_len,
            cased,
            raw,
        } => {
            let mut config = BertServingConfig::new(model_dir);
            config.pooling_strategy = pooling_strategy;
            config.pooling_layers = pooling_layer;
            config.checkpoint_name = checkpoint;
            config.fine_tuned_model_dir = fine_tuned_model_dir;
            config.max_seq_len = max_seq_len;
            config.lower_case = !cased;
            config.device = device;

            let server_config = ServerConfig::with_port(server_port.unwrap_or(DEFAULT_PORT));
            let mut session =
                ServerSession::open_with(server_config, || BertServingEncoder::new(config))?;
            let summary = session.process(|client| {
                if raw {
                    pipeline.run(client, &input, &output)
                } else {
                    pipeline.run_tokenized(client, &input, &output)
                }
            })?;
            session.close()?;
            summary
        }
        Commands::Flair {
            models,
            input,
            output,
        } => {
            let model = DocumentPoolEmbeddings::from_model_list(&models, device)?;
            pipeline.run(&model, &input, &output)?
        }
        Commands::Sent2vec {
            model,
            input,
            output,
        } => {
            let model = Sent2VecModel::load(&model)?;
            pipeline.run(&model, &input, &output)?
        }
        Commands::UniversalSentenceEncoder {
            model_url,
            input,
            output,
        } => {
            let model = UniversalSentenceEncoder::load(&model_url, device)?;
            pipeline.run(&model, &input, &output)?
        }
        Commands::Wordpiece {
            vocab,
            sentence,
            cased,
        } => {
            let tokenizer = WordPieceTokenizer::from_file(&vocab, !cased)?;
            println!("{}", tokenizer.tokenize_to_line(&sentence));
            return Ok(None);
        }
    };
    Ok(Some(summary))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if run(args)?.is_some() {
        println!("{SUCCESS_MARKER}");
    }
    Ok(())
}
