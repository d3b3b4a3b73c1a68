// Copyright 2019-present, Laurent Mazare.
// Copyright 2019-present Guillaume Becquin
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
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Converts weights exported as `.npz` to the `.ot` format read by the tch-based models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    source: PathBuf,
    destination: PathBuf,
    /// Prefix removed from the tensor names, e.g. `linear.` for Dense module weights
    #[arg(long)]
    strip_prefix: Option<String>,
}

fn strip_name(name: String, prefix: Option<&str>) -> String {
    match prefix.and_then(|prefix| name.strip_prefix(prefix)) {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let tensors = tch::Tensor::read_npz(&args.source)
        .with_context(|| format!("could not read {}", args.source.display()))?;
    let tensors = tensors
        .into_iter()
        .map(|(name, tensor)| {
            let name = strip_name(name, args.strip_prefix.as_deref());
            debug!(name = %name, shape = ?tensor.size(), "tensor");
            (name, tensor)
        })
        .collect::<Vec<_>>();
    tch::Tensor::save_multi(&tensors, &args.destination)
        .with_context(|| format!("could not write {}", args.destination.display()))?;

    info!(
        tensors = tensors.len(),
        destination = %args.destination.display(),
        "weights converted"
    );
    Ok(())
}
