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

use crate::common::error::SentenceVectorsError;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// # Utility to deserialize JSON config files
pub trait Config
where
    for<'de> Self: Deserialize<'de>,
{
    /// Loads a `Config` object from a JSON file. The format is expected to be aligned with the
    /// files shipped with the pretrained models (e.g. `config.json`, `modules.json`).
    ///
    /// # Arguments
    ///
    /// * `path` - `Path` to the configuration JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sentence_vectors::bert::BertConfig;
    /// use sentence_vectors::Config;
    ///
    /// let config = BertConfig::from_file("path/to/config.json")?;
    /// # Ok::<(), sentence_vectors::SentenceVectorsError>(())
    /// ```
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SentenceVectorsError> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            SentenceVectorsError::IOError(format!(
                "could not open configuration file {}: {e}",
                path.display()
            ))
        })?;
        let br = BufReader::new(f);
        serde_json::from_reader(br).map_err(|e| {
            SentenceVectorsError::InvalidConfigurationError(format!(
                "could not parse configuration {}: {e}",
                path.display()
            ))
        })
    }
}
