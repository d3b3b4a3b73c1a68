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

//! Newline-delimited JSON messages exchanged between `EmbeddingClient` and `EmbeddingServer`.
//! Every message is a single JSON object on one line, tagged by its `type` field.

use crate::pipelines::vectorization::Embedding;
use serde::{Deserialize, Serialize};

/// Sentences to encode, as raw text or as token lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodeInput {
    Raw(Vec<String>),
    Tokenized(Vec<Vec<String>>),
}

impl EncodeInput {
    /// Number of sentences
    pub fn len(&self) -> usize {
        match self {
            EncodeInput::Raw(sentences) => sentences.len(),
            EncodeInput::Tokenized(sentences) => sentences.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// `{"type":"encode","texts":[...]}`
    Encode { texts: EncodeInput },
    /// `{"type":"status"}`
    Status,
}

/// Counters reported by a running server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerStatus {
    pub port: u16,
    pub encode_requests: u64,
    pub sentences_encoded: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Embeddings { embeddings: Vec<Embedding> },
    Status(ServerStatus),
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_tagged_by_type() {
        let request = Request::Encode {
            texts: EncodeInput::Raw(vec!["a sentence".to_string()]),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"type":"encode","texts":["a sentence"]}"#
        );
        assert_eq!(
            serde_json::to_string(&Request::Status).unwrap(),
            r#"{"type":"status"}"#
        );
    }

    #[test]
    fn token_lists_are_recognized() {
        let request: Request =
            serde_json::from_str(r###"{"type":"encode","texts":[["un","##aff","##able"]]}"###)
                .unwrap();
        assert_eq!(
            request,
            Request::Encode {
                texts: EncodeInput::Tokenized(vec![vec![
                    "un".to_string(),
                    "##aff".to_string(),
                    "##able".to_string()
                ]])
            }
        );
    }

    #[test]
    fn status_response_is_flat() {
        let response = Response::Status(ServerStatus {
            port: 5555,
            encode_requests: 2,
            sentences_encoded: 4,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["port"], 5555);
        assert_eq!(json["sentences_encoded"], 4);
    }
}
