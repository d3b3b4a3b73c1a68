//! # Resource definitions for model weights, vocabularies and configuration files
//!
//! Every model family reads its files through a `ResourceProvider`:
//! - model weights (`.ot` files, fastText binaries, TorchScript modules)
//! - configuration files
//! - vocabularies
//!
//! Two types of resources are pre-defined:
//! - LocalResource: points to a local file
//! - RemoteResource: points to a remote file via a URL, downloaded to the local cache on first use
//!
//! For both types of resources, the local location of the file can be retrieved using
//! `get_local_path`, allowing to reference the resource file location regardless if it is a remote
//! or local resource.

mod local;

use crate::common::error::SentenceVectorsError;
pub use local::LocalResource;
use std::path::PathBuf;

/// # Resource Trait that can provide the location of the model, configuration or vocabulary resources
pub trait ResourceProvider {
    /// Provides the local path for a resource.
    ///
    /// # Returns
    ///
    /// * `PathBuf` pointing to the resource file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sentence_vectors::resources::{LocalResource, ResourceProvider};
    /// use std::path::PathBuf;
    /// let config_resource = LocalResource {
    ///     local_path: PathBuf::from("path/to/config.json"),
    /// };
    /// let config_path = config_resource.get_local_path();
    /// ```
    fn get_local_path(&self) -> Result<PathBuf, SentenceVectorsError>;
}

#[cfg(feature = "remote")]
mod remote;
#[cfg(feature = "remote")]
pub use remote::{get_cache_directory, RemoteResource};
