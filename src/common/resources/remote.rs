use super::*;
use crate::common::error::SentenceVectorsError;
use cached_path::{Cache, Options, ProgressBar};
use dirs::cache_dir;
use std::path::PathBuf;

/// # Remote resource that will be downloaded and cached locally on demand
#[derive(PartialEq, Clone, Debug)]
pub struct RemoteResource {
    /// Remote path/url for the resource
    pub url: String,
    /// Local subdirectory of the cache root where this resource is saved
    pub cache_subdir: String,
    /// Extract the downloaded archive (`.tar.gz`, `.zip`) and point to the extracted directory
    pub extract: bool,
}

impl RemoteResource {
    /// Creates a new RemoteResource from an URL and a custom local path. Note that this does not
    /// download the resource (only declares the remote and local locations)
    ///
    /// # Arguments
    ///
    /// * `url` - `&str` Location of the remote resource
    /// * `cache_subdir` - `&str` Local subdirectory of the cache root to save the resource to
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sentence_vectors::resources::RemoteResource;
    /// let config_resource = RemoteResource::new("http://config_json_location", "configs");
    /// ```
    pub fn new(url: &str, cache_subdir: &str) -> RemoteResource {
        RemoteResource {
            url: url.to_string(),
            cache_subdir: cache_subdir.to_string(),
            extract: false,
        }
    }

    /// Creates a new RemoteResource pointing to an archive that is unpacked after download.
    /// `get_local_path` then returns the extraction directory.
    pub fn archive(url: &str, cache_subdir: &str) -> RemoteResource {
        RemoteResource {
            url: url.to_string(),
            cache_subdir: cache_subdir.to_string(),
            extract: true,
        }
    }

    /// Creates a new RemoteResource for a file of a Hugging Face hub repository, e.g.
    /// `RemoteResource::from_hub("sentence-transformers/all-MiniLM-L6-v2", "modules.json")`.
    /// The file is cached under a subdirectory named after the repository.
    pub fn from_hub(repo_id: &str, file: &str) -> RemoteResource {
        let url = format!("https://huggingface.co/{repo_id}/resolve/main/{file}");
        let cache_subdir = match file.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{dir}", repo_id.replace('/', "_")),
            None => repo_id.replace('/', "_"),
        };
        RemoteResource {
            url,
            cache_subdir,
            extract: false,
        }
    }
}

impl ResourceProvider for RemoteResource {
    /// Gets the local path for a remote resource.
    ///
    /// The remote resource is downloaded and cached. Then the path
    /// to the local cache is returned.
    fn get_local_path(&self) -> Result<PathBuf, SentenceVectorsError> {
        let cache = Cache::builder()
            .dir(get_cache_directory()?)
            .progress_bar(Some(ProgressBar::Light))
            .build()?;
        let mut options = Options::default().subdir(&self.cache_subdir);
        if self.extract {
            options = options.extract();
        }
        Ok(cache.cached_path_with_options(&self.url, &options)?)
    }
}

/// # Global cache directory
/// If the environment variable `SENTENCE_VECTORS_CACHE` is set, will save the cache model files
/// at that location. Otherwise defaults to `$XDG_CACHE_HOME/.sentence-vectors`, or
/// corresponding user cache for the current system.
pub fn get_cache_directory() -> Result<PathBuf, SentenceVectorsError> {
    match std::env::var("SENTENCE_VECTORS_CACHE") {
        Ok(value) => Ok(PathBuf::from(value)),
        Err(_) => {
            let mut home = cache_dir().ok_or_else(|| {
                SentenceVectorsError::IOError("no user cache directory available".to_string())
            })?;
            home.push(".sentence-vectors");
            Ok(home)
        }
    }
}
