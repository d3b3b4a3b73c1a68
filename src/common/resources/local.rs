use crate::common::error::SentenceVectorsError;
use crate::resources::ResourceProvider;
use std::path::PathBuf;

/// # Local resource
#[derive(PartialEq, Clone, Debug)]
pub struct LocalResource {
    /// Local path for the resource
    pub local_path: PathBuf,
}

impl ResourceProvider for LocalResource {
    /// Gets the path for a local resource. The file is expected to exist: a missing file is
    /// reported here rather than when the consumer opens it.
    fn get_local_path(&self) -> Result<PathBuf, SentenceVectorsError> {
        if !self.local_path.exists() {
            return Err(SentenceVectorsError::IOError(format!(
                "resource not found: {}",
                self.local_path.display()
            )));
        }
        Ok(self.local_path.clone())
    }
}

impl From<PathBuf> for LocalResource {
    fn from(local_path: PathBuf) -> Self {
        Self { local_path }
    }
}

impl From<PathBuf> for Box<dyn ResourceProvider + Send> {
    fn from(local_path: PathBuf) -> Self {
        Box::new(LocalResource { local_path })
    }
}
