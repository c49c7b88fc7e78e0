use std::path::{Path, PathBuf};

use super::config::StoreConfig;

/// Locations of the two persisted vector store artifacts
#[derive(Debug, Clone, PartialEq)]
pub struct StorePaths {
    pub data_dir: PathBuf,
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl StorePaths {
    /// Resolve artifact paths, relative data dirs against `root`
    pub fn from_config(root: &Path, store: &StoreConfig) -> Self {
        let data_dir = if store.data_dir.is_absolute() {
            store.data_dir.clone()
        } else {
            root.join(&store.data_dir)
        };

        Self {
            index: data_dir.join(&store.index_file),
            metadata: data_dir.join(&store.metadata_file),
            data_dir,
        }
    }

    pub fn exists(&self) -> bool {
        self.index.exists() && self.metadata.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_data_dir_joins_root() {
        let store = StoreConfig::default();
        let paths = StorePaths::from_config(Path::new("/srv/rag"), &store);

        assert_eq!(paths.data_dir, PathBuf::from("/srv/rag/data/vector_store"));
        assert_eq!(
            paths.index,
            PathBuf::from("/srv/rag/data/vector_store/complaints.index")
        );
        assert_eq!(
            paths.metadata,
            PathBuf::from("/srv/rag/data/vector_store/metadata.json")
        );
    }

    #[test]
    fn test_absolute_data_dir_is_kept() {
        let store = StoreConfig {
            data_dir: PathBuf::from("/var/lib/rag"),
            ..StoreConfig::default()
        };
        let paths = StorePaths::from_config(Path::new("/home/me"), &store);
        assert_eq!(paths.index, PathBuf::from("/var/lib/rag/complaints.index"));
    }
}
