// src/dataset.rs
//
// Dataset name -> metadata query.
//
// Processing transformations select their input files by metadata. The
// query behind a dataset name comes from a `DatasetQuery` collaborator; the
// local backend is a YAML registry:
//
//   datasets:
//     Prod5b_LaPalma_gamma:
//       MCCampaign: PROD5b
//       particle: gamma

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::core::MetaQuery;
use crate::error::DatasetError;

pub trait DatasetQuery {
    fn get_dataset_mq(&self, dataset: &str) -> Result<MetaQuery, DatasetError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetRegistry {
    #[serde(default)]
    datasets: BTreeMap<String, MetaQuery>,
}

impl DatasetRegistry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry: Self = serde_yaml::from_str(&text).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!(
            "Loaded {} dataset(s) from {}",
            registry.datasets.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn insert(&mut self, name: impl Into<String>, query: MetaQuery) {
        self.datasets.insert(name.into(), query);
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl DatasetQuery for DatasetRegistry {
    fn get_dataset_mq(&self, dataset: &str) -> Result<MetaQuery, DatasetError> {
        self.datasets
            .get(dataset)
            .cloned()
            .ok_or_else(|| DatasetError::Unknown(dataset.to_string()))
    }
}
