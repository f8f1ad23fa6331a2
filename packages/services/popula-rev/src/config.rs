use std::env;

use crate::{Result, RevisionError};

/// Connection and collection names for the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct MongoConfig {
    pub mongodb_uri: String,
    pub database_name: String,
    /// Monthly info, read by the migration.
    pub monthly_info_collection: String,
    /// Agencies. Part of the shared schema, not read here.
    pub agency_collection: String,
    /// Packages. Part of the shared schema, not read here.
    pub package_collection: String,
    /// Revisions, written by the migration.
    pub revision_collection: String,
}

/// Object storage (Swift) credentials shared with the collector deployment.
#[derive(Clone, PartialEq)]
pub struct StorageConfig {
    pub username: String,
    pub api_key: String,
    pub auth_url: String,
    pub domain: String,
    pub container: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("username", &self.username)
            .field("api_key", &"***")
            .field("auth_url", &self.auth_url)
            .field("domain", &self.domain)
            .field("container", &self.container)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mongo: MongoConfig,
    /// `None` when the storage block was not requested.
    pub storage: Option<StorageConfig>,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env(require_storage: bool) -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok(), require_storage)
    }

    /// Load from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F, require_storage: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| RevisionError::MissingConfig { key: key.to_string() })
        };

        let mongo = MongoConfig {
            mongodb_uri: required("MONGODB_URI")?,
            database_name: required("MONGODB_DBNAME")?,
            monthly_info_collection: required("MONGODB_MICOL")?,
            agency_collection: required("MONGODB_AGCOL")?,
            package_collection: required("MONGODB_PKGCOL")?,
            revision_collection: required("MONGODB_REVCOL")?,
        };

        if mongo.monthly_info_collection == mongo.revision_collection {
            return Err(RevisionError::Config {
                message: format!(
                    "MONGODB_MICOL and MONGODB_REVCOL both point at '{}'",
                    mongo.revision_collection
                ),
            });
        }

        let storage = if require_storage {
            Some(StorageConfig {
                username: required("SWIFT_USERNAME")?,
                api_key: required("SWIFT_APIKEY")?,
                auth_url: required("SWIFT_AUTHURL")?,
                domain: required("SWIFT_DOMAIN")?,
                container: required("SWIFT_CONTAINER")?,
            })
        } else {
            None
        };

        Ok(Self { mongo, storage })
    }
}
