//! Settings read from the environment.

use std::fmt::{self, Debug};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use cinescout_catalog::{
    InMemoryCatalog, MediaCatalog, TmdbCatalog, TmdbConfigBuilder,
};
use cinescout_core::{Driver, DriverBuilder};
use cinescout_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use thiserror::Error;

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const OPENAI_MODEL: &str = "OPENAI_MODEL";
const TMDB_API_KEY: &str = "TMDB_API_KEY";
const CINESCOUT_CATALOG: &str = "CINESCOUT_CATALOG";
const CINESCOUT_ADDR: &str = "CINESCOUT_ADDR";

/// The address the server listens on by default.
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 3000);

/// Why the settings couldn't be read.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable is set to something unusable.
    #[error("{name} has an invalid value: {value:?}")]
    Invalid {
        /// The variable's name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Which catalog the tools query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CatalogKind {
    /// The Movie Database.
    #[default]
    Tmdb,
    /// A small built-in list, for offline use.
    Memory,
}

impl FromStr for CatalogKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tmdb" => Ok(CatalogKind::Tmdb),
            "memory" => Ok(CatalogKind::Memory),
            _ => Err(()),
        }
    }
}

/// Everything needed to build a [`Driver`].
#[derive(Clone)]
pub struct Settings {
    /// OpenAI API key.
    pub openai_api_key: String,
    /// Overrides the OpenAI endpoint.
    pub openai_base_url: Option<String>,
    /// Overrides the model.
    pub openai_model: Option<String>,
    /// The catalog to use.
    pub catalog: CatalogKind,
    /// TMDB access token, required for [`CatalogKind::Tmdb`].
    pub tmdb_api_key: Option<String>,
    /// The address the server listens on.
    pub addr: SocketAddr,
}

impl Settings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the settings through `lookup`. Blank values count as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let openai_api_key =
            var(OPENAI_API_KEY).ok_or(ConfigError::Missing(OPENAI_API_KEY))?;

        let catalog = match var(CINESCOUT_CATALOG) {
            Some(value) => {
                value.parse().map_err(|_| ConfigError::Invalid {
                    name: CINESCOUT_CATALOG,
                    value,
                })?
            }
            None => CatalogKind::default(),
        };
        let tmdb_api_key = var(TMDB_API_KEY);
        if catalog == CatalogKind::Tmdb && tmdb_api_key.is_none() {
            return Err(ConfigError::Missing(TMDB_API_KEY));
        }

        let addr = match var(CINESCOUT_ADDR) {
            Some(value) => {
                value.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: CINESCOUT_ADDR,
                    value,
                })?
            }
            None => DEFAULT_ADDR,
        };

        Ok(Self {
            openai_api_key,
            openai_base_url: var(OPENAI_BASE_URL),
            openai_model: var(OPENAI_MODEL),
            catalog,
            tmdb_api_key,
            addr,
        })
    }

    /// Creates the configured catalog.
    pub fn catalog(&self) -> Arc<dyn MediaCatalog> {
        match (self.catalog, &self.tmdb_api_key) {
            (CatalogKind::Tmdb, Some(token)) => {
                let config =
                    TmdbConfigBuilder::with_access_token(token).build();
                Arc::new(TmdbCatalog::new(config))
            }
            (CatalogKind::Tmdb, None) => {
                warn!("no TMDB access token, using the built-in catalog");
                Arc::new(InMemoryCatalog::sample())
            }
            (CatalogKind::Memory, _) => Arc::new(InMemoryCatalog::sample()),
        }
    }

    /// Creates a driver backed by OpenAI and the configured catalog.
    pub fn driver(&self) -> Driver {
        let mut builder =
            OpenAIConfigBuilder::with_api_key(&self.openai_api_key);
        if let Some(base_url) = &self.openai_base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.openai_model {
            builder = builder.with_model(model);
        }
        let config = builder.build();
        info!("using model {}", config.model());

        DriverBuilder::with_shared_catalog(
            OpenAIProvider::new(config),
            self.catalog(),
        )
        .build()
    }
}

impl Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("catalog", &self.catalog)
            .field(
                "tmdb_api_key",
                &self.tmdb_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("addr", &self.addr)
            .finish()
    }
}
