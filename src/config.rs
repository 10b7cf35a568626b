use std::{collections::HashMap, path::PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{cache::ModuleCache, resolver::FallbackConfigurations, search::DEFAULT_FILE_GLOB};

const CONFIG_FILE: &str = ".ksrc/config.toml";

/// User level settings: `$HOME/.ksrc/config.toml` overridden by `KSRC_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KsrcConfig {
    pub cache_dir: Option<PathBuf>,
    pub search_glob: String,
    pub fallback: FallbackConfigurations,
}

impl Default for KsrcConfig {
    fn default() -> Self {
        KsrcConfig {
            cache_dir: None,
            search_glob: DEFAULT_FILE_GLOB.to_string(),
            fallback: FallbackConfigurations::default(),
        }
    }
}

impl KsrcConfig {
    pub fn load() -> anyhow::Result<Self> {
        let file = home::home_dir().map(|home| home.join(CONFIG_FILE));
        let raw_config = RawConfig::load(file, None)?;
        Ok(raw_config.into())
    }

    /// Gradle user home holding the module cache.
    pub fn cache_location(&self) -> anyhow::Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(ModuleCache::default_location()?),
        }
    }
}

impl From<RawConfig> for KsrcConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = FallbackConfigurations::default();
        KsrcConfig {
            cache_dir: raw.cache.dir,
            search_glob: raw
                .search
                .glob
                .filter(|glob| !glob.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILE_GLOB.to_string()),
            fallback: FallbackConfigurations {
                compile: raw
                    .resolve
                    .debug
                    .compile
                    .map_or(defaults.compile, |csv| split_csv(&csv)),
                runtime: raw
                    .resolve
                    .debug
                    .runtime
                    .map_or(defaults.runtime, |csv| split_csv(&csv)),
            },
        }
    }
}

pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    search: SearchConfig,
    #[serde(default)]
    resolve: ResolveConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct SearchConfig {
    glob: Option<String>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct ResolveConfig {
    #[serde(default)]
    debug: DebugConfig,
}

/// Comma separated configuration globs; an empty value disables the fallback attempt.
#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct DebugConfig {
    compile: Option<String>,
    runtime: Option<String>,
}

impl RawConfig {
    fn load(
        file: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml).required(false));
        }
        builder
            .add_source(Environment::with_prefix("KSRC").separator("_").source(env))
            .build()?
            .try_deserialize()
    }
}
