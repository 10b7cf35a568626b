use std::{env, path::PathBuf};

use crate::{
    cache::ModuleCache,
    config::KsrcConfig,
    process::{CancellationToken, OsProcessRunner, ProcessRunner},
    Ksrc,
};

#[derive(Default)]
pub struct KsrcBuilder {
    // Project directories are relative to `root`
    root: Option<PathBuf>,
    cache_directory_path: Option<PathBuf>,
    config: Option<KsrcConfig>,
    runner: Option<Box<dyn ProcessRunner + Send + Sync>>,
    cancel: Option<CancellationToken>,
}

impl KsrcBuilder {
    /// Directory project paths are resolved against.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Gradle user home holding the module cache.
    ///
    /// Defaults to `cache.dir` from the settings, then `$HOME/.gradle`.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory_path = Some(path.into());
        self
    }

    /// User settings. Defaults to [`KsrcConfig::default`], not to the config file.
    pub fn config(mut self, config: KsrcConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// How external tools are found and run. Defaults to real subprocesses.
    pub fn runner(mut self, runner: impl ProcessRunner + Send + Sync + 'static) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn try_build(self) -> anyhow::Result<Ksrc> {
        let Self {
            root,
            cache_directory_path,
            config,
            runner,
            cancel,
        } = self;
        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };
        let config = config.unwrap_or_default();

        let cache_location = match cache_directory_path {
            Some(path) => root.join(path),
            None => config.cache_location()?,
        };

        Ok(Ksrc {
            runner: runner.unwrap_or_else(|| Box::new(OsProcessRunner)),
            cache: ModuleCache::new(cache_location),
            config,
            root,
            cancel: cancel.unwrap_or_else(CancellationToken::new),
        })
    }
}
