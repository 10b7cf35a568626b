use std::{io::Write, path::PathBuf};

use crate::{
    cache::ModuleCache,
    cli::command_handlers::{
        do_cat, do_deps, do_doctor, do_fetch, do_resolve, do_search, do_where, SearchOptions,
        Tools,
    },
    config::KsrcConfig,
    process::{CancellationToken, ProcessRunner},
    resolver::ResolveConfiguration,
};

mod builder;

pub use builder::KsrcBuilder;

pub struct Ksrc {
    runner: Box<dyn ProcessRunner + Send + Sync>,
    cache: ModuleCache,
    config: KsrcConfig,
    root: PathBuf,
    cancel: CancellationToken,
}

impl Ksrc {
    pub fn builder() -> KsrcBuilder {
        KsrcBuilder::default()
    }

    /// Token that interrupts whatever this instance is running.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &KsrcConfig {
        &self.config
    }

    fn tools(&self) -> Tools<'_> {
        Tools {
            runner: self.runner.as_ref(),
            cache: &self.cache,
            cancel: &self.cancel,
        }
    }

    /// Anchors the project directory at `root` and applies user settings.
    fn prepare(&self, config: ResolveConfiguration) -> ResolveConfiguration {
        ResolveConfiguration {
            project_dir: self.root.join(&config.project_dir),
            fallback: self.config.fallback.clone(),
            ..config
        }
    }

    /// Prints `coordinate|path` for every resolved sources archive
    pub fn resolve(&self, config: ResolveConfiguration, out: &mut dyn Write) -> anyhow::Result<()> {
        do_resolve(self.tools(), &self.prepare(config), out)
    }

    /// Lists resolved dependencies with their sources availability
    pub fn deps(&self, config: ResolveConfiguration, out: &mut dyn Write) -> anyhow::Result<()> {
        do_deps(self.tools(), &self.prepare(config), out)
    }

    /// Searches resolved sources with ripgrep.
    ///
    /// An empty `file_glob` in `options` is replaced by the configured default.
    pub fn search(
        &self,
        config: ResolveConfiguration,
        mut options: SearchOptions,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        if options.file_glob.trim().is_empty() {
            options.file_glob = self.config.search_glob.clone();
        }
        do_search(self.tools(), &self.prepare(config), options, out)
    }

    /// Prints one file from resolved sources
    pub fn cat(
        &self,
        config: ResolveConfiguration,
        target: &str,
        lines: Option<&str>,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        do_cat(self.tools(), &self.prepare(config), target, lines, out)
    }

    /// Prints the archive holding a file id, a coordinate or a path
    pub fn locate(
        &self,
        config: ResolveConfiguration,
        target: &str,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        do_where(self.tools(), &self.prepare(config), target, out)
    }

    /// Downloads the sources of one exact coordinate
    pub fn fetch(
        &self,
        config: ResolveConfiguration,
        coordinate: &str,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        do_fetch(self.tools(), &self.prepare(config), coordinate, out)
    }

    pub fn doctor(&self, config: ResolveConfiguration, out: &mut dyn Write) -> anyhow::Result<()> {
        do_doctor(self.tools(), &self.prepare(config), out)
    }
}
