use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::{
    config::split_csv,
    model::selector::SourceFilter,
    resolver::{ResolveConfiguration, Scope},
};

/// Find, read and search the sources of Gradle dependencies.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Gradle user home holding the module cache
    ///
    /// Defaults to `$HOME/.gradle`.
    #[clap(long, global = true)]
    pub cache_directory: Option<PathBuf>,
    /// Log what is being run
    #[clap(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve dependency sources and print `coordinate|path`
    Resolve {
        #[clap(flatten)]
        selector: SelectorArgs,
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// List resolved dependencies and whether their sources are available
    Deps {
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Search dependency sources with ripgrep
    #[clap(alias = "rg")]
    Search {
        /// Module selector, same as --module
        #[clap(value_name = "MODULE")]
        module_arg: Option<String>,
        /// Search pattern
        #[clap(short, long)]
        query: String,
        /// Search every resolved dependency instead of a single module
        #[clap(long)]
        all: bool,
        /// Show N lines before and after each match
        #[clap(short = 'C', long)]
        context: Option<usize>,
        /// Extra ripgrep arguments, comma separated
        #[clap(long, default_value = "")]
        rg_args: String,
        /// Print the searched path next to the file id
        #[clap(long)]
        show_extracted_path: bool,
        #[clap(flatten)]
        selector: SelectorArgs,
        #[clap(flatten)]
        project: ProjectArgs,
        /// Arguments passed to ripgrep as is
        #[clap(last = true)]
        rg_extra: Vec<String>,
    },
    /// Print a file from dependency sources
    Cat {
        /// A file id (`group:artifact:version!/path`) or a path inside the sources of --module
        target: String,
        /// Line range, `start,end`
        #[clap(long)]
        lines: Option<String>,
        #[clap(flatten)]
        selector: SelectorArgs,
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Print the sources archive holding a file id, coordinate or path
    Where {
        /// A file id, a coordinate, or a path inside the sources of --module
        target: String,
        #[clap(flatten)]
        selector: SelectorArgs,
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Download the sources of one `group:artifact:version` into the Gradle cache
    Fetch {
        coordinate: String,
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Check that ripgrep, Gradle and the module cache are usable
    Doctor {
        /// Project root
        #[clap(long, default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct SelectorArgs {
    /// Module selector: `group:artifact[:version]` globs or a loose name
    #[clap(long)]
    pub module: Option<String>,
    /// Group glob filter
    #[clap(long)]
    pub group: Option<String>,
    /// Artifact glob filter
    #[clap(long)]
    pub artifact: Option<String>,
    /// Version glob filter
    #[clap(long)]
    pub version: Option<String>,
}

impl SelectorArgs {
    pub fn to_filter(&self) -> SourceFilter {
        SourceFilter {
            module: self.module.clone().unwrap_or_default(),
            group: self.group.clone().unwrap_or_default(),
            artifact: self.artifact.clone().unwrap_or_default(),
            version: self.version.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Project root
    #[clap(long, default_value = ".")]
    pub project: PathBuf,
    /// Dependency scope: compile, runtime, test or all
    #[clap(long, default_value = "compile")]
    pub scope: Scope,
    /// Configuration name globs, comma separated
    #[clap(long, default_value = "")]
    pub config: String,
    /// Kotlin Multiplatform targets, comma separated
    #[clap(long, default_value = "")]
    pub targets: String,
    /// Limit to a subproject path or name (repeatable)
    #[clap(long = "subproject")]
    pub subprojects: Vec<String>,
    /// Run Gradle offline
    #[clap(long)]
    pub offline: bool,
    /// Refresh dependencies
    #[clap(long)]
    pub refresh: bool,
    /// Include buildSrc dependencies (--buildsrc=false to disable)
    #[clap(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub buildsrc: bool,
    /// Include buildscript classpath dependencies (--buildscript=false to disable)
    #[clap(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub buildscript: bool,
    /// Include composite builds (--include-builds=false to disable)
    #[clap(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub include_builds: bool,
}

impl ProjectArgs {
    pub fn to_configuration(&self, filter: SourceFilter) -> ResolveConfiguration {
        ResolveConfiguration {
            project_dir: self.project.clone(),
            filter,
            scope: self.scope,
            configurations: split_csv(&self.config),
            targets: split_csv(&self.targets),
            subprojects: self.subprojects.clone(),
            offline: self.offline,
            refresh: self.refresh,
            include_build_src: self.buildsrc,
            include_buildscript: self.buildscript,
            include_builds: self.include_builds,
            ..Default::default()
        }
    }
}
