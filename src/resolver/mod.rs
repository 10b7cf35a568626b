mod gradle;

use std::{
    collections::{HashSet, VecDeque},
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{info, warn};
use thiserror::Error;

use crate::{
    model::{selector::SourceFilter, Coordinate, ParseError, SourceArtifact},
    process::{check_cancelled, CancellationToken, ProcessError, ProcessRunner},
};

pub use gradle::{GradleResolver, Property, INIT_SCRIPT, TASK_NAME};

const DEFAULT_DEBUG_COMPILE: &[&str] = &["debugCompileClasspath", "*DebugCompileClasspath"];
const DEFAULT_DEBUG_RUNTIME: &[&str] = &["debugRuntimeClasspath", "*DebugRuntimeClasspath"];

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Resolving {} [{attempt}] failed: {source}", build.display())]
    Build {
        build: PathBuf,
        attempt: String,
        #[source]
        source: ProcessError,
    },
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ResolveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ResolveError::Process(ProcessError::Cancelled)
                | ResolveError::Build {
                    source: ProcessError::Cancelled,
                    ..
                }
        )
    }
}

/// Coarse dependency bucket, mapped to Gradle configurations by the init script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Test,
    All,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::All => "all",
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compile" => Ok(Scope::Compile),
            "runtime" => Ok(Scope::Runtime),
            "test" => Ok(Scope::Test),
            "all" => Ok(Scope::All),
            _ => Err(ParseError::InvalidScope(value.to_string())),
        }
    }
}

/// Configuration globs retried when the default scope attempt finds nothing,
/// for graphs only reachable through build-variant classpaths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackConfigurations {
    pub compile: Vec<String>,
    pub runtime: Vec<String>,
}

impl Default for FallbackConfigurations {
    fn default() -> Self {
        FallbackConfigurations {
            compile: DEFAULT_DEBUG_COMPILE.iter().map(|s| s.to_string()).collect(),
            runtime: DEFAULT_DEBUG_RUNTIME.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Everything one resolution call needs. Built once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveConfiguration {
    pub project_dir: PathBuf,
    pub filter: SourceFilter,
    pub scope: Scope,
    /// Explicit configuration name globs; when set, no fallback attempts are made.
    pub configurations: Vec<String>,
    pub targets: Vec<String>,
    pub subprojects: Vec<String>,
    /// A single `group:artifact:version` queried instead of the project's own graph.
    pub dependency: Option<String>,
    pub offline: bool,
    pub refresh: bool,
    pub include_build_src: bool,
    pub include_buildscript: bool,
    pub include_builds: bool,
    /// Run every fallback attempt and merge them instead of stopping at the first hit.
    pub search_all: bool,
    pub fallback: FallbackConfigurations,
}

impl Default for ResolveConfiguration {
    fn default() -> Self {
        ResolveConfiguration {
            project_dir: PathBuf::from("."),
            filter: SourceFilter::default(),
            scope: Scope::default(),
            configurations: Vec::new(),
            targets: Vec::new(),
            subprojects: Vec::new(),
            dependency: None,
            offline: false,
            refresh: false,
            include_build_src: true,
            include_buildscript: true,
            include_builds: true,
            search_all: false,
            fallback: FallbackConfigurations::default(),
        }
    }
}

impl ResolveConfiguration {
    fn single_dependency(&self) -> bool {
        self.dependency
            .as_deref()
            .is_some_and(|dependency| !dependency.trim().is_empty())
    }
}

/// One invocation of the build tool against a build directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveAttempt {
    pub label: String,
    /// Configuration globs overriding the scope selection; empty means "use the scope".
    pub configurations: Vec<String>,
}

impl ResolveAttempt {
    /// The attempts to make for every build, in order.
    pub fn plan(config: &ResolveConfiguration) -> Vec<ResolveAttempt> {
        if !config.configurations.is_empty() {
            return vec![ResolveAttempt {
                label: "configurations".to_string(),
                configurations: config.configurations.clone(),
            }];
        }
        let mut attempts = vec![ResolveAttempt {
            label: format!("scope {}", config.scope),
            configurations: Vec::new(),
        }];
        let fallback = match config.scope {
            Scope::Compile => Some(("debug compile classpath", &config.fallback.compile)),
            Scope::Runtime => Some(("debug runtime classpath", &config.fallback.runtime)),
            Scope::Test | Scope::All => None,
        };
        if let Some((label, patterns)) = fallback.filter(|(_, patterns)| !patterns.is_empty()) {
            attempts.push(ResolveAttempt {
                label: label.to_string(),
                configurations: patterns.clone(),
            });
        }
        attempts
    }
}

/// Record of an attempt made against one build, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub build: PathBuf,
    pub label: String,
    pub configurations: Vec<String>,
    pub found: bool,
}

impl Display for AttemptReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.label, self.build.display())?;
        if !self.configurations.is_empty() {
            write!(f, " ({})", self.configurations.join(","))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    pub sources: Vec<SourceArtifact>,
    pub deps: Vec<Coordinate>,
    pub included_builds: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub attempts: Vec<AttemptReport>,
}

impl ResolutionResult {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.deps.is_empty()
    }

    /// Appends `other`, keeping the first occurrence of every source, dependency,
    /// included build and warning.
    pub fn merge(&mut self, other: ResolutionResult) {
        let ResolutionResult {
            sources,
            deps,
            included_builds,
            warnings,
            attempts,
        } = other;
        extend_unique(&mut self.sources, sources, |s| {
            (s.coordinate.to_string(), s.path.clone())
        });
        extend_unique(&mut self.deps, deps, |d| d.to_string());
        extend_unique(&mut self.included_builds, included_builds, |p| p.clone());
        extend_unique(&mut self.warnings, warnings, |w| w.clone());
        self.attempts.extend(attempts);
    }
}

fn extend_unique<T, K, F>(base: &mut Vec<T>, extra: Vec<T>, key: F)
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    if extra.is_empty() {
        return;
    }
    let mut seen: HashSet<K> = base.iter().map(&key).collect();
    for item in extra {
        if seen.insert(key(&item)) {
            base.push(item);
        }
    }
}

/// Resolves the sources of one build directory.
pub trait BuildResolver {
    fn resolve_build(&self, build_dir: &Path) -> Result<ResolutionResult, ResolveError>;
}

/// Resolves sources across the whole build topology with Gradle.
pub fn resolve<R>(
    config: &ResolveConfiguration,
    runner: &R,
    cancel: &CancellationToken,
) -> Result<ResolutionResult, ResolveError>
where
    R: ProcessRunner + ?Sized,
{
    let root = canonical_path(&config.project_dir);
    let resolver = GradleResolver::new(runner, config, root, cancel);
    resolve_topology(config, &resolver, cancel)
}

/// Walks the root build and every composite build it reports, breadth first,
/// visiting each canonical directory at most once.
///
/// A failure of the root build aborts the call; failures of included builds become warnings.
pub fn resolve_topology<B>(
    config: &ResolveConfiguration,
    resolver: &B,
    cancel: &CancellationToken,
) -> Result<ResolutionResult, ResolveError>
where
    B: BuildResolver + ?Sized,
{
    let root = canonical_path(&config.project_dir);
    let follow_includes = config.include_builds && !config.single_dependency();

    let mut queue = VecDeque::from([root.clone()]);
    let mut visited = HashSet::new();
    let mut combined = ResolutionResult::default();

    while let Some(build_dir) = queue.pop_front() {
        check_cancelled(cancel)?;
        let build_dir = canonical_path(&build_dir);
        if !visited.insert(build_dir.clone()) {
            continue;
        }
        info!("Resolving sources in {}", build_dir.display());

        let result = match resolver.resolve_build(&build_dir) {
            Ok(result) => result,
            Err(error) if error.is_cancelled() || build_dir == root => return Err(error),
            Err(error) => {
                warn!("Skipping included build {}: {}", build_dir.display(), error);
                combined.warnings.push(format!(
                    "included build resolve failed ({}): {}",
                    build_dir.display(),
                    error
                ));
                continue;
            }
        };

        if follow_includes {
            for included in &result.included_builds {
                if !visited.contains(&canonical_path(included)) {
                    queue.push_back(included.clone());
                }
            }
        }
        combined.merge(result);
    }

    Ok(combined)
}

/// Canonical absolute form of `path`, falling back to a lexical absolute path
/// when the directory cannot be resolved on disk.
pub fn canonical_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
