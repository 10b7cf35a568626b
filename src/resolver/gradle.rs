use std::{
    collections::HashSet,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use tempfile::NamedTempFile;

use crate::{
    model::{Coordinate, SourceArtifact},
    process::{CancellationToken, Invocation, ProcessError, ProcessRunner},
};

use super::{
    AttemptReport, BuildResolver, ResolutionResult, ResolveAttempt, ResolveConfiguration,
    ResolveError,
};

/// Init script injected into every Gradle invocation. It prints the records parsed below.
pub const INIT_SCRIPT: &str = include_str!("ksrc-init.gradle");
/// Synthetic task registered by [`INIT_SCRIPT`].
pub const TASK_NAME: &str = "ksrcSources";

const SOURCE_MARKER: &str = "KSRC|";
const DEPENDENCY_MARKER: &str = "KSRCDEP|";
const INCLUDE_MARKER: &str = "KSRCINCLUDE|";

const BUILD_FILES: &[&str] = &[
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
];

#[cfg(windows)]
const WRAPPER: &str = "gradlew.bat";
#[cfg(not(windows))]
const WRAPPER: &str = "gradlew";

/// Project properties understood by [`INIT_SCRIPT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Module,
    Group,
    Artifact,
    Version,
    Scope,
    Config,
    Targets,
    Subprojects,
    Dependency,
    Buildscript,
    IncludeBuilds,
}

impl Property {
    pub const ALL: [Property; 11] = [
        Property::Module,
        Property::Group,
        Property::Artifact,
        Property::Version,
        Property::Scope,
        Property::Config,
        Property::Targets,
        Property::Subprojects,
        Property::Dependency,
        Property::Buildscript,
        Property::IncludeBuilds,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Property::Module => "ksrcModule",
            Property::Group => "ksrcGroup",
            Property::Artifact => "ksrcArtifact",
            Property::Version => "ksrcVersion",
            Property::Scope => "ksrcScope",
            Property::Config => "ksrcConfig",
            Property::Targets => "ksrcTargets",
            Property::Subprojects => "ksrcSubprojects",
            Property::Dependency => "ksrcDep",
            Property::Buildscript => "ksrcBuildscript",
            Property::IncludeBuilds => "ksrcIncludeBuilds",
        }
    }

    pub fn to_arg(&self, value: &str) -> String {
        format!("-P{}={}", self.key(), value)
    }
}

/// Property values for one attempt. Blank values are left out, flags are always sent.
pub fn properties(
    config: &ResolveConfiguration,
    attempt: &ResolveAttempt,
    build_src: bool,
) -> Vec<(Property, String)> {
    let subprojects = if build_src {
        String::new()
    } else {
        config.subprojects.join(",")
    };
    let candidates = [
        (Property::Module, config.filter.module.clone()),
        (Property::Group, config.filter.group.clone()),
        (Property::Artifact, config.filter.artifact.clone()),
        (Property::Version, config.filter.version.clone()),
        (Property::Scope, config.scope.to_string()),
        (Property::Config, attempt.configurations.join(",")),
        (Property::Targets, config.targets.join(",")),
        (Property::Subprojects, subprojects),
        (
            Property::Dependency,
            config.dependency.clone().unwrap_or_default(),
        ),
        (
            Property::Buildscript,
            config.include_buildscript.to_string(),
        ),
        (Property::IncludeBuilds, config.include_builds.to_string()),
    ];
    candidates
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
}

/// Parses the records printed by the init script. Anything else on stdout is ignored.
pub fn parse_output(stdout: &str) -> ResolutionResult {
    let mut result = ResolutionResult::default();
    let mut seen_sources = HashSet::new();
    let mut seen_deps = HashSet::new();
    let mut seen_includes = HashSet::new();

    for line in stdout.lines().map(str::trim) {
        if let Some(record) = line.strip_prefix(SOURCE_MARKER) {
            let Some((coordinate, path)) = record.split_once('|') else {
                continue;
            };
            let path = path.trim();
            let Ok(coordinate) = Coordinate::parse(coordinate.trim()) else {
                continue;
            };
            if path.is_empty() {
                continue;
            }
            trace!("Source {} at {}", coordinate, path);
            if seen_sources.insert((coordinate.to_string(), path.to_string())) {
                result.sources.push(SourceArtifact::new(coordinate, path));
            }
        } else if let Some(record) = line.strip_prefix(DEPENDENCY_MARKER) {
            let coordinate = record.split('|').next().unwrap_or("");
            if let Ok(coordinate) = Coordinate::parse(coordinate.trim()) {
                if seen_deps.insert(coordinate.to_string()) {
                    result.deps.push(coordinate);
                }
            }
        } else if let Some(path) = line.strip_prefix(INCLUDE_MARKER) {
            let path = path.trim();
            if !path.is_empty() && seen_includes.insert(path.to_string()) {
                result.included_builds.push(PathBuf::from(path));
            }
        }
    }
    result
}

/// Whether `dir` holds a Gradle build of its own.
pub fn has_build_file(dir: &Path) -> bool {
    dir.is_dir() && BUILD_FILES.iter().any(|file| dir.join(file).is_file())
}

fn wrapper_in(dir: &Path) -> Option<PathBuf> {
    let wrapper = dir.join(WRAPPER);
    wrapper.is_file().then_some(wrapper)
}

/// Drives Gradle against one build directory at a time.
pub struct GradleResolver<'a, R: ?Sized> {
    runner: &'a R,
    config: &'a ResolveConfiguration,
    root: PathBuf,
    cancel: &'a CancellationToken,
}

impl<'a, R> GradleResolver<'a, R>
where
    R: ProcessRunner + ?Sized,
{
    pub fn new(
        runner: &'a R,
        config: &'a ResolveConfiguration,
        root: PathBuf,
        cancel: &'a CancellationToken,
    ) -> Self {
        GradleResolver {
            runner,
            config,
            root,
            cancel,
        }
    }

    /// Prefers the build's own wrapper, then the root build's wrapper, then `gradle` on the path.
    pub fn find_gradle(&self, build_dir: &Path) -> Result<PathBuf, ProcessError> {
        if let Some(wrapper) = wrapper_in(build_dir) {
            return Ok(wrapper);
        }
        if build_dir != self.root {
            if let Some(wrapper) = wrapper_in(&self.root) {
                return Ok(wrapper);
            }
        }
        self.runner.which("gradle").ok_or_else(|| {
            ProcessError::ToolNotFound(
                "gradle not found (no ./gradlew and gradle not on PATH)".to_string(),
            )
        })
    }

    fn run_attempts(
        &self,
        build_dir: &Path,
        build_src: Option<&Path>,
    ) -> Result<ResolutionResult, ResolveError> {
        let mut combined = ResolutionResult::default();
        for attempt in ResolveAttempt::plan(self.config) {
            let mut result = self
                .run_attempt(build_dir, build_src, &attempt)
                .map_err(|source| ResolveError::Build {
                    build: build_src.unwrap_or(build_dir).to_path_buf(),
                    attempt: attempt.label.clone(),
                    source,
                })?;
            let found = !result.is_empty();
            debug!(
                "Attempt `{}` in {} found {} sources and {} dependencies",
                attempt.label,
                build_src.unwrap_or(build_dir).display(),
                result.sources.len(),
                result.deps.len()
            );
            result.attempts.push(AttemptReport {
                build: build_src.unwrap_or(build_dir).to_path_buf(),
                label: attempt.label,
                configurations: attempt.configurations,
                found,
            });
            combined.merge(result);
            if found && !self.config.search_all {
                break;
            }
        }
        Ok(combined)
    }

    fn run_attempt(
        &self,
        build_dir: &Path,
        build_src: Option<&Path>,
        attempt: &ResolveAttempt,
    ) -> Result<ResolutionResult, ProcessError> {
        let script = write_init_script()?;
        let gradle = self.find_gradle(build_dir)?;

        let mut invocation = Invocation::new(gradle)
            .current_dir(build_dir)
            .arg("-I")
            .arg(script.path())
            .args([
                "-Dorg.gradle.console=plain",
                "--info",
                "--no-configuration-cache",
            ]);
        if let Some(build_src) = build_src {
            invocation = invocation.arg("-p").arg(build_src);
        }
        if self.config.offline {
            invocation = invocation.arg("--offline");
        }
        if self.config.refresh {
            invocation = invocation.arg("--refresh-dependencies");
        }
        let invocation = invocation
            .args(
                properties(self.config, attempt, build_src.is_some())
                    .iter()
                    .map(|(property, value)| property.to_arg(value)),
            )
            .arg(TASK_NAME);

        let output = self.runner.run(&invocation, self.cancel)?;
        // the script file must outlive the subprocess
        drop(script);
        if !output.status.success() {
            return Err(output.into_failure(&invocation));
        }
        Ok(parse_output(&output.stdout))
    }
}

impl<'a, R> BuildResolver for GradleResolver<'a, R>
where
    R: ProcessRunner + ?Sized,
{
    fn resolve_build(&self, build_dir: &Path) -> Result<ResolutionResult, ResolveError> {
        let mut result = self.run_attempts(build_dir, None)?;

        if self.config.include_build_src && !self.config.single_dependency() {
            let build_src = build_dir.join("buildSrc");
            if has_build_file(&build_src) {
                debug!("Including buildSrc at {}", build_src.display());
                result.merge(self.run_attempts(build_dir, Some(&build_src))?);
            }
        }
        Ok(result)
    }
}

fn write_init_script() -> Result<NamedTempFile, ProcessError> {
    let mut file = tempfile::Builder::new()
        .prefix("ksrc-init-")
        .suffix(".gradle")
        .tempfile()?;
    file.write_all(INIT_SCRIPT.as_bytes())?;
    file.flush()?;
    Ok(file)
}
