use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;
use walkdir::WalkDir;

use crate::model::{version::highest, Coordinate, SourceArtifact};

const MODULES_DIRECTORY: &str = "caches/modules-2/files-2.1";
const SOURCES_SUFFIX: &str = "-sources.jar";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No cached versions of {group}:{artifact} in {}", location.display())]
    NoVersions {
        group: String,
        artifact: String,
        location: PathBuf,
    },
    #[error("Sources for {0} not found in the Gradle cache")]
    SourcesNotFound(Coordinate),
    #[error("Could not find home dir. Please define $HOME env variable.")]
    NoHome,
    #[error("Error walking {}: {source}", location.display())]
    Walk {
        location: PathBuf,
        source: walkdir::Error,
    },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Read-only view of the Gradle module cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCache {
    /// Gradle user home, usually `~/.gradle`.
    pub location: PathBuf,
}

impl ModuleCache {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        ModuleCache {
            location: location.into(),
        }
    }

    pub fn default_location() -> Result<PathBuf, CacheError> {
        home::home_dir()
            .map(|home| home.join(".gradle"))
            .ok_or(CacheError::NoHome)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.location.join(MODULES_DIRECTORY)
    }

    fn module_dir(&self, group: &str, artifact: &str) -> PathBuf {
        let mut dir = self.modules_dir();
        dir.extend(group.split('.'));
        dir.push(artifact);
        dir
    }

    /// Highest cached version of `group:artifact`.
    pub fn highest_version(&self, group: &str, artifact: &str) -> Result<String, CacheError> {
        let module_dir = self.module_dir(group, artifact);
        let no_versions = || CacheError::NoVersions {
            group: group.to_string(),
            artifact: artifact.to_string(),
            location: module_dir.clone(),
        };
        let entries = match std::fs::read_dir(&module_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(no_versions()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        highest(versions.iter().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(no_versions)
    }

    /// Cached sources archives for `coordinate`, using the highest cached version
    /// when the coordinate does not pin one.
    pub fn find_sources(&self, coordinate: &Coordinate) -> Result<Vec<SourceArtifact>, CacheError> {
        let version = match &coordinate.version {
            Some(version) => version.clone(),
            None => self.highest_version(&coordinate.group, &coordinate.artifact)?,
        };
        let resolved = Coordinate::new(
            coordinate.group.as_str(),
            coordinate.artifact.as_str(),
            Some(version.clone()),
        );
        let version_dir = self
            .module_dir(&coordinate.group, &coordinate.artifact)
            .join(&version);
        debug!("Looking for cached sources in {}", version_dir.display());

        let archives = sources_archives(&version_dir)?;
        if archives.is_empty() {
            return Err(CacheError::SourcesNotFound(resolved));
        }
        Ok(archives
            .into_iter()
            .map(|path| SourceArtifact::new(resolved.clone(), path))
            .collect())
    }
}

fn sources_archives(version_dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    if !version_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut archives = Vec::new();
    for entry in WalkDir::new(version_dir).sort_by_file_name() {
        let entry = entry.map_err(|source| CacheError::Walk {
            location: version_dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(SOURCES_SUFFIX)
        {
            archives.push(entry.into_path());
        }
    }
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    use pretty_assertions::assert_eq;

    fn cached(cache: &ModuleCache, group: &str, artifact: &str, version: &str, files: &[&str]) {
        let dir = cache
            .module_dir(group, artifact)
            .join(version)
            .join("0123456789abcdef");
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), "").unwrap();
        }
    }

    #[test]
    fn module_dir_layout() {
        let cache = ModuleCache::new("/home/me/.gradle");
        assert_eq!(
            cache.module_dir("org.jetbrains.kotlinx", "kotlinx-datetime"),
            PathBuf::from(
                "/home/me/.gradle/caches/modules-2/files-2.1/org/jetbrains/kotlinx/kotlinx-datetime"
            )
        );
    }

    #[test]
    fn picks_highest_version() {
        let temp = tempfile::tempdir().unwrap();
        let cache = ModuleCache::new(temp.path());
        cached(&cache, "com.example", "demo", "1.9.0", &["demo-1.9.0-sources.jar"]);
        cached(&cache, "com.example", "demo", "1.10.0", &["demo-1.10.0-sources.jar"]);
        cached(&cache, "com.example", "demo", "1.2", &["demo-1.2-sources.jar"]);

        assert_eq!(cache.highest_version("com.example", "demo").unwrap(), "1.10.0");
        let sources = cache
            .find_sources(&Coordinate::parse("com.example:demo").unwrap())
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(
            sources[0].coordinate,
            Coordinate::parse("com.example:demo:1.10.0").unwrap()
        );
        assert!(sources[0].path.ends_with("demo-1.10.0-sources.jar"));
    }

    #[test]
    fn pinned_version_ignores_others() {
        let temp = tempfile::tempdir().unwrap();
        let cache = ModuleCache::new(temp.path());
        cached(
            &cache,
            "com.example",
            "demo",
            "1.0",
            &["demo-1.0.jar", "demo-1.0-sources.jar"],
        );
        cached(&cache, "com.example", "demo", "2.0", &["demo-2.0-sources.jar"]);

        let sources = cache
            .find_sources(&Coordinate::parse("com.example:demo:1.0").unwrap())
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].path.ends_with("demo-1.0-sources.jar"));
    }

    #[test]
    fn missing_module_or_sources() {
        let temp = tempfile::tempdir().unwrap();
        let cache = ModuleCache::new(temp.path());
        assert!(matches!(
            cache.find_sources(&Coordinate::parse("com.example:absent").unwrap()),
            Err(CacheError::NoVersions { .. })
        ));

        cached(&cache, "com.example", "binary", "1.0", &["binary-1.0.jar"]);
        assert!(matches!(
            cache.find_sources(&Coordinate::parse("com.example:binary").unwrap()),
            Err(CacheError::SourcesNotFound(_))
        ));
    }
}
