use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
};

use super::ParseError;

const FILE_ID_SEPARATOR: &str = "!/";

/// Identity of a dependency module: `group:artifact[:version]`.
///
/// A missing version means "unspecified", never "latest".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Coordinate {
            group: group.into(),
            artifact: artifact.into(),
            version,
        }
    }

    pub fn parse(s: &str) -> Result<Coordinate, ParseError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(ParseError::InvalidCoordinate(s.to_string()));
        }
        Ok(Coordinate {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts.get(2).map(|v| v.to_string()),
        })
    }

    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }

    /// Same group and artifact, and the same version when `self` pins one.
    pub fn accepts(&self, other: &Coordinate) -> bool {
        self.group == other.group
            && self.artifact == other.artifact
            && self
                .version
                .as_ref()
                .map_or(true, |v| Some(v) == other.version.as_ref())
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}:{}", self.group, self.artifact, version),
            None => write!(f, "{}:{}", self.group, self.artifact),
        }
    }
}

impl FromStr for Coordinate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coordinate::parse(s)
    }
}

/// A sources archive resolved for a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceArtifact {
    pub coordinate: Coordinate,
    pub path: PathBuf,
}

impl SourceArtifact {
    pub fn new(coordinate: Coordinate, path: impl Into<PathBuf>) -> Self {
        SourceArtifact {
            coordinate,
            path: path.into(),
        }
    }
}

/// Stable name of one file inside one sources archive,
/// e.g. `org.jetbrains.kotlinx:kotlinx-datetime:0.6.1!/kotlinx/datetime/LocalDate.kt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId {
    pub coordinate: Coordinate,
    /// Path inside the archive, never with a leading `/`.
    pub path: String,
}

impl FileId {
    pub fn new(coordinate: Coordinate, path: impl AsRef<str>) -> Self {
        FileId {
            coordinate,
            path: path.as_ref().trim_start_matches('/').to_string(),
        }
    }

    pub fn looks_like(value: &str) -> bool {
        value.contains(FILE_ID_SEPARATOR)
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.coordinate, FILE_ID_SEPARATOR, self.path)
    }
}

impl FromStr for FileId {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (coordinate, path) = value
            .split_once(FILE_ID_SEPARATOR)
            .ok_or_else(|| ParseError::InvalidFileIdentifier(value.to_string()))?;
        let coordinate = Coordinate::parse(coordinate)?;
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(ParseError::InvalidFileIdentifier(value.to_string()));
        }
        Ok(FileId::new(coordinate, path))
    }
}
