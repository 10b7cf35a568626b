use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;
use zip::{result::ZipError, ZipArchive};

use crate::model::{version::compare_version, Coordinate, ParseError, SourceArtifact};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("File not found in archive: {0}")]
    EntryNotFound(String),
    #[error("Source archive not found for {0}. Try: ksrc fetch {0}")]
    ArchiveNotFound(Coordinate),
    #[error(
        "File not found in resolved sources: {0}. \
         Try: ksrc search --module group:artifact -q \"<pattern>\" to get a file-id"
    )]
    NotInSources(String),
    #[error("Could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Zip error: {0}")]
    Zip(#[from] ZipError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Inclusive, 1-based line range written as `start,end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl FromStr for LineRange {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidLineRange(value.to_string());
        let (start, end) = value.trim().split_once(',').ok_or_else(invalid)?;
        let parse = |n: &str| n.trim().parse::<usize>().ok().filter(|n| *n > 0);
        let (start, end) = parse(start).zip(parse(end)).ok_or_else(invalid)?;
        if end < start {
            return Err(invalid());
        }
        Ok(LineRange { start, end })
    }
}

fn open(archive: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let file = File::open(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    Ok(ZipArchive::new(file)?)
}

/// Reads one entry, keeping only the lines in `range` when given.
pub fn read_entry(
    archive: &Path,
    inner_path: &str,
    range: Option<LineRange>,
) -> Result<Vec<u8>, ArchiveError> {
    let inner_path = inner_path.trim_start_matches('/');
    let mut zip = open(archive)?;
    let entry = match zip.by_name(inner_path) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(ArchiveError::EntryNotFound(inner_path.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let Some(range) = range else {
        let mut data = Vec::new();
        BufReader::new(entry).read_to_end(&mut data)?;
        return Ok(data);
    };
    let mut data = Vec::new();
    for (n, line) in BufReader::new(entry).lines().enumerate() {
        let n = n + 1;
        if n < range.start {
            continue;
        }
        if n > range.end {
            break;
        }
        data.extend_from_slice(line?.as_bytes());
        data.push(b'\n');
    }
    Ok(data)
}

fn entry_names(archive: &Path) -> Result<Vec<String>, ArchiveError> {
    let zip = open(archive)?;
    Ok(zip.file_names().map(str::to_string).collect())
}

/// First archive holding `path`, either exactly or as a path suffix.
/// Returns the archive and the entry's full inner path.
pub fn find_entry<'a>(
    sources: &'a [SourceArtifact],
    path: &str,
) -> Result<(&'a SourceArtifact, String), ArchiveError> {
    let wanted = path.trim_start_matches('/');
    let suffix = format!("/{wanted}");
    for source in sources {
        let Ok(names) = entry_names(&source.path) else {
            continue;
        };
        if let Some(name) = names.iter().find(|name| name.as_str() == wanted) {
            return Ok((source, name.clone()));
        }
        if let Some(name) = names.iter().find(|name| name.ends_with(&suffix)) {
            return Ok((source, name.clone()));
        }
    }
    Err(ArchiveError::NotInSources(wanted.to_string()))
}

/// The archive resolved for `coordinate`. Without a version, the highest one wins.
pub fn find_archive_for<'a>(
    sources: &'a [SourceArtifact],
    coordinate: &Coordinate,
) -> Result<&'a SourceArtifact, ArchiveError> {
    sources
        .iter()
        .filter(|source| coordinate.accepts(&source.coordinate))
        .reduce(|best, candidate| {
            if compare_version(
                candidate.coordinate.version_str(),
                best.coordinate.version_str(),
            )
            .is_gt()
            {
                candidate
            } else {
                best
            }
        })
        .ok_or_else(|| ArchiveError::ArchiveNotFound(coordinate.clone()))
}
