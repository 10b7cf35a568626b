mod extract;
mod capability;
pub mod ripgrep;

use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    model::{Coordinate, FileId, SourceArtifact},
    process::{check_cancelled, CancellationToken, ProcessError, ProcessRunner},
};

pub use extract::{entry_destination, extract_archive};
pub use capability::zip_capable;

pub const DEFAULT_FILE_GLOB: &str = "*.kt";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search pattern is required")]
    EmptyPattern,
    #[error("No source archives to search")]
    NoArchives,
    #[error("Invalid path in archive: {0}")]
    ArchiveEscape(String),
    #[error("Could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

impl SearchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Process(ProcessError::Cancelled))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub pattern: String,
    pub archives: Vec<SourceArtifact>,
    /// Passed to ripgrep after the fixed flags, e.g. `-C 2`.
    pub extra_args: Vec<String>,
    pub file_glob: String,
    pub work_dir: Option<PathBuf>,
}

impl SearchRequest {
    pub fn new(pattern: impl Into<String>, archives: Vec<SourceArtifact>) -> Self {
        SearchRequest {
            pattern: pattern.into(),
            archives,
            extra_args: Vec::new(),
            file_glob: DEFAULT_FILE_GLOB.to_string(),
            work_dir: None,
        }
    }
}

/// How the archives are handed to ripgrep, decided once per search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// ripgrep reads the archives directly.
    SearchZip,
    /// Archives are unpacked to a temporary directory first.
    Extract,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub file_id: FileId,
    /// Path as reported by ripgrep. For extracted archives it no longer exists after the search.
    pub file: String,
    pub line: u64,
    /// 0 for context lines.
    pub column: u64,
    pub text: String,
}

impl Display for Match {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:{}:{}", self.file_id, self.line, self.column, self.text)
    }
}

/// Searches the given sources archives with ripgrep.
pub fn search<R>(
    request: &SearchRequest,
    runner: &R,
    cancel: &CancellationToken,
) -> Result<Vec<Match>, SearchError>
where
    R: ProcessRunner + ?Sized,
{
    if request.pattern.is_empty() {
        return Err(SearchError::EmptyPattern);
    }
    if request.archives.is_empty() {
        return Err(SearchError::NoArchives);
    }
    let rg = runner
        .which(ripgrep::PROGRAM)
        .ok_or_else(|| ProcessError::ToolNotFound("rg not found on PATH".to_string()))?;

    let strategy = if zip_capable(runner, &rg, cancel)? {
        Strategy::SearchZip
    } else {
        Strategy::Extract
    };
    info!("Searching {} archives ({:?})", request.archives.len(), strategy);
    match strategy {
        Strategy::SearchZip => search_archives(request, runner, &rg, cancel),
        Strategy::Extract => search_extracted(request, runner, &rg, cancel),
    }
}

fn run_ripgrep<R, T>(
    request: &SearchRequest,
    runner: &R,
    rg: &Path,
    search_zip: bool,
    targets: T,
    cancel: &CancellationToken,
) -> Result<Vec<ripgrep::RawMatch>, SearchError>
where
    R: ProcessRunner + ?Sized,
    T: IntoIterator,
    T::Item: Into<std::ffi::OsString>,
{
    let mut invocation = ripgrep::invocation(
        rg,
        search_zip,
        &request.file_glob,
        &request.extra_args,
        &request.pattern,
        targets,
    );
    if let Some(dir) = &request.work_dir {
        invocation = invocation.current_dir(dir);
    }
    let stdout = ripgrep::run(runner, &invocation, cancel)?;
    Ok(ripgrep::parse_output(&stdout))
}

fn search_archives<R>(
    request: &SearchRequest,
    runner: &R,
    rg: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<Match>, SearchError>
where
    R: ProcessRunner + ?Sized,
{
    let prefixes: Vec<(String, &Coordinate)> = request
        .archives
        .iter()
        .map(|source| (format!("{}:", source.path.display()), &source.coordinate))
        .collect();
    let targets = request.archives.iter().map(|source| source.path.as_os_str());
    let raw = run_ripgrep(request, runner, rg, true, targets, cancel)?;

    Ok(raw
        .into_iter()
        .filter_map(|raw| {
            let (prefix, coordinate) = prefixes
                .iter()
                .filter(|(prefix, _)| raw.file.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())?;
            let inner = raw.file[prefix.len()..].to_string();
            Some(to_match(raw, Coordinate::clone(coordinate), &inner))
        })
        .collect())
}

fn search_extracted<R>(
    request: &SearchRequest,
    runner: &R,
    rg: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<Match>, SearchError>
where
    R: ProcessRunner + ?Sized,
{
    // removed on drop, whichever way this function returns
    let temp = tempfile::Builder::new().prefix("ksrc-search-").tempdir()?;
    let base = temp.path().canonicalize()?;

    let mut roots = Vec::with_capacity(request.archives.len());
    for (i, source) in request.archives.iter().enumerate() {
        check_cancelled(cancel)?;
        let dir = base.join(format!("archive-{i}"));
        let count = extract_archive(&source.path, &dir)?;
        debug!("Extracted {} files from {}", count, source.path.display());
        roots.push((dir, &source.coordinate));
    }

    let targets = roots.iter().map(|(dir, _)| dir.as_os_str());
    let raw = run_ripgrep(request, runner, rg, false, targets, cancel)?;

    Ok(raw
        .into_iter()
        .filter_map(|raw| {
            let file = PathBuf::from(&raw.file);
            let (relative, coordinate) = roots
                .iter()
                .filter_map(|(root, coordinate)| {
                    file.strip_prefix(root)
                        .ok()
                        .map(|relative| (root.as_os_str().len(), relative, *coordinate))
                })
                .max_by_key(|(len, _, _)| *len)
                .map(|(_, relative, coordinate)| (relative.to_path_buf(), coordinate))?;
            let inner = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some(to_match(raw, coordinate.clone(), &inner))
        })
        .collect())
}

fn to_match(raw: ripgrep::RawMatch, coordinate: Coordinate, inner: &str) -> Match {
    Match {
        file_id: FileId::new(coordinate, inner),
        file: raw.file,
        line: raw.line,
        column: raw.column,
        text: raw.text,
    }
}
