use std::{io::Write, path::Path};

use log::debug;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use super::{ripgrep, SearchError};
use crate::process::{CancellationToken, ProcessError, ProcessRunner};

const SAMPLE_ENTRY: &str = "sample.txt";
const SAMPLE_MARKER: &str = "ksrc-zip-sample";

/// Whether the installed ripgrep can look inside zip archives.
///
/// Searches a throwaway single-entry archive. Any failure other than cancellation
/// counts as "not capable".
pub fn zip_capable<R>(
    runner: &R,
    rg: &Path,
    cancel: &CancellationToken,
) -> Result<bool, SearchError>
where
    R: ProcessRunner + ?Sized,
{
    let mut sample = tempfile::Builder::new()
        .prefix("ksrc-rg-sample-")
        .suffix(".zip")
        .tempfile()?;
    {
        let mut writer = ZipWriter::new(sample.as_file_mut());
        writer.start_file(
            SAMPLE_ENTRY,
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )?;
        writer.write_all(SAMPLE_MARKER.as_bytes())?;
        writer.finish()?;
    }
    let path = sample.path().to_string_lossy().to_string();

    let invocation = ripgrep::invocation(rg, true, "*.txt", &[], SAMPLE_MARKER, [&path]);
    let stdout = match ripgrep::run(runner, &invocation, cancel) {
        Ok(stdout) => stdout,
        Err(ProcessError::Cancelled) => return Err(ProcessError::Cancelled.into()),
        Err(error) => {
            debug!("Zip capability check failed: {}", error);
            return Ok(false);
        }
    };

    let prefix = format!("{path}:");
    let capable = ripgrep::parse_output(&stdout)
        .iter()
        .any(|raw| raw.file.starts_with(&prefix));
    debug!("ripgrep zip search supported: {}", capable);
    Ok(capable)
}
