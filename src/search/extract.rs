use std::{
    fs::{self, File},
    io,
    path::{Component, Path, PathBuf},
};

use zip::ZipArchive;

use super::SearchError;

/// Resolves an archive entry name against `dest` without touching the file system.
/// Fails when the entry would land outside `dest`.
pub fn entry_destination(dest: &Path, name: &str) -> Result<PathBuf, SearchError> {
    let escape = || SearchError::ArchiveEscape(name.to_string());
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(escape());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(escape());
    }
    Ok(dest.join(relative))
}

/// Extracts every file entry of `archive` below `dest`.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize, SearchError> {
    let file = File::open(archive).map_err(|source| SearchError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;

    let mut extracted = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let target = entry_destination(dest, entry.name())?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::testing::write_archive;

    use pretty_assertions::assert_eq;

    #[test]
    fn destination_normalises_inside_dest() {
        let dest = Path::new("/tmp/out");
        assert_eq!(
            entry_destination(dest, "a/./b/../c.kt").unwrap(),
            PathBuf::from("/tmp/out/a/c.kt")
        );
    }

    #[test]
    fn destination_rejects_escapes() {
        let dest = Path::new("/tmp/out");
        for name in ["../evil.kt", "a/../../evil.kt", "/etc/passwd", ".", "a/.."] {
            assert!(
                matches!(
                    entry_destination(dest, name),
                    Err(SearchError::ArchiveEscape(_))
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn extracts_files_and_skips_directories() {
        let temp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            temp.path(),
            "demo-sources.jar",
            &[("a/", ""), ("a/b.kt", "fun b() = 1\n"), ("c.kt", "val c = 2\n")],
        );
        let dest = temp.path().join("out");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dest.join("a/b.kt")).unwrap(),
            "fun b() = 1\n"
        );
        assert_eq!(fs::read_to_string(dest.join("c.kt")).unwrap(), "val c = 2\n");
    }

    #[test]
    fn malicious_entry_aborts_extraction() {
        let temp = tempfile::tempdir().unwrap();
        let archive = write_archive(temp.path(), "evil.jar", &[("../../escape.kt", "boom")]);
        let dest = temp.path().join("nested").join("out");
        let error = extract_archive(&archive, &dest).unwrap_err();
        assert!(matches!(error, SearchError::ArchiveEscape(_)));
        assert!(!temp.path().join("escape.kt").exists());
    }
}
