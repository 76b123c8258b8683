use serde::Serialize;
use std::{
    fs::{self, ReadDir},
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("Cannot serialize to JSON (dest='{0}'): {1}")]
        SerializeToJson(PathBuf, #[source] serde_json::Error),
    }

    impl Error {
        pub fn path(&self) -> &std::path::Path {
            match self {
                Self::SingleIO(_, path, _) => path,
                Self::SerializeToJson(path, _) => path,
            }
        }

        /// Whether the underlying I/O error is `NotFound`.
        pub fn is_not_found(&self) -> bool {
            match self {
                Self::SingleIO(_, _, e) => e.kind() == io::ErrorKind::NotFound,
                Self::SerializeToJson(..) => false,
            }
        }
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read(filepath: impl AsRef<Path>) -> Result<Vec<u8>> {
    fs::read(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_json_with_mkdir<P, T>(filepath: P, data: &T) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let s = serde_json::to_string(data)
        .map_err(|e| Error::SerializeToJson(filepath.as_ref().to_owned(), e))?;
    write_with_mkdir(filepath, &s)
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

/// Lists regular files directly under `dir`, sorted by file name.
///
/// Directories, symlinks to directories, sockets, etc. are skipped.
/// Entries whose metadata cannot be read are skipped with a warning.
pub fn list_regular_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut res = Vec::new();
    for entry in self::read_dir(&dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!(
                    "Skipping unreadable entry in '{}': {}",
                    dir.as_ref().to_string_lossy(),
                    e
                );
                continue;
            }
        };
        // `fs::metadata` follows symlinks, so a link to a regular file counts.
        let Ok(meta) = fs::metadata(entry.path()) else {
            log::warn!("Skipping entry without metadata: {:?}", entry.path());
            continue
        };
        if meta.is_file() {
            res.push(entry.path());
        }
    }
    res.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(res)
}

/// Normalize the path
/// ```
/// use fsutil::normalize_path;
/// use std::path::Path;
///
/// assert_eq!(normalize_path("./hoge/.config/././foo"), Path::new("hoge/.config/foo"));
/// assert_eq!(normalize_path("hoge/.config/../../bar/."), Path::new("bar"));
/// assert_eq!(normalize_path("../foo/../hello"), Path::new("../hello"));
/// assert_eq!(normalize_path("/"), Path::new("/"));
/// assert_eq!(normalize_path("./foo/"), Path::new("foo"));
/// assert_eq!(normalize_path("."), Path::new("."));
/// ```
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    use ::std::path::Component;
    let components = path.as_ref().components();
    let mut stack = Vec::with_capacity(components.size_hint().1.unwrap_or(4));
    for c in components {
        match c {
            Component::CurDir => (),
            Component::ParentDir if !stack.is_empty() => {
                stack.pop();
            }
            _ => {
                stack.push(c);
            }
        }
    }
    if stack.is_empty() {
        stack.push(Component::CurDir);
    }
    stack.iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_regular_files_is_sorted_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(base.join("b.txt"), "b").unwrap();
        write(base.join("a.txt"), "a").unwrap();
        write(base.join("10.txt"), "10").unwrap();
        mkdir_all(base.join("a_subdir")).unwrap();

        let names: Vec<_> = list_regular_files(base)
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["10.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn missing_dir_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = list_regular_files(&missing).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.path(), missing);
    }

    #[test]
    fn write_with_mkdir_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x/y/z.bin");
        write_with_mkdir(&path, b"\x00\xff").unwrap();
        assert_eq!(read(&path).unwrap(), b"\x00\xff");
    }
}
