use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

pub trait Testcase {
    /// Identity of the testcase. Used as the report key and as the reference file name.
    fn name(&self) -> &str;
    fn input(&self) -> fsutil::Result<Cow<'_, [u8]>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsTestcase {
    name: String,
    input_data_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnMemoryTestcase<B: AsRef<[u8]>> {
    pub name: String,
    pub input: B,
}

impl Testcase for FsTestcase {
    fn name(&self) -> &str {
        &self.name
    }

    fn input(&self) -> fsutil::Result<Cow<'_, [u8]>> {
        fsutil::read(&self.input_data_path).map(Cow::Owned)
    }
}

impl FsTestcase {
    pub fn new(name: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            input_data_path: input.into(),
        }
    }

    /// Lists every regular file in `dir` as a testcase, in lexicographic order of file name.
    ///
    /// A file name that is not valid UTF-8 is named lossily, so the testcase still runs and
    /// shows up in the report.
    pub fn enumerate(dir: impl AsRef<Path>) -> fsutil::Result<Vec<Self>> {
        let mut res: Vec<Self> = fsutil::list_regular_files(&dir)?
            .into_iter()
            .filter_map(|path| {
                let file_name = path.file_name()?;
                let name = match file_name.to_str() {
                    Some(name) => name.to_owned(),
                    None => {
                        let lossy = file_name.to_string_lossy().into_owned();
                        log::warn!(
                            "Input file name {:?} is not valid UTF-8; reported as '{}'",
                            path,
                            lossy
                        );
                        lossy
                    }
                };
                Some(Self::new(name, path))
            })
            .collect();
        res.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(res)
    }
}

impl<B> OnMemoryTestcase<B>
where
    B: AsRef<[u8]>,
{
    pub fn new(name: impl Into<String>, input: impl Into<B>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
        }
    }
}

impl<B> Testcase for OnMemoryTestcase<B>
where
    B: AsRef<[u8]>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn input(&self) -> fsutil::Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.input.as_ref()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enumerate_sorts_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fsutil::write(dir.path().join("b.txt"), "2\n").unwrap();
        fsutil::write(dir.path().join("a.txt"), "1\n").unwrap();
        fsutil::mkdir_all(dir.path().join("nested")).unwrap();

        let testcases = FsTestcase::enumerate(dir.path()).unwrap();
        let names: Vec<_> = testcases.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(testcases[0].input().unwrap().as_ref(), b"1\n");
    }

    #[test]
    fn enumerate_keeps_non_utf8_file_names() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = tempfile::tempdir().unwrap();
        fsutil::write(dir.path().join("a.txt"), "1\n").unwrap();
        fsutil::write(dir.path().join(OsStr::from_bytes(b"b\xff.txt")), "2\n").unwrap();

        let testcases = FsTestcase::enumerate(dir.path()).unwrap();
        let names: Vec<_> = testcases.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["a.txt", "b\u{FFFD}.txt"]);
        assert_eq!(testcases[1].input().unwrap().as_ref(), b"2\n");
    }

    #[test]
    fn on_memory_testcase_borrows_input() {
        let t = OnMemoryTestcase::<&'static str>::new("sample", "hello\n");
        let input = t.input().unwrap();
        assert!(matches!(input, Cow::Borrowed(_)));
        assert_eq!(input.as_ref(), b"hello\n");
    }
}
