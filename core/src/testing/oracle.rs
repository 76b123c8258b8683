use std::path::PathBuf;

use super::result::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OracleMode {
    /// Compare against the stored reference.
    Compare,
    /// Overwrite the stored reference with the actual output.
    Record,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Missing reference output '{}'", .0.to_string_lossy())]
    MissingReference(PathBuf),

    #[error(transparent)]
    Fs(#[from] fsutil::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Judgement {
    Match,
    Mismatch { expected: Vec<u8> },
    Recorded,
}

impl Judgement {
    pub fn verdict(&self) -> Verdict {
        match self {
            Judgement::Match => Verdict::Pass,
            Judgement::Recorded => Verdict::Recorded,
            Judgement::Mismatch { .. } => Verdict::Fail,
        }
    }
}

/// Exact byte equality. No whitespace, line-ending or trailing-newline leniency.
pub fn compare(actual: &[u8], reference: &[u8]) -> Verdict {
    if actual == reference {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Reference outputs stored one file per testcase, named after the testcase.
#[derive(Debug, Clone)]
pub struct Oracle {
    dir: PathBuf,
    mode: OracleMode,
}

impl Oracle {
    pub fn new(dir: impl Into<PathBuf>, mode: OracleMode) -> Self {
        Self {
            dir: dir.into(),
            mode,
        }
    }

    pub fn mode(&self) -> OracleMode {
        self.mode
    }

    pub fn reference_path(&self, testcase_name: &str) -> PathBuf {
        self.dir.join(testcase_name)
    }

    pub fn load_reference(&self, testcase_name: &str) -> Result<Vec<u8>, OracleError> {
        let path = self.reference_path(testcase_name);
        fsutil::read(&path).map_err(|e| {
            if e.is_not_found() {
                OracleError::MissingReference(path)
            } else {
                e.into()
            }
        })
    }

    pub fn judge(&self, testcase_name: &str, actual: &[u8]) -> Result<Judgement, OracleError> {
        match self.mode {
            OracleMode::Record => {
                fsutil::write_with_mkdir(self.reference_path(testcase_name), actual)?;
                Ok(Judgement::Recorded)
            }
            OracleMode::Compare => {
                let expected = self.load_reference(testcase_name)?;
                Ok(match compare(actual, &expected) {
                    Verdict::Pass => Judgement::Match,
                    _ => Judgement::Mismatch { expected },
                })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compare_is_exact() {
        assert_eq!(compare(b"hello_123\n", b"hello_123\n"), Verdict::Pass);
        assert_eq!(compare(b"hello_123", b"hello_123\n"), Verdict::Fail);
        assert_eq!(compare(b"hello_123\r\n", b"hello_123\n"), Verdict::Fail);
        assert_eq!(compare(b"hello_123 \n", b"hello_123\n"), Verdict::Fail);
        assert_eq!(compare(b"hello_124\n", b"hello_123\n"), Verdict::Fail);
        assert_eq!(compare(b"", b""), Verdict::Pass);
    }

    #[test]
    fn compare_mode_matches_stored_reference() {
        let dir = tempfile::tempdir().unwrap();
        fsutil::write(dir.path().join("a.txt"), "42\n").unwrap();
        let oracle = Oracle::new(dir.path(), OracleMode::Compare);

        assert_eq!(oracle.judge("a.txt", b"42\n").unwrap(), Judgement::Match);
        let j = oracle.judge("a.txt", b"42").unwrap();
        assert_eq!(
            j,
            Judgement::Mismatch {
                expected: b"42\n".to_vec()
            }
        );
        assert_eq!(j.verdict(), Verdict::Fail);
    }

    #[test]
    fn missing_reference_is_not_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = Oracle::new(dir.path(), OracleMode::Compare);
        let err = oracle.judge("nope.txt", b"anything").unwrap_err();
        match err {
            OracleError::MissingReference(path) => assert_eq!(path, dir.path().join("nope.txt")),
            e => panic!("unexpected error: {:?}", e),
        }
    }

    #[test]
    fn record_mode_overwrites_reference() {
        let dir = tempfile::tempdir().unwrap();
        let refdir = dir.path().join("outputs");
        let oracle = Oracle::new(&refdir, OracleMode::Record);

        let j = oracle.judge("a.txt", b"first\n").unwrap();
        assert_eq!(j, Judgement::Recorded);
        assert_eq!(j.verdict(), Verdict::Recorded);
        assert_eq!(j.verdict().score(), None);
        oracle.judge("a.txt", b"second").unwrap();
        assert_eq!(fsutil::read(refdir.join("a.txt")).unwrap(), b"second");
    }
}
