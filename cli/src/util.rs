use std::path::{Path, PathBuf};
use std::process::exit;

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

/// `dir` made absolute against the current dir, or the current dir itself.
pub fn working_dir(dir: Option<&Path>) -> PathBuf {
    let cur = self::current_dir();
    match dir {
        Some(dir) => fsutil::normalize_path(cur.join(dir)),
        None => cur,
    }
}
