// System Port (filesystem, symlinks, permissions, process execution)

use crate::domain::{DirEntry, FileInfo, FsHandle, RunScriptOptions};
use crate::error::SystemResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// System capability
///
/// Implementations:
/// - OsSystem: local filesystem and child processes
/// - InstrumentedSystem: logs every call to an inner System
#[async_trait]
pub trait System: Send + Sync {
    /// Set access and modification times
    async fn chtimes(&self, name: &Path, atime: DateTime<Utc>, mtime: DateTime<Utc>)
        -> SystemResult<()>;

    /// Set permission bits
    async fn chmod(&self, name: &Path, mode: u32) -> SystemResult<()>;

    /// Paths matching `pattern`
    async fn glob(&self, pattern: &str) -> SystemResult<Vec<String>>;

    /// Create a hard link `newpath` pointing at `oldpath`
    async fn link(&self, oldpath: &Path, newpath: &Path) -> SystemResult<()>;

    /// Metadata without following a trailing symlink
    async fn lstat(&self, name: &Path) -> SystemResult<FileInfo>;

    async fn mkdir(&self, name: &Path, perm: u32) -> SystemResult<()>;

    /// Host path backing `path`
    fn raw_path(&self, path: &Path) -> SystemResult<PathBuf>;

    /// Entries of a directory, sorted by name
    async fn read_dir(&self, name: &Path) -> SystemResult<Vec<DirEntry>>;

    async fn read_file(&self, name: &Path) -> SystemResult<Vec<u8>>;

    /// Target of a symlink
    async fn readlink(&self, name: &Path) -> SystemResult<PathBuf>;

    /// Remove a file or an empty directory
    async fn remove(&self, name: &Path) -> SystemResult<()>;

    /// Remove a path and everything below it. Missing paths are not an error.
    async fn remove_all(&self, name: &Path) -> SystemResult<()>;

    async fn rename(&self, oldpath: &Path, newpath: &Path) -> SystemResult<()>;

    /// Run a command to completion
    ///
    /// # Errors
    /// - SystemError::ProcessExit if the command exits unsuccessfully
    async fn run_cmd(&self, cmd: &mut Command) -> SystemResult<()>;

    /// Run the script `data`, named `scriptname`, in `dir`
    async fn run_script(
        &self,
        scriptname: &Path,
        dir: &Path,
        data: &[u8],
        options: &RunScriptOptions,
    ) -> SystemResult<()>;

    async fn stat(&self, name: &Path) -> SystemResult<FileInfo>;

    /// The filesystem this System operates on
    fn underlying_fs(&self) -> FsHandle;

    /// Write `data` to `name`, creating it with `perm` if needed
    async fn write_file(&self, name: &Path, data: &[u8], perm: u32) -> SystemResult<()>;

    /// Replace whatever is at `newname` with a symlink to `oldname`
    async fn write_symlink(&self, oldname: &str, newname: &Path) -> SystemResult<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::FileKind;
    use crate::error::SystemError;
    use std::sync::{Arc, Mutex};

    /// Mock system behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Every call succeeds with the canned values
        Success,
        /// Every call fails with this error
        Fail(SystemError),
    }

    /// Mock System returning canned values
    pub struct MockSystem {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
        data: Vec<u8>,
        matches: Vec<String>,
        entries: Vec<DirEntry>,
        link_target: PathBuf,
        fs: FsHandle,
    }

    impl MockSystem {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
                data: b"mock data".to_vec(),
                matches: vec!["/mock/a".to_string(), "/mock/b".to_string()],
                entries: vec![DirEntry {
                    name: "entry".to_string(),
                    kind: FileKind::File,
                }],
                link_target: PathBuf::from("/mock/target"),
                fs: FsHandle::new("/mock"),
            }
        }
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }
        pub fn new_fail(err: SystemError) -> Self {
            Self::new(MockBehavior::Fail(err))
        }
        /// Contents returned by read_file
        pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
            self.data = data.into();
            self
        }
        pub fn with_matches(mut self, matches: Vec<String>) -> Self {
            self.matches = matches;
            self
        }
        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }
        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
        pub fn file_info(name: &Path) -> FileInfo {
            FileInfo {
                name: name.display().to_string(),
                size: 9,
                mode: 0o644,
                kind: FileKind::File,
                modified: None,
            }
        }

        fn outcome<T>(&self, value: T) -> SystemResult<T> {
            *self.call_count.lock().unwrap() += 1;
            match &*self.behavior.lock().unwrap() {
                MockBehavior::Success => Ok(value),
                MockBehavior::Fail(err) => Err(err.clone()),
            }
        }
    }

    #[async_trait]
    impl System for MockSystem {
        async fn chtimes(&self, _: &Path, _: DateTime<Utc>, _: DateTime<Utc>) -> SystemResult<()> {
            self.outcome(())
        }
        async fn chmod(&self, _: &Path, _: u32) -> SystemResult<()> {
            self.outcome(())
        }
        async fn glob(&self, _: &str) -> SystemResult<Vec<String>> {
            self.outcome(self.matches.clone())
        }
        async fn link(&self, _: &Path, _: &Path) -> SystemResult<()> {
            self.outcome(())
        }
        async fn lstat(&self, name: &Path) -> SystemResult<FileInfo> {
            self.outcome(Self::file_info(name))
        }
        async fn mkdir(&self, _: &Path, _: u32) -> SystemResult<()> {
            self.outcome(())
        }
        fn raw_path(&self, path: &Path) -> SystemResult<PathBuf> {
            self.outcome(self.fs.resolve(path))
        }
        async fn read_dir(&self, _: &Path) -> SystemResult<Vec<DirEntry>> {
            self.outcome(self.entries.clone())
        }
        async fn read_file(&self, _: &Path) -> SystemResult<Vec<u8>> {
            self.outcome(self.data.clone())
        }
        async fn readlink(&self, _: &Path) -> SystemResult<PathBuf> {
            self.outcome(self.link_target.clone())
        }
        async fn remove(&self, _: &Path) -> SystemResult<()> {
            self.outcome(())
        }
        async fn remove_all(&self, _: &Path) -> SystemResult<()> {
            self.outcome(())
        }
        async fn rename(&self, _: &Path, _: &Path) -> SystemResult<()> {
            self.outcome(())
        }
        async fn run_cmd(&self, _: &mut Command) -> SystemResult<()> {
            self.outcome(())
        }
        async fn run_script(
            &self,
            _: &Path,
            _: &Path,
            _: &[u8],
            _: &RunScriptOptions,
        ) -> SystemResult<()> {
            self.outcome(())
        }
        async fn stat(&self, name: &Path) -> SystemResult<FileInfo> {
            self.outcome(Self::file_info(name))
        }
        fn underlying_fs(&self) -> FsHandle {
            self.fs.clone()
        }
        async fn write_file(&self, _: &Path, _: &[u8], _: u32) -> SystemResult<()> {
            self.outcome(())
        }
        async fn write_symlink(&self, _: &str, _: &Path) -> SystemResult<()> {
            self.outcome(())
        }
    }
}
