// OsSystem: System over the local filesystem and child processes
// reason: tokio::fs for async filesystem access, glob crate for pattern matching
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use sysdebug_core::domain::{
    DirEntry, FileInfo, FileKind, FsHandle, Interpreter, RunScriptOptions,
};
use sysdebug_core::error::{SystemError, SystemResult};
use sysdebug_core::port::System;

use crate::exec;

/// Permission bits of temporary script files
const SCRIPT_PERM: u32 = 0o700;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> SystemError + '_ {
    move |err| SystemError::from_io(path, err)
}

/// An unreadable directory met while walking a glob pattern
fn glob_error(err: glob::GlobError) -> SystemError {
    let cause = err.error();
    SystemError::from_io(err.path(), io::Error::new(cause.kind(), cause.to_string()))
}

fn join_error(err: tokio::task::JoinError) -> SystemError {
    SystemError::Io(format!("blocking task failed: {}", err))
}

/// System backed by the local filesystem
///
/// Every path is resolved below the root of `fs`; the host root by default.
#[derive(Debug, Clone, Default)]
pub struct OsSystem {
    fs: FsHandle,
}

impl OsSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// OsSystem operating below `root`
    ///
    /// # Example
    /// ```ignore
    /// let system = OsSystem::with_root("/tmp/sandbox");
    /// system.write_file(Path::new("/etc/motd"), b"hi", 0o644).await?; // writes /tmp/sandbox/etc/motd
    /// ```
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            fs: FsHandle::new(root),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.fs.resolve(path)
    }

    /// Maps a host path back into this system's namespace
    fn unresolve(&self, path: &Path) -> String {
        match path.strip_prefix(&self.fs.root) {
            Ok(rel) if self.fs.root != Path::new("/") => {
                Path::new("/").join(rel).display().to_string()
            }
            _ => path.display().to_string(),
        }
    }

    /// Nearest ancestor of `dir` (itself included) that is an existing directory
    async fn existing_dir(dir: &Path) -> Option<PathBuf> {
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            if let Ok(metadata) = tokio::fs::metadata(ancestor).await {
                if metadata.is_dir() {
                    return Some(ancestor.to_path_buf());
                }
            }
        }
        None
    }

    /// Writes `data` to a fresh temporary file named after `scriptname`
    async fn write_temp_script(scriptname: &Path, data: &[u8]) -> SystemResult<PathBuf> {
        let base = scriptname
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());
        let path = std::env::temp_dir().join(format!("sysdebug-{}.{}", Uuid::new_v4(), base));

        let data = data.to_vec();
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            use std::io::Write;
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(SCRIPT_PERM);
            }
            let mut file = options.open(&target)?;
            file.write_all(&data)
        })
        .await
        .map_err(join_error)?
        .map_err(io_error(&path))?;

        debug!(path = %path.display(), "Temporary script written");
        Ok(path)
    }
}

#[async_trait]
impl System for OsSystem {
    async fn chtimes(
        &self,
        name: &Path,
        atime: DateTime<Utc>,
        mtime: DateTime<Utc>,
    ) -> SystemResult<()> {
        let path = self.resolve(name);
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let times = std::fs::FileTimes::new()
                .set_accessed(SystemTime::from(atime))
                .set_modified(SystemTime::from(mtime));
            std::fs::File::open(&target)?.set_times(times)
        })
        .await
        .map_err(join_error)?
        .map_err(io_error(&path))
    }

    async fn chmod(&self, name: &Path, mode: u32) -> SystemResult<()> {
        let path = self.resolve(name);
        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            std::fs::Permissions::from_mode(mode)
        };
        #[cfg(not(unix))]
        let permissions = {
            let mut permissions = tokio::fs::metadata(&path)
                .await
                .map_err(io_error(&path))?
                .permissions();
            permissions.set_readonly(mode & 0o200 == 0);
            permissions
        };
        tokio::fs::set_permissions(&path, permissions)
            .await
            .map_err(io_error(&path))
    }

    async fn glob(&self, pattern: &str) -> SystemResult<Vec<String>> {
        let resolved = self.resolve(Path::new(pattern)).display().to_string();
        let paths = tokio::task::spawn_blocking(move || -> SystemResult<Vec<PathBuf>> {
            let entries =
                glob::glob(&resolved).map_err(|e| SystemError::Pattern(e.to_string()))?;
            let mut paths = Vec::new();
            for entry in entries {
                let path = entry.map_err(glob_error)?;
                paths.push(path);
            }
            Ok(paths)
        })
        .await
        .map_err(join_error)??;

        Ok(paths.iter().map(|p| self.unresolve(p)).collect())
    }

    async fn link(&self, oldpath: &Path, newpath: &Path) -> SystemResult<()> {
        let new = self.resolve(newpath);
        tokio::fs::hard_link(self.resolve(oldpath), &new)
            .await
            .map_err(io_error(&new))
    }

    async fn lstat(&self, name: &Path) -> SystemResult<FileInfo> {
        let path = self.resolve(name);
        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(io_error(&path))?;
        Ok(FileInfo::from_metadata(name, &metadata))
    }

    async fn mkdir(&self, name: &Path, perm: u32) -> SystemResult<()> {
        let path = self.resolve(name);
        let mut builder = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(perm);
        #[cfg(not(unix))]
        let _ = perm;
        builder.create(&path).await.map_err(io_error(&path))
    }

    fn raw_path(&self, path: &Path) -> SystemResult<PathBuf> {
        Ok(self.resolve(path))
    }

    async fn read_dir(&self, name: &Path) -> SystemResult<Vec<DirEntry>> {
        let path = self.resolve(name);
        let mut dir = tokio::fs::read_dir(&path).await.map_err(io_error(&path))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(io_error(&path))? {
            let file_type = entry.file_type().await.map_err(io_error(&entry.path()))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: FileKind::from_file_type(file_type),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, name: &Path) -> SystemResult<Vec<u8>> {
        let path = self.resolve(name);
        tokio::fs::read(&path).await.map_err(io_error(&path))
    }

    async fn readlink(&self, name: &Path) -> SystemResult<PathBuf> {
        let path = self.resolve(name);
        tokio::fs::read_link(&path).await.map_err(io_error(&path))
    }

    async fn remove(&self, name: &Path) -> SystemResult<()> {
        let path = self.resolve(name);
        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(io_error(&path))?;
        let result = if metadata.is_dir() {
            tokio::fs::remove_dir(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        result.map_err(io_error(&path))
    }

    async fn remove_all(&self, name: &Path) -> SystemResult<()> {
        let path = self.resolve(name);
        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SystemError::from_io(&path, e)),
        };
        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other.map_err(io_error(&path)),
        }
    }

    async fn rename(&self, oldpath: &Path, newpath: &Path) -> SystemResult<()> {
        let old = self.resolve(oldpath);
        tokio::fs::rename(&old, self.resolve(newpath))
            .await
            .map_err(io_error(&old))
    }

    async fn run_cmd(&self, cmd: &mut Command) -> SystemResult<()> {
        exec::run(cmd).await
    }

    async fn run_script(
        &self,
        scriptname: &Path,
        dir: &Path,
        data: &[u8],
        options: &RunScriptOptions,
    ) -> SystemResult<()> {
        let script = Self::write_temp_script(scriptname, data).await?;

        let mut cmd = Interpreter::exec_command(options.interpreter.as_ref(), &script);
        if let Some(cwd) = Self::existing_dir(&self.resolve(dir)).await {
            cmd.current_dir(cwd);
        }
        let result = exec::run(&mut cmd).await;

        if let Err(e) = tokio::fs::remove_file(&script).await {
            warn!(path = %script.display(), error = %e, "Failed to remove temporary script");
        } else {
            debug!(path = %script.display(), "Temporary script removed");
        }
        result
    }

    async fn stat(&self, name: &Path) -> SystemResult<FileInfo> {
        let path = self.resolve(name);
        let metadata = tokio::fs::metadata(&path).await.map_err(io_error(&path))?;
        Ok(FileInfo::from_metadata(name, &metadata))
    }

    fn underlying_fs(&self) -> FsHandle {
        self.fs.clone()
    }

    async fn write_file(&self, name: &Path, data: &[u8], perm: u32) -> SystemResult<()> {
        use tokio::io::AsyncWriteExt;

        let path = self.resolve(name);
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(perm);
        #[cfg(not(unix))]
        let _ = perm;

        let mut file = options.open(&path).await.map_err(io_error(&path))?;
        file.write_all(data).await.map_err(io_error(&path))?;
        file.flush().await.map_err(io_error(&path))
    }

    async fn write_symlink(&self, oldname: &str, newname: &Path) -> SystemResult<()> {
        self.remove_all(newname).await?;
        let path = self.resolve(newname);
        #[cfg(unix)]
        {
            tokio::fs::symlink(oldname, &path)
                .await
                .map_err(io_error(&path))
        }
        #[cfg(not(unix))]
        {
            let _ = oldname;
            Err(SystemError::Io(format!(
                "{}: symlinks are not supported on this platform",
                path.display()
            )))
        }
    }
}
