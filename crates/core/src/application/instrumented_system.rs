// InstrumentedSystem: logs every call to an inner System

use crate::domain::{DirEntry, FileInfo, FsHandle, Interpreter, RunScriptOptions};
use crate::error::SystemResult;
use crate::logging::{
    append_exit_error_attrs, command_attr, info_or_error, output, Attr, Level, LogRecord,
};
use crate::port::{Logger, System};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;

/// Decorator that forwards every call to `system` unchanged and emits one
/// record per call to `logger`
///
/// `raw_path` and `underlying_fs` are forwarded without logging.
pub struct InstrumentedSystem {
    system: Arc<dyn System>,
    logger: Arc<dyn Logger>,
}

impl InstrumentedSystem {
    /// # Example
    /// ```ignore
    /// let system = InstrumentedSystem::new(Arc::new(OsSystem::new()), Arc::new(TracingLogger));
    /// ```
    pub fn new(system: Arc<dyn System>, logger: Arc<dyn Logger>) -> Self {
        Self { system, logger }
    }

    fn log(&self, record: LogRecord) {
        self.logger.log(record);
    }
}

#[async_trait]
impl System for InstrumentedSystem {
    async fn chtimes(
        &self,
        name: &Path,
        atime: DateTime<Utc>,
        mtime: DateTime<Utc>,
    ) -> SystemResult<()> {
        let result = self.system.chtimes(name, atime, mtime).await;
        info_or_error(
            self.logger.as_ref(),
            "Chtimes",
            result.as_ref().err(),
            vec![
                Attr::path("name", name),
                Attr::time("atime", atime),
                Attr::time("mtime", mtime),
            ],
        );
        result
    }

    async fn chmod(&self, name: &Path, mode: u32) -> SystemResult<()> {
        let result = self.system.chmod(name, mode).await;
        info_or_error(
            self.logger.as_ref(),
            "Chmod",
            result.as_ref().err(),
            vec![Attr::path("name", name), Attr::int("mode", mode)],
        );
        result
    }

    async fn glob(&self, pattern: &str) -> SystemResult<Vec<String>> {
        let result = self.system.glob(pattern).await;
        let matches = result.as_deref().unwrap_or_default();
        info_or_error(
            self.logger.as_ref(),
            "Glob",
            result.as_ref().err(),
            vec![
                Attr::string("name", pattern),
                Attr::list("matches", matches.iter().cloned()),
            ],
        );
        result
    }

    async fn link(&self, oldpath: &Path, newpath: &Path) -> SystemResult<()> {
        let result = self.system.link(oldpath, newpath).await;
        info_or_error(
            self.logger.as_ref(),
            "Link",
            result.as_ref().err(),
            vec![Attr::path("oldpath", oldpath), Attr::path("newpath", newpath)],
        );
        result
    }

    async fn lstat(&self, name: &Path) -> SystemResult<FileInfo> {
        let result = self.system.lstat(name).await;
        info_or_error(
            self.logger.as_ref(),
            "Lstat",
            result.as_ref().err(),
            vec![Attr::path("name", name)],
        );
        result
    }

    async fn mkdir(&self, name: &Path, perm: u32) -> SystemResult<()> {
        let result = self.system.mkdir(name, perm).await;
        info_or_error(
            self.logger.as_ref(),
            "Mkdir",
            result.as_ref().err(),
            vec![Attr::path("name", name), Attr::int("perm", perm)],
        );
        result
    }

    fn raw_path(&self, path: &Path) -> SystemResult<PathBuf> {
        self.system.raw_path(path)
    }

    async fn read_dir(&self, name: &Path) -> SystemResult<Vec<DirEntry>> {
        let result = self.system.read_dir(name).await;
        info_or_error(
            self.logger.as_ref(),
            "ReadDir",
            result.as_ref().err(),
            vec![Attr::path("name", name)],
        );
        result
    }

    async fn read_file(&self, name: &Path) -> SystemResult<Vec<u8>> {
        let result = self.system.read_file(name).await;
        match &result {
            Ok(data) => self.log(LogRecord::info(
                "ReadFile",
                vec![
                    Attr::bytes("data", output(data, result.as_ref().err())),
                    Attr::size("size", data.len()),
                ],
            )),
            Err(err) => self.log(LogRecord::error("ReadFile", vec![Attr::error(err)])),
        }
        result
    }

    async fn readlink(&self, name: &Path) -> SystemResult<PathBuf> {
        let result = self.system.readlink(name).await;
        match &result {
            Ok(linkname) => self.log(LogRecord::info(
                "Readlink",
                vec![Attr::path("linkname", linkname)],
            )),
            Err(err) => self.log(LogRecord::error("Readlink", vec![Attr::error(err)])),
        }
        result
    }

    async fn remove(&self, name: &Path) -> SystemResult<()> {
        let result = self.system.remove(name).await;
        info_or_error(
            self.logger.as_ref(),
            "Remove",
            result.as_ref().err(),
            vec![Attr::path("name", name)],
        );
        result
    }

    async fn remove_all(&self, name: &Path) -> SystemResult<()> {
        let result = self.system.remove_all(name).await;
        info_or_error(
            self.logger.as_ref(),
            "RemoveAll",
            result.as_ref().err(),
            vec![Attr::path("name", name)],
        );
        result
    }

    async fn rename(&self, oldpath: &Path, newpath: &Path) -> SystemResult<()> {
        let result = self.system.rename(oldpath, newpath).await;
        info_or_error(
            self.logger.as_ref(),
            "Rename",
            result.as_ref().err(),
            vec![Attr::path("oldpath", oldpath), Attr::path("newpath", newpath)],
        );
        result
    }

    async fn run_cmd(&self, cmd: &mut Command) -> SystemResult<()> {
        let start = Instant::now();
        let result = self.system.run_cmd(cmd).await;
        let mut attrs = vec![
            command_attr(cmd),
            Attr::duration("duration", start.elapsed()),
        ];
        append_exit_error_attrs(&mut attrs, result.as_ref().err());
        self.log(LogRecord::new(Level::of(&result), "RunCmd", attrs));
        result
    }

    async fn run_script(
        &self,
        scriptname: &Path,
        dir: &Path,
        data: &[u8],
        options: &RunScriptOptions,
    ) -> SystemResult<()> {
        let start = Instant::now();
        let result = self.system.run_script(scriptname, dir, data, options).await;
        let mut attrs = vec![
            Attr::path("scriptname", scriptname),
            Attr::path("dir", dir),
            Attr::bytes("data", output(data, result.as_ref().err())),
            Attr::new(
                "interpreter",
                Interpreter::log_value(options.interpreter.as_ref()),
            ),
            Attr::string("condition", options.condition.as_str()),
            Attr::duration("duration", start.elapsed()),
        ];
        append_exit_error_attrs(&mut attrs, result.as_ref().err());
        self.log(LogRecord::new(Level::of(&result), "RunScript", attrs));
        result
    }

    async fn stat(&self, name: &Path) -> SystemResult<FileInfo> {
        let result = self.system.stat(name).await;
        info_or_error(
            self.logger.as_ref(),
            "Stat",
            result.as_ref().err(),
            vec![Attr::path("name", name)],
        );
        result
    }

    fn underlying_fs(&self) -> FsHandle {
        self.system.underlying_fs()
    }

    async fn write_file(&self, name: &Path, data: &[u8], perm: u32) -> SystemResult<()> {
        let result = self.system.write_file(name, data, perm).await;
        info_or_error(
            self.logger.as_ref(),
            "WriteFile",
            result.as_ref().err(),
            vec![
                Attr::path("name", name),
                Attr::bytes("data", output(data, result.as_ref().err())),
                Attr::int("perm", perm),
                Attr::size("size", data.len()),
            ],
        );
        result
    }

    async fn write_symlink(&self, oldname: &str, newname: &Path) -> SystemResult<()> {
        let result = self.system.write_symlink(oldname, newname).await;
        info_or_error(
            self.logger.as_ref(),
            "WriteSymlink",
            result.as_ref().err(),
            vec![Attr::string("oldname", oldname), Attr::path("newname", newname)],
        );
        result
    }
}
