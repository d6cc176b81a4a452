// Filesystem and script value types shared by System implementations

use super::interpreter::Interpreter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl FileKind {
    pub fn from_file_type(file_type: std::fs::FileType) -> Self {
        if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Dir
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileKind::File => "file",
            FileKind::Dir => "dir",
            FileKind::Symlink => "symlink",
            FileKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Result of stat / lstat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// Permission bits (0 where the platform has none)
    pub mode: u32,
    pub kind: FileKind,
    pub modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            size: metadata.len(),
            mode: permission_bits(metadata),
            kind: FileKind::from_file_type(metadata.file_type()),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}

/// One entry of read_dir
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// Describes the filesystem a System operates on
///
/// Every path handed to the System is resolved below `root`. Resolution is
/// lexical: `..` never climbs above `root`, symlinks are not inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsHandle {
    pub root: PathBuf,
}

impl FsHandle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The host root filesystem
    pub fn host() -> Self {
        Self::new("/")
    }

    /// Path of `path` on the host
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if self.root == Path::new("/") {
            return path.to_path_buf();
        }
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::ParentDir => {
                    relative.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        self.root.join(relative)
    }
}

impl Default for FsHandle {
    fn default() -> Self {
        Self::host()
    }
}

/// When a script is run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptCondition {
    #[default]
    None,
    Always,
    Once,
    OnChange,
}

impl ScriptCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptCondition::None => "",
            ScriptCondition::Always => "always",
            ScriptCondition::Once => "once",
            ScriptCondition::OnChange => "onchange",
        }
    }
}

impl fmt::Display for ScriptCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for System::run_script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunScriptOptions {
    pub interpreter: Option<Interpreter>,
    pub condition: ScriptCondition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_against_root() {
        assert_eq!(
            FsHandle::host().resolve(Path::new("/etc/hosts")),
            PathBuf::from("/etc/hosts")
        );
        let sandbox = FsHandle::new("/tmp/sandbox");
        assert_eq!(
            sandbox.resolve(Path::new("/etc/hosts")),
            PathBuf::from("/tmp/sandbox/etc/hosts")
        );
        assert_eq!(
            sandbox.resolve(Path::new("rel/file")),
            PathBuf::from("/tmp/sandbox/rel/file")
        );
    }

    #[test]
    fn test_resolve_parent_components() {
        let sandbox = FsHandle::new("/tmp/sandbox");
        assert_eq!(
            sandbox.resolve(Path::new("/../x")),
            PathBuf::from("/tmp/sandbox/x")
        );
        assert_eq!(
            sandbox.resolve(Path::new("/a/./b/../../../../etc/passwd")),
            PathBuf::from("/tmp/sandbox/etc/passwd")
        );
        assert_eq!(sandbox.resolve(Path::new("/")), PathBuf::from("/tmp/sandbox"));
    }

    #[test]
    fn test_condition_strings() {
        assert_eq!(ScriptCondition::default().as_str(), "");
        assert_eq!(ScriptCondition::OnChange.to_string(), "onchange");
    }
}
