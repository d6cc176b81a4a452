// Command descriptor: loggable view of a process invocation

use super::attr::{Attr, Value};

/// Read-only view of a process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub path: String,
    pub args: Vec<String>,
    pub dir: Option<String>,
    /// Variables explicitly set on the command, as `KEY=value`
    pub env: Vec<String>,
}

impl CommandDescriptor {
    pub fn from_std(cmd: &std::process::Command) -> Self {
        Self {
            path: cmd.get_program().to_string_lossy().into_owned(),
            args: cmd
                .get_args()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            dir: cmd
                .get_current_dir()
                .map(|dir| dir.display().to_string()),
            env: cmd
                .get_envs()
                .filter_map(|(key, value)| {
                    value.map(|v| format!("{}={}", key.to_string_lossy(), v.to_string_lossy()))
                })
                .collect(),
        }
    }

    pub fn from_command(cmd: &tokio::process::Command) -> Self {
        Self::from_std(cmd.as_std())
    }

    /// Group value with only the non-empty fields
    pub fn log_value(&self) -> Value {
        let mut attrs = Vec::new();
        if !self.path.is_empty() {
            attrs.push(Attr::string("path", self.path.as_str()));
        }
        if !self.args.is_empty() {
            attrs.push(Attr::list("args", self.args.iter().cloned()));
        }
        if let Some(dir) = self.dir.as_deref().filter(|d| !d.is_empty()) {
            attrs.push(Attr::string("dir", dir));
        }
        if !self.env.is_empty() {
            attrs.push(Attr::list("env", self.env.iter().cloned()));
        }
        Value::Group(attrs)
    }
}

/// The `cmd` attribute for a tokio command
pub fn command_attr(cmd: &tokio::process::Command) -> Attr {
    Attr::new("cmd", CommandDescriptor::from_command(cmd).log_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_fields() {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(["status", "--short"])
            .current_dir("/src")
            .env("GIT_PAGER", "cat");

        let descriptor = CommandDescriptor::from_command(&cmd);
        assert_eq!(descriptor.path, "git");
        assert_eq!(descriptor.args, vec!["status", "--short"]);
        assert_eq!(descriptor.dir.as_deref(), Some("/src"));
        assert_eq!(descriptor.env, vec!["GIT_PAGER=cat"]);
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let cmd = tokio::process::Command::new("true");
        let Value::Group(attrs) = CommandDescriptor::from_command(&cmd).log_value() else {
            panic!("expected a group");
        };
        let keys: Vec<_> = attrs.iter().map(|a| a.key).collect();
        assert_eq!(keys, vec!["path"]);
    }
}
