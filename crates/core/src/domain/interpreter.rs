// Script interpreter resolution

use crate::logging::{Attr, Value};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use tokio::process::Command;

/// External program used to run a script instead of executing it directly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreter {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Interpreter {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// True if `interpreter` represents no interpreter (absent or empty command)
    pub fn is_none(interpreter: Option<&Interpreter>) -> bool {
        interpreter.map_or(true, |i| i.command.is_empty())
    }

    /// Builds the command that runs the script `name`
    ///
    /// Without an interpreter the script is executed directly; otherwise the
    /// interpreter command is run with its args followed by `name`. The
    /// command and args are not validated here.
    pub fn exec_command(interpreter: Option<&Interpreter>, name: impl AsRef<OsStr>) -> Command {
        match interpreter {
            Some(i) if !Self::is_none(interpreter) => {
                let mut cmd = Command::new(&i.command);
                cmd.args(&i.args).arg(name);
                cmd
            }
            _ => Command::new(name),
        }
    }

    /// Group value with the non-empty fields
    pub fn log_value(interpreter: Option<&Interpreter>) -> Value {
        let mut attrs = Vec::new();
        if let Some(i) = interpreter {
            if !i.command.is_empty() {
                attrs.push(Attr::string("command", i.command.as_str()));
            }
            if !i.args.is_empty() {
                attrs.push(Attr::list("args", i.args.iter().cloned()));
            }
        }
        Value::Group(attrs)
    }
}
