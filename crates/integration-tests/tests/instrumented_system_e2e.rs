//! InstrumentedSystem over a real OsSystem
//!
//! Every call hits the local filesystem or spawns a real process; the
//! records are collected by a MemoryLogger.

use std::path::Path;
use std::sync::Arc;

use sysdebug_core::domain::{Interpreter, RunScriptOptions, ScriptCondition};
use sysdebug_core::error::SystemError;
use sysdebug_core::logging::{Level, Value};
use sysdebug_core::port::logger::mocks::MemoryLogger;
use sysdebug_core::port::System;
use sysdebug_core::InstrumentedSystem;
use sysdebug_infra_system::OsSystem;
use tempfile::TempDir;
use tokio::process::Command;

fn setup() -> (TempDir, Arc<MemoryLogger>, InstrumentedSystem) {
    let dir = tempfile::tempdir().unwrap();
    let logger = Arc::new(MemoryLogger::new());
    let system = InstrumentedSystem::new(
        Arc::new(OsSystem::with_root(dir.path())),
        logger.clone(),
    );
    (dir, logger, system)
}

/// WriteFile of 100 bytes logs a 67-byte sample, perm 420 and size 100
#[tokio::test]
async fn test_write_file_record() {
    let (dir, logger, system) = setup();
    let data = vec![b'x'; 100];

    system
        .write_file(Path::new("/x"), &data, 0o644)
        .await
        .unwrap();

    assert_eq!(std::fs::read(dir.path().join("x")).unwrap(), data);
    let records = logger.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.level, Level::Info);
    assert_eq!(record.message, "WriteFile");
    assert_eq!(record.get("name"), Some(&Value::Str("/x".to_string())));
    let mut sample = vec![b'x'; 64];
    sample.extend_from_slice(b"...");
    assert_eq!(record.get("data"), Some(&Value::Bytes(sample)));
    assert_eq!(record.get("perm"), Some(&Value::Int(420)));
    assert_eq!(record.get("size"), Some(&Value::Int(100)));

    println!("✅ WriteFile logged with truncated sample");
}

/// ReadFile of a missing file: one error record with only `err`
#[tokio::test]
async fn test_read_missing_file_record() {
    let (_dir, logger, system) = setup();

    let err = system.read_file(Path::new("/missing")).await.unwrap_err();
    assert!(err.is_not_found());

    let records = logger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, Level::Error);
    assert_eq!(records[0].message, "ReadFile");
    assert_eq!(records[0].keys(), vec!["err"]);
    assert_eq!(
        records[0].get("err"),
        Some(&Value::Str(err.to_string()))
    );
}

/// Filesystem round trip: every mutating call is logged once, in order
#[tokio::test]
async fn test_filesystem_sequence() {
    let (_dir, logger, system) = setup();

    system.mkdir(Path::new("/d"), 0o755).await.unwrap();
    system
        .write_file(Path::new("/d/a.txt"), b"hello", 0o600)
        .await
        .unwrap();
    system
        .rename(Path::new("/d/a.txt"), Path::new("/d/b.txt"))
        .await
        .unwrap();
    let matches = system.glob("/d/*.txt").await.unwrap();
    assert_eq!(matches, vec!["/d/b.txt"]);
    system.remove_all(Path::new("/d")).await.unwrap();

    let messages: Vec<_> = logger.records().iter().map(|r| r.message).collect();
    assert_eq!(messages, vec!["Mkdir", "WriteFile", "Rename", "Glob", "RemoveAll"]);
    assert!(logger.records().iter().all(|r| r.level == Level::Info));
}

/// Process exiting with code 2: exitCode attribute, no pid
#[tokio::test]
async fn test_run_cmd_exit_code() {
    let (_dir, logger, system) = setup();
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "exit 2"]);

    let err = system.run_cmd(&mut cmd).await.unwrap_err();
    assert!(matches!(err, SystemError::ProcessExit(_)));

    let record = logger.last().unwrap();
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.message, "RunCmd");
    assert_eq!(record.get("exitCode"), Some(&Value::Int(2)));
    assert_eq!(record.get("pid"), None);
    assert_eq!(&record.keys()[..3], &["cmd", "duration", "exitCode"]);
}

/// Process killed by a signal: pid attribute, no exitCode
#[cfg(unix)]
#[tokio::test]
async fn test_run_cmd_killed_by_signal() {
    let (_dir, logger, system) = setup();
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "kill -9 $$"]);

    let err = system.run_cmd(&mut cmd).await.unwrap_err();
    let SystemError::ProcessExit(exit) = &err else {
        panic!("expected process exit, got {:?}", err);
    };
    let pid = exit.state.as_ref().unwrap().pid;

    let record = logger.last().unwrap();
    assert_eq!(record.get("exitCode"), None);
    assert_eq!(record.get("pid"), Some(&Value::Int(i64::from(pid))));
}

/// Script run through `sh -e`, in a subdirectory of the root
#[cfg(unix)]
#[tokio::test]
async fn test_run_script_with_interpreter() {
    let (dir, logger, system) = setup();
    std::fs::create_dir(dir.path().join("home")).unwrap();
    let options = RunScriptOptions {
        interpreter: Some(Interpreter::new("sh", vec!["-e".to_string()])),
        condition: ScriptCondition::Once,
    };

    system
        .run_script(
            Path::new("run_once_setup.sh"),
            Path::new("/home"),
            b"echo done > done.txt\n",
            &options,
        )
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("home/done.txt")).unwrap(),
        "done\n"
    );
    let record = logger.last().unwrap();
    assert_eq!(record.level, Level::Info);
    assert_eq!(record.message, "RunScript");
    assert_eq!(record.get("condition"), Some(&Value::Str("once".to_string())));
    assert_eq!(
        record.get("interpreter").map(|v| v.to_string()),
        Some(r#"{command="sh" args=["-e"]}"#.to_string())
    );
}

/// Decorators are shared across tasks; one record per call
#[tokio::test]
async fn test_concurrent_calls() {
    let (_dir, logger, system) = setup();
    let system = Arc::new(system);

    let mut handles = Vec::new();
    for i in 0..20 {
        let system = system.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("/f{}", i);
            system
                .write_file(Path::new(&name), b"data", 0o644)
                .await
                .unwrap();
            system.read_file(Path::new(&name)).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), b"data");
    }

    assert_eq!(logger.len(), 40);
    println!("✅ 20 concurrent writers logged 40 records");
}
