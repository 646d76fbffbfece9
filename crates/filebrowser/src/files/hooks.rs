//! Observers around mutating operations.
//!
//! Hooks are owned by the [`FileManager`](super::FileManager) and run in
//! registration order. A `before` failure vetoes the operation; `after`
//! failures are logged and otherwise ignored.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use super::error::FilesError;

/// A mutating operation and its parameters.
///
/// Directories are relative to the root; names are the sanitized names that
/// will be (or were) written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateDir {
        dir: String,
        name: String,
    },
    Upload {
        dir: String,
        name: String,
        size: u64,
    },
    Delete {
        dir: String,
        name: String,
        is_directory: bool,
    },
    Rename {
        dir: String,
        from: String,
        to: String,
    },
}

impl Operation {
    /// Short operation name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateDir { .. } => "create_dir",
            Operation::Upload { .. } => "upload",
            Operation::Delete { .. } => "delete",
            Operation::Rename { .. } => "rename",
        }
    }

    /// Directory the operation happens in.
    pub fn dir(&self) -> &str {
        match self {
            Operation::CreateDir { dir, .. }
            | Operation::Upload { dir, .. }
            | Operation::Delete { dir, .. }
            | Operation::Rename { dir, .. } => dir,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.dir().is_empty() { "/" } else { self.dir() };
        match self {
            Operation::CreateDir { name, .. } => write!(f, "create folder {} in {}", name, dir),
            Operation::Upload { name, size, .. } => {
                write!(f, "upload {} ({} bytes) to {}", name, size, dir)
            }
            Operation::Delete { name, .. } => write!(f, "delete {} in {}", name, dir),
            Operation::Rename { from, to, .. } => write!(f, "rename {} to {} in {}", from, to, dir),
        }
    }
}

/// Errors reported by hooks.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook refuses the operation.
    #[error("{0}")]
    Rejected(String),

    /// The hook itself failed.
    #[error("hook failed: {0}")]
    Failed(String),
}

/// Observer of mutating operations.
pub trait OperationHook: Send + Sync {
    /// Name used in logs and veto errors.
    fn name(&self) -> &str;

    /// Runs after validation, before the storage call. An error aborts the
    /// operation.
    fn before(&self, _operation: &Operation) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after a successful storage call.
    fn after(&self, _operation: &Operation) -> Result<(), HookError> {
        Ok(())
    }
}

/// Records every completed operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook;

impl OperationHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn after(&self, operation: &Operation) -> Result<(), HookError> {
        info!(operation = operation.kind(), dir = %operation.dir(), "{}", operation);
        Ok(())
    }
}

/// Ordered hook list.
#[derive(Default)]
pub struct HookList {
    hooks: Vec<Box<dyn OperationHook>>,
}

impl fmt::Debug for HookList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

impl HookList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Box<dyn OperationHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every `before` hook; the first error becomes
    /// [`FilesError::Vetoed`].
    pub fn run_before(&self, operation: &Operation) -> Result<(), FilesError> {
        for hook in &self.hooks {
            if let Err(e) = hook.before(operation) {
                warn!(
                    hook = hook.name(),
                    operation = operation.kind(),
                    error = %e,
                    "Operation vetoed"
                );
                return Err(FilesError::Vetoed {
                    hook: hook.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run every `after` hook, logging failures.
    pub fn run_after(&self, operation: &Operation) {
        for hook in &self.hooks {
            if let Err(e) = hook.after(operation) {
                warn!(
                    hook = hook.name(),
                    operation = operation.kind(),
                    error = %e,
                    "Post-operation hook failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl OperationHook for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn before(&self, operation: &Operation) -> Result<(), HookError> {
            self.seen.lock().unwrap().push(format!("before {}", operation.kind()));
            Ok(())
        }

        fn after(&self, operation: &Operation) -> Result<(), HookError> {
            self.seen.lock().unwrap().push(format!("after {}", operation.kind()));
            Err(HookError::Failed("ignored".to_string()))
        }
    }

    struct NoUploads;

    impl OperationHook for NoUploads {
        fn name(&self) -> &str {
            "no-uploads"
        }

        fn before(&self, operation: &Operation) -> Result<(), HookError> {
            match operation {
                Operation::Upload { .. } => {
                    Err(HookError::Rejected("uploads are closed".to_string()))
                }
                _ => Ok(()),
            }
        }
    }

    fn upload() -> Operation {
        Operation::Upload {
            dir: "docs".to_string(),
            name: "a.pdf".to_string(),
            size: 3,
        }
    }

    #[test]
    fn test_veto_stops_later_hooks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookList::new();
        hooks.push(Box::new(NoUploads));
        hooks.push(Box::new(Recorder { seen: seen.clone() }));

        let err = hooks.run_before(&upload()).unwrap_err();
        match err {
            FilesError::Vetoed { hook, reason } => {
                assert_eq!(hook, "no-uploads");
                assert_eq!(reason, "uploads are closed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_after_failures_are_ignored() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookList::new();
        hooks.push(Box::new(Recorder { seen: seen.clone() }));
        hooks.push(Box::new(LoggingHook));

        let op = Operation::Delete {
            dir: String::new(),
            name: "old.txt".to_string(),
            is_directory: false,
        };
        hooks.run_before(&op).unwrap();
        hooks.run_after(&op);

        assert_eq!(*seen.lock().unwrap(), vec!["before delete", "after delete"]);
        assert_eq!(hooks.len(), 2);
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(upload().to_string(), "upload a.pdf (3 bytes) to docs");
        let op = Operation::Rename {
            dir: String::new(),
            from: "a.txt".to_string(),
            to: "b.txt".to_string(),
        };
        assert_eq!(op.to_string(), "rename a.txt to b.txt in /");
    }
}
