//! Fault Injection
//!
//! Lets tests make a chosen store operation fail so every rollback branch
//! of the lifecycle manager can be exercised.

use crate::domain::ports::RecordKind;
use crate::error::{Error, Result};
use parking_lot::Mutex;

/// Store operation that a fault can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Begin,
    Create,
    Save,
    Delete,
    Commit,
    Rollback,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOp::Begin => write!(f, "begin"),
            StoreOp::Create => write!(f, "create"),
            StoreOp::Save => write!(f, "save"),
            StoreOp::Delete => write!(f, "delete"),
            StoreOp::Commit => write!(f, "commit"),
            StoreOp::Rollback => write!(f, "rollback"),
        }
    }
}

/// One-shot failure rule
#[derive(Debug, Clone)]
struct FaultRule {
    op: StoreOp,
    /// `None` matches any record kind
    kind: Option<RecordKind>,
    /// Matching calls to let through before failing
    skip: usize,
}

/// Pending failures, consumed as they fire
#[derive(Debug, Default)]
pub struct FaultPlan {
    rules: Mutex<Vec<FaultRule>>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next matching operation
    pub fn fail_next(&self, op: StoreOp, kind: Option<RecordKind>) {
        self.fail_after(op, kind, 0);
    }

    /// Let `skip` matching operations succeed, then fail the next one
    pub fn fail_after(&self, op: StoreOp, kind: Option<RecordKind>, skip: usize) {
        self.rules.lock().push(FaultRule { op, kind, skip });
    }

    pub fn pending(&self) -> usize {
        self.rules.lock().len()
    }

    /// Check an operation against the plan, firing at most one rule
    pub fn check(&self, op: StoreOp, kind: Option<RecordKind>) -> Result<()> {
        let mut rules = self.rules.lock();
        let matched = rules
            .iter()
            .position(|r| r.op == op && (r.kind.is_none() || r.kind == kind));

        let Some(idx) = matched else {
            return Ok(());
        };

        if rules[idx].skip > 0 {
            rules[idx].skip -= 1;
            return Ok(());
        }

        rules.remove(idx);
        Err(Error::Store(match kind {
            Some(kind) => format!("injected fault on {} {}", op, kind),
            None => format!("injected fault on {}", op),
        }))
    }
}
