//! Client lifecycle: `Uninitialized -> Initialized -> Closed`, no way back.
//!
//! `init` and `register` run as ordered pipelines of named steps. Every step
//! yields a [`StepOutcome`]; only `Fatal` aborts the pipeline. `close` runs
//! two independent releases and reports both in a [`TeardownReport`].

use std::fmt;
use tracing::{debug, info, warn};
use txcert_core::{TxCertError, TxCertResult};

use crate::error::{ClientError, ClientResult, LifecycleStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "uninitialized"),
            LifecycleState::Initialized => write!(f, "initialized"),
            LifecycleState::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// The step had already been performed earlier; not an error.
    AlreadyDone,
    Fatal(TxCertError),
}

impl StepOutcome {
    /// Classify a collaborator result. Only the keystore reporting that it is
    /// already initialized counts as benign.
    pub fn classify(step: LifecycleStep, result: TxCertResult<()>) -> Self {
        match result {
            Ok(()) => StepOutcome::Done,
            Err(TxCertError::KeyStoreAlreadyInitialized) if step == LifecycleStep::KeyStoreInit => {
                StepOutcome::AlreadyDone
            }
            Err(e) => StepOutcome::Fatal(e),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StepOutcome::Fatal(_))
    }

    /// Log the outcome and turn `Fatal` into a lifecycle error.
    pub fn into_result(self, step: LifecycleStep) -> ClientResult<()> {
        match self {
            StepOutcome::Done => {
                debug!(%step, "step done");
                Ok(())
            }
            StepOutcome::AlreadyDone => {
                info!(%step, "step already performed, continuing");
                Ok(())
            }
            StepOutcome::Fatal(source) => {
                warn!(%step, error = %source, "step failed");
                Err(ClientError::Lifecycle { step, source })
            }
        }
    }
}

/// Run one step of a pipeline end to end.
pub(crate) fn run_step(
    step: LifecycleStep,
    action: impl FnOnce() -> TxCertResult<()>,
) -> ClientResult<()> {
    debug!(%step, "running step");
    StepOutcome::classify(step, action()).into_result(step)
}

/// Result of releasing one subsystem during `close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownStep {
    /// Nothing to release (e.g. the pool was never created).
    Skipped,
    Released,
    Failed(String),
}

impl TeardownStep {
    pub(crate) fn attempt(subsystem: &str, release: impl FnOnce() -> TxCertResult<()>) -> Self {
        match release() {
            Ok(()) => {
                debug!(subsystem, "released");
                TeardownStep::Released
            }
            Err(e) => {
                warn!(subsystem, error = %e, "failed releasing");
                TeardownStep::Failed(e.to_string())
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TeardownStep::Failed(_))
    }
}

/// What `close` did with each subsystem. Both steps are always attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub pool: TeardownStep,
    pub node: TeardownStep,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        !self.pool.is_failure() && !self.node.is_failure()
    }

    pub fn failures(&self) -> Vec<String> {
        [("pool", &self.pool), ("node", &self.node)]
            .into_iter()
            .filter_map(|(name, step)| match step {
                TeardownStep::Failed(msg) => Some(format!("{}: {}", name, msg)),
                _ => None,
            })
            .collect()
    }
}
