//! Events published to the presentation boundary.
//!
//! The core only *sends* these; nothing here depends on what a consumer does
//! with them. Both streams ride bounded broadcast channels so a slow consumer
//! can never stall capture or execution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runner::RunStatus;
use crate::step::{RecordedStep, StepWarning};

/// Events emitted by a recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecorderEvent {
    /// A step was appended to the session buffer
    Step(RecordedStep),
    /// A warning was attached to an existing step
    Warning {
        /// Order of the affected step
        order: usize,
        /// The warning
        warning: StepWarning,
    },
    /// The subscriber fell behind and the oldest unread events were dropped
    Overflow {
        /// Number of dropped events
        missed: u64,
    },
    /// The session was stopped and the buffer frozen
    Stopped {
        /// Session id
        session_id: Uuid,
        /// Final number of steps
        steps: usize,
    },
}

/// Which output stream a runner line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    /// Child process stdout
    Stdout,
    /// Child process stderr
    Stderr,
}

/// Events emitted by the execution orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEvent {
    /// Run transitioned to running
    Started {
        /// Run id
        run_id: Uuid,
        /// Test being executed
        test_name: String,
    },
    /// One line of child output, in order
    Output {
        /// Source stream
        stream: OutputStream,
        /// Line content without trailing newline
        line: String,
    },
    /// Run reached a terminal status
    Finished {
        /// Run id
        run_id: Uuid,
        /// Terminal status
        status: RunStatus,
    },
}
