//! Grabar: recorded browser sessions into maintainable Rust tests
//!
//! Grabar (Spanish: "to record") turns interactive sessions against
//! enterprise web applications into executable, parameterized test code.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────────┐
//! │ Recorded │──►│ Locator   │──►│ Generated │──►│ Execution    │
//! │ Session  │   │ Library   │   │ test and  │   │ Orchestrator │
//! │ (steps)  │   │ (cleanup) │   │ data file │   │ (+ feedback) │
//! └──────────┘   └───────────┘   └───────────┘   └──────────────┘
//! ```
//!
//! Recording classifies pages and extracts resilient locators, the locator
//! library keeps generated code aligned with vetted locators, the generator
//! emits deterministic source, and the orchestrator runs it and feeds
//! failures back into the library.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Code generation from recorded steps
pub mod codegen;
/// DOM snapshot arena
pub mod dom;
/// Recorder and runner event surfaces
pub mod events;
/// Tiered locator extraction
pub mod extract;
/// Locator library and maintenance
pub mod library;
/// Locator model and stable keys
pub mod locator;
/// Page classification
pub mod page;
/// Parameterization of generated source
pub mod params;
/// Recording session engine
pub mod recorder;
/// Result and error types
pub mod result;
/// Execution orchestrator
pub mod runner;
/// Runtime surface for generated tests
pub mod runtime;
/// Recorded step model
pub mod step;

pub use codegen::{CodeGenerator, GeneratedTest};
pub use dom::{DomNode, DomSnapshot, NodeId};
pub use events::{OutputStream, RecorderEvent, RunEvent};
pub use extract::{ExtractorConfig, LocatorExtractor};
pub use library::{
    CleanupReport, HealthStatus, LocatorLibrary, LocatorLibraryEntry, MaintenanceService,
};
pub use locator::{LocatorDefinition, LocatorMetadata, Strategy};
pub use page::{PageIdentity, PageSignature, PageType, SignatureRegistry};
pub use params::{
    apply_parameterization, confirm_candidates, detect_candidates, render_data_file,
    ParamCandidate, ParamMap,
};
pub use recorder::{CaptureEvent, CaptureKind, RecordingEngine, SessionState, StepSubscriber};
pub use result::{GrabarError, GrabarResult};
pub use runner::remote::{RemoteBrowser, RemoteCredentials, RemoteTarget};
pub use runner::{
    ExecutionMode, ExecutionOrchestrator, RunRecord, RunSource, RunStatus, RunStore,
    RunnerConfig,
};
pub use runtime::{BrowserDriver, Row, Session, SimulatedDriver};
pub use step::{Action, AssertionKind, RecordedStep, StepWarning};
