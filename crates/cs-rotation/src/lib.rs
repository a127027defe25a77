//! Blue-green certificate rotation.
//!
//! A rotation takes the primary host record offline, points traffic at the
//! standby, renews and reloads, pushes the renewed certificate to the CDN,
//! and then puts the primary back. See [`CutoverController`] for the exact
//! sequence and failure policy.

pub mod command;
mod cutover;
pub mod locator;
pub mod state;
pub mod types;

pub use command::{CommandOutput, CommandRunner, ExternalCommand, SystemCommandRunner};
pub use cutover::{CutoverController, Phase, RotationReport, RunOutcome, StepOutcome, StepRecord};
pub use locator::{CertificateFilePair, locate};
pub use state::{RotationState, StateStore, is_eligible};
pub use types::{DEFAULT_MIN_INTERVAL_SECS, RotationConfig, RotationError, RotationResult};
