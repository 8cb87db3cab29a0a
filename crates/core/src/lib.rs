//! `scriptstep-core` -- execution engine for inline script pipeline steps.
//!
//! Pure domain types ([`parameter`], [`outcome`], [`error`]) plus the
//! [`scripting`] engine. No configuration loading or logging setup happens
//! here; the worker binary owns those.

pub mod error;
pub mod outcome;
pub mod parameter;
pub mod scripting;

pub use error::ScriptError;
pub use outcome::{Outcome, Status};
pub use scripting::supervisor::{ScriptAction, StepRequest};
