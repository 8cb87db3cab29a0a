//! Inline script step execution.
//!
//! The pipeline for one step is: [`spec`] parses the `script` parameter,
//! [`materialize`] writes it to disk, [`environment`] assembles the child
//! environment, and [`supervisor`] spawns and watches the interpreter,
//! pushing output through a [`sink::LineSink`].

pub mod environment;
pub mod materialize;
pub mod sink;
pub mod spec;
pub mod supervisor;
