//! Testing utilities and mock implementations
//!
//! Lets the session machine, dispatcher and shutdown sequencer run without a
//! broker or real OS actions.

pub mod mocks;

pub use mocks::*;
