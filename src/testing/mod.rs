//! Testing utilities for virtcap
//!
//! Synthetic QEMU-style screenshots plus scriptable screenshot sources and
//! encoders, so the whole capture pipeline runs without a hypervisor.

pub mod fakes;
pub mod synthetic_data;

pub use fakes::{LookaheadEncoder, ScriptedSource, SourceStep, Submission};
pub use synthetic_data::{ppm_header, solid_ppm_frame, synthetic_ppm_frame};
