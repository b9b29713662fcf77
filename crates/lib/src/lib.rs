//! oftb-bootstrap-lib: bootstrap verification for the oftb toolchain
//!
//! This crate drives the self-hosting bootstrap of oftb and its in-language
//! macro expander:
//! - `process`: runs external commands, capturing or redirecting stdout
//! - `toolchain`: the `compile`/`interpret`/`run` command surface and the native build
//! - `artifact`: `<package>/build/<binary>.ofta` addressing, promotion and comparison
//! - `pipeline`: prelude generation, self-tests and the triple-compile fixpoint check
//! - `package`: the distributable `oftb.tar.gz`

pub mod artifact;
pub mod config;
pub mod consts;
pub mod package;
pub mod pipeline;
pub mod process;
pub mod toolchain;
pub mod util;

pub use config::{BootstrapConfig, ToolchainSource};
pub use pipeline::{BootstrapError, Pipeline, PipelineReport, StageOutcome};
