//! cwasm-lib: compile C source to WASI WebAssembly modules.
//!
//! This crate wraps an external wasi-sdk clang behind a single call:
//! - `WasiCompiler`: stages source, runs the compiler, validates and returns the module
//! - `CompilerConfig`: immutable toolchain paths and flags
//! - `BuildError`: phase-tagged failures separating bad input from infrastructure faults
//! - `sweep`: explicit collection of files left by failed builds

pub mod classify;
pub mod compile;
pub mod config;
pub mod error;
pub mod id;
pub mod sweep;

#[cfg(test)]
pub mod testutil;

pub use compile::WasiCompiler;
pub use config::CompilerConfig;
pub use error::{BuildError, Phase};
