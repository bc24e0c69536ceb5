//! Artifact format classification.
//!
//! A misconfigured toolchain can exit cleanly and still emit a native object.
//! The classifier is the last check before the artifact is handed back.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// WebAssembly binary preamble: `\0asm` magic followed by version 1 (little-endian).
pub const WASM_PREAMBLE: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

/// Decides whether a produced file is a WebAssembly module.
pub trait ArtifactClassifier: Send + Sync {
  fn is_wasm(&self, path: &Path) -> bool;
}

/// Checks the file's leading bytes against [`WASM_PREAMBLE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WasmMagicClassifier;

impl ArtifactClassifier for WasmMagicClassifier {
  fn is_wasm(&self, path: &Path) -> bool {
    let mut header = [0u8; WASM_PREAMBLE.len()];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
      Ok(()) => is_wasm_bytes(&header),
      Err(_) => false,
    }
  }
}

/// Whether `bytes` starts with the WebAssembly preamble.
pub fn is_wasm_bytes(bytes: &[u8]) -> bool {
  bytes.starts_with(&WASM_PREAMBLE)
}
