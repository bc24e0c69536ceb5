//! Build identifier generation.

use uuid::Uuid;

/// Produces a fresh naming key for each build.
///
/// Two calls must never return the same value while either build is still
/// outstanding; the staged file names are derived from it.
pub trait IdGenerator: Send + Sync {
  fn next_id(&self) -> String;
}

/// Random v4 UUIDs with `-` replaced by `_`, e.g. `0f8e..._4c1a_...`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
  fn next_id(&self) -> String {
    Uuid::new_v4().to_string().replace('-', "_")
  }
}

/// Whether `stem` has the shape produced by [`UuidGenerator`].
pub fn is_generated_id(stem: &str) -> bool {
  const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

  let parts: Vec<&str> = stem.split('_').collect();
  parts.len() == GROUPS.len()
    && parts
      .iter()
      .zip(GROUPS)
      .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}
