//! Terminal reporting for cwasm commands: status lines, labelled fields and JSON.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Module and residue sizes, in binary units.
pub fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];

  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = UNITS[0];
  for next in &UNITS[1..] {
    if value < 1024.0 {
      break;
    }
    value /= 1024.0;
    unit = *next;
  }
  format!("{:.1} {}", value, unit)
}

/// Compile times: milliseconds below a second, otherwise seconds with two decimals.
pub fn human_elapsed(elapsed: Duration) -> String {
  if elapsed < Duration::from_secs(1) {
    format!("{}ms", elapsed.as_millis())
  } else {
    format!("{:.2}s", elapsed.as_secs_f64())
  }
}

pub fn report_done(message: &str) {
  println!("{} {}", "✓".if_supports_color(Stream::Stdout, |s| s.green()), message);
}

pub fn report_note(message: &str) {
  println!("{} {}", "•".if_supports_color(Stream::Stdout, |s| s.blue()), message);
}

/// Rejected-source headline on stderr; the compiler diagnostics follow it verbatim.
pub fn report_rejected(message: &str) {
  eprintln!(
    "{} {}",
    "✗".if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn field(label: &str, value: impl std::fmt::Display) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn emit_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
