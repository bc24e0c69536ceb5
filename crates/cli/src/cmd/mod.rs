mod build;
mod gc;
mod info;

pub use build::cmd_build;
pub use gc::cmd_gc;
pub use info::cmd_info;
