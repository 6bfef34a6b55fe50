//! Command-line shell for the timecaps application.

mod app;
mod main;

pub use app::*;
pub use main::*;
