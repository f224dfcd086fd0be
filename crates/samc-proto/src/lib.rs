//! Protocol-level building blocks for samc: the window-host event grammar,
//! the path codec used when rendering library paths, path arithmetic, the
//! typed player records and configuration.
//!
//! Nothing in this crate performs I/O apart from reading/writing the config
//! file.

pub mod codec;
pub mod config;
pub mod event;
pub mod path;
pub mod platform;
pub mod player;
