//! Cross-platform helpers: path expansion, executable lookup and named
//! worker threads.

pub mod command;
pub mod path;
pub mod thread;
