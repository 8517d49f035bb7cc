//! Strata - depth-layered clock wallpapers.
//!
//! A photo is split into depth layers once; afterwards the clock is redrawn
//! between two of those layers on every update, so it appears to sit behind
//! foreground objects.
//!
//! The [`wallpaper`] module holds the engine and can be used on its own;
//! [`cli`] and [`config`] make up the `strata` binary.

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod platform;
pub mod wallpaper;
