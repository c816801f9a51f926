//! `stcodec` command-line tool.
//!
//! The binary is a thin layer over [`stcodec_io`]; the pieces live here so
//! they can be unit tested.

pub mod commands;
pub mod exit;
pub mod settings;
