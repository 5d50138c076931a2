// src/lib.rs — Library root for kimi2api

pub mod api;
pub mod cli;
pub mod core;
pub mod infra;
pub mod upstream;
pub mod util;
