pub mod app;
pub mod chunk;
pub mod config;
pub mod domain;
pub mod ena;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod loader;
pub mod output;
pub mod pool;
pub mod srr;
pub mod xml;
