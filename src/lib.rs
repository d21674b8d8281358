pub mod backend;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod layout;
pub mod logging;
pub mod output;
pub mod tasklist;
pub mod workflow;
