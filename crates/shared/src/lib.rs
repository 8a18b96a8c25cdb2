pub mod actions;
pub mod config;
pub mod control;
pub mod domain;
pub mod error;
pub mod protocol;
