pub mod commands;
pub mod composite;
pub mod package;
pub mod runtime;
pub mod source;
