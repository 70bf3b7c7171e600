//! Device-side orchestration: one command per user-facing action, the
//! record stream on stdout or a file, a summary on stderr.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod operations;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::{resolve_root, ToolConfig};
pub use credentials::JsonCredentials;
pub use operations::{dispatch_command, open_stream, HandlerResult};
