//! `KernelBridge`: the dispatcher that wires every other component
//! together behind one entry point.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod config;
mod dispatcher;
mod error;
mod token;
mod tool;

pub use config::KernelConfig;
pub use dispatcher::CancelToken;
pub use dispatcher::DispatchContext;
pub use dispatcher::Executor;
pub use dispatcher::KernelBridge;
pub use error::KernelError;
pub use error::Result;
pub use token::decode_decision_token;
pub use token::encode_decision_token;
pub use tool::ToolName;
