//! パイプとリダイレクトに対応した小さな対話シェル。
//!
//! 1行を[`parser::parse`]で[`pipeline::Pipeline`]に変換し、
//! [`executor::execute`]がステージごとにプロセスをforkしてパイプでつなぐ。

pub mod config;
pub mod error;
pub mod executor;
pub mod fd;
pub mod helper;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod redirect;
pub mod shell;

pub use error::{ExecError, ParseError};
pub use executor::{PipelineStatus, execute};
pub use parser::parse;
pub use pipeline::{Command, Pipeline};
