use crate::helper::syscall;
use nix::{errno::Errno, libc, unistd};
use std::{ffi::CStr, os::unix::io::RawFd};
use thiserror::Error;

/// 行のパースエラー。どれもプロセス生成前に検出され、その行だけが破棄される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Input file not specified.")]
    MissingInputFile,
    #[error("Output file not specified.")]
    MissingOutputFile,
    #[error("Error output file not specified.")]
    MissingErrorFile,
    #[error("Command missing after pipe.")]
    MissingCommandAfterPipe,
    #[error("Empty command between pipes.")]
    EmptyCommandBetweenPipes,
    #[error("Missing command.")]
    MissingCommand,
    #[error("Too many pipes.")]
    TooManyPipes,
    #[error("Too many arguments.")]
    TooManyArguments,
    #[error("Input line too long ({len} bytes, limit is {max}).")]
    LineTooLong { len: usize, max: usize },
}

/// パイプライン全体を中断するエラー。シェル自体は継続する。
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipe: {0}")]
    ChannelCreationFailed(#[source] Errno),
    #[error("fork: {0}")]
    ProcessCreationFailed(#[source] Errno),
    #[error("{0}: argument contains a NUL byte")]
    InvalidArgument(String),
}

/// exitの引数が整数ではない
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("exit: {0}: numeric argument required")]
pub struct BadExitCode(pub String);

/// fork後の子プロセス内で起きる、そのステージだけのエラー。
///
/// 子プロセスではヒープ確保もバッファ付きI/Oも使えないので、
/// 表示は借用したCStrとErrnoの静的文字列をそのまま書き出すだけにする。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageError<'a> {
    CommandNotFound(&'a CStr),
    FileNotFound(&'a CStr),
    RedirectionOpenFailed(&'a CStr, Errno),
    StreamRebindFailed(Errno),
}

impl StageError<'_> {
    /// fdへメッセージを書き込む。書き込み失敗は無視。
    pub fn write_to(&self, fd: RawFd) {
        match *self {
            StageError::CommandNotFound(name) => {
                write_parts(fd, &[name.to_bytes(), b": command not found\n"])
            }
            StageError::FileNotFound(path) => {
                write_parts(fd, &[path.to_bytes(), b": file not found\n"])
            }
            StageError::RedirectionOpenFailed(path, errno) => write_parts(
                fd,
                &[path.to_bytes(), b": ", errno.desc().as_bytes(), b"\n"],
            ),
            StageError::StreamRebindFailed(errno) => {
                write_parts(fd, &[b"dup2: ", errno.desc().as_bytes(), b"\n"])
            }
        }
    }

    /// 標準エラーへ報告して子プロセスを終了する。
    pub fn exit(&self) -> ! {
        self.write_to(libc::STDERR_FILENO);
        unsafe { libc::_exit(1) }
    }
}

fn write_parts(fd: RawFd, parts: &[&[u8]]) {
    for part in parts {
        let mut buf = *part;
        while !buf.is_empty() {
            match syscall(|| unistd::write(fd, buf)) {
                Ok(0) | Err(_) => return,
                Ok(n) => buf = &buf[n..],
            }
        }
    }
}

/// エラーシンク。診断メッセージを標準エラーに出すだけで、制御フローには影響しない。
pub fn report(err: &dyn std::error::Error) {
    tracing::debug!(error = %err, "reporting error");
    eprintln!("pipesh: {err}");
}
