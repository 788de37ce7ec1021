use crate::{
    error::{ExecError, StageError},
    helper::syscall,
    pipeline::Command,
};
use nix::{
    fcntl::{OFlag, open},
    libc,
    sys::stat::Mode,
    unistd::{self, dup2},
};
use std::{
    ffi::{CStr, CString},
    os::unix::io::RawFd,
};

/// 1ステージ分のリダイレクト先。fork前にCStringへ変換しておく。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Redirections {
    input: Option<CString>,
    output: Option<CString>,
    error: Option<CString>,
}

fn to_cstring(s: &str) -> Result<CString, ExecError> {
    CString::new(s).map_err(|_| ExecError::InvalidArgument(s.to_string()))
}

impl Redirections {
    pub fn from_command(cmd: &Command) -> Result<Self, ExecError> {
        Ok(Redirections {
            input: cmd.input_path().map(to_cstring).transpose()?,
            output: cmd.output_path().map(to_cstring).transpose()?,
            error: cmd.error_path().map(to_cstring).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none() && self.error.is_none()
    }

    /// 標準入出力をファイルに付け替える。
    ///
    /// パイプへの接続の後、exec の前に子プロセス内で呼ぶこと。
    /// ここで付け替えたストリームはパイプ接続より優先される。
    /// 子プロセス内で呼ばれるので、open/dup2/close 以外のことはしない。
    pub fn apply(&self) -> Result<(), StageError<'_>> {
        // > file
        if let Some(path) = self.output.as_deref() {
            let fd = open_for_write(path)
                .map_err(|e| StageError::RedirectionOpenFailed(path, e))?;
            rebind(fd, libc::STDOUT_FILENO)?;
        }

        // 2> file
        if let Some(path) = self.error.as_deref() {
            let fd = open_for_write(path)
                .map_err(|e| StageError::RedirectionOpenFailed(path, e))?;
            rebind(fd, libc::STDERR_FILENO)?;
        }

        // < file
        if let Some(path) = self.input.as_deref() {
            let fd = syscall(|| open(path, OFlag::O_RDONLY, Mode::empty()))
                .map_err(|_| StageError::FileNotFound(path))?;
            rebind(fd, libc::STDIN_FILENO)?;
        }

        Ok(())
    }
}

/// 書き込み用に開く。無ければ作成、あれば切り詰め、パーミッションは0644。
fn open_for_write(path: &CStr) -> nix::Result<RawFd> {
    let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
    let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
    syscall(|| open(path, flags, mode))
}

/// fdをtargetに複製し、不要になった元のfdをクローズ。
fn rebind<'a>(fd: RawFd, target: RawFd) -> Result<(), StageError<'a>> {
    if fd == target {
        return Ok(()); // 既にtarget番で開かれている
    }
    let result = syscall(|| dup2(fd, target));
    let _ = syscall(|| unistd::close(fd));
    result.map(drop).map_err(StageError::StreamRebindFailed)
}
