use crate::helper::syscall;
use nix::{fcntl::OFlag, libc, unistd};
use std::os::unix::io::RawFd;

/// 所有しているファイルディスクリプタ。ドロップ時にクローズする。
#[derive(Debug)]
pub struct Fd(RawFd);

impl Fd {
    pub fn from_raw(fd: RawFd) -> Self {
        Fd(fd)
    }

    pub fn as_raw(&self) -> RawFd {
        self.0
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        tracing::trace!(fd = self.0, "close");
        if let Err(e) = syscall(|| unistd::close(self.0)) {
            tracing::warn!(fd = self.0, "close failed: {e}");
        }
    }
}

/// パイプ1本分。親は各端を最後の利用者をforkした直後にクローズする。
#[derive(Debug)]
pub struct Channel {
    pub read: Option<Fd>,
    pub write: Option<Fd>,
}

impl Channel {
    /// close-on-exec付きで作成する。子プロセスではdup2した標準入出力だけがexec後に残る。
    pub fn open() -> nix::Result<Self> {
        let (read, write) = syscall(|| unistd::pipe2(OFlag::O_CLOEXEC))?;
        tracing::trace!(read, write, "pipe");
        Ok(Channel {
            read: Some(Fd::from_raw(read)),
            write: Some(Fd::from_raw(write)),
        })
    }

    pub fn read_fd(&self) -> Option<RawFd> {
        self.read.as_ref().map(Fd::as_raw)
    }

    pub fn write_fd(&self) -> Option<RawFd> {
        self.write.as_ref().map(Fd::as_raw)
    }

    pub fn close_read(&mut self) {
        drop(self.read.take());
    }

    pub fn close_write(&mut self) {
        drop(self.write.take());
    }

    /// fork後の子プロセス用。まだ保持している端をすべてクローズする。
    ///
    /// デストラクタは走らせず（メモリ解放もログ出力もしない）、
    /// 標準入出力として残す0〜2番はクローズしない。
    pub fn release_in_child(&self) {
        for fd in [self.read_fd(), self.write_fd()].into_iter().flatten() {
            if fd > libc::STDERR_FILENO {
                let _ = syscall(|| unistd::close(fd));
            }
        }
    }
}
