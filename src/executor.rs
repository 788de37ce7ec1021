use crate::{
    error::{ExecError, StageError},
    fd::Channel,
    helper::syscall,
    pipeline::{Command, Pipeline},
    redirect::Redirections,
};
use nix::{
    fcntl::{FcntlArg, FdFlag, fcntl},
    libc,
    sys::{
        signal::{SigHandler, Signal, signal},
        wait::{WaitStatus, waitpid},
    },
    unistd::{ForkResult, Pid, dup2, fork},
};
use std::{ffi::CString, os::unix::io::RawFd, ptr};

/// fork前に用意しておく1ステージ分の実行情報。
///
/// 子プロセスではメモリ確保ができないので、execvpに渡すNULL終端の
/// ポインタ配列まで親プロセス側で作っておく。
struct PreparedStage {
    argv: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>, // argvを指す。末尾はNULL
    redirections: Redirections,
}

impl PreparedStage {
    fn new(cmd: &Command) -> Result<Self, ExecError> {
        let argv = cmd
            .arguments()
            .iter()
            .map(|arg| {
                CString::new(arg.as_str()).map_err(|_| ExecError::InvalidArgument(arg.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect();

        Ok(PreparedStage {
            argv,
            argv_ptrs,
            redirections: Redirections::from_command(cmd)?,
        })
    }
}

/// 実行したパイプラインの各ステージの終了状態（ステージ順）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    statuses: Vec<WaitStatus>,
}

impl PipelineStatus {
    pub fn statuses(&self) -> &[WaitStatus] {
        &self.statuses
    }

    /// 各ステージの終了コード。シグナルで終了した場合は128 + シグナル番号。
    pub fn exit_codes(&self) -> Vec<i32> {
        self.statuses.iter().map(exit_code).collect()
    }

    /// 最後のステージの終了コード
    pub fn exit_code(&self) -> i32 {
        self.statuses.last().map_or(0, exit_code)
    }

    pub fn success(&self) -> bool {
        self.exit_code() == 0
    }
}

fn exit_code(status: &WaitStatus) -> i32 {
    match *status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
        _ => 1,
    }
}

/// パイプラインを実行し、全ステージの終了を待つ。
///
/// ステージごとに1プロセスをforkし、隣り合うステージをパイプでつなぐ。
/// 親プロセスは、各パイプの端を最後に必要とする子をforkした直後にクローズする。
/// まとめて最後にクローズすると、書き込み端を親が持ち続けて読み手がEOFを受け取れない。
pub fn execute(pipeline: &Pipeline) -> Result<PipelineStatus, ExecError> {
    assert!(!pipeline.is_empty()); // パーサは空のパイプラインを返さない

    // 文字列の変換はすべてfork前に済ませる
    let stages = pipeline
        .stages()
        .iter()
        .map(PreparedStage::new)
        .collect::<Result<Vec<_>, _>>()?;
    let n = stages.len();

    // パイプiはステージiの出力とステージi+1の入力をつなぐ
    let mut channels = Vec::with_capacity(n - 1);
    for _ in 1..n {
        channels.push(Channel::open().map_err(ExecError::ChannelCreationFailed)?);
    }

    let mut pids = Vec::with_capacity(n);
    for (i, stage) in stages.iter().enumerate() {
        match syscall(|| unsafe { fork() }) {
            Ok(ForkResult::Child) => run_stage(i, stage, &channels),
            Ok(ForkResult::Parent { child }) => {
                tracing::debug!(
                    stage = i,
                    pid = %child,
                    program = pipeline.stages()[i].program(),
                    redirected = !stage.redirections.is_empty(),
                    "spawned"
                );
                pids.push(child);

                // ステージiが最後の利用者である端をクローズ
                if i > 0 {
                    channels[i - 1].close_read();
                }
                if i < n - 1 {
                    channels[i].close_write();
                }
            }
            Err(e) => {
                // 残りのパイプはドロップ時にクローズされる。起動済みの子はwaitしない
                tracing::warn!(?pids, "fork failed at stage {i}, abandoning pipeline");
                return Err(ExecError::ProcessCreationFailed(e));
            }
        }
    }

    debug_assert!(channels.iter().all(|ch| ch.read.is_none() && ch.write.is_none()));

    // 全ての子をpidを指定してwait
    let statuses = pids.into_iter().map(wait_stage).collect();
    Ok(PipelineStatus { statuses })
}

/// 子プロセスの終了を待つ。
fn wait_stage(pid: Pid) -> WaitStatus {
    match syscall(|| waitpid(pid, None)) {
        Ok(status) => {
            if let WaitStatus::Signaled(pid, sig, core) = status {
                if sig != Signal::SIGPIPE {
                    tracing::info!(%pid, %sig, core, "stage terminated by signal");
                }
            }
            tracing::debug!(?status, "reaped");
            status
        }
        Err(e) => {
            tracing::warn!(%pid, "waitpid failed: {e}");
            WaitStatus::Exited(pid, 1)
        }
    }
}

/// 子プロセス側の処理。戻らない。
///
/// fork後なので、ここではasync-signal-safeな操作（dup2, close, open, write,
/// sigaction, execvp, _exit）しか行わない。メモリ確保、ログ出力、デストラクタは禁止。
fn run_stage(i: usize, stage: &PreparedStage, channels: &[Channel]) -> ! {
    let n = channels.len() + 1;

    // 標準入力を前のパイプの読み込み端に
    if i > 0 {
        if let Some(fd) = channels[i - 1].read_fd() {
            rebind_or_exit(fd, libc::STDIN_FILENO);
        }
    }

    // 標準出力を次のパイプの書き込み端に
    if i < n - 1 {
        if let Some(fd) = channels[i].write_fd() {
            rebind_or_exit(fd, libc::STDOUT_FILENO);
        }
    }

    // 残っているパイプのfdを全てクローズ。書き込み端が1つでも残ると読み手がEOFを受け取れない
    for ch in channels {
        ch.release_in_child();
    }

    // ファイルへのリダイレクトはパイプ接続を上書きする
    if let Err(e) = stage.redirections.apply() {
        e.exit();
    }

    // Rustのランタイムが無視に設定したSIGPIPEはexec後も引き継がれるので戻す
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    // 実行ファイルをメモリに読み込み。戻ってきたらプログラムが見つからないか実行できない
    unsafe { libc::execvp(stage.argv[0].as_ptr(), stage.argv_ptrs.as_ptr()) };
    StageError::CommandNotFound(&stage.argv[0]).exit()
}

/// dup2はclose-on-execを引き継がない。既にtarget番ならフラグだけ外す。
fn rebind_or_exit(fd: RawFd, target: RawFd) {
    let result = if fd == target {
        syscall(|| fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))).map(drop)
    } else {
        syscall(|| dup2(fd, target)).map(drop)
    };
    if let Err(e) = result {
        StageError::StreamRebindFailed(e).exit();
    }
}
