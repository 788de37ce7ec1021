/// 境界で使うエラー型
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// システムコール呼び出しのラッパ。EINTR（割り込みによって中断されたシステムコール）ならリトライ。
pub fn syscall<F, T>(f: F) -> Result<T, nix::Error>
where
    F: Fn() -> Result<T, nix::Error>,
{
    loop {
        match f() {
            Err(nix::Error::EINTR) => (),
            result => return result,
        }
    }
}
