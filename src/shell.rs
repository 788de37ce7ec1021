use crate::{
    config::Config,
    error::{BadExitCode, report},
    executor,
    helper::DynError,
    parser,
};
use rustyline::{Editor, error::ReadlineError};
use signal_hook::{consts::*, iterator::Signals};
use std::thread;

/// 読み込んだ1行の分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Blank,            // 空白のみ
    Exit(i32),        // exit [n]
    Command(&'a str), // パイプラインとしてパースする行
    BadExit(&'a str), // exitの引数が整数ではない
}

/// 行を分類する。exitとその終了コードはここで処理し、パーサには渡さない。
pub fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Blank;
    }

    let mut words = trimmed.split_ascii_whitespace();
    if words.next() != Some("exit") {
        return Input::Command(line);
    }

    // パイプやリダイレクトを含む行はパーサに任せる（"exit |" など）
    if trimmed.contains(['|', '<', '>']) {
        return Input::Command(line);
    }

    match (words.next(), words.next()) {
        (None, _) => Input::Exit(0),
        (Some(code), None) => match code.parse::<i32>() {
            Ok(n) => Input::Exit(n),
            Err(_) => Input::BadExit(code),
        },
        // 引数が2つ以上なら普通のコマンドとして扱う
        _ => Input::Command(line),
    }
}

#[derive(Debug)]
pub struct Shell {
    config: Config,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Shell { config }
    }

    /// 読み込みループ。終了コードを返す。
    pub fn run(&self) -> Result<i32, DynError> {
        // パイプライン実行中のCtrl+Cで子プロセスだけが終了するようにする
        spawn_sig_handler()?;

        let mut rl = Editor::<()>::new()?;
        if let Some(history) = &self.config.history_file {
            if let Err(e) = rl.load_history(history) {
                tracing::debug!("history not loaded from {}: {e}", history.display());
            }
        }

        let exit_val; // 終了コード
        let mut prev = 0; // 直前の終了コード
        loop {
            // 1行読み込んで、パースして実行
            let face = if prev == 0 { '\u{1F642}' } else { '\u{1F480}' };
            match rl.readline(&format!("pipesh {face} %> ")) {
                Ok(line) => {
                    let input = classify(&line);
                    if input != Input::Blank {
                        rl.add_history_entry(line.trim()); // ヒストリに追加
                    }

                    match input {
                        Input::Blank => continue, // 空のコマンドの場合は再読み込み
                        Input::Exit(n) => {
                            exit_val = n;
                            break;
                        }
                        Input::BadExit(arg) => {
                            report(&BadExitCode(arg.to_string()));
                            prev = 1;
                        }
                        Input::Command(line) => prev = run_line(line),
                    }
                }
                Err(ReadlineError::Interrupted) => eprintln!("pipesh: use Ctrl+D or exit to quit"),
                Err(ReadlineError::Eof) => {
                    exit_val = 0;
                    break;
                }
                Err(e) => {
                    eprintln!("pipesh: read error\n{e}");
                    exit_val = 1;
                    break;
                }
            }
        }

        if let Some(history) = &self.config.history_file {
            if let Err(e) = rl.save_history(history) {
                eprintln!("pipesh: failed to write history file {}: {e}", history.display());
            }
        }
        Ok(exit_val)
    }
}

/// 1行をパースして実行し、終了コードを返す。エラーはシンクに報告するだけ。
fn run_line(line: &str) -> i32 {
    let pipeline = match parser::parse(line) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            report(&e);
            return 2;
        }
    };

    match executor::execute(&pipeline) {
        Ok(status) => {
            tracing::debug!(codes = ?status.exit_codes(), "pipeline finished");
            status.exit_code()
        }
        Err(e) => {
            report(&e);
            1
        }
    }
}

/// signal_handlerスレッド。シェル自身はSIGINT/SIGQUITで終了しない。
///
/// 子プロセスはexec時にデフォルト動作へ戻るので、フォアグラウンドの
/// パイプラインだけがシグナルで終了する。
fn spawn_sig_handler() -> Result<(), DynError> {
    let mut signals = Signals::new(&[SIGINT, SIGQUIT])?;
    thread::spawn(move || {
        for sig in signals.forever() {
            tracing::debug!(signal = sig, "signal received");
        }
    });

    Ok(())
}
