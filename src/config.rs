use std::path::PathBuf;

const HISTORY_ENV: &str = "PIPESH_HISTORY";
const LOG_ENV: &str = "PIPESH_LOG";
const HISTORY_FILE: &str = ".pipesh_history";
const DEFAULT_LOG_FILTER: &str = "warn";

/// シェルの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub history_file: Option<PathBuf>, // ヒストリファイル。Noneなら保存しない
    pub log_filter: String,            // tracingのフィルタ指定
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から設定を組み立てる。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let history_file = match lookup(HISTORY_ENV) {
            Some(path) if path.is_empty() => None, // 空文字列ならヒストリ無効
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::home_dir().map(|mut home| {
                home.push(HISTORY_FILE);
                home
            }),
        };

        let log_filter = lookup(LOG_ENV)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Config {
            history_file,
            log_filter,
        }
    }
}
