/// パイプラインの最大ステージ数
pub const MAX_STAGES: usize = 16;
/// 1ステージあたりの最大引数数（プログラム名を含む）
pub const MAX_ARGS: usize = 64;
/// 1行の内容の最大バイト数（改行は含まない）。ちょうどこの長さの行は受け付ける。
pub const MAX_INPUT: usize = 1024;

/// パイプラインの1ステージ。パース後は変更されない。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Command {
    pub(crate) arguments: Vec<String>,      // arguments[0]がプログラム名
    pub(crate) input_path: Option<String>,  // < file
    pub(crate) output_path: Option<String>, // > file
    pub(crate) error_path: Option<String>,  // 2> file
}

impl Command {
    /// 実行するプログラム名。パースに成功したステージでは必ず存在する。
    pub fn program(&self) -> &str {
        &self.arguments[0]
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn input_path(&self) -> Option<&str> {
        self.input_path.as_deref()
    }

    pub fn output_path(&self) -> Option<&str> {
        self.output_path.as_deref()
    }

    pub fn error_path(&self) -> Option<&str> {
        self.error_path.as_deref()
    }
}

/// 1行分のパース結果。ステージiの出力はステージi+1の入力につながる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub(crate) stages: Vec<Command>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// パーサが返すPipelineは常に1ステージ以上持つ。
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
