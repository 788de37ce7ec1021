use crate::{
    error::ParseError,
    pipeline::{Command, MAX_ARGS, MAX_INPUT, MAX_STAGES, Pipeline},
};

type ParseResult<T> = Result<T, ParseError>;

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// 1行をパースしてPipelineを生成。失敗した時点で打ち切り、プロセスは一切作らない。
pub fn parse(line: &str) -> ParseResult<Pipeline> {
    if line.len() > MAX_INPUT {
        return Err(ParseError::LineTooLong {
            len: line.len(),
            max: MAX_INPUT,
        });
    }

    let segments = split_segments(line)?;
    let stages = segments
        .into_iter()
        .map(parse_command)
        .collect::<ParseResult<Vec<_>>>()?;

    tracing::debug!(stages = stages.len(), "parsed pipeline");
    Ok(Pipeline { stages })
}

/// '|'で分割し、空のセグメントとステージ数を検査。
fn split_segments(line: &str) -> ParseResult<Vec<&str>> {
    let segments: Vec<&str> = line.split('|').collect();
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        // 先頭のセグメントが空の場合はparse_commandでMissingCommandになる
        if i > 0 && segment.trim_start_matches(is_blank).is_empty() {
            if i == last {
                return Err(ParseError::MissingCommandAfterPipe); // "cmd |"
            }
            return Err(ParseError::EmptyCommandBetweenPipes); // "cmd | | cmd"
        }

        if i >= MAX_STAGES {
            return Err(ParseError::TooManyPipes);
        }
    }

    Ok(segments)
}

/// 1ステージ分をトークンに分割し、リダイレクトと引数を取り出す。
fn parse_command(segment: &str) -> ParseResult<Command> {
    let mut cmd = Command::default();
    let mut tokens = segment.split(is_blank).filter(|t| !t.is_empty());

    while let Some(token) = tokens.next() {
        // 演算子の直後のトークンは内容に関係なくファイル名として扱う
        match token {
            "<" => {
                let file = tokens.next().ok_or(ParseError::MissingInputFile)?;
                cmd.input_path = Some(file.to_string());
            }
            ">" => {
                let file = tokens.next().ok_or(ParseError::MissingOutputFile)?;
                cmd.output_path = Some(file.to_string());
            }
            "2>" => {
                let file = tokens.next().ok_or(ParseError::MissingErrorFile)?;
                cmd.error_path = Some(file.to_string());
            }
            arg => {
                if cmd.arguments.len() >= MAX_ARGS {
                    return Err(ParseError::TooManyArguments);
                }
                cmd.arguments.push(arg.to_string());
            }
        }
    }

    if cmd.arguments.is_empty() {
        return Err(ParseError::MissingCommand); // "< infile" など
    }

    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<&str> {
        cmd.arguments().iter().map(String::as_str).collect()
    }

    #[test]
    fn single_command_with_arguments() {
        let p = parse("ls -l\t-a").unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.stages()[0].program(), "ls");
        assert_eq!(args(&p.stages()[0]), ["ls", "-l", "-a"]);
        assert_eq!(p.stages()[0].input_path(), None);
    }

    #[test]
    fn stage_count_is_pipe_count_plus_one() {
        for k in 1..MAX_STAGES {
            let line = vec!["echo hi"; k + 1].join(" | ");
            assert_eq!(parse(&line).unwrap().len(), k + 1, "{line}");
        }
    }

    #[test]
    fn pipes_need_no_surrounding_spaces() {
        let p = parse("cat file|grep x|wc -l").unwrap();
        let programs: Vec<&str> = p.stages().iter().map(Command::program).collect();
        assert_eq!(programs, ["cat", "grep", "wc"]);
    }

    #[test]
    fn redirections_are_extracted() {
        let p = parse("sort < in.txt > out.txt 2> err.log -r").unwrap();
        let cmd = &p.stages()[0];
        assert_eq!(args(cmd), ["sort", "-r"]);
        assert_eq!(cmd.input_path(), Some("in.txt"));
        assert_eq!(cmd.output_path(), Some("out.txt"));
        assert_eq!(cmd.error_path(), Some("err.log"));
    }

    #[test]
    fn redirections_in_any_stage() {
        let p = parse("cat < a | tr a b 2> e | wc > c").unwrap();
        assert_eq!(p.stages()[0].input_path(), Some("a"));
        assert_eq!(p.stages()[1].error_path(), Some("e"));
        assert_eq!(p.stages()[2].output_path(), Some("c"));
    }

    #[test]
    fn operator_looking_filename_is_a_filename() {
        let p = parse("echo hi > >").unwrap();
        assert_eq!(p.stages()[0].output_path(), Some(">"));
        assert_eq!(args(&p.stages()[0]), ["echo", "hi"]);
    }

    #[test]
    fn affixed_operators_are_plain_arguments() {
        let p = parse("echo >out 2>err").unwrap();
        assert_eq!(args(&p.stages()[0]), ["echo", ">out", "2>err"]);
        assert_eq!(p.stages()[0].output_path(), None);
    }

    #[test]
    fn later_redirection_replaces_earlier() {
        let p = parse("echo hi > a > b").unwrap();
        assert_eq!(p.stages()[0].output_path(), Some("b"));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(parse("ls | | wc"), Err(ParseError::EmptyCommandBetweenPipes));
        assert_eq!(parse("ls ||wc"), Err(ParseError::EmptyCommandBetweenPipes));
        assert_eq!(parse("ls |"), Err(ParseError::MissingCommandAfterPipe));
        assert_eq!(parse("ls | \t"), Err(ParseError::MissingCommandAfterPipe));
        assert_eq!(parse("cmd <"), Err(ParseError::MissingInputFile));
        assert_eq!(parse("cmd >"), Err(ParseError::MissingOutputFile));
        assert_eq!(parse("cmd 2>  "), Err(ParseError::MissingErrorFile));
        assert_eq!(parse("< infile"), Err(ParseError::MissingCommand));
        assert_eq!(parse("| wc"), Err(ParseError::MissingCommand));
        assert_eq!(parse("ls | > out"), Err(ParseError::MissingCommand));
    }

    #[test]
    fn stage_limit() {
        let max = vec!["cat"; MAX_STAGES].join(" | ");
        assert_eq!(parse(&max).unwrap().len(), MAX_STAGES);

        let over = vec!["cat"; MAX_STAGES + 1].join(" | ");
        assert_eq!(parse(&over), Err(ParseError::TooManyPipes));
    }

    #[test]
    fn argument_limit() {
        let max = format!("echo {}", vec!["x"; MAX_ARGS - 1].join(" "));
        assert_eq!(parse(&max).unwrap().stages()[0].arguments().len(), MAX_ARGS);

        let over = format!("echo {}", vec!["x"; MAX_ARGS].join(" "));
        assert_eq!(parse(&over), Err(ParseError::TooManyArguments));
    }

    #[test]
    fn line_of_exactly_max_input_bytes_is_accepted() {
        let line = format!("echo {}", "a".repeat(MAX_INPUT - "echo ".len()));
        assert_eq!(line.len(), MAX_INPUT);
        assert_eq!(parse(&line).unwrap().len(), 1);
    }

    #[test]
    fn oversized_line_is_rejected() {
        let line = format!("echo {}", "a".repeat(MAX_INPUT));
        assert_eq!(
            parse(&line),
            Err(ParseError::LineTooLong {
                len: line.len(),
                max: MAX_INPUT
            })
        );
    }
}
