// crates/hdm_engine/src/input.rs

//! 项目输入文件
//!
//! 行式文本格式：
//!
//! ```text
//! <自由文本标题行>
//! <projectID>
//! <nd>
//! <domainID> <domainPath> <outputDir> [<parentID>]   × nd 行
//! ```
//!
//! 域定义行按空白分列：3 列为根域，4 列为子域，其余列数为输入
//! 错误并报告出错的域标识符。父域必须先于其子域声明。

use crate::domain::DomainSpec;
use crate::error::{EngineError, EngineResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// 解析后的项目输入文件
#[derive(Debug, Clone)]
pub struct ProjectInput {
    /// 标题行（自由文本）
    pub header: String,
    /// 项目标识符
    pub project_id: String,
    /// 声明的域数量
    pub nd: usize,
    /// 域定义（按声明顺序）
    pub domains: Vec<DomainSpec>,
}

impl ProjectInput {
    /// 读取并解析项目输入文件
    pub fn read(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EngineError::InputFormat {
            path: path.to_path_buf(),
            message: format!("cannot open input file: {}", e),
        })?;
        Self::parse(BufReader::new(file), path)
    }

    /// 从任意读端解析（`path` 仅用于错误报告）
    pub fn parse<R: BufRead>(reader: R, path: &Path) -> EngineResult<Self> {
        let mut lines = reader.lines();

        let header = next_line(&mut lines, path, "header")?;
        let project_id = first_token(&next_line(&mut lines, path, "project id")?, path, "project id")?;
        let nd_line = next_line(&mut lines, path, "domain count")?;
        let nd: usize = first_token(&nd_line, path, "domain count")?
            .parse()
            .map_err(|_| EngineError::InputFormat {
                path: path.to_path_buf(),
                message: format!("domain count is not a number: {:?}", nd_line.trim()),
            })?;

        let mut domains = Vec::with_capacity(nd);
        for d in 0..nd {
            let line = next_line(&mut lines, path, "domain row")?;
            let columns = split_line(&line);
            let spec = match columns.len() {
                3 => DomainSpec::root(
                    columns[0].as_str(),
                    columns[1].as_str(),
                    columns[2].as_str(),
                ),
                4 => DomainSpec::child(
                    columns[0].as_str(),
                    columns[1].as_str(),
                    columns[2].as_str(),
                    columns[3].as_str(),
                ),
                0 => {
                    return Err(EngineError::InputFormat {
                        path: path.to_path_buf(),
                        message: format!("domain row {} of {} is blank", d + 1, nd),
                    })
                }
                n => {
                    return Err(EngineError::DomainRow {
                        domain_id: columns[0].clone(),
                        columns: n,
                    })
                }
            };
            domains.push(spec);
        }

        Ok(Self {
            header: header.trim().to_string(),
            project_id,
            nd,
            domains,
        })
    }
}

/// 按空白把一行拆成列
pub fn split_line(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

fn next_line<I>(lines: &mut I, path: &Path, what: &str) -> EngineResult<String>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    match lines.next() {
        Some(Ok(line)) => Ok(line),
        Some(Err(e)) => Err(EngineError::InputFormat {
            path: path.to_path_buf(),
            message: format!("failed reading {}: {}", what, e),
        }),
        None => Err(EngineError::InputFormat {
            path: path.to_path_buf(),
            message: format!("unexpected end of file while reading {}", what),
        }),
    }
}

fn first_token(line: &str, path: &Path, what: &str) -> EngineResult<String> {
    line.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| EngineError::InputFormat {
            path: path.to_path_buf(),
            message: format!("{} line is blank", what),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(text: &str) -> EngineResult<ProjectInput> {
        ProjectInput::parse(Cursor::new(text.to_string()), Path::new("test.prj"))
    }

    #[test]
    fn test_parse_two_domains() {
        let input = parse_str("demo\nP\n2\nA /a /outA\nB /b /outB A\n").unwrap();

        assert_eq!(input.header, "demo");
        assert_eq!(input.project_id, "P");
        assert_eq!(input.nd, 2);
        assert_eq!(input.domains.len(), 2);

        let a = &input.domains[0];
        assert_eq!(a.id, "A");
        assert_eq!(a.path, PathBuf::from("/a"));
        assert_eq!(a.output_dir, PathBuf::from("/outA"));
        assert!(a.parent_id.is_none());

        let b = &input.domains[1];
        assert_eq!(b.id, "B");
        assert_eq!(b.parent_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_invalid_column_count_names_domain() {
        let err = parse_str("demo\nP\n1\nA /a /outA A extra\n").unwrap_err();
        match err {
            EngineError::DomainRow { domain_id, columns } => {
                assert_eq!(domain_id, "A");
                assert_eq!(columns, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_file() {
        let err = parse_str("demo\nP\n2\nA /a /outA\n").unwrap_err();
        assert!(matches!(err, EngineError::InputFormat { .. }));
    }

    #[test]
    fn test_bad_domain_count() {
        let err = parse_str("demo\nP\nmany\n").unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.prj");
        std::fs::write(&path, "tides\nT1\n1\nbay ./bay ./out_bay\n").unwrap();

        let input = ProjectInput::read(&path).unwrap();
        assert_eq!(input.project_id, "T1");
        assert_eq!(input.domains[0].id, "bay");
    }

    #[test]
    fn test_missing_file() {
        let err = ProjectInput::read("/definitely/not/here.prj").unwrap_err();
        assert!(matches!(err, EngineError::InputFormat { .. }));
    }

    #[test]
    fn test_split_line() {
        assert_eq!(split_line("  a  b\tc "), vec!["a", "b", "c"]);
        assert!(split_line("   ").is_empty());
    }
}
