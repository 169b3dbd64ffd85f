//! 特征仓库模块
//!
//! 读取协议映射配置（每行 `协议名 标记`），为每个协议定位并解析一个特征
//! 定义文件，编译成有序的 [`Pattern`] 列表。列表顺序即配置文件中的顺序，
//! 也就是匹配优先级。
//!
//! 特征文件格式：
//!
//! ```text
//! # 注释
//! http
//! ^get |^post |^head
//! userspace pattern=^(get|post|head) [\x09-\x0d -~]* http/
//! userspace flags=REG_EXTENDED REG_ICASE REG_NOSUB
//! ```
//!
//! 第一行非注释内容必须是协议名；之后可以是一行后备正则，或者
//! `pattern=` / `flags=` 属性行（可带历史遗留的 `userspace ` 前缀）。

use crate::core::mark::Mark;
use crate::core::pattern::{CompileFlags, ExecFlags, FlagToken, Pattern};
use crate::error::{ClassifierError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 特征文件扩展名
pub const SIGNATURE_EXTENSION: &str = "pat";

/// 默认特征目录
pub const DEFAULT_PATTERN_DIR: &str = "/etc/l7-protocols";

/// 映射配置中的一条规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    /// 协议名
    pub protocol: String,
    /// 协议标记
    pub mark: Mark,
}

/// 解析后的特征定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDefinition {
    /// 协议名
    pub protocol: String,
    /// 正则文本（未做十六进制替换）
    pub pattern: Vec<u8>,
    /// 编译期标志
    pub cflags: CompileFlags,
    /// 执行期标志
    pub eflags: ExecFlags,
}

/// 解析映射配置中的一行
///
/// 注释行与空行返回 `Ok(None)`；格式错误或标记越界返回 `Err(原因)`，
/// 由调用者决定跳过并告警。
pub fn parse_rule_line(line: &str) -> std::result::Result<Option<RuleEntry>, String> {
    if line.starts_with('#') || line.trim().is_empty() {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let protocol = fields.next();
    let mark = fields.next().and_then(|m| m.parse::<i64>().ok());

    let (protocol, mark) = match (protocol, mark) {
        (Some(protocol), Some(mark)) => (protocol, mark),
        _ => {
            return Err(format!(
                "Ignoring line because it isn't in the format 'protocol mark': {}",
                line
            ))
        }
    };

    let mark = u32::try_from(mark).ok().and_then(Mark::new).ok_or_else(|| {
        format!(
            "Ignoring line because the mark is not in the range {}-{}: {}",
            Mark::MIN,
            Mark::MAX,
            line
        )
    })?;

    Ok(Some(RuleEntry {
        protocol: protocol.to_string(),
        mark,
    }))
}

/// 解析特征定义文件内容
pub fn parse_signature(
    contents: &[u8],
    expected: &str,
    path: &Path,
) -> Result<SignatureDefinition> {
    let mut declared: Option<String> = None;
    let mut fallback: Option<Vec<u8>> = None;
    let mut pattern_attr: Option<Vec<u8>> = None;
    let mut flags_attr: Option<(CompileFlags, ExecFlags)> = None;

    for raw_line in contents.split(|&b| b == b'\n') {
        let line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);

        if line.first() == Some(&b'#') || line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        if declared.is_none() {
            let name = String::from_utf8_lossy(line).trim().to_string();
            if name != expected {
                return Err(ClassifierError::ProtocolMismatch {
                    path: path.to_path_buf(),
                    expected: expected.to_string(),
                    found: name,
                });
            }
            declared = Some(name);
            continue;
        }

        match split_attribute(line) {
            Some((key, value)) => match key {
                "pattern" => pattern_attr = Some(value.to_vec()),
                "flags" => flags_attr = Some(parse_flags(value, path)?),
                other => {
                    tracing::warn!(
                        file = %path.display(),
                        "ignoring unknown attribute '{}'",
                        other
                    );
                }
            },
            None if fallback.is_none() => fallback = Some(line.to_vec()),
            None => {
                tracing::debug!(file = %path.display(), "ignoring extra pattern line");
            }
        }
    }

    let protocol = declared.ok_or_else(|| ClassifierError::MissingPattern {
        path: path.to_path_buf(),
    })?;
    let pattern = pattern_attr
        .or(fallback)
        .ok_or_else(|| ClassifierError::MissingPattern {
            path: path.to_path_buf(),
        })?;
    let (cflags, eflags) = flags_attr.unwrap_or((CompileFlags::default(), ExecFlags::default()));

    Ok(SignatureDefinition {
        protocol,
        pattern,
        cflags,
        eflags,
    })
}

/// 拆分 `[userspace ]key=value` 属性行
fn split_attribute(line: &[u8]) -> Option<(&str, &[u8])> {
    let body = match line.strip_prefix(b"userspace") {
        Some(rest) if rest.first().map_or(false, |b| b.is_ascii_whitespace()) => {
            let skip = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
            &rest[skip..]
        }
        _ => line,
    };

    let eq = body.iter().position(|&b| b == b'=')?;
    let key = &body[..eq];
    if key.is_empty() || !key.iter().all(|&b| b.is_ascii_lowercase() || b == b'_') {
        return None;
    }
    let key = std::str::from_utf8(key).ok()?;
    Some((key, &body[eq + 1..]))
}

fn parse_flags(value: &[u8], path: &Path) -> Result<(CompileFlags, ExecFlags)> {
    let mut cflags = CompileFlags::empty();
    let mut eflags = ExecFlags::default();

    for token in String::from_utf8_lossy(value).split_whitespace() {
        let flag = FlagToken::parse(token).ok_or_else(|| ClassifierError::UnknownFlag {
            path: path.to_path_buf(),
            token: token.to_string(),
        })?;
        flag.apply(&mut cflags, &mut eflags);
    }

    Ok((cflags, eflags))
}

/// 特征仓库
#[derive(Debug, Clone)]
pub struct PatternRepository {
    root: PathBuf,
}

impl PatternRepository {
    /// 创建以 `root` 为根目录的仓库
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 获取根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 查找协议的特征文件：先根目录，再按名称逆序查找一级子目录
    pub fn locate(&self, protocol: &str) -> Result<PathBuf> {
        let filename = format!("{}.{}", protocol, SIGNATURE_EXTENSION);

        let mut candidates = vec![self.root.join(&filename)];
        if let Ok(entries) = fs::read_dir(&self.root) {
            let mut subdirs: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            subdirs.sort_by(|a, b| b.cmp(a));
            candidates.extend(subdirs.into_iter().map(|dir| dir.join(&filename)));
        }

        candidates
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(|| ClassifierError::SignatureNotFound {
                protocol: protocol.to_string(),
                root: self.root.clone(),
            })
    }

    /// 读取并编译一个协议的特征
    pub fn load_pattern(&self, protocol: &str, mark: Mark) -> Result<Pattern> {
        let path = self.locate(protocol)?;
        tracing::debug!("Attempting to load pattern from {}", path.display());

        let contents = fs::read(&path)?;
        let definition = parse_signature(&contents, protocol, &path)?;

        tracing::debug!(
            protocol = %definition.protocol,
            pattern = %String::from_utf8_lossy(&definition.pattern),
            cflags = ?definition.cflags,
            eflags = ?definition.eflags,
            "parsed pattern file"
        );

        Pattern::new(
            definition.protocol,
            &definition.pattern,
            definition.cflags,
            definition.eflags,
            mark,
        )
    }

    /// 按映射配置文件加载全部特征
    pub fn load(&self, config_file: &Path) -> Result<Vec<Pattern>> {
        tracing::debug!("Attempting to read configuration from {}", config_file.display());

        let contents =
            fs::read_to_string(config_file).map_err(|source| ClassifierError::ConfigUnreadable {
                path: config_file.to_path_buf(),
                source,
            })?;

        self.load_from_str(&contents)
    }

    /// 按映射配置内容加载全部特征
    pub fn load_from_str(&self, contents: &str) -> Result<Vec<Pattern>> {
        let mut patterns = Vec::new();

        for line in contents.lines() {
            let entry = match parse_rule_line(line) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(reason) => {
                    tracing::warn!("{}", reason);
                    continue;
                }
            };

            let pattern = self.load_pattern(&entry.protocol, entry.mark)?;
            tracing::info!("Added: {}\tmark={}", entry.protocol, entry.mark);
            patterns.push(pattern);
        }

        if patterns.is_empty() {
            return Err(ClassifierError::NoValidRules);
        }

        Ok(patterns)
    }
}

impl Default for PatternRepository {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_DIR)
    }
}
