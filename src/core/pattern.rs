//! 协议特征模块
//!
//! 一个 [`Pattern`] 由协议名、编译好的正则、编译/执行标志和协议标记组成，
//! 启动时创建，之后只读。

use crate::core::mark::Mark;
use crate::core::syntax::{self, SyntaxOptions};
use crate::error::{ClassifierError, Result};
use regex::bytes::{Regex, RegexBuilder};
use std::fmt;

/// 编译期标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileFlags {
    /// 扩展语法（REG_EXTENDED）
    pub extended: bool,
    /// 不区分大小写（REG_ICASE）
    pub icase: bool,
    /// 不需要捕获（REG_NOSUB）
    pub nosub: bool,
    /// 换行敏感（REG_NEWLINE）
    pub newline: bool,
}

impl CompileFlags {
    /// 全部关闭
    pub const fn empty() -> Self {
        Self {
            extended: false,
            icase: false,
            nosub: false,
            newline: false,
        }
    }
}

impl Default for CompileFlags {
    /// 只有后备正则时使用的默认标志：扩展语法 + 不区分大小写 + 不捕获
    fn default() -> Self {
        Self {
            extended: true,
            icase: true,
            nosub: true,
            newline: false,
        }
    }
}

/// 执行期标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecFlags {
    /// 缓冲区开头不视为行首（REG_NOTBOL）
    pub not_bol: bool,
    /// 缓冲区结尾不视为行尾（REG_NOTEOL）
    pub not_eol: bool,
}

/// 单个标志名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagToken {
    /// REG_EXTENDED
    Extended,
    /// REG_ICASE
    Icase,
    /// REG_NOSUB
    Nosub,
    /// REG_NEWLINE
    Newline,
    /// REG_NOTBOL
    NotBol,
    /// REG_NOTEOL
    NotEol,
}

impl FlagToken {
    /// 解析标志名（不区分大小写），未知标志返回 `None`
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "REG_EXTENDED" => Some(Self::Extended),
            "REG_ICASE" => Some(Self::Icase),
            "REG_NOSUB" => Some(Self::Nosub),
            "REG_NEWLINE" => Some(Self::Newline),
            "REG_NOTBOL" => Some(Self::NotBol),
            "REG_NOTEOL" => Some(Self::NotEol),
            _ => None,
        }
    }

    /// 将标志应用到标志集合
    pub fn apply(self, cflags: &mut CompileFlags, eflags: &mut ExecFlags) {
        match self {
            Self::Extended => cflags.extended = true,
            Self::Icase => cflags.icase = true,
            Self::Nosub => cflags.nosub = true,
            Self::Newline => cflags.newline = true,
            Self::NotBol => eflags.not_bol = true,
            Self::NotEol => eflags.not_eol = true,
        }
    }
}

/// 替换 `\xHH` 转义为对应字节
///
/// 替换出的字节如果是正则元字符或 NUL 会给出告警；NUL 之后的内容被截断。
pub fn preprocess_hex_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\'
            && raw.get(i + 1) == Some(&b'x')
            && i + 3 < raw.len()
            && raw[i + 2].is_ascii_hexdigit()
            && raw[i + 3].is_ascii_hexdigit()
        {
            let byte = hex_value(raw[i + 2]) * 16 + hex_value(raw[i + 3]);
            let escape = String::from_utf8_lossy(&raw[i..i + 4]).to_string();

            match byte {
                b'$' | b'(' | b')' | b'*' | b'+' | b'.' | b'?' | b'[' | b']' | b'^' | b'|'
                | b'{' | b'}' | b'\\' => {
                    tracing::warn!(
                        "regexp contains a regexp control character, {}, in hex ({}). \
                         Write this as {} or \\{} depending on what you meant",
                        byte as char,
                        escape,
                        byte as char,
                        byte as char
                    );
                }
                0 => {
                    tracing::warn!(
                        "null (\\x00) in layer7 regexp, the pattern is truncated at this point"
                    );
                    return result;
                }
                _ => {}
            }

            result.push(byte);
            i += 4;
            continue;
        }

        result.push(raw[i]);
        i += 1;
    }

    result
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

/// 协议特征
#[derive(Clone)]
pub struct Pattern {
    /// 协议名（特征文件的基本名）
    name: String,
    /// 原始正则文本
    source: String,
    /// 编译后的正则
    regex: Regex,
    /// 编译期标志
    cflags: CompileFlags,
    /// 执行期标志
    eflags: ExecFlags,
    /// 协议标记
    mark: Mark,
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("cflags", &self.cflags)
            .field("eflags", &self.eflags)
            .field("mark", &self.mark)
            .finish()
    }
}

impl Pattern {
    /// 编译一个协议特征
    pub fn new(
        name: impl Into<String>,
        raw: &[u8],
        cflags: CompileFlags,
        eflags: ExecFlags,
        mark: Mark,
    ) -> Result<Self> {
        let name = name.into();
        let source = String::from_utf8_lossy(raw).to_string();

        if !cflags.extended {
            tracing::warn!(
                protocol = %name,
                "REG_EXTENDED not set, compiling as extended syntax anyway"
            );
        }

        let preprocessed = preprocess_hex_escapes(raw);
        let options = SyntaxOptions {
            newline: cflags.newline,
            not_eol: eflags.not_eol,
        };
        let translated = syntax::translate(&preprocessed, options)
            .map_err(|reason| ClassifierError::pattern_compile(name.clone(), reason))?;

        let regex = RegexBuilder::new(&translated)
            .unicode(false)
            .case_insensitive(cflags.icase)
            .multi_line(cflags.newline)
            .build()
            .map_err(|e| ClassifierError::pattern_compile(name.clone(), e.to_string()))?;

        tracing::trace!(protocol = %name, regex = %translated, "compiled pattern");

        Ok(Self {
            name,
            source,
            regex,
            cflags,
            eflags,
            mark,
        })
    }

    /// 检测缓冲区是否匹配
    pub fn matches(&self, buffer: &[u8]) -> bool {
        let pad_tail = self.eflags.not_eol && self.cflags.newline;
        if !self.eflags.not_bol && !pad_tail {
            return self.regex.is_match(buffer);
        }

        // 头部 NUL 让 ^ 不在缓冲区开头生效，搜索从它之后开始。
        // 尾部 NUL 让多行 $ 不在缓冲区结尾生效；编译时已排除一切能匹配 NUL 的构造，
        // 所以只需丢弃起点落在填充之后的匹配
        let mut haystack = Vec::with_capacity(buffer.len() + 2);
        let start = if self.eflags.not_bol {
            haystack.push(0);
            1
        } else {
            0
        };
        haystack.extend_from_slice(buffer);
        let end = haystack.len();
        if pad_tail {
            haystack.push(0);
        }

        self.regex
            .find_at(&haystack, start)
            .map_or(false, |m| m.start() <= end)
    }

    /// 获取协议名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 获取原始正则文本
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 获取协议标记
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// 获取编译期标志
    pub fn compile_flags(&self) -> CompileFlags {
        self.cflags
    }

    /// 获取执行期标志
    pub fn exec_flags(&self) -> ExecFlags {
        self.eflags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(v: u32) -> Mark {
        Mark::new(v).unwrap()
    }

    #[test]
    fn test_hex_substitution() {
        assert_eq!(preprocess_hex_escapes(br"^\x16\x03"), vec![b'^', 0x16, 0x03]);
        assert_eq!(preprocess_hex_escapes(br"a\x41b"), b"aAb".to_vec());
    }

    #[test]
    fn test_hex_after_backslash_is_substituted() {
        assert_eq!(preprocess_hex_escapes(br"\\x41"), br"\A".to_vec());
    }

    #[test]
    fn test_hex_nul_truncates() {
        assert_eq!(preprocess_hex_escapes(br"ab\x00cd"), b"ab".to_vec());
    }

    #[test]
    fn test_hex_metachar_is_substituted() {
        assert_eq!(preprocess_hex_escapes(br"a\x2eb"), b"a.b".to_vec());
    }

    #[test]
    fn test_default_flags_case_insensitive() {
        let p = Pattern::new(
            "http",
            b"^get |^post |^head ",
            CompileFlags::default(),
            ExecFlags::default(),
            mark(80),
        )
        .unwrap();
        assert!(p.matches(b"GET / HTTP/1.1\r\n"));
        assert!(!p.matches(b"PUT / HTTP/1.1\r\n"));
    }

    #[test]
    fn test_binary_pattern() {
        let p = Pattern::new(
            "ssl",
            br"^\x16\x03[\x01-\x03]",
            CompileFlags::default(),
            ExecFlags::default(),
            mark(443),
        )
        .unwrap();
        assert!(p.matches(&[0x16, 0x03, 0x01, 0x02]));
        assert!(!p.matches(&[0x17, 0x03, 0x01]));
    }

    #[test]
    fn test_not_bol() {
        let eflags = ExecFlags {
            not_bol: true,
            not_eol: false,
        };
        let p = Pattern::new("x", b"^abc", CompileFlags::default(), eflags, mark(1)).unwrap();
        assert!(!p.matches(b"abc"));
    }

    #[test]
    fn test_not_eol() {
        let eflags = ExecFlags {
            not_bol: false,
            not_eol: true,
        };
        let p = Pattern::new("x", b"abc$", CompileFlags::default(), eflags, mark(1)).unwrap();
        assert!(!p.matches(b"xabc"));

        let dot = Pattern::new("y", b"abc.", CompileFlags::default(), eflags, mark(1)).unwrap();
        assert!(!dot.matches(b"abc"));
        assert!(dot.matches(b"abcd"));
    }

    fn not_eol(regex: &[u8], cflags: CompileFlags) -> Pattern {
        let eflags = ExecFlags {
            not_bol: false,
            not_eol: true,
        };
        Pattern::new("x", regex, cflags, eflags, mark(1)).unwrap()
    }

    #[test]
    fn test_not_eol_buffer_end_is_not_line_end() {
        let cflags = CompileFlags::default();
        assert!(!not_eol(b"$", cflags).matches(b"abc"));
        assert!(!not_eol(br"abc\W", cflags).matches(b"abc"));
        assert!(!not_eol(b"abc[[:cntrl:]]", cflags).matches(b"abc"));

        assert!(not_eol(br"abc\W", cflags).matches(b"abc!"));
        assert!(not_eol(b"abc[[:cntrl:]]", cflags).matches(b"abc\r"));
        assert!(not_eol(b"ab", cflags).matches(b"xabx"));
    }

    #[test]
    fn test_not_eol_with_newline() {
        let cflags = CompileFlags {
            newline: true,
            ..CompileFlags::default()
        };
        let p = not_eol(b"abc$", cflags);
        assert!(!p.matches(b"abc"));
        assert!(p.matches(b"abc\nnext"));
        assert!(!p.matches(b"abc\r\nnext"));
        assert!(p.matches(b"xyz\nabc\nmore"));

        assert!(!not_eol(b"$", cflags).matches(b"abc"));
        assert!(not_eol(b"$", cflags).matches(b"a\nb"));
        assert!(!not_eol(br"abc\W", cflags).matches(b"abc"));
        assert!(!not_eol(b"abc[[:cntrl:]]", cflags).matches(b"abc"));
        assert!(not_eol(b"abc[[:cntrl:]]", cflags).matches(b"abc\n"));
    }

    #[test]
    fn test_back_reference_fails_to_compile() {
        let err = Pattern::new("x", br"(a)\1", CompileFlags::default(), ExecFlags::default(), mark(1))
            .unwrap_err();
        assert!(matches!(err, ClassifierError::PatternCompile { .. }));
    }

    #[test]
    fn test_case_sensitive_flags() {
        let p = Pattern::new("x", b"^GET", CompileFlags::empty(), ExecFlags::default(), mark(1))
            .unwrap();
        assert!(p.matches(b"GET /"));
        assert!(!p.matches(b"get /"));
    }

    #[test]
    fn test_compile_failure() {
        let err = Pattern::new("bad", b"(abc", CompileFlags::default(), ExecFlags::default(), mark(1))
            .unwrap_err();
        assert!(matches!(err, ClassifierError::PatternCompile { .. }));
    }

    #[test]
    fn test_flag_tokens() {
        assert_eq!(FlagToken::parse("REG_ICASE"), Some(FlagToken::Icase));
        assert_eq!(FlagToken::parse("reg_notbol"), Some(FlagToken::NotBol));
        assert_eq!(FlagToken::parse("REG_BOGUS"), None);
    }
}
