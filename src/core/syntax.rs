//! 正则语法转换模块
//!
//! 特征文件使用 POSIX 扩展正则（ERE）书写，这里把经过十六进制替换后的
//! 字节序列转换为 `regex` crate 能够编译的语法。
//!
//! 主要差异：
//! - 方括号表达式内反斜杠是普通字符；
//! - 没有可重复对象的 `*`、`+`、`?` 以及不构成区间的 `{` 是普通字符；
//! - 连续的量词（如 `a**`）在 ERE 中合法；
//! - 非 ASCII 可打印字节需要写成 `\xHH`；
//! - 不支持反向引用 `\1`..`\9`，遇到时报错。
//!
//! REG_NOTEOL：未设置 REG_NEWLINE 时 `$` 只能匹配缓冲区结尾，因此直接转换为
//! 永不成立的断言；设置了 REG_NEWLINE 时缓冲区尾部会追加一个 NUL，
//! 所有可能匹配 NUL 的构造都要把它排除。

/// 转换选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyntaxOptions {
    /// `.` 与否定方括号不匹配换行（REG_NEWLINE）
    pub newline: bool,
    /// 缓冲区结尾不视为行尾（REG_NOTEOL）
    pub not_eol: bool,
}

impl SyntaxOptions {
    /// 匹配时缓冲区尾部是否带 NUL 填充
    pub fn pads_tail(&self) -> bool {
        self.newline && self.not_eol
    }
}

/// 永不成立的零宽断言
const NEVER: &str = r"\b\B";

const POSIX_CLASSES: &[&str] = &[
    "alnum", "alpha", "blank", "cntrl", "digit", "graph", "lower", "print", "punct", "space",
    "upper", "xdigit",
];

/// 方括号表达式中的单个元素
#[derive(Debug, Clone)]
enum ClassItem {
    Byte(u8),
    Range(u8, u8),
    Named(String),
}

/// 将 POSIX ERE 转换为 `regex` 语法
pub fn translate(pattern: &[u8], options: SyntaxOptions) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() * 2);
    // 最近一个可被量词修饰的原子在 out 中的起始位置
    let mut atom_start: Option<usize> = None;
    let mut last_was_quantifier = false;
    let mut groups: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < pattern.len() {
        let b = pattern[i];
        match b {
            b'\\' => {
                let start = out.len();
                match pattern.get(i + 1) {
                    None => {
                        push_byte(&mut out, b'\\', options);
                        i += 1;
                    }
                    Some(&n) => {
                        match n {
                            b'1'..=b'9' => {
                                return Err(format!(
                                    "back reference \\{} is not supported",
                                    n as char
                                ));
                            }
                            b'W' | b'S' | b'D' if options.pads_tail() => {
                                out.push_str(r"[^\x00\");
                                out.push(n.to_ascii_lowercase() as char);
                                out.push(']');
                            }
                            b'w' | b'W' | b's' | b'S' | b'd' | b'D' => {
                                out.push('\\');
                                out.push(n as char);
                            }
                            b'b' | b'B' => {
                                out.push('\\');
                                out.push(n as char);
                            }
                            b'<' | b'>' => out.push_str(r"\b"),
                            _ => push_byte(&mut out, n, options),
                        }
                        i += 2;
                    }
                }
                atom_start = if out[start..].starts_with(r"\b") || out[start..].starts_with(r"\B") {
                    None
                } else {
                    Some(start)
                };
                last_was_quantifier = false;
            }
            b'[' => {
                let start = out.len();
                i = translate_bracket(pattern, i, options, &mut out)?;
                atom_start = Some(start);
                last_was_quantifier = false;
            }
            b'(' => {
                groups.push(out.len());
                out.push('(');
                atom_start = None;
                last_was_quantifier = false;
                i += 1;
            }
            b')' => {
                if let Some(start) = groups.pop() {
                    out.push(')');
                    atom_start = Some(start);
                } else {
                    let start = out.len();
                    push_literal(&mut out, b')');
                    atom_start = Some(start);
                }
                last_was_quantifier = false;
                i += 1;
            }
            b'|' => {
                out.push('|');
                atom_start = None;
                last_was_quantifier = false;
                i += 1;
            }
            b'*' | b'+' | b'?' => {
                match atom_start {
                    Some(start) => {
                        if last_was_quantifier {
                            wrap_atom(&mut out, start);
                        }
                        out.push(b as char);
                        last_was_quantifier = true;
                    }
                    None => {
                        let start = out.len();
                        push_literal(&mut out, b);
                        atom_start = Some(start);
                        last_was_quantifier = false;
                    }
                }
                i += 1;
            }
            b'{' => {
                match (atom_start, interval_end(pattern, i)) {
                    (Some(start), Some(end)) => {
                        if last_was_quantifier {
                            wrap_atom(&mut out, start);
                        }
                        for &c in &pattern[i..=end] {
                            out.push(c as char);
                        }
                        last_was_quantifier = true;
                        i = end + 1;
                    }
                    _ => {
                        let start = out.len();
                        push_literal(&mut out, b'{');
                        atom_start = Some(start);
                        last_was_quantifier = false;
                        i += 1;
                    }
                }
            }
            b'$' if options.not_eol && !options.newline => {
                out.push_str(NEVER);
                atom_start = None;
                last_was_quantifier = false;
                i += 1;
            }
            b'^' | b'$' => {
                out.push(b as char);
                atom_start = None;
                last_was_quantifier = false;
                i += 1;
            }
            b'.' => {
                let start = out.len();
                out.push_str(&any_byte(options));
                atom_start = Some(start);
                last_was_quantifier = false;
                i += 1;
            }
            _ => {
                let start = out.len();
                push_byte(&mut out, b, options);
                atom_start = Some(start);
                last_was_quantifier = false;
                i += 1;
            }
        }
    }

    if !groups.is_empty() {
        return Err("unmatched ( in pattern".to_string());
    }

    Ok(out)
}

/// 连续量词时把前一个（已带量词的）原子包成非捕获组
fn wrap_atom(out: &mut String, start: usize) {
    out.insert_str(start, "(?:");
    out.push(')');
}

fn any_byte(options: SyntaxOptions) -> String {
    match (options.newline, options.pads_tail()) {
        (false, _) => "(?s:.)".to_string(),
        (true, false) => r"[^\n]".to_string(),
        (true, true) => r"[^\n\x00]".to_string(),
    }
}

/// 判断 `{` 是否开始一个合法区间 `{m}`、`{m,}`、`{m,n}`，返回 `}` 的位置
fn interval_end(pattern: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    let digits_start = i;
    while i < pattern.len() && pattern[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if i < pattern.len() && pattern[i] == b',' {
        i += 1;
        while i < pattern.len() && pattern[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < pattern.len() && pattern[i] == b'}' {
        Some(i)
    } else {
        None
    }
}

/// 普通字节；尾部有 NUL 填充时字面 NUL 不能匹配
fn push_byte(out: &mut String, b: u8, options: SyntaxOptions) {
    if b == 0 && options.pads_tail() {
        out.push_str(r"(?:\b\B)");
    } else {
        push_literal(out, b);
    }
}

fn push_literal(out: &mut String, b: u8) {
    if b.is_ascii_alphanumeric() || b == b' ' || b == b'<' || b == b'>' || b == b'_' {
        out.push(b as char);
    } else if b.is_ascii_punctuation() {
        out.push('\\');
        out.push(b as char);
    } else {
        out.push_str(&format!(r"\x{:02X}", b));
    }
}

fn push_class_byte(out: &mut String, b: u8) {
    match b {
        b'\\' | b'[' | b']' | b'^' | b'-' | b'&' | b'~' => {
            out.push('\\');
            out.push(b as char);
        }
        _ if b.is_ascii_graphic() || b == b' ' => out.push(b as char),
        _ => out.push_str(&format!(r"\x{:02X}", b)),
    }
}

/// 转换方括号表达式，返回 `]` 之后的位置
fn translate_bracket(
    pattern: &[u8],
    open: usize,
    options: SyntaxOptions,
    out: &mut String,
) -> Result<usize, String> {
    let mut i = open + 1;
    let negated = pattern.get(i) == Some(&b'^');
    if negated {
        i += 1;
    }

    let mut items: Vec<ClassItem> = Vec::new();
    let mut first = true;

    loop {
        let b = *pattern
            .get(i)
            .ok_or_else(|| "unterminated [ in pattern".to_string())?;

        if b == b']' && !first {
            i += 1;
            break;
        }
        first = false;

        // [:class:]、[=x=]、[.x.]
        if b == b'[' {
            if let Some(&kind) = pattern.get(i + 1) {
                if kind == b':' || kind == b'=' || kind == b'.' {
                    let close = find_bracket_term(pattern, i + 2, kind)
                        .ok_or_else(|| "unterminated [: in pattern".to_string())?;
                    let body = &pattern[i + 2..close];
                    i = close + 2;
                    if kind == b':' {
                        let name = String::from_utf8_lossy(body).to_string();
                        if !POSIX_CLASSES.contains(&name.as_str()) {
                            return Err(format!("invalid character class [:{}:]", name));
                        }
                        items.push(ClassItem::Named(name));
                        continue;
                    }
                    if body.len() != 1 {
                        return Err("unsupported collating element".to_string());
                    }
                    push_item_or_range(pattern, &mut i, body[0], &mut items)?;
                    continue;
                }
            }
        }

        i += 1;
        push_item_or_range(pattern, &mut i, b, &mut items)?;
    }

    out.push('[');
    if negated {
        out.push('^');
        if options.newline {
            out.push_str(r"\n");
        }
        if options.pads_tail() {
            out.push_str(r"\x00");
        }
    }
    for item in &items {
        match item {
            ClassItem::Byte(b) => push_class_byte(out, *b),
            ClassItem::Range(lo, hi) => {
                push_class_byte(out, *lo);
                out.push('-');
                push_class_byte(out, *hi);
            }
            ClassItem::Named(name) => {
                out.push_str("[:");
                out.push_str(name);
                out.push_str(":]");
            }
        }
    }
    if !negated && options.pads_tail() {
        out.push_str(r"&&[^\x00]");
    }
    out.push(']');

    Ok(i)
}

/// 读取到一个端点后检查是否构成区间 `a-z`
fn push_item_or_range(
    pattern: &[u8],
    i: &mut usize,
    lo: u8,
    items: &mut Vec<ClassItem>,
) -> Result<(), String> {
    if pattern.get(*i) == Some(&b'-') {
        if let Some(&hi) = pattern.get(*i + 1) {
            if hi != b']' {
                if hi < lo {
                    return Err(format!(
                        "invalid range end {:?}-{:?}",
                        lo as char, hi as char
                    ));
                }
                items.push(ClassItem::Range(lo, hi));
                *i += 2;
                return Ok(());
            }
        }
    }
    items.push(ClassItem::Byte(lo));
    Ok(())
}

fn find_bracket_term(pattern: &[u8], from: usize, kind: u8) -> Option<usize> {
    (from..pattern.len().saturating_sub(1))
        .find(|&j| pattern[j] == kind && pattern[j + 1] == b']')
}
