//! 可读化输出
//!
//! 把捕获的载荷渲染成便于运维人员查看的文本。

/// 渲染单个字节：可打印字符原样输出，空白变为空格，其余变为 `.`
pub fn friendly_byte(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else if byte.is_ascii_whitespace() || byte == 0x0b {
        ' '
    } else {
        '.'
    }
}

/// 渲染整段载荷
pub fn friendly_print(data: &[u8]) -> String {
    data.iter().copied().map(friendly_byte).collect()
}
