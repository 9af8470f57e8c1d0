//! 框架属性文件 (framework.properties)
//!
//! 支持的格式与 Java properties 文本格式一致：
//!
//! - `key=value`、`key: value`、`key value` 三种分隔方式
//! - `#` 或 `!` 开头的注释行
//! - 行尾奇数个反斜杠表示续行，续行的前导空白被忽略
//! - `\t` `\n` `\r` `\f` `\uXXXX` 转义，其余 `\x` 解析为 `x`
//!
//! 文件内容按 UTF-8 解码。

use std::collections::BTreeMap;

use crate::utils::{LauncherError, Result};

/// 有序的框架配置表
pub type ConfigMap = BTreeMap<String, String>;

/// 解析 properties 文本
pub fn parse(bytes: &[u8]) -> Result<ConfigMap> {
    let mut map = ConfigMap::new();
    load_into(&mut map, bytes)?;
    Ok(map)
}

/// 解析 properties 文本并覆盖写入已有的配置表
pub fn load_into(map: &mut ConfigMap, bytes: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let line_no = index + 1;
        let mut logical = trimmed.to_string();
        while has_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical, line_no)?;
        map.insert(key, value);
    }

    Ok(())
}

/// 把配置表序列化为 properties 文本
///
/// 输出按键排序，可选的说明写为首行注释。
pub fn store(map: &ConfigMap, comment: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(comment) = comment {
        for line in comment.lines() {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }
    for (key, value) in map {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

/// 行尾是否为奇数个反斜杠
fn has_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str, line_no: usize) -> Result<(String, String)> {
    let mut key_end = line.len();
    let mut value_start = line.len();
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                value_start = i + 1;
                break;
            }
            c if c.is_whitespace() => {
                key_end = i;
                let rest = line[i..].trim_start();
                value_start = line.len() - rest.len();
                if rest.starts_with('=') || rest.starts_with(':') {
                    value_start += 1;
                }
                break;
            }
            _ => {}
        }
    }

    let key = unescape(&line[..key_end], line_no)?;
    let value = unescape(line[value_start..].trim_start(), line_no)?;
    Ok((key, value))
}

fn unescape(raw: &str, line: usize) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = if hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()) {
                    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
                } else {
                    None
                };
                let decoded = decoded.ok_or_else(|| LauncherError::InvalidProperties {
                    line,
                    reason: format!("无效的 \\u 转义序列: \\u{}", hex),
                })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

fn escape(raw: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{000C}' => out.push_str("\\f"),
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
