//! Best-effort coercion of model output into a JSON object.
//!
//! Models are asked for bare JSON but regularly wrap it in markdown fences,
//! sprinkle comments, leave trailing commas or forget to escape quotes and
//! backslashes. [`repair`] runs increasingly aggressive passes, each one on
//! the output of the previous, and settles on the first text that parses to
//! an object. When nothing parses the canned [`Lesson::fallback`] is used.

use crate::domain::model::Lesson;
use crate::utils::logger::truncate_for_log;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Characters that may legally follow a backslash inside a JSON string.
const VALID_ESCAPES: &str = "\"\\/bfnrt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStage {
    /// Fences, comments and trailing commas removed; whitespace normalised.
    Clean,
    /// Control characters dropped, stray backslashes and inner quotes escaped.
    Escaped,
    /// The `examples` array rebuilt item by item.
    ArrayPatched,
    Fallback,
}

impl RepairStage {
    pub fn is_fallback(&self) -> bool {
        matches!(self, RepairStage::Fallback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Value,
    pub stage: RepairStage,
}

pub fn repair(raw: &str) -> Repaired {
    let cleaned = clean(raw);
    match parse_object(&cleaned) {
        Ok(value) => {
            tracing::debug!("AI response parsed after cleanup");
            return Repaired {
                value,
                stage: RepairStage::Clean,
            };
        }
        Err(e) => {
            tracing::warn!("JSON parse error, attempting to fix: {}", e);
            tracing::debug!("Problematic JSON: {}", truncate_for_log(&cleaned, 500));
        }
    }

    let escaped = fix_escapes(&cleaned);
    match parse_object(&escaped) {
        Ok(value) => {
            tracing::info!("AI response parsed after escape fixes");
            return Repaired {
                value,
                stage: RepairStage::Escaped,
            };
        }
        Err(e) => tracing::warn!("Second JSON parse error, patching arrays: {}", e),
    }

    let patched = patch_examples_array(&escaped);
    match parse_object(&patched) {
        Ok(value) => {
            tracing::info!("AI response parsed after array patch");
            Repaired {
                value,
                stage: RepairStage::ArrayPatched,
            }
        }
        Err(e) => {
            tracing::error!("Final JSON parse error, serving fallback lesson: {}", e);
            tracing::debug!("Final problematic JSON: {}", truncate_for_log(&patched, 500));
            Repaired {
                value: fallback_value(),
                stage: RepairStage::Fallback,
            }
        }
    }
}

pub fn fallback_value() -> Value {
    serde_json::to_value(Lesson::fallback()).unwrap_or_default()
}

fn parse_object(text: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("top-level JSON value is not an object".to_string())
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex pattern"))
}

/// 第一階段：去除 markdown、註解與多餘逗號
pub fn clean(raw: &str) -> String {
    static FENCE_JSON: OnceLock<Regex> = OnceLock::new();
    static FENCE: OnceLock<Regex> = OnceLock::new();
    static COMMA_BRACE: OnceLock<Regex> = OnceLock::new();
    static COMMA_BRACKET: OnceLock<Regex> = OnceLock::new();

    let text = regex(&FENCE_JSON, r"```json\s*").replace_all(raw, "");
    let text = regex(&FENCE, r"```\s*").replace_all(&text, "");
    let text = strip_comments(&text);
    let text = extract_object(&text);
    let text = regex(&COMMA_BRACE, r",\s*\}").replace_all(text, "}");
    let text = regex(&COMMA_BRACKET, r",\s*\]").replace_all(&text, "]");

    text.replace('\n', " ")
        .replace('\r', "")
        .replace('\t', " ")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .trim()
        .to_string()
}

/// Remove `//` and `/* */` comments that sit outside string literals.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// First `{` through last `}`; the text is returned untouched if there is no such span.
fn extract_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// 第二階段：處理控制字元、反斜線與字串內未跳脫的引號
pub fn fix_escapes(text: &str) -> String {
    static CONTROL: OnceLock<Regex> = OnceLock::new();

    let text = regex(&CONTROL, r"[\x00-\x1F\x7F-\x9F]").replace_all(text, "");
    let text = escape_stray_backslashes(&text);
    escape_inner_quotes(&text)
}

fn escape_stray_backslashes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some(&next) if VALID_ESCAPES.contains(next) => {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            Some('u') if is_unicode_escape(&chars[i + 2..]) => {
                out.push_str("\\u");
                i += 2;
            }
            // stray or trailing backslash, including LaTeX such as \underline
            _ => {
                out.push_str("\\\\");
                i += 1;
            }
        }
    }

    out
}

/// `\u` is only an escape when exactly four hex digits follow.
fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(char::is_ascii_hexdigit)
}

/// Escape quotes that open and close inside a string value.
///
/// A quote inside a string only counts as the closing one when the next
/// non-whitespace character is a structural `,` `}` `]` `:` or the end of
/// input; anything else means the model forgot to escape it.
fn escape_inner_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
            '"' => {
                if closes_string(&chars[i + 1..]) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn closes_string(rest: &[char]) -> bool {
    matches!(
        rest.iter().copied().find(|c| !c.is_whitespace()),
        None | Some(',' | '}' | ']' | ':')
    )
}

/// 第三階段：逐項重建 examples 陣列
pub fn patch_examples_array(text: &str) -> String {
    static EXAMPLES: OnceLock<Regex> = OnceLock::new();

    regex(&EXAMPLES, r#"(?s)"examples"\s*:\s*\[(.*?)\]"#)
        .replace(text, |caps: &Captures| {
            let inner = caps[1].trim();
            if inner.is_empty() {
                return r#""examples": []"#.to_string();
            }

            let items: Vec<String> = inner
                .split("\",")
                .map(|item| {
                    let item = item.trim().replace("\\\"", "\"");
                    let item = item.strip_prefix('"').unwrap_or(&item);
                    let item = item.strip_suffix('"').unwrap_or(item);
                    format!("\"{}\"", item.replace('"', "\\\""))
                })
                .collect();

            format!(r#""examples": [{}]"#, items.join(", "))
        })
        .into_owned()
}
