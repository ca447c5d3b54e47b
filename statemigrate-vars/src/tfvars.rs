//! Variables-file rendering.
//!
//! One `key = "value"` line per variable, keys ascending, every value a
//! quoted HCL string. Values are escaped so they are never interpolated.

use std::fmt::Write as _;

use statemigrate_core::VariableMap;

/// A rendered variables file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVars {
    pub content: String,
    /// Keys whose value is the literal string `"null"`.
    pub null_keys: Vec<String>,
}

pub fn render_tfvars(vars: &VariableMap) -> RenderedVars {
    let mut content = String::new();
    let mut null_keys = Vec::new();

    // VariableMap iterates in ascending key order.
    for (key, value) in vars.iter() {
        if value == "null" {
            tracing::warn!(
                key,
                "variable has the value \"null\"; if it is sensitive in the remote workspace, supply it as a sensitive variable instead"
            );
            null_keys.push(key.to_owned());
        }
        let _ = writeln!(content, "{key} = \"{}\"", escape_hcl(value));
    }

    RenderedVars { content, null_keys }
}

/// Escape `raw` for use inside a double-quoted HCL string.
pub fn escape_hcl(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
