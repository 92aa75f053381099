//! Source-text helpers for code handed to the runtime.
use worker_core::ColumnType;

/// Removes `#` comments from R source, leaving string literals and
/// backtick-quoted names untouched. Line breaks are preserved.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_comment = false;

    for ch in source.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                out.push(ch);
            }
            continue;
        }
        match quote {
            Some(open) => {
                out.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == open {
                    quote = None;
                }
            }
            None => match ch {
                '#' => in_comment = true,
                '"' | '\'' | '`' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                _ => out.push(ch),
            },
        }
    }
    out
}

/// True when nothing but whitespace remains once comments are gone.
pub fn is_blank_code(source: &str) -> bool {
    strip_comments(source).trim().is_empty()
}

/// Wraps user code so its values are written into `column_name` as `column_type`
/// and the setter's answer comes back as a string.
pub fn wrap_computed_column(column_name: &str, code: &str, column_type: ColumnType) -> String {
    let escaped_name = column_name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "local({{;calcedVals <- {{{code}}};\nreturn(toString({setter}('{escaped_name}', calcedVals)));}})",
        setter = column_type.setter_function(),
    )
}
