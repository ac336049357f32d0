//! `format` transform: named case/trim helpers plus a single-argument
//! printf-style fallback.

use crate::payload::Value;

#[derive(Debug, PartialEq, Eq)]
pub(super) enum FormatError {
    UnknownConversion(char),
    NotAnInteger,
    NotANumber,
    MissingArgument,
    Truncated,
}

/// Apply `format` to `value`. Any failure falls back to the plain display
/// string of the value.
pub(super) fn apply(value: &Value, format: Option<&str>) -> String {
    let Some(format) = format else {
        return value.to_string();
    };

    match format.to_lowercase().as_str() {
        "uppercase" => value.to_string().to_uppercase(),
        "lowercase" => value.to_string().to_lowercase(),
        "trim" => value.to_string().trim().to_string(),
        _ => printf(format, value).unwrap_or_else(|err| {
            tracing::warn!(format, value = %value, ?err, "format pattern could not be applied");
            value.to_string()
        }),
    }
}

/// Render `pattern` with `value` as its only argument.
///
/// Supported conversions: `%s`, `%d`, `%x`, `%f`, `%.Nf` and the `%%` escape.
pub(super) fn printf(pattern: &str, value: &Value) -> Result<String, FormatError> {
    let mut out = String::with_capacity(pattern.len());
    let mut consumed = false;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            precision = Some(digits.parse().map_err(|_| FormatError::Truncated)?);
        }

        let conversion = chars.next().ok_or(FormatError::Truncated)?;
        if conversion == '%' {
            out.push('%');
            continue;
        }
        if consumed {
            return Err(FormatError::MissingArgument);
        }
        consumed = true;

        match conversion {
            's' => out.push_str(&value.to_string()),
            'd' => {
                let n = value.as_i64().ok_or(FormatError::NotAnInteger)?;
                out.push_str(&n.to_string());
            }
            'x' => {
                let n = value.as_i64().ok_or(FormatError::NotAnInteger)?;
                out.push_str(&format!("{n:x}"));
            }
            'f' => {
                let f = value.as_f64().ok_or(FormatError::NotANumber)?;
                let precision = precision.unwrap_or(6);
                out.push_str(&format!("{f:.precision$}"));
            }
            other => return Err(FormatError::UnknownConversion(other)),
        }
    }

    Ok(out)
}
