//! Positional `%`-style formatting for message templates.
//!
//! Supported conversions: `%s` (any argument), `%d` / `%i` (numbers,
//! truncated toward zero), `%f` (numbers, six decimals) and `%%`.

use std::fmt;
use thiserror::Error;

/// One positional argument for a message template.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageArg {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for MessageArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageArg::Text(text) => f.write_str(text),
            MessageArg::Int(value) => write!(f, "{}", value),
            MessageArg::Float(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for MessageArg {
    fn from(value: &str) -> Self {
        MessageArg::Text(value.to_string())
    }
}

impl From<String> for MessageArg {
    fn from(value: String) -> Self {
        MessageArg::Text(value)
    }
}

impl From<i64> for MessageArg {
    fn from(value: i64) -> Self {
        MessageArg::Int(value)
    }
}

impl From<i32> for MessageArg {
    fn from(value: i32) -> Self {
        MessageArg::Int(i64::from(value))
    }
}

impl From<usize> for MessageArg {
    fn from(value: usize) -> Self {
        MessageArg::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MessageArg {
    fn from(value: f64) -> Self {
        MessageArg::Float(value)
    }
}

/// A template and its arguments do not fit together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("not enough arguments for format string")]
    NotEnoughArguments,

    #[error("not all arguments converted during string formatting")]
    TooManyArguments,

    #[error("%{conversion} format: a number is required, not text")]
    NumberRequired { conversion: char },

    #[error("unsupported format character '{0}'")]
    UnsupportedConversion(char),

    #[error("incomplete format")]
    Incomplete,
}

/// Substitute `args` into `template`.
///
/// Every argument must be consumed by exactly one placeholder.
pub fn format_message(template: &str, args: &[MessageArg]) -> Result<String, FormatError> {
    let mut output = String::with_capacity(template.len() + args.len() * 8);
    let mut remaining = args.iter();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        let conversion = chars.next().ok_or(FormatError::Incomplete)?;
        if conversion == '%' {
            output.push('%');
            continue;
        }

        if !matches!(conversion, 's' | 'd' | 'i' | 'f') {
            return Err(FormatError::UnsupportedConversion(conversion));
        }
        let arg = remaining.next().ok_or(FormatError::NotEnoughArguments)?;

        let rendered = match (conversion, arg) {
            ('s', arg) => arg.to_string(),
            (_, MessageArg::Text(_)) => return Err(FormatError::NumberRequired { conversion }),
            ('f', MessageArg::Int(value)) => format!("{:.6}", *value as f64),
            ('f', MessageArg::Float(value)) => format!("{:.6}", value),
            (_, MessageArg::Int(value)) => value.to_string(),
            (_, MessageArg::Float(value)) => (value.trunc() as i64).to_string(),
        };
        output.push_str(&rendered);
    }

    if remaining.next().is_some() {
        return Err(FormatError::TooManyArguments);
    }

    Ok(output)
}
