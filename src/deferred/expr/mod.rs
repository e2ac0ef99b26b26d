//! Restricted expression language for deferred values.
//!
//! Expressions see nothing but a [`Scope`] (the configuration being resolved)
//! and a fixed table of builtin functions. There is no access to the host
//! environment.

mod builtins;
mod eval;
mod lexer;
mod parser;

pub use eval::{evaluate, member, stringify, truthy, Scope};
pub use parser::{parse, BinaryOp, Expr, Segment, UnaryOp};

use std::fmt;

/// One step of a path into a configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Field(name) => write!(f, "{name}"),
            PathKey::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Render a path as `a.b[0].c`.
pub fn format_path(path: &[PathKey]) -> String {
    let mut out = String::new();
    for key in path {
        match key {
            PathKey::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathKey::Index(i) => out.push_str(&format!("[{i}]")),
        }
    }
    if out.is_empty() {
        out.push_str("<root>");
    }
    out
}

/// Expression failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("{0}")]
    Runtime(String),
}

impl ExprError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        ExprError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ExprError::Runtime(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_path() {
        let path = vec![
            PathKey::Field("grid".into()),
            PathKey::Field("columns".into()),
            PathKey::Index(2),
        ];
        assert_eq!(format_path(&path), "grid.columns[2]");
        assert_eq!(format_path(&[]), "<root>");
        assert_eq!(format_path(&[PathKey::Index(0)]), "[0]");
    }
}
