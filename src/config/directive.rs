//! Parser for the `uwsgi <from> <to>` directive.
//!
//! A directive file holds one directive per line; blank lines and `#`
//! comments are skipped. Every occurrence appends one [`RouteConfig`], so
//! declaration order is preserved.

use thiserror::Error;

use crate::config::schema::RouteConfig;

/// Directive keyword.
pub const DIRECTIVE: &str = "uwsgi";

/// Errors raised while reading directives. All of them abort startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("line {line}: unknown directive '{name}'")]
    Unknown { line: usize, name: String },

    #[error("line {line}: wrong argument count, expected 'uwsgi <from> <to>'")]
    ArgCount { line: usize },

    #[error("line {line}: backend address must not be empty")]
    EmptyAddress { line: usize },
}

/// Parse a directive block into an ordered route list.
pub fn parse_directives(input: &str) -> Result<Vec<RouteConfig>, DirectiveError> {
    let mut routes = Vec::new();

    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let mut tokens = content.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        if name != DIRECTIVE {
            return Err(DirectiveError::Unknown {
                line,
                name: name.to_string(),
            });
        }

        let args: Vec<&str> = tokens.collect();
        routes.push(route_from_args(&args).map_err(|e| e.at_line(line))?);
    }

    Ok(routes)
}

/// Build a route from the two directive arguments.
///
/// Shared by the file parser and the `--uwsgi FROM TO` command-line flag.
pub fn route_from_args<S: AsRef<str>>(args: &[S]) -> Result<RouteConfig, DirectiveError> {
    let [from, to] = args else {
        return Err(DirectiveError::ArgCount { line: 0 });
    };

    let to = unquote(to.as_ref());
    if to.is_empty() {
        return Err(DirectiveError::EmptyAddress { line: 0 });
    }

    Ok(RouteConfig::new(unquote(from.as_ref()), to))
}

fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}

impl DirectiveError {
    fn at_line(self, line: usize) -> Self {
        match self {
            DirectiveError::Unknown { name, .. } => DirectiveError::Unknown { line, name },
            DirectiveError::ArgCount { .. } => DirectiveError::ArgCount { line },
            DirectiveError::EmptyAddress { .. } => DirectiveError::EmptyAddress { line },
        }
    }
}
