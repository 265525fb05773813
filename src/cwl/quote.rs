// src/cwl/quote.rs
//
// Shell quoting for synthesized command-line tokens.
//
// A token is quoted when it is empty or contains whitespace or one of
// | & ; ( ) < > ' " $ @. Quoting follows POSIX single-quote rules: the token
// is wrapped in '...' and every embedded ' becomes '"'"'.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

static NEEDS_QUOTING: OnceLock<Regex> = OnceLock::new();

fn needs_quoting_re() -> &'static Regex {
    NEEDS_QUOTING.get_or_init(|| {
        Regex::new(r#"^$|[\s|&;()<>'"$@]"#).expect("quoting pattern is a valid regex")
    })
}

/// True when `token` would not survive the shell unquoted.
pub fn needs_quoting(token: &str) -> bool {
    needs_quoting_re().is_match(token)
}

/// Returns `token` unchanged when it is shell-safe, quoted otherwise.
pub fn quote(token: &str) -> Cow<'_, str> {
    if !needs_quoting(token) {
        return Cow::Borrowed(token);
    }
    Cow::Owned(format!("'{}'", token.replace('\'', r#"'"'"'"#)))
}

/// Quotes each token as needed and joins them with single spaces.
pub fn join<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| quote(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
