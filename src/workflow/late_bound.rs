// src/workflow/late_bound.rs
//
// Late-bound parameters.
//
// Some values only exist once the remote system instantiates a job (the run
// number is the job ID there). CWL inputs are static, so the input document
// carries a numeric placeholder (`--run 42`) and the step's argument tokens
// are patched with the job's token after binding, before quoting. Literal
// arguments that merely contain `--run 5` are never touched.

use regex::Regex;

use crate::cwl::quote;

/// Flag carrying the per-job run number.
pub const RUN_FLAG: &str = "--run";

#[derive(Debug, Clone)]
pub struct LateBoundParameter {
    flag: String,
    // `<flag>=<digits>` as a single token
    joined: Regex,
    digits: Regex,
}

/// A placeholder token that was replaced by a late-bound value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundToken {
    pub index: usize,
    pub tokens: Vec<String>,
}

impl BoundToken {
    /// Joins the tokens with shell quoting, except the bound one, which the
    /// remote system must see verbatim (`@{JOB_ID}` would otherwise be quoted).
    pub fn render(&self) -> String {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if i == self.index {
                    t.clone()
                } else {
                    quote::quote(t).into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl LateBoundParameter {
    pub fn new(flag: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            flag: flag.to_string(),
            joined: Regex::new(&format!(r"^{}=\d+$", regex::escape(flag)))?,
            digits: Regex::new(r"^\d+$")?,
        })
    }

    pub fn run_number() -> Self {
        Self::new(RUN_FLAG).expect("run flag pattern is a valid regex")
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    /// Replaces the first `<flag> <digits>` token pair (or `<flag>=<digits>`
    /// token) with `value`. `None` when the tokens carry no such placeholder.
    pub fn bind(&self, tokens: &[String], value: &str) -> Option<BoundToken> {
        let (index, replacement) = tokens.iter().enumerate().find_map(|(i, token)| {
            if *token == self.flag {
                let next = tokens.get(i + 1)?;
                self.digits
                    .is_match(next)
                    .then(|| (i + 1, value.to_string()))
            } else if self.joined.is_match(token) {
                Some((i, format!("{}={}", self.flag, value)))
            } else {
                None
            }
        })?;

        let mut tokens = tokens.to_vec();
        tokens[index] = replacement;
        Some(BoundToken { index, tokens })
    }
}
