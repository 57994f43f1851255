use std::fmt;

use crate::error::{CirunError, Result};

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// A condition over the triggering branch name.
///
/// Parsed from `if:` expressions of the form `github.ref == 'refs/heads/main'`
/// or `github.ref_name != 'main'`. A missing `if:` is `Always`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchPredicate {
    Always,
    Equals(String),
    NotEquals(String),
}

impl BranchPredicate {
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: &str| CirunError::InvalidPredicate {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let mut body = expression.trim();
        if let Some(inner) = body
            .strip_prefix("${{")
            .and_then(|rest| rest.strip_suffix("}}"))
        {
            body = inner.trim();
        }

        if body.is_empty() || body == "always()" || body == "true" {
            return Ok(Self::Always);
        }

        let (lhs, rhs, negated) = if let Some((lhs, rhs)) = body.split_once("!=") {
            (lhs, rhs, true)
        } else if let Some((lhs, rhs)) = body.split_once("==") {
            (lhs, rhs, false)
        } else {
            return Err(invalid("expected `==` or `!=` comparison"));
        };

        let literal = rhs
            .trim()
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .ok_or_else(|| invalid("right-hand side must be a single-quoted string"))?;

        let branch = match lhs.trim() {
            "github.ref" => literal
                .strip_prefix(BRANCH_REF_PREFIX)
                .ok_or_else(|| invalid("only `refs/heads/` refs can be compared"))?,
            "github.ref_name" => literal,
            _ => return Err(invalid("only `github.ref` and `github.ref_name` are supported")),
        };

        if branch.is_empty() {
            return Err(invalid("branch name is empty"));
        }

        Ok(if negated {
            Self::NotEquals(branch.to_string())
        } else {
            Self::Equals(branch.to_string())
        })
    }

    pub fn evaluate(&self, branch: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Equals(expected) => branch == expected,
            Self::NotEquals(excluded) => branch != excluded,
        }
    }

    /// Whether some single branch satisfies both predicates.
    pub fn compatible_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Equals(a), Self::Equals(b)) => a == b,
            (Self::Equals(a), Self::NotEquals(b)) | (Self::NotEquals(b), Self::Equals(a)) => {
                a != b
            }
            _ => true,
        }
    }
}

/// Whether one branch satisfies every predicate at once.
///
/// With a non-empty `triggers` list the branch must also be one of them.
pub fn jointly_satisfiable(predicates: &[&BranchPredicate], triggers: &[String]) -> bool {
    if triggers.is_empty() {
        return predicates
            .iter()
            .enumerate()
            .all(|(i, a)| predicates[i + 1..].iter().all(|b| a.compatible_with(b)));
    }

    triggers
        .iter()
        .any(|branch| predicates.iter().all(|p| p.evaluate(branch)))
}

impl fmt::Display for BranchPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Equals(branch) => write!(f, "branch == {branch}"),
            Self::NotEquals(branch) => write!(f, "branch != {branch}"),
        }
    }
}
