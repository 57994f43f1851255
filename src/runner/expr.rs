use std::collections::HashMap;

use log::warn;

use super::run::Trigger;
use crate::error::{CirunError, Result};

/// Values visible to `${{ ... }}` expressions in scripts and action inputs.
pub struct ExpressionContext<'a> {
    pub trigger: &'a Trigger,
    /// Backing store for both `secrets.*` and `env.*`
    pub environment: &'a HashMap<String, String>,
}

impl ExpressionContext<'_> {
    fn resolve(&self, expression: &str) -> Result<String> {
        let invalid = |reason: &str| CirunError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let (scope, key) = expression
            .split_once('.')
            .ok_or_else(|| invalid("expected `<context>.<name>`"))?;

        match (scope, key) {
            ("github", "sha") => Ok(self.trigger.sha.clone()),
            ("github", "ref") => Ok(self.trigger.git_ref()),
            ("github", "ref_name") => Ok(self.trigger.branch.clone()),
            ("github", "event_name") => Ok("push".to_string()),
            ("github", _) => Err(invalid("unsupported `github` property")),
            ("secrets" | "env", name) => Ok(self.environment.get(name).cloned().unwrap_or_else(|| {
                warn!("{scope}.{name} is not set, substituting an empty string");
                String::new()
            })),
            _ => Err(invalid("unknown context")),
        }
    }

    /// Replaces every `${{ <context>.<name> }}` in `input`.
    pub fn interpolate(&self, input: &str) -> Result<String> {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${{") {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + 3..];

            let end = after_open
                .find("}}")
                .ok_or_else(|| CirunError::InvalidExpression {
                    expression: rest[start..].to_string(),
                    reason: "missing closing `}}`".to_string(),
                })?;

            output.push_str(&self.resolve(after_open[..end].trim())?);
            rest = &after_open[end + 2..];
        }

        output.push_str(rest);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment() -> HashMap<String, String> {
        HashMap::from([
            ("DOCKER_IMAGE".to_string(), "ghcr.io/acme/app".to_string()),
            ("HOME".to_string(), "/home/ci".to_string()),
        ])
    }

    #[test]
    fn test_interpolates_github_context() {
        let trigger = Trigger::push("main", "deadbeef");
        let env = environment();
        let ctx = ExpressionContext {
            trigger: &trigger,
            environment: &env,
        };

        let result = ctx
            .interpolate("docker tag ${{ secrets.DOCKER_IMAGE }}:${{ github.sha }} ${{secrets.DOCKER_IMAGE}}:${{ github.ref_name }}")
            .unwrap();
        assert_eq!(
            result,
            "docker tag ghcr.io/acme/app:deadbeef ghcr.io/acme/app:main"
        );
    }

    #[test]
    fn test_interpolates_ref_and_env() {
        let trigger = Trigger::push("dev", "abc");
        let env = environment();
        let ctx = ExpressionContext {
            trigger: &trigger,
            environment: &env,
        };

        assert_eq!(
            ctx.interpolate("${{ github.ref }} in ${{ env.HOME }}").unwrap(),
            "refs/heads/dev in /home/ci"
        );
    }

    #[test]
    fn test_missing_secret_is_empty() {
        let trigger = Trigger::push("dev", "abc");
        let env = HashMap::new();
        let ctx = ExpressionContext {
            trigger: &trigger,
            environment: &env,
        };

        assert_eq!(ctx.interpolate("token=${{ secrets.TOKEN }};").unwrap(), "token=;");
    }

    #[test]
    fn test_text_without_expressions_is_unchanged() {
        let trigger = Trigger::push("dev", "abc");
        let env = HashMap::new();
        let ctx = ExpressionContext {
            trigger: &trigger,
            environment: &env,
        };

        assert_eq!(ctx.interpolate("echo $HOME {}").unwrap(), "echo $HOME {}");
    }

    #[test]
    fn test_rejects_unknown_context_and_unclosed_expression() {
        let trigger = Trigger::push("dev", "abc");
        let env = HashMap::new();
        let ctx = ExpressionContext {
            trigger: &trigger,
            environment: &env,
        };

        assert!(ctx.interpolate("${{ matrix.os }}").is_err());
        assert!(ctx.interpolate("${{ github.actor }}").is_err());
        assert!(ctx.interpolate("echo ${{ github.sha").is_err());
    }
}
