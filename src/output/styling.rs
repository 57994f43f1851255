use std::fmt::Display;

use console::{style, StyledObject};

use crate::runner::StageStatus;

/// Green for a passing outcome, red for a failing one.
pub fn outcome(text: impl Display, passed: bool) -> StyledObject<String> {
    let styled = style(text.to_string()).bright();
    if passed {
        styled.green()
    } else {
        styled.red()
    }
}

/// Stage name with a check or cross, as shown when its spinner stops.
pub fn stage_marker(stage: &str, status: StageStatus) -> StyledObject<String> {
    match status {
        StageStatus::Failed => outcome(format!("{stage} ✗"), false),
        _ => outcome(format!("{stage} ✓"), true),
    }
}

pub fn bright_yellow(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn cyan(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn banner(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_marker() {
        assert_eq!(
            stage_marker("check", StageStatus::Failed).force_styling(false).to_string(),
            "check ✗"
        );
        assert_eq!(
            stage_marker("check", StageStatus::Succeeded).force_styling(false).to_string(),
            "check ✓"
        );
    }
}
