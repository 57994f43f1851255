use super::parse::parse_workflow;
use super::types::Workflow;
use crate::error::Result;

/// The project workflow: formatting and type checks, Docker image build and
/// push, documentation build, and documentation deployment.
const BUILTIN_WORKFLOW: &str = include_str!("../../workflows/ci.yml");

pub fn builtin_workflow() -> Result<Workflow> {
    parse_workflow(BUILTIN_WORKFLOW)
}
