use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::predicate::{jointly_satisfiable, BranchPredicate};
use super::types::{Stage, Workflow};
use crate::error::{CirunError, Result};

/// A static warning about the stage graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    pub stage: String,
    pub message: String,
}

/// Checks stage ids are unique, every `needs` entry names a declared stage
/// and the graph is acyclic.
pub(super) fn validate_graph(workflow: &Workflow) -> Result<()> {
    let mut seen = HashSet::new();
    for stage in &workflow.stages {
        if !seen.insert(stage.id.as_str()) {
            return Err(CirunError::Workflow(format!(
                "stage '{}' is declared twice",
                stage.id
            )));
        }
    }

    for stage in &workflow.stages {
        if let Some(dependency) = stage
            .needs
            .iter()
            .find(|dep| !seen.contains(dep.as_str()))
        {
            return Err(CirunError::UnknownDependency {
                stage: stage.id.clone(),
                dependency: dependency.clone(),
            });
        }
    }

    topological_order(workflow).map(|_| ())
}

/// Orders stages so every stage comes after all of its predecessors.
///
/// Uses Kahn's algorithm. Stages that become ready at the same time keep their
/// declaration order, so the result is deterministic.
///
/// # Errors
///
/// Returns `DependencyCycle` naming the stages that could not be ordered.
pub fn topological_order(workflow: &Workflow) -> Result<Vec<&Stage>> {
    let mut in_degree: HashMap<&str, usize> = workflow
        .stages
        .iter()
        .map(|s| (s.id.as_str(), s.needs.len()))
        .collect();

    let mut queue: VecDeque<&Stage> = workflow
        .stages
        .iter()
        .filter(|s| s.needs.is_empty())
        .collect();

    let mut order = Vec::with_capacity(workflow.stages.len());

    while let Some(stage) = queue.pop_front() {
        order.push(stage);

        for dependent in workflow
            .stages
            .iter()
            .filter(|s| s.needs.iter().any(|n| *n == stage.id))
        {
            if let Some(count) = in_degree.get_mut(dependent.id.as_str()) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if order.len() != workflow.stages.len() {
        let ordered: HashSet<&str> = order.iter().map(|s| s.id.as_str()).collect();
        let stuck = workflow
            .stages
            .iter()
            .filter(|s| !ordered.contains(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect();
        return Err(CirunError::DependencyCycle(stuck));
    }

    Ok(order)
}

/// All stages `stage` depends on, directly or transitively, in declaration order.
fn transitive_predecessors<'a>(workflow: &'a Workflow, stage: &Stage) -> Vec<&'a Stage> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&str> = stage.needs.iter().map(String::as_str).collect();

    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(dep) = workflow.stage(id) {
            pending.extend(dep.needs.iter().map(String::as_str));
        }
    }

    workflow
        .stages
        .iter()
        .filter(|s| visited.contains(s.id.as_str()))
        .collect()
}

/// Finds stages that can never run for any triggering branch.
///
/// A stage is unreachable when no trigger branch satisfies its own condition
/// together with the conditions of every stage it transitively depends on.
pub fn lint(workflow: &Workflow) -> Vec<LintFinding> {
    let mut findings = Vec::new();

    for stage in &workflow.stages {
        let predecessors = transitive_predecessors(workflow, stage);

        let mut conditions: Vec<&BranchPredicate> =
            predecessors.iter().map(|p| &p.condition).collect();
        conditions.push(&stage.condition);

        if jointly_satisfiable(&conditions, &workflow.triggers) {
            continue;
        }

        let conflict = predecessors
            .iter()
            .find(|p| !stage.condition.compatible_with(&p.condition));

        let message = match conflict {
            Some(dep) => format!(
                "never runs: requires `{}` but depends on '{}' which requires `{}`",
                stage.condition, dep.id, dep.condition
            ),
            None if !jointly_satisfiable(&[&stage.condition], &workflow.triggers) => format!(
                "never runs: `{}` matches none of the trigger branches ({})",
                stage.condition,
                workflow.triggers.join(", ")
            ),
            None => "never runs: no trigger branch satisfies the conditions of its dependency chain"
                .to_string(),
        };

        findings.push(LintFinding {
            stage: stage.id.clone(),
            message,
        });
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Step, StepAction};

    fn stage(id: &str, needs: &[&str], condition: BranchPredicate) -> Stage {
        Stage {
            id: id.to_string(),
            name: None,
            needs: needs.iter().map(ToString::to_string).collect(),
            condition,
            steps: vec![Step {
                name: None,
                condition: BranchPredicate::Always,
                action: StepAction::Run {
                    script: "true".to_string(),
                },
            }],
        }
    }

    fn workflow(stages: Vec<Stage>, triggers: &[&str]) -> Workflow {
        Workflow {
            name: "test".to_string(),
            triggers: triggers.iter().map(ToString::to_string).collect(),
            stages,
        }
    }

    fn ids(order: &[&Stage]) -> Vec<String> {
        order.iter().map(|s| s.id.clone()).collect()
    }

    #[test]
    fn test_topological_order_respects_needs() {
        let wf = workflow(
            vec![
                stage("deploy", &["docs"], BranchPredicate::Always),
                stage("docs", &["check"], BranchPredicate::Always),
                stage("check", &[], BranchPredicate::Always),
            ],
            &[],
        );

        let order = topological_order(&wf).unwrap();
        assert_eq!(ids(&order), vec!["check", "docs", "deploy"]);
    }

    #[test]
    fn test_topological_order_keeps_declaration_order_for_siblings() {
        let wf = workflow(
            vec![
                stage("check", &[], BranchPredicate::Always),
                stage("build_docker", &["check"], BranchPredicate::Always),
                stage("build_docs", &["check"], BranchPredicate::Always),
            ],
            &[],
        );

        let order = topological_order(&wf).unwrap();
        assert_eq!(ids(&order), vec!["check", "build_docker", "build_docs"]);
    }

    #[test]
    fn test_topological_order_detects_cycle() {
        let wf = workflow(
            vec![
                stage("root", &[], BranchPredicate::Always),
                stage("a", &["b"], BranchPredicate::Always),
                stage("b", &["a"], BranchPredicate::Always),
            ],
            &[],
        );

        match topological_order(&wf) {
            Err(CirunError::DependencyCycle(stages)) => {
                assert_eq!(stages, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected a cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_graph_rejects_duplicates() {
        let wf = workflow(
            vec![
                stage("check", &[], BranchPredicate::Always),
                stage("check", &[], BranchPredicate::Always),
            ],
            &[],
        );

        let err = validate_graph(&wf).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_lint_flags_contradictory_dependency() {
        let wf = workflow(
            vec![
                stage("check", &[], BranchPredicate::Always),
                stage(
                    "build_docs",
                    &["check"],
                    BranchPredicate::NotEquals("main".to_string()),
                ),
                stage(
                    "deploy",
                    &["build_docs"],
                    BranchPredicate::Equals("main".to_string()),
                ),
            ],
            &["main", "dev"],
        );

        let findings = lint(&wf);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].stage, "deploy");
        assert!(findings[0].message.contains("build_docs"));
        assert!(findings[0].message.contains("branch != main"));
    }

    #[test]
    fn test_lint_flags_condition_outside_triggers() {
        let wf = workflow(
            vec![stage(
                "release",
                &[],
                BranchPredicate::Equals("release".to_string()),
            )],
            &["main", "dev"],
        );

        let findings = lint(&wf);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("trigger branches"));
    }

    #[test]
    fn test_lint_propagates_through_unreachable_predecessor() {
        let wf = workflow(
            vec![
                stage("a", &[], BranchPredicate::Equals("release".to_string())),
                stage("b", &["a"], BranchPredicate::Always),
            ],
            &["main"],
        );

        let flagged: Vec<String> = lint(&wf).into_iter().map(|f| f.stage).collect();
        assert_eq!(flagged, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_lint_clean_workflow() {
        let wf = workflow(
            vec![
                stage("check", &[], BranchPredicate::Always),
                stage(
                    "deploy",
                    &["check"],
                    BranchPredicate::Equals("main".to_string()),
                ),
            ],
            &["main", "dev"],
        );

        assert!(lint(&wf).is_empty());
    }
}
