use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use bastion_pdp::Policy;
use bastion_pdp::condition::{condition_depth, unknown_operators};
use colored::Colorize;
use serde::Serialize;

use super::{load_config, load_policies};
use crate::cli::OutputFormat;
use crate::output::{print_json, print_success, print_warning};

/// One problem found in a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub policy_id: String,
    pub statement_id: Option<String>,
    pub message: String,
}

/// Check a policy file. Returns `true` when nothing was found.
pub fn run(path: &Path, config: Option<&Path>, format: OutputFormat) -> Result<bool> {
    let policies = load_policies(path)?;
    let max_depth = load_config(config)?.max_condition_depth;
    let findings = lint(&policies, max_depth);

    match format {
        OutputFormat::Json => print_json(&findings)?,
        OutputFormat::Table if findings.is_empty() => {
            let statements: usize = policies.iter().map(|p| p.statements.len()).sum();
            print_success(&format!(
                "{} policies, {} statements, no problems found",
                policies.len(),
                statements
            ));
        }
        OutputFormat::Table => {
            for finding in &findings {
                let location = match &finding.statement_id {
                    Some(sid) => format!("{}/{}", finding.policy_id, sid),
                    None => finding.policy_id.clone(),
                };
                print_warning(&format!("{}: {}", location.cyan(), finding.message));
            }
        }
    }

    Ok(findings.is_empty())
}

pub fn lint(policies: &[Policy], max_depth: usize) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut seen = HashSet::new();

    for policy in policies {
        if !seen.insert(policy.id.as_str()) {
            findings.push(Finding {
                policy_id: policy.id.clone(),
                statement_id: None,
                message: "duplicate policy id".to_string(),
            });
        }
        if policy.statements.is_empty() {
            findings.push(Finding {
                policy_id: policy.id.clone(),
                statement_id: None,
                message: "policy has no statements".to_string(),
            });
        }

        for (index, statement) in policy.statements.iter().enumerate() {
            let mut report = |message: String| {
                findings.push(Finding {
                    policy_id: policy.id.clone(),
                    statement_id: Some(statement.label(index)),
                    message,
                });
            };

            if statement.actions.is_empty() {
                report("statement has no Action patterns and never matches".to_string());
            }
            if statement.resources.is_empty() {
                report("statement has no Resource patterns and never matches".to_string());
            }
            for name in unknown_operators(&statement.condition) {
                report(format!("unknown condition operator '{name}'"));
            }
            let depth = condition_depth(&statement.condition);
            if depth > max_depth {
                report(format!(
                    "condition nesting depth {depth} exceeds the limit of {max_depth}"
                ));
            }
        }
    }

    findings
}
