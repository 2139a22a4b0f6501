use anyhow::Result;
use bastion_pdp::{Decision, DecisionResult, StatementTrace};
use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_decision(decision: &Decision) {
    let result = match decision.result {
        DecisionResult::Permit => "PERMIT".green().bold(),
        DecisionResult::Deny => "DENY".red().bold(),
    };
    println!("{}: {}", "Decision".cyan(), result);
    println!("{}: {}", "Reason".cyan(), decision.reason);
    if !decision.matched_statements.is_empty() {
        let cited: Vec<String> = decision
            .matched_statements
            .iter()
            .map(|m| format!("{}/{} ({})", m.policy_id, m.statement_id, m.effect))
            .collect();
        println!("{}: {}", "Matched".cyan(), cited.join(", "));
    }
    println!("{}: {}ms", "Time".cyan(), decision.evaluation_time_ms);
}

pub fn print_trace(statements: &[StatementTrace]) {
    if statements.is_empty() {
        println!("No statements evaluated.");
        return;
    }
    println!("{}", trace_table(statements));
}

fn trace_table(statements: &[StatementTrace]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Policy", "Statement", "Effect", "Action", "Resource", "Excluded", "Conditions"]);
    for s in statements {
        let conditions = match s.conditions_satisfied {
            Some(true) => "satisfied",
            Some(false) => "failed",
            None => "-",
        };
        builder.push_record([
            s.policy_id.clone(),
            s.statement_id.clone(),
            s.effect.to_string(),
            yes_no(s.action_matched).to_string(),
            yes_no(s.resource_matched).to_string(),
            yes_no(s.excluded).to_string(),
            conditions.to_string(),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_pdp::Effect;

    #[test]
    fn test_trace_table_rows() {
        let rows = vec![
            StatementTrace {
                policy_id: "docs".into(),
                statement_id: "read".into(),
                effect: Effect::Allow,
                action_matched: true,
                resource_matched: true,
                excluded: false,
                conditions_satisfied: Some(true),
            },
            StatementTrace {
                policy_id: "docs".into(),
                statement_id: "#1".into(),
                effect: Effect::Deny,
                action_matched: false,
                resource_matched: false,
                excluded: false,
                conditions_satisfied: None,
            },
        ];
        let table = trace_table(&rows);
        assert!(table.contains("satisfied"));
        assert!(table.contains("#1"));
        assert_eq!(table.lines().filter(|l| l.contains("docs")).count(), 2);
    }
}
