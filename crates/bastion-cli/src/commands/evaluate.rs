use std::sync::Arc;

use anyhow::{Context, Result};
use bastion_pdp::{
    Decision, EvaluationRequest, EvaluationTrace, InMemoryPolicyStore, PolicyDecisionPoint,
    StaticAttributeResolver,
};

use super::{load_config, load_policies, read_input};
use crate::cli::{EvaluateArgs, OutputFormat};
use crate::output::{print_decision, print_json, print_trace};

pub async fn run(args: &EvaluateArgs, format: OutputFormat) -> Result<Decision> {
    let trace = decide(args).await?;

    match format {
        OutputFormat::Json if args.trace => print_json(&trace)?,
        OutputFormat::Json => print_json(&trace.decision)?,
        OutputFormat::Table => {
            print_decision(&trace.decision);
            if args.trace {
                println!();
                print_trace(&trace.statements);
            }
        }
    }

    Ok(trace.decision)
}

async fn decide(args: &EvaluateArgs) -> Result<EvaluationTrace> {
    let policies = load_policies(&args.policies)?;
    let config = load_config(args.config.as_deref())?;

    let resolver = match &args.attributes {
        Some(path) => {
            let text = read_input(Some(path))?;
            StaticAttributeResolver::from_json(&text)
                .with_context(|| format!("Invalid attribute tables {}", path.display()))?
        }
        None => StaticAttributeResolver::new(),
    };

    let request_text = read_input(args.request.as_deref())?;
    let request = EvaluationRequest::from_json(&request_text).context("Invalid request")?;

    tracing::debug!(
        policies = policies.len(),
        subject = %request.subject_id,
        action = %request.action,
        "Evaluating request"
    );

    let pdp = PolicyDecisionPoint::new(
        Arc::new(InMemoryPolicyStore::with_policies(policies)),
        Arc::new(resolver),
        config,
    )?;

    pdp.evaluate_with_trace(&request)
        .await
        .context("Evaluation failed")
}
