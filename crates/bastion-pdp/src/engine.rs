//! Policy decision point.
//!
//! Orchestrates attribute enrichment, policy retrieval, statement matching
//! and the deny-override combining algorithm.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bastion_pdp::engine::PolicyDecisionPoint;
//! use bastion_pdp::model::{Effect, EvaluationRequest, Policy, Statement};
//! use bastion_pdp::storage::{InMemoryPolicyStore, StaticAttributeResolver};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryPolicyStore::with_policies(vec![
//!     Policy::new("docs").with_statement(
//!         Statement::new(Effect::Allow)
//!             .with_action("document-service:file:*")
//!             .with_resource("api:documents:*"),
//!     ),
//! ]);
//! let pdp = PolicyDecisionPoint::with_defaults(
//!     Arc::new(store),
//!     Arc::new(StaticAttributeResolver::new()),
//! );
//!
//! let request = EvaluationRequest::new("user-123", "api:documents:1", "document-service:file:read");
//! let decision = pdp.evaluate(&request).await?;
//! assert!(decision.is_permit());
//! # Ok::<(), bastion_pdp::PdpError>(())
//! # }).unwrap();
//! ```

use std::sync::Arc;

use ipnetwork::IpNetwork;
use serde::Serialize;
use tokio::time::{Instant, timeout_at};
use tracing::Instrument;

use crate::condition::ConditionEvaluator;
use crate::config::PdpConfig;
use crate::context::{WorkingContext, WorkingContextBuilder};
use crate::error::{PdpError, PdpResult};
use crate::matcher::match_target;
use crate::model::{
    Decision, DecisionResult, Effect, EvaluationContext, EvaluationRequest, MatchedStatement,
    Policy,
};
use crate::storage::{AttributeResolver, PolicyStore};

/// Reason attached when no statement matched.
pub const IMPLICIT_DENY_REASON: &str = "implicit deny: no statement matched the request";

/// Reason attached when the evaluation deadline passes.
pub const DEADLINE_EXCEEDED_REASON: &str = "evaluation deadline exceeded";

// =============================================================================
// Evaluation Trace
// =============================================================================

/// Decision plus a record of every statement visited.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationTrace {
    /// The final decision.
    pub decision: Decision,

    /// Visited statements, in evaluation order.
    pub statements: Vec<StatementTrace>,
}

/// How one statement fared against the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementTrace {
    /// Owning policy.
    pub policy_id: String,

    /// `Sid` or `#<index>`.
    pub statement_id: String,

    /// Statement effect.
    pub effect: Effect,

    /// Some action pattern matched.
    pub action_matched: bool,

    /// Some resource pattern matched.
    pub resource_matched: bool,

    /// Some `NotResource` pattern matched.
    pub excluded: bool,

    /// Condition result; `None` when the target did not match.
    pub conditions_satisfied: Option<bool>,
}

impl StatementTrace {
    /// Returns `true` if the statement contributed to the decision.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.conditions_satisfied == Some(true)
    }
}

// =============================================================================
// Policy Decision Point
// =============================================================================

/// Policy decision point.
///
/// Holds no per-request state; one instance serves concurrent evaluations.
pub struct PolicyDecisionPoint {
    store: Arc<dyn PolicyStore>,
    resolver: Arc<dyn AttributeResolver>,
    conditions: ConditionEvaluator,
    internal_networks: Vec<IpNetwork>,
    config: PdpConfig,
}

impl std::fmt::Debug for PolicyDecisionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyDecisionPoint")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PolicyDecisionPoint {
    /// Create a decision point after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns `PdpError::Configuration` if the configuration is invalid.
    pub fn new(
        store: Arc<dyn PolicyStore>,
        resolver: Arc<dyn AttributeResolver>,
        config: PdpConfig,
    ) -> PdpResult<Self> {
        config.validate()?;
        Ok(Self::assemble(store, resolver, config))
    }

    /// Create a decision point with the default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<dyn PolicyStore>, resolver: Arc<dyn AttributeResolver>) -> Self {
        Self::assemble(store, resolver, PdpConfig::default())
    }

    fn assemble(
        store: Arc<dyn PolicyStore>,
        resolver: Arc<dyn AttributeResolver>,
        config: PdpConfig,
    ) -> Self {
        tracing::info!(
            max_evaluation_time = ?config.max_evaluation_time,
            max_condition_depth = config.max_condition_depth,
            unknown_operator = ?config.unknown_operator,
            "Policy decision point initialized"
        );

        Self {
            conditions: ConditionEvaluator::new(&config),
            internal_networks: config.internal_network_ranges(),
            store,
            resolver,
            config,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &PdpConfig {
        &self.config
    }

    /// Condition dispatcher, including its regex cache.
    #[must_use]
    pub fn conditions(&self) -> &ConditionEvaluator {
        &self.conditions
    }

    /// Evaluate a request.
    ///
    /// # Evaluation Order
    ///
    /// 1. Validate the request
    /// 2. Enrich attributes and build the working context
    /// 3. Fetch policies, skipping disabled ones
    /// 4. Match statements in declaration order; the first matching Deny
    ///    wins immediately
    /// 5. Permit if any Allow matched, otherwise implicit deny
    ///
    /// Passing `max_evaluation_time` yields a Deny decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or a collaborator fails.
    /// No decision is produced in that case.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> PdpResult<Decision> {
        self.run(request, None).await
    }

    /// Evaluate a request and record every statement visited.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub async fn evaluate_with_trace(
        &self,
        request: &EvaluationRequest,
    ) -> PdpResult<EvaluationTrace> {
        let mut statements = Vec::new();
        let decision = self.run(request, Some(&mut statements)).await?;
        Ok(EvaluationTrace {
            decision,
            statements,
        })
    }

    async fn run(
        &self,
        request: &EvaluationRequest,
        trace: Option<&mut Vec<StatementTrace>>,
    ) -> PdpResult<Decision> {
        let start = Instant::now();
        request.validate()?;

        let span = tracing::info_span!(
            "pdp.evaluate",
            subject = %request.subject_id,
            action = %request.action,
            resource = %request.resource_id,
        );

        async move {
            let decision = self.decide(request, start, trace).await?;
            tracing::debug!(
                result = %decision.result,
                reason = %decision.reason,
                evaluation_time_ms = decision.evaluation_time_ms,
                "Access decision"
            );
            Ok(decision)
        }
        .instrument(span)
        .await
    }

    async fn decide(
        &self,
        request: &EvaluationRequest,
        start: Instant,
        mut trace: Option<&mut Vec<StatementTrace>>,
    ) -> PdpResult<Decision> {
        // A budget too large to represent as an instant means no deadline
        let deadline = start.checked_add(self.config.max_evaluation_time);

        // Step 1: Enrich attributes
        let Some(attributes) = within(deadline, self.resolver.enrich_context(request)).await
        else {
            return Ok(deadline_exceeded(start, "attribute enrichment"));
        };
        let attributes = attributes.map_err(|e| {
            tracing::error!(error = %e, "Attribute resolution failed");
            wrap_attribute_error(e)
        })?;
        let context = self.build_context(request, attributes)?;

        // Step 2: Fetch policies
        let Some(policies) = within(deadline, self.store.get_policies()).await else {
            return Ok(deadline_exceeded(start, "policy retrieval"));
        };
        let policies = policies.map_err(|e| {
            tracing::error!(error = %e, "Failed to get policies from store");
            wrap_storage_error(e)
        })?;

        // Step 3: Evaluate statements
        let mut allows: Vec<MatchedStatement> = Vec::new();

        for policy in policies.iter().filter(|p| is_enabled(p)) {
            for (index, statement) in policy.statements.iter().enumerate() {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Ok(deadline_exceeded(start, "statement evaluation"));
                }

                let target = match_target(
                    statement,
                    &request.action,
                    &request.resource_id,
                    context.values(),
                );
                let satisfied = target
                    .applies()
                    .then(|| self.conditions.evaluate(&statement.condition, context.values()));

                let statement_id = statement.label(index);
                if let Some(trace) = trace.as_deref_mut() {
                    trace.push(StatementTrace {
                        policy_id: policy.id.clone(),
                        statement_id: statement_id.clone(),
                        effect: statement.effect,
                        action_matched: target.action,
                        resource_matched: target.resource,
                        excluded: target.excluded,
                        conditions_satisfied: satisfied,
                    });
                }

                if satisfied != Some(true) {
                    continue;
                }

                let matched = MatchedStatement {
                    policy_id: policy.id.clone(),
                    statement_id,
                    effect: statement.effect,
                };

                match statement.effect {
                    Effect::Deny => {
                        // First deny wins
                        tracing::debug!(
                            policy_id = %matched.policy_id,
                            statement = %matched.statement_id,
                            "Statement denied access"
                        );
                        return Ok(Decision {
                            result: DecisionResult::Deny,
                            reason: format!(
                                "explicit deny by {}/{}",
                                matched.policy_id, matched.statement_id
                            ),
                            matched_policies: vec![matched.policy_id.clone()],
                            matched_statements: vec![matched],
                            evaluation_time_ms: elapsed_ms(start),
                        });
                    }
                    Effect::Allow => {
                        tracing::debug!(
                            policy_id = %matched.policy_id,
                            statement = %matched.statement_id,
                            "Statement allowed access"
                        );
                        allows.push(matched);
                    }
                }
            }
        }

        // Step 4: Combine
        if allows.is_empty() {
            return Ok(Decision {
                result: DecisionResult::Deny,
                matched_policies: Vec::new(),
                matched_statements: Vec::new(),
                reason: IMPLICIT_DENY_REASON.to_string(),
                evaluation_time_ms: elapsed_ms(start),
            });
        }

        let mut matched_policies: Vec<String> = Vec::new();
        for m in &allows {
            if !matched_policies.contains(&m.policy_id) {
                matched_policies.push(m.policy_id.clone());
            }
        }
        let cited: Vec<String> = allows
            .iter()
            .map(|m| format!("{}/{}", m.policy_id, m.statement_id))
            .collect();

        Ok(Decision {
            result: DecisionResult::Permit,
            matched_policies,
            reason: format!("allowed by {}", cited.join(", ")),
            matched_statements: allows,
            evaluation_time_ms: elapsed_ms(start),
        })
    }

    fn build_context(
        &self,
        request: &EvaluationRequest,
        attributes: EvaluationContext,
    ) -> PdpResult<WorkingContext> {
        WorkingContextBuilder::new()
            .with_request(request)
            .with_attributes(attributes)
            .with_business_hours(&self.config.business_hours)
            .with_internal_networks(&self.internal_networks)
            .build()
            .map_err(|e| PdpError::validation(e.to_string()))
    }
}

fn is_enabled(policy: &Policy) -> bool {
    if !policy.enabled {
        tracing::trace!(policy_id = %policy.id, "Skipping disabled policy");
    }
    policy.enabled
}

/// Await `future` until `deadline`; `None` once the deadline passes.
async fn within<F: Future>(deadline: Option<Instant>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

fn deadline_exceeded(start: Instant, stage: &str) -> Decision {
    tracing::warn!(
        stage,
        elapsed_ms = elapsed_ms(start),
        "Evaluation deadline exceeded, denying"
    );
    Decision {
        result: DecisionResult::Deny,
        matched_policies: Vec::new(),
        matched_statements: Vec::new(),
        reason: DEADLINE_EXCEEDED_REASON.to_string(),
        evaluation_time_ms: elapsed_ms(start),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn wrap_attribute_error(err: PdpError) -> PdpError {
    match err {
        PdpError::AttributeResolution { .. } => err,
        other => PdpError::attribute_resolution(other.to_string()),
    }
}

fn wrap_storage_error(err: PdpError) -> PdpError {
    match err {
        PdpError::Storage { .. } => err,
        other => PdpError::storage(other.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
