//! Collaborator traits for policy retrieval and attribute enrichment.
//!
//! Persistence and attribute lookup live outside the engine. The engine
//! only needs every policy (it filters `enabled` itself) and the
//! attributes of the subject, resource and action named by a request.
//! In-memory implementations are provided for tests and local tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::PdpResult;
use crate::model::{EvaluationContext, EvaluationRequest, Policy};
use crate::value::ValueMap;

// =============================================================================
// Traits
// =============================================================================

/// Source of policy documents.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Return all policies, enabled or not, in evaluation order.
    async fn get_policies(&self) -> PdpResult<Vec<Policy>>;
}

/// Source of subject, resource and action attributes.
#[async_trait]
pub trait AttributeResolver: Send + Sync {
    /// Produce the enrichment context for `request`.
    async fn enrich_context(&self, request: &EvaluationRequest) -> PdpResult<EvaluationContext>;
}

// =============================================================================
// In-Memory Policy Store
// =============================================================================

/// Policy store backed by a vector, preserving insertion order.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<Vec<Policy>>,
}

impl InMemoryPolicyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `policies`.
    #[must_use]
    pub fn with_policies(policies: Vec<Policy>) -> Self {
        Self {
            policies: RwLock::new(policies),
        }
    }

    /// Insert a policy, replacing any policy with the same id in place.
    ///
    /// Returns the replaced policy.
    pub async fn upsert(&self, policy: Policy) -> Option<Policy> {
        let mut policies = self.policies.write().await;
        match policies.iter_mut().find(|p| p.id == policy.id) {
            Some(existing) => Some(std::mem::replace(existing, policy)),
            None => {
                policies.push(policy);
                None
            }
        }
    }

    /// Remove a policy by id.
    pub async fn remove(&self, id: &str) -> Option<Policy> {
        let mut policies = self.policies.write().await;
        let index = policies.iter().position(|p| p.id == id)?;
        Some(policies.remove(index))
    }

    /// Replace the whole policy set.
    pub async fn replace_all(&self, policies: Vec<Policy>) {
        *self.policies.write().await = policies;
    }

    /// Number of stored policies.
    pub async fn len(&self) -> usize {
        self.policies.read().await.len()
    }

    /// Returns `true` if the store holds no policies.
    pub async fn is_empty(&self) -> bool {
        self.policies.read().await.is_empty()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get_policies(&self) -> PdpResult<Vec<Policy>> {
        Ok(self.policies.read().await.clone())
    }
}

// =============================================================================
// Static Attribute Resolver
// =============================================================================

/// Attribute resolver backed by fixed tables keyed by id.
///
/// Unknown ids resolve to empty attribute sets. Environment data and the
/// timestamp are taken from the request.
///
/// Deserializes from:
///
/// ```json
/// {
///   "subjects": { "user-123": { "Department": "engineering" } },
///   "resources": { "api:documents:1": { "owner": "user-123" } },
///   "actions": { "document-service:file:read": { "category": "read" } }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticAttributeResolver {
    subjects: HashMap<String, ValueMap>,
    resources: HashMap<String, ValueMap>,
    actions: HashMap<String, ValueMap>,
}

impl StaticAttributeResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attributes of a subject.
    #[must_use]
    pub fn with_subject(mut self, id: impl Into<String>, attributes: ValueMap) -> Self {
        self.subjects.insert(id.into(), attributes);
        self
    }

    /// Set the attributes of a resource.
    #[must_use]
    pub fn with_resource(mut self, id: impl Into<String>, attributes: ValueMap) -> Self {
        self.resources.insert(id.into(), attributes);
        self
    }

    /// Set the metadata of an action.
    #[must_use]
    pub fn with_action(mut self, id: impl Into<String>, attributes: ValueMap) -> Self {
        self.actions.insert(id.into(), attributes);
        self
    }

    /// Parse attribute tables from JSON.
    ///
    /// # Errors
    ///
    /// Returns `PdpError::Serialization` on malformed input.
    pub fn from_json(json: &str) -> PdpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[async_trait]
impl AttributeResolver for StaticAttributeResolver {
    async fn enrich_context(&self, request: &EvaluationRequest) -> PdpResult<EvaluationContext> {
        Ok(EvaluationContext {
            subject: self
                .subjects
                .get(&request.subject_id)
                .cloned()
                .unwrap_or_default(),
            resource: self
                .resources
                .get(&request.resource_id)
                .cloned()
                .unwrap_or_default(),
            action: self.actions.get(&request.action).cloned().unwrap_or_default(),
            environment: request.environment.clone(),
            timestamp: request.timestamp,
        })
    }
}
