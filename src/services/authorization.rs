//! Role and threshold rules for sensitive workflow transitions.
//!
//! The predicates are pure functions over [`ActorRole`]; the approval
//! threshold is injected through [`ApprovalPolicy`] so it can come from the
//! settings row rather than a constant.

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::entities::actor::{self, ActorRole, Entity as Actor};
use crate::errors::ServiceError;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// PR totals at or above this amount need a senior approver.
    pub threshold: Decimal,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            threshold: Decimal::ONE_THOUSAND,
        }
    }
}

pub fn can_approve_pr(role: ActorRole, total: Decimal, policy: &ApprovalPolicy) -> bool {
    use ActorRole::*;
    if total < policy.threshold {
        matches!(
            role,
            Purchasing | Ops | Executive | Accounting | Admin | Commandant
        )
    } else {
        matches!(role, Executive | Accounting | Admin | Commandant)
    }
}

pub fn can_issue_po(role: ActorRole) -> bool {
    use ActorRole::*;
    matches!(
        role,
        Purchasing | Ops | Accounting | Executive | Admin | Commandant
    )
}

pub fn can_receive(role: ActorRole) -> bool {
    use ActorRole::*;
    matches!(role, Shop | Super | Ops | Admin | Commandant)
}

pub fn can_reconcile(role: ActorRole) -> bool {
    can_issue_po(role)
}

pub fn can_administer(role: ActorRole) -> bool {
    matches!(role, ActorRole::Admin | ActorRole::Commandant)
}

/// Sensitive actions, named the way denial messages describe them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ApprovePurchaseRequest,
    RejectPurchaseRequest,
    ConvertPurchaseRequest,
    ChangePurchaseOrderStatus,
    ReceiveGoods,
    EditReceipt,
    ReconcileReceipt,
    CancelReceipt,
    Administer,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ApprovePurchaseRequest => "approve purchase request",
            Action::RejectPurchaseRequest => "reject purchase request",
            Action::ConvertPurchaseRequest => "convert purchase request",
            Action::ChangePurchaseOrderStatus => "change purchase order status",
            Action::ReceiveGoods => "receive goods",
            Action::EditReceipt => "edit receipt",
            Action::ReconcileReceipt => "reconcile receipt",
            Action::CancelReceipt => "cancel receipt",
            Action::Administer => "change purchasing administration settings",
        }
    }
}

/// Turns a failed predicate into an `AuthorizationError`.
///
/// The message names the actor's role and the attempted action only.
pub fn ensure(allowed: bool, actor: &actor::Model, action: Action) -> Result<(), ServiceError> {
    if allowed {
        return Ok(());
    }
    metrics::record_denial(action.as_str(), actor.role.as_str());
    warn!(
        actor_id = %actor.id,
        role = actor.role.as_str(),
        action = action.as_str(),
        "Authorization denied"
    );
    Err(ServiceError::AuthorizationError(format!(
        "role '{}' is not permitted to {}",
        actor.role.as_str(),
        action.as_str()
    )))
}

/// Loads the acting user. Unknown actors are `NotFound`, deactivated ones
/// are refused outright.
pub async fn resolve_actor<C: ConnectionTrait>(
    conn: &C,
    actor_id: Uuid,
) -> Result<actor::Model, ServiceError> {
    let actor = Actor::find_by_id(actor_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Actor", actor_id))?;

    if !actor.is_active {
        return Err(ServiceError::AuthorizationError(format!(
            "actor {} is inactive",
            actor_id
        )));
    }
    Ok(actor)
}
