//! The order state machine.
//!
//! A single pure decision function over (current status, requested status, actor role, digital contents). Every
//! status write in the engine runs through [`can_transition`] first, then through the store's compare-and-set
//! update, so an illegal transition can neither be requested by a user nor raced in by a stale webhook.
//!
//! The matrix (roles in parentheses):
//!
//! | From \ To | Approved | Rejected | Cancelled | Paid     | Completed        | Refunded |
//! |-----------|----------|----------|-----------|----------|------------------|----------|
//! | Requested | seller   | seller   | buyer     | -        | -                | -        |
//! | Approved  | -        | -        | buyer     | system   | seller/system *  | -        |
//! | Paid      | -        | -        | -         | -        | system           | -        |
//! | Completed | -        | -        | -         | -        | -                | system   |
//!
//! (*) Approved → Completed is only legal for orders with no digital items; digital goods must route through
//! `Paid` so an unpaid asset can never be unlocked. Dispute changes ride a separate side channel and never pass
//! through this matrix.
use thiserror::Error;

use crate::db_types::{ActorRole, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionDenied {
    #[error("An order cannot move from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error("A {role} is not permitted to move an order from {from} to {to}")]
    RoleNotPermitted { role: ActorRole, from: OrderStatus, to: OrderStatus },
    #[error("Digital products must be paid before completion")]
    DigitalRequiresPayment,
}

/// Decide whether `role` may move an order from `current` to `target`.
///
/// This is a pure function: it neither reads nor writes state, and an expected business denial is a typed result,
/// not an error path. Callers translate [`TransitionDenied`] into a 409 (illegal transition) or 403 (role).
pub fn can_transition(
    current: OrderStatus,
    target: OrderStatus,
    role: ActorRole,
    has_digital_items: bool,
) -> Result<(), TransitionDenied> {
    use ActorRole::*;
    use OrderStatus::*;
    let permitted_roles: &[ActorRole] = match (current, target) {
        (Requested, Approved) => &[Seller],
        (Requested, Rejected) => &[Seller],
        (Requested, Cancelled) => &[Buyer],
        (Approved, Cancelled) => &[Buyer],
        // Payment confirmation and refunds only ever arrive via the reconciler.
        (Approved, Paid) => &[System],
        (Paid, Completed) => &[System],
        (Completed, Refunded) => &[System],
        (Approved, Completed) => {
            if has_digital_items {
                return Err(TransitionDenied::DigitalRequiresPayment);
            }
            // Physical-only fulfilment is confirmed out of band.
            &[Seller, System]
        },
        (from, to) => return Err(TransitionDenied::IllegalTransition { from, to }),
    };
    if permitted_roles.contains(&role) {
        Ok(())
    } else {
        Err(TransitionDenied::RoleNotPermitted { role, from: current, to: target })
    }
}
