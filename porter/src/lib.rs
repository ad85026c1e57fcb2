//! Access control for Hearth: who may do what, over which rows, how often.
//!
//! The porter answers three questions and nothing else:
//! - may this role perform this action at all ([`grants`]),
//! - which rows may this profile see ([`scope::RowScope`], compiled to
//!   SQL predicates by the store),
//! - has this actor exhausted its filing quota ([`quota::QuotaKernel`]).
//!
//! Row ownership of a *specific* record (is this landlord the owner of
//! this unit's property?) is enforced by the store through the scope, so
//! a denied row reads as absent rather than forbidden.

pub mod grants;
pub mod quota;
pub mod scope;

pub use grants::{check, require, Action, Decision, PorterError};
pub use quota::{QuotaDecision, QuotaKernel};
pub use scope::RowScope;
