//! The module contains the errors the engine can return.
//!
//! Variants fall into four groups:
//!
//! - validation ([`InvalidAmount`], [`KeyNotFound`], [`ExistingKey`],
//!   [`CurrencyMismatch`], [`InvalidCategory`]): rejected before any state
//!   is mutated
//! - named preconditions ([`AdjustmentLocked`], [`TransferTargetRequired`],
//!   [`NoSameCurrencyTarget`]): user-actionable conditions the caller is
//!   expected to branch on
//! - [`Inconsistent`]: a ledger math check failed; the surrounding
//!   transaction is aborted
//! - [`Database`]: storage failures, propagated from sea-orm
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`CurrencyMismatch`]: EngineError::CurrencyMismatch
//!  [`InvalidCategory`]: EngineError::InvalidCategory
//!  [`AdjustmentLocked`]: EngineError::AdjustmentLocked
//!  [`TransferTargetRequired`]: EngineError::TransferTargetRequired
//!  [`NoSameCurrencyTarget`]: EngineError::NoSameCurrencyTarget
//!  [`Inconsistent`]: EngineError::Inconsistent
//!  [`Database`]: EngineError::Database

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Adjustment locked: {0}")]
    AdjustmentLocked(String),
    #[error("Transfer target required: {0}")]
    TransferTargetRequired(String),
    #[error("No same-currency account available: {0}")]
    NoSameCurrencyTarget(String),
    #[error("Ledger inconsistency: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::AdjustmentLocked(a), Self::AdjustmentLocked(b)) => a == b,
            (Self::TransferTargetRequired(a), Self::TransferTargetRequired(b)) => a == b,
            (Self::NoSameCurrencyTarget(a), Self::NoSameCurrencyTarget(b)) => a == b,
            (Self::Inconsistent(a), Self::Inconsistent(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
