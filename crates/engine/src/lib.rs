//! Ledger core of a personal finance tracker.
//!
//! The engine owns one invariant above all: **an account's balance always
//! equals its opening seed plus the signed effects of every non-deleted
//! operation touching it**. Every write path (create, update, delete, split,
//! balance adjustment, account deletion with re-homing) preserves that
//! invariant inside a single DB transaction, and publishes a coarse reload
//! event after commit so dependent views re-fetch.
//!
//! Around the ledger sit the supporting pieces: per-currency minor-unit
//! money ([`Amount`], [`Currency`]), cross-currency triple derivation
//! ([`derive_third_value`]), the calculator-style input evaluator
//! ([`Keypad`]), and on-demand balance history reconstruction
//! ([`Engine::balance_history`]).

pub use accounts::Account;
pub use categories::{Category, CategoryKind, FlowKind};
pub use commands::{ExpenseCmd, IncomeCmd, SplitOperationCmd, TransferCmd, UpdateOperationCmd};
pub use conversion::{
    ConversionTriple, EditedField, RATE_EPSILON_MICRO, RATE_SCALE, Rate, convert_amount,
    derive_third_value, rate_from_amounts, reconciles,
};
pub use currency::Currency;
pub use error::EngineError;
pub use events::{EventBus, LedgerEvent};
pub use keypad::{BinOp, Key, Keypad};
pub use money::Amount;
pub use operations::{Operation, OperationKind};
pub use ops::{
    BalanceHistory, Engine, EngineBuilder, HistoryPoint, HistoryQuery, OperationListFilter,
};

mod accounts;
mod categories;
mod commands;
mod conversion;
mod currency;
mod error;
mod events;
mod keypad;
mod money;
mod operations;
mod ops;

type ResultEngine<T> = Result<T, EngineError>;
