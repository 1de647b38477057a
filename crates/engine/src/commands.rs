//! Command structs for engine operations.
//!
//! These types group parameters for write operations
//! (expense/income/transfer/update/split), keeping call sites readable and
//! avoiding long argument lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::Rate;

/// Create an expense operation.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub account_id: Uuid,
    pub amount_minor: i64,
    pub category_id: Option<Uuid>,
    pub occurred_on: NaiveDate,
    pub note: Option<String>,
}

impl ExpenseCmd {
    #[must_use]
    pub fn new(account_id: Uuid, amount_minor: i64, occurred_on: NaiveDate) -> Self {
        Self {
            account_id,
            amount_minor,
            category_id: None,
            occurred_on,
            note: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Create an income operation.
#[derive(Clone, Debug)]
pub struct IncomeCmd {
    pub account_id: Uuid,
    pub amount_minor: i64,
    pub category_id: Option<Uuid>,
    pub occurred_on: NaiveDate,
    pub note: Option<String>,
}

impl IncomeCmd {
    #[must_use]
    pub fn new(account_id: Uuid, amount_minor: i64, occurred_on: NaiveDate) -> Self {
        Self {
            account_id,
            amount_minor,
            category_id: None,
            occurred_on,
            note: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Create a transfer between two accounts.
///
/// For a same-currency pair, `rate` and `destination_amount_minor` are
/// ignored: the destination amount mirrors the source amount. For a
/// cross-currency pair at least one of the two must be supplied; when both
/// are, they must reconcile with the amount within one destination minor
/// unit.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_minor: i64,
    pub rate: Option<Rate>,
    pub destination_amount_minor: Option<i64>,
    pub occurred_on: NaiveDate,
    pub note: Option<String>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount_minor,
            rate: None,
            destination_amount_minor: None,
            occurred_on,
            note: None,
        }
    }

    #[must_use]
    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    #[must_use]
    pub fn destination_amount(mut self, destination_amount_minor: i64) -> Self {
        self.destination_amount_minor = Some(destination_amount_minor);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Update an existing operation.
///
/// `None` fields keep their current value. `note` follows patch semantics:
/// `None` keeps, `Some("")` clears. Adjustments reject every update.
#[derive(Clone, Debug)]
pub struct UpdateOperationCmd {
    pub operation_id: Uuid,
    pub amount_minor: Option<i64>,
    pub category_id: Option<Uuid>,
    pub occurred_on: Option<NaiveDate>,
    pub note: Option<String>,
    /// Transfers only: new exchange rate ("rate was edited last").
    pub rate: Option<Rate>,
    /// Transfers only: new destination amount ("destination was edited
    /// last"). Supplying both pins the triple and must reconcile.
    pub destination_amount_minor: Option<i64>,
}

impl UpdateOperationCmd {
    #[must_use]
    pub fn new(operation_id: Uuid) -> Self {
        Self {
            operation_id,
            amount_minor: None,
            category_id: None,
            occurred_on: None,
            note: None,
            rate: None,
            destination_amount_minor: None,
        }
    }

    #[must_use]
    pub fn amount(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn occurred_on(mut self, occurred_on: NaiveDate) -> Self {
        self.occurred_on = Some(occurred_on);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    #[must_use]
    pub fn destination_amount(mut self, destination_amount_minor: i64) -> Self {
        self.destination_amount_minor = Some(destination_amount_minor);
        self
    }
}

/// Split an operation: move `split_amount_minor` of it into a new sibling
/// operation under a different category. The account balance does not move.
#[derive(Clone, Debug)]
pub struct SplitOperationCmd {
    pub operation_id: Uuid,
    pub split_amount_minor: i64,
    pub category_id: Uuid,
}

impl SplitOperationCmd {
    #[must_use]
    pub fn new(operation_id: Uuid, split_amount_minor: i64, category_id: Uuid) -> Self {
        Self {
            operation_id,
            split_amount_minor,
            category_id,
        }
    }
}
