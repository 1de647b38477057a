//! The module contains the `Account` struct and its entity model.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, Currency, EngineError};

/// An account.
///
/// An account is a place money lives: a wallet, a bank account, a card. Its
/// stored balance is denormalized and always equals the opening seed plus the
/// signed effects of every non-deleted operation touching the account; only
/// the engine writes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier, generated once and persisted, so the account can be
    /// renamed without breaking references.
    pub id: Uuid,
    pub name: String,
    pub currency: Currency,
    /// Current balance in minor units of `currency`.
    pub balance_minor: i64,
    /// Balance seeded at creation, before any operation.
    pub opening_balance_minor: i64,
    /// Display order in account lists; purely presentational.
    pub position: i32,
    pub hidden: bool,
}

impl Account {
    pub fn new(name: String, currency: Currency, opening_balance_minor: i64, position: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            currency,
            balance_minor: opening_balance_minor,
            opening_balance_minor,
            position,
            hidden: false,
        }
    }

    /// Current balance as an [`Amount`].
    #[must_use]
    pub fn balance(&self) -> Amount {
        Amount::new(self.balance_minor)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub currency: String,
    pub balance_minor: i64,
    pub opening_balance_minor: i64,
    pub position: i32,
    pub hidden: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::operations::Entity")]
    Operations,
}

impl Related<super::operations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            name: ActiveValue::Set(account.name.clone()),
            currency: ActiveValue::Set(account.currency.code().to_string()),
            balance_minor: ActiveValue::Set(account.balance_minor),
            opening_balance_minor: ActiveValue::Set(account.opening_balance_minor),
            position: ActiveValue::Set(account.position),
            hidden: ActiveValue::Set(account.hidden),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?,
            name: model.name,
            currency: Currency::try_from(model.currency.as_str())?,
            balance_minor: model.balance_minor,
            opening_balance_minor: model.opening_balance_minor,
            position: model.position,
            hidden: model.hidden,
        })
    }
}
