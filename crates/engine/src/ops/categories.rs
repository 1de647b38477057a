use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    Category, CategoryKind, EngineError, FlowKind, ResultEngine, categories,
};

use super::{Engine, normalize_required_name, parse_model_uuid, with_tx};

/// Name of the synthetic category adjustment operations hang off.
const SHADOW_CATEGORY_NAME: &str = "Balance correction";

impl Engine {
    /// Adds a new category.
    ///
    /// `parent_id` must reference a `folder` of the same flow; folders are
    /// navigational only, so an `entry` can never hold children.
    pub async fn new_category(
        &self,
        name: &str,
        kind: CategoryKind,
        flow: FlowKind,
        parent_id: Option<Uuid>,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "category")?;
        with_tx!(self, |db_tx| {
            if let Some(parent_id) = parent_id {
                let parent = categories::Entity::find_by_id(parent_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;
                if CategoryKind::try_from(parent.kind.as_str())? != CategoryKind::Folder {
                    return Err(EngineError::InvalidCategory(
                        "parent must be a folder".to_string(),
                    ));
                }
                if FlowKind::try_from(parent.flow.as_str())? != flow {
                    return Err(EngineError::InvalidCategory(
                        "parent flow does not match".to_string(),
                    ));
                }
            }

            let parent_filter = match parent_id {
                Some(parent_id) => {
                    categories::Column::ParentId.eq(parent_id.to_string())
                }
                None => categories::Column::ParentId.is_null(),
            };
            let exists = categories::Entity::find()
                .filter(parent_filter)
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(name.to_string()));
            }

            let category = Category::new(name.clone(), kind, flow, parent_id);
            let category_id = category.id;
            categories::ActiveModel::from(&category).insert(&db_tx).await?;
            Ok(category_id)
        })
    }

    /// Renames a category. The shadow category is immutable.
    pub async fn rename_category(&self, category_id: Uuid, new_name: &str) -> ResultEngine<()> {
        let new_name = normalize_required_name(new_name, "category")?;
        with_tx!(self, |db_tx| {
            let model = categories::Entity::find_by_id(category_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;
            if model.shadow {
                return Err(EngineError::InvalidCategory(
                    "the shadow category is immutable".to_string(),
                ));
            }

            let active = categories::ActiveModel {
                id: ActiveValue::Set(category_id.to_string()),
                name: ActiveValue::Set(new_name),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Returns a single category.
    pub async fn category(&self, category_id: Uuid) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            let model = categories::Entity::find_by_id(category_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;
            Category::try_from(model)
        })
    }

    /// Lists categories of a flow, ordered by name.
    ///
    /// This is the picker contract: the shadow category is excluded unless
    /// explicitly requested, so adjustment plumbing never shows up in expense
    /// or income selectors.
    pub async fn list_categories(
        &self,
        flow: FlowKind,
        include_shadow: bool,
    ) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            let mut query = categories::Entity::find()
                .filter(categories::Column::Flow.eq(flow.as_str()))
                .order_by_asc(categories::Column::Name);
            if !include_shadow {
                query = query.filter(categories::Column::Shadow.eq(false));
            }
            let models = query.all(&db_tx).await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                out.push(Category::try_from(model)?);
            }
            Ok(out)
        })
    }

    /// Returns the shadow category id, creating the category on first use.
    pub(super) async fn shadow_category_id(
        &self,
        db_tx: &DatabaseTransaction,
    ) -> ResultEngine<Uuid> {
        if let Some(model) = categories::Entity::find()
            .filter(categories::Column::Shadow.eq(true))
            .one(db_tx)
            .await?
        {
            return parse_model_uuid(&model.id, "category");
        }

        let mut category = Category::new(
            SHADOW_CATEGORY_NAME.to_string(),
            CategoryKind::Entry,
            FlowKind::Expense,
            None,
        );
        category.shadow = true;
        let category_id = category.id;
        categories::ActiveModel::from(&category).insert(db_tx).await?;
        Ok(category_id)
    }

    /// Validates that a category can be attached to an operation of the
    /// given flow: it must exist, be an `entry` (folders are navigational),
    /// not be the shadow category, and classify the same flow.
    pub(super) async fn require_entry_category(
        &self,
        db_tx: &DatabaseTransaction,
        category_id: Uuid,
        flow: FlowKind,
    ) -> ResultEngine<()> {
        let model = categories::Entity::find_by_id(category_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;
        if model.shadow {
            return Err(EngineError::InvalidCategory(
                "the shadow category cannot be picked".to_string(),
            ));
        }
        if CategoryKind::try_from(model.kind.as_str())? != CategoryKind::Entry {
            return Err(EngineError::InvalidCategory(
                "folders cannot hold operations".to_string(),
            ));
        }
        if FlowKind::try_from(model.flow.as_str())? != flow {
            return Err(EngineError::InvalidCategory(format!(
                "category flow is {}, expected {}",
                model.flow,
                flow.as_str()
            )));
        }
        Ok(())
    }
}
