//! Basket identities and their claim tokens

use std::collections::HashSet;

use basketbin_db::entities::basket;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use tracing::{debug, error, info, warn};

use crate::config::{bounded, StoreConfig};
use crate::error::{CleanupOutcome, StoreError, StoreResult};

/// Names bound per `IN (...)` query, well under every backend's bind limit
const VALIDATE_CHUNK_SIZE: usize = 500;

/// Sole writer of basket rows
#[derive(Clone)]
pub struct BasketStore {
    db: DatabaseConnection,
    config: StoreConfig,
}

impl BasketStore {
    pub fn new(db: DatabaseConnection, config: StoreConfig) -> Self {
        Self { db, config }
    }

    /// All baskets, ordered by name
    pub async fn list_baskets(&self) -> StoreResult<Vec<basket::Model>> {
        bounded(
            self.config.op_timeout,
            "list_baskets",
            basket::Entity::find()
                .order_by_asc(basket::Column::Name)
                .all(&self.db),
        )
        .await
        .map_err(|e| {
            error!("Failed to list baskets: {}", e);
            StoreError::internal("list_baskets")(e)
        })
    }

    /// Full basket row, `None` if absent
    pub async fn get_basket(&self, name: &str) -> StoreResult<Option<basket::Model>> {
        bounded(
            self.config.op_timeout,
            "get_basket",
            basket::Entity::find_by_id(name.to_string()).one(&self.db),
        )
        .await
        .map_err(StoreError::internal("get_basket"))
    }

    /// Existence lookup returning the stored name, `None` if absent
    pub async fn get_basket_name(&self, name: &str) -> StoreResult<Option<String>> {
        let found = self.get_basket(name).await?.map(|b| b.name);
        if found.is_none() {
            debug!("Basket not found: {}", name);
        }
        Ok(found)
    }

    pub async fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.get_basket(name).await?.is_some())
    }

    /// Insert a new basket
    ///
    /// Uniqueness is enforced by the primary key, so concurrent creates of
    /// the same name yield exactly one success and `Conflict` for the rest.
    pub async fn create(&self, name: &str) -> StoreResult<basket::Model> {
        let model = basket::ActiveModel {
            name: Set(name.to_string()),
            token: Set(None),
            created_at: Set(Utc::now()),
        };

        match bounded(self.config.op_timeout, "create_basket", model.insert(&self.db)).await {
            Ok(created) => {
                info!("Created basket {}", name);
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => {
                debug!("Basket {} already exists", name);
                Err(StoreError::Conflict(name.to_string()))
            }
            Err(e) => {
                error!("Failed to create basket {}: {}", name, e);
                Err(StoreError::persistence("create_basket")(e))
            }
        }
    }

    /// Set the basket's token unconditionally, replacing any previous one
    pub async fn claim_token(&self, token: &str, name: &str) -> StoreResult<basket::Model> {
        let update = basket::Entity::update_many()
            .col_expr(basket::Column::Token, Expr::value(token.to_string()))
            .filter(basket::Column::Name.eq(name));

        let result = bounded(self.config.op_timeout, "claim_token", update.exec(&self.db))
            .await
            .map_err(|e| token_write_error(name, e))?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("basket '{}'", name)));
        }

        self.reload_claimed(name).await
    }

    /// Set the basket's token only if it has none yet
    pub async fn claim_token_if_unclaimed(
        &self,
        token: &str,
        name: &str,
    ) -> StoreResult<basket::Model> {
        let update = basket::Entity::update_many()
            .col_expr(basket::Column::Token, Expr::value(token.to_string()))
            .filter(basket::Column::Name.eq(name))
            .filter(basket::Column::Token.is_null());

        let result = bounded(self.config.op_timeout, "claim_token", update.exec(&self.db))
            .await
            .map_err(|e| token_write_error(name, e))?;

        if result.rows_affected == 0 {
            return if self.exists(name).await? {
                Err(StoreError::AlreadyClaimed(name.to_string()))
            } else {
                Err(StoreError::NotFound(format!("basket '{}'", name)))
            };
        }

        self.reload_claimed(name).await
    }

    /// Reverse lookup from a presented token
    pub async fn get_token(&self, token: &str) -> StoreResult<Option<basket::Model>> {
        bounded(
            self.config.op_timeout,
            "get_token",
            basket::Entity::find()
                .filter(basket::Column::Token.eq(token))
                .one(&self.db),
        )
        .await
        .map_err(StoreError::internal("get_token"))
    }

    /// Subset of `names` that exist; an empty input issues no query
    pub async fn validate_names(&self, names: &HashSet<String>) -> StoreResult<HashSet<String>> {
        if names.is_empty() {
            return Ok(HashSet::new());
        }

        let candidates: Vec<&String> = names.iter().collect();
        let mut found = HashSet::new();

        for chunk in candidates.chunks(VALIDATE_CHUNK_SIZE) {
            let rows = bounded(
                self.config.op_timeout,
                "validate_names",
                basket::Entity::find()
                    .filter(basket::Column::Name.is_in(chunk.iter().map(|name| name.as_str())))
                    .all(&self.db),
            )
            .await
            .map_err(|e| {
                error!("Could not validate {} basket names: {}", names.len(), e);
                StoreError::internal("validate_names")(e)
            })?;

            found.extend(rows.into_iter().map(|b| b.name));
        }

        Ok(found)
    }

    /// Remove the basket row; failures are reported, not raised
    pub async fn delete(&self, name: &str) -> CleanupOutcome {
        let result = bounded(
            self.config.op_timeout,
            "delete_basket",
            basket::Entity::delete_by_id(name.to_string()).exec(&self.db),
        )
        .await;

        match result {
            Ok(res) => {
                debug!("Deleted basket {} ({} rows)", name, res.rows_affected);
                CleanupOutcome::Done {
                    rows_affected: res.rows_affected,
                }
            }
            Err(e) => {
                error!("Error deleting basket {}: {}", name, e);
                CleanupOutcome::Failed {
                    cause: StoreError::persistence("delete_basket")(e),
                }
            }
        }
    }

    async fn reload_claimed(&self, name: &str) -> StoreResult<basket::Model> {
        // The row can vanish between the update and this read under a
        // concurrent delete.
        self.get_basket(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("basket '{}'", name)))
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn token_write_error(name: &str, err: DbErr) -> StoreError {
    if is_unique_violation(&err) {
        warn!("Generated token for basket {} collides with another basket", name);
        StoreError::TokenCollision
    } else {
        error!("Error storing token for basket {}: {}", name, err);
        StoreError::persistence("claim_token")(err)
    }
}
