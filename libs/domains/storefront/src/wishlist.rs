use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{StorefrontError, StorefrontResult};
use crate::models::WishlistEntry;
use crate::query::{Order, Predicate};
use crate::store::{RemoteStore, SelectQuery};

pub const WISHLIST_TABLE: &str = "wishlist";

/// Saved products per user. A `(user, product)` pair is stored at most once.
pub struct WishlistRepository<S: RemoteStore> {
    store: Option<Arc<S>>,
}

impl<S: RemoteStore> WishlistRepository<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store: Some(store) }
    }

    pub fn unconfigured() -> Self {
        Self { store: None }
    }

    fn store(&self) -> StorefrontResult<&S> {
        self.store.as_deref().ok_or_else(|| {
            StorefrontError::Configuration("no wishlist store configured".to_string())
        })
    }

    fn pair(user_id: Uuid, product_id: Uuid) -> Vec<Predicate> {
        vec![
            Predicate::eq("user_id", user_id.to_string()),
            Predicate::eq("product_id", product_id.to_string()),
        ]
    }

    /// Save a product for a user. An existing pair is a
    /// [`StorefrontError::Conflict`].
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: Uuid, product_id: Uuid) -> StorefrontResult<WishlistEntry> {
        let store = self.store()?;

        let mut row = Map::new();
        row.insert("user_id".into(), user_id.to_string().into());
        row.insert("product_id".into(), product_id.to_string().into());
        store.insert(WISHLIST_TABLE, row).await?;

        info!(%user_id, %product_id, "Added to wishlist");
        Ok(WishlistEntry { user_id, product_id })
    }

    /// Remove a pair. Removing a pair that is not saved succeeds.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> StorefrontResult<()> {
        let store = self.store()?;
        let removed = store
            .delete(WISHLIST_TABLE, Self::pair(user_id, product_id))
            .await?;

        debug!(%user_id, %product_id, removed, "Removed from wishlist");
        Ok(())
    }

    /// Product ids saved by a user, oldest first.
    #[instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: Uuid) -> StorefrontResult<Vec<Uuid>> {
        let store = self.store()?;
        let query = SelectQuery::from(WISHLIST_TABLE)
            .columns(&["product_id"])
            .filter(Predicate::eq("user_id", user_id.to_string()))
            .order_by(Order::asc("created_at"));

        let rows = store.select(query).await?;
        rows.iter().map(product_id).collect()
    }

    #[instrument(skip(self))]
    pub async fn contains(&self, user_id: Uuid, product_id: Uuid) -> StorefrontResult<bool> {
        let store = self.store()?;
        let mut query = SelectQuery::from(WISHLIST_TABLE)
            .columns(&["product_id"])
            .limit(1);
        for predicate in Self::pair(user_id, product_id) {
            query = query.filter(predicate);
        }

        Ok(!store.select(query).await?.is_empty())
    }
}

impl<S: RemoteStore> Clone for WishlistRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

fn product_id(row: &Value) -> StorefrontResult<Uuid> {
    row.get("product_id")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| {
            StorefrontError::Serialization(format!("wishlist row without a product id: {row}"))
        })
}
