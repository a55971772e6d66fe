//! Product reads and writes against the remote store.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{StorefrontError, StorefrontResult};
use crate::models::{AvailableFilters, CreateProduct, FilterOptions, Product, UpdateProduct};
use crate::query::{build_directives, Order, Predicate};
use crate::schema::{decode_image, decode_product, image_to_domain, to_domain, to_storage_patch};
use crate::store::{RelationSelect, RemoteStore, SelectQuery, StoreError};

pub const PRODUCTS_TABLE: &str = "products";
pub const IMAGES_TABLE: &str = "product_images";
pub const VARIANTS_TABLE: &str = "product_variants";
pub const ATTRIBUTES_TABLE: &str = "product_attributes";

/// Hard cap on quick-search results
pub const SEARCH_LIMIT: usize = 50;

/// Product data access.
///
/// Built without a store handle (see [`ProductRepository::unconfigured`]),
/// listing reads degrade to empty results and everything else fails with
/// [`StorefrontError::Configuration`].
pub struct ProductRepository<S: RemoteStore> {
    store: Option<Arc<S>>,
}

impl<S: RemoteStore> ProductRepository<S> {
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
            StorefrontError::Configuration("no product store configured".to_string())
        })
    }

    fn decode_rows(rows: Vec<Value>) -> StorefrontResult<Vec<Product>> {
        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(product) = to_domain(decode_product(row)?) {
                products.push(product);
            }
        }
        Ok(products)
    }

    /// Active products matching `filters`, each with its primary image only.
    ///
    /// An unconfigured or unreachable store yields an empty list; use
    /// [`get_all_checked`](Self::get_all_checked) to observe that condition.
    #[instrument(skip(self))]
    pub async fn get_all(&self, filters: &FilterOptions) -> StorefrontResult<Vec<Product>> {
        match self.get_all_checked(filters).await {
            Err(err) if err.is_configuration() => {
                warn!(error = %err, "Product listing unavailable, returning no products");
                Ok(Vec::new())
            }
            result => result,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_all_checked(&self, filters: &FilterOptions) -> StorefrontResult<Vec<Product>> {
        let store = self.store()?;
        let query = SelectQuery::from(PRODUCTS_TABLE)
            .relation(RelationSelect::new(IMAGES_TABLE).only("is_primary", true))
            .filter(Predicate::eq("is_active", true))
            .apply(build_directives(filters));

        let rows = store.select(query).await?;
        Self::decode_rows(rows)
    }

    /// Active product with every relation, images in display order.
    /// `None` when no active product has this id.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> StorefrontResult<Option<Product>> {
        let store = self.store()?;
        let query = SelectQuery::from(PRODUCTS_TABLE)
            .relation(RelationSelect::new(IMAGES_TABLE).ordered(Order::asc("display_order")))
            .relation(RelationSelect::new(VARIANTS_TABLE))
            .relation(RelationSelect::new(ATTRIBUTES_TABLE))
            .filter(Predicate::eq("id", id.to_string()))
            .filter(Predicate::eq("is_active", true));

        match store.select_single(query).await {
            Ok(row) => Ok(to_domain(decode_product(row)?)),
            Err(StoreError::NoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Distinct brands, categories and tags among active products, sorted.
    /// Degrades to empty lists like [`get_all`](Self::get_all).
    #[instrument(skip(self))]
    pub async fn get_filter_options(&self, gender: Option<&str>) -> StorefrontResult<AvailableFilters> {
        match self.get_filter_options_checked(gender).await {
            Err(err) if err.is_configuration() => {
                warn!(error = %err, "Filter options unavailable, returning none");
                Ok(AvailableFilters::default())
            }
            result => result,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_filter_options_checked(
        &self,
        gender: Option<&str>,
    ) -> StorefrontResult<AvailableFilters> {
        let store = self.store()?;
        let mut query = SelectQuery::from(PRODUCTS_TABLE)
            .columns(&["brand", "category", "tag"])
            .filter(Predicate::eq("is_active", true));
        if let Some(gender) = gender.map(str::trim).filter(|g| !g.is_empty()) {
            query = query.filter(Predicate::eq("gender", gender));
        }

        let rows = store.select(query).await?;

        let mut brands = BTreeSet::new();
        let mut categories = BTreeSet::new();
        let mut tags = BTreeSet::new();
        for row in &rows {
            let text = |column: &str| {
                row.get(column)
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };
            brands.extend(text("brand"));
            categories.extend(text("category"));
            tags.extend(text("tag"));
        }

        Ok(AvailableFilters {
            brands: brands.into_iter().collect(),
            categories: categories.into_iter().collect(),
            tags: tags.iter().filter_map(|tag| tag.parse().ok()).collect(),
        })
    }

    /// Quick search over name, description and brand among active products
    /// that have a primary image. At most [`SEARCH_LIMIT`] results.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> StorefrontResult<Vec<Product>> {
        let store = self.store()?;
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let query = SelectQuery::from(PRODUCTS_TABLE)
            .relation(
                RelationSelect::new(IMAGES_TABLE)
                    .only("is_primary", true)
                    .inner(),
            )
            .filter(Predicate::eq("is_active", true))
            .filter(Predicate::search(term))
            .limit(SEARCH_LIMIT);

        let rows = store.select(query).await?;
        Self::decode_rows(rows)
    }

    /// Insert the product row, then its primary image when a URL is given.
    ///
    /// If the written row cannot be decoded or the image insert fails, the
    /// product row stays and the error is [`StorefrontError::PartialFailure`]
    /// carrying its id.
    #[instrument(skip(self, input), fields(product_name = %input.name))]
    pub async fn create_product(&self, input: CreateProduct) -> StorefrontResult<Product> {
        input.validate()?;
        let store = self.store()?;

        let mut row = Map::new();
        row.insert("name".into(), input.name.clone().into());
        row.insert("description".into(), input.description.into());
        row.insert("price".into(), input.price.into());
        row.insert("original_price".into(), input.original_price.into());
        row.insert("gender".into(), input.gender.into());
        row.insert("category".into(), input.category.into());
        row.insert("brand".into(), input.brand.into());
        row.insert("tag".into(), input.tag.map(|tag| tag.to_string()).into());
        row.insert("stock_quantity".into(), input.stock_quantity.into());
        row.insert("is_active".into(), input.is_active.unwrap_or(true).into());
        row.insert("rating".into(), 0.into());
        row.insert("review_count".into(), 0.into());

        let created = store.insert(PRODUCTS_TABLE, row).await?;
        let written_id = created
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok());
        let decoded = decode_product(created).and_then(|record| {
            to_domain(record).ok_or_else(|| {
                StorefrontError::Serialization("insert returned an empty product row".to_string())
            })
        });
        let mut product = match (decoded, written_id) {
            (Ok(product), _) => product,
            (Err(err), Some(product_id)) => {
                error!(%product_id, error = %err, "Created product row could not be decoded");
                return Err(StorefrontError::PartialFailure {
                    product_id,
                    source: Box::new(err),
                });
            }
            (Err(err), None) => return Err(err),
        };
        info!(product_id = %product.id, "Product created");

        let Some(image_url) = input.image_url else {
            product.product_images = Some(Vec::new());
            return Ok(product);
        };

        let mut image = Map::new();
        image.insert("product_id".into(), product.id.to_string().into());
        image.insert("image_url".into(), image_url.into());
        image.insert("alt_text".into(), input.name.into());
        image.insert("is_primary".into(), true.into());
        image.insert("display_order".into(), 1.into());

        let stored = match store.insert(IMAGES_TABLE, image).await {
            Ok(stored) => stored,
            Err(err) => {
                error!(
                    product_id = %product.id,
                    error = %err,
                    "Primary image insert failed, product row left in place"
                );
                return Err(StorefrontError::PartialFailure {
                    product_id: product.id,
                    source: Box::new(err.into()),
                });
            }
        };

        let image = decode_image(stored).map_err(|err| StorefrontError::PartialFailure {
            product_id: product.id,
            source: Box::new(err),
        })?;
        product.product_images = Some(vec![image_to_domain(image)]);
        Ok(product)
    }

    /// Write the present fields of `input` to the product row.
    #[instrument(skip(self, input))]
    pub async fn update_product(&self, id: Uuid, input: UpdateProduct) -> StorefrontResult<Product> {
        input.validate()?;
        let store = self.store()?;

        let partial = match serde_json::to_value(&input)? {
            Value::Object(partial) => partial,
            _ => Map::new(),
        };
        let patch = to_storage_patch(&partial);
        let by_id = vec![Predicate::eq("id", id.to_string())];

        let row = if patch.is_empty() {
            let query = SelectQuery::from(PRODUCTS_TABLE).filter(Predicate::eq("id", id.to_string()));
            match store.select_single(query).await {
                Err(StoreError::NoRows) => None,
                result => Some(result?),
            }
        } else {
            store.update(PRODUCTS_TABLE, by_id, patch).await?.into_iter().next()
        };

        let row = row.ok_or_else(|| StorefrontError::NotFound(format!("product {id}")))?;
        let product = to_domain(decode_product(row)?)
            .ok_or_else(|| StorefrontError::NotFound(format!("product {id}")))?;

        info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Remove the product row.
    ///
    /// Unlike a plain store delete, an id that matches no row is reported as
    /// [`StorefrontError::NotFound`] instead of succeeding.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> StorefrontResult<bool> {
        let store = self.store()?;
        let deleted = store
            .delete(PRODUCTS_TABLE, vec![Predicate::eq("id", id.to_string())])
            .await?;

        if deleted == 0 {
            return Err(StorefrontError::NotFound(format!("product {id}")));
        }

        info!(product_id = %id, "Product deleted");
        Ok(true)
    }
}

impl<S: RemoteStore> Clone for ProductRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
