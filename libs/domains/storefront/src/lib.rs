//! Storefront Domain
//!
//! Data access for a clothing storefront backed by a hosted Postgres REST
//! service and its object storage: product listing with filters, sorting and
//! search, product writes, per-user wishlists and product photo uploads.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ ProductRepository · WishlistRepository   │  ← Operations, validation, logging
//! │ FileUploadService                        │
//! └──────┬─────────────────────────┬─────────┘
//!        │                         │
//! ┌──────▼──────┐           ┌──────▼──────┐
//! │ Query       │           │ Schema      │  ← Filter options → directives,
//! │ builder     │           │ mapper      │    storage rows ↔ domain models
//! └──────┬──────┘           └──────┬──────┘
//!        │                         │
//! ┌──────▼─────────────────────────▼─────────┐
//! │ RemoteStore · ObjectStorage (traits)     │  ← PostgREST / storage REST,
//! └──────────────────────────────────────────┘    or in-memory for tests
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_storefront::{FilterOptions, Storefront};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads STOREFRONT_BACKEND_URL / STOREFRONT_BACKEND_KEY. Without them the
//! // listing reads return empty results and writes fail with a
//! // configuration error.
//! let storefront = Storefront::from_env();
//!
//! let filters = FilterOptions {
//!     gender: Some("women".to_string()),
//!     sort_by: Some("price-asc".to_string()),
//!     ..Default::default()
//! };
//! let products = storefront.products.get_all(&filters).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod postgrest;
pub mod products;
pub mod query;
pub mod schema;
pub mod storage;
pub mod store;
pub mod upload;
pub mod wishlist;

use core_config::{BackendConfig, FromEnv};
use std::sync::Arc;
use tracing::{info, warn};

// Re-export commonly used types
pub use error::{StorefrontError, StorefrontResult};
pub use memory::{InMemoryObjectStorage, InMemoryStore};
pub use models::{
    AvailableFilters, CreateProduct, FilterOptions, Product, ProductAttribute, ProductImage,
    ProductTag, ProductVariant, SortBy, UpdateProduct, WishlistEntry,
};
pub use postgrest::PostgrestStore;
pub use products::ProductRepository;
pub use storage::{HttpObjectStorage, ObjectStorage, UploadOptions};
pub use store::{RemoteStore, StoreError};
pub use upload::{FileUploadService, UploadFile, UploadRequest, UploadResult};
pub use wishlist::WishlistRepository;

/// The three services sharing one backend
pub struct Storefront<S: RemoteStore = PostgrestStore, O: ObjectStorage = HttpObjectStorage> {
    pub products: ProductRepository<S>,
    pub wishlist: WishlistRepository<S>,
    pub uploads: FileUploadService<O>,
}

impl Storefront {
    /// Connect using the environment. Missing or invalid settings produce
    /// unconfigured services instead of an error.
    pub fn from_env() -> Self {
        match BackendConfig::from_env() {
            Ok(config) => Self::connect(&config),
            Err(err) => {
                warn!(error = %err, "Storefront backend not configured");
                Self::unconfigured()
            }
        }
    }

    pub fn connect(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Falling back to a default HTTP client");
                reqwest::Client::new()
            });

        info!(url = %config.url, "Storefront backend configured");
        Self::with_backends(
            PostgrestStore::new(client.clone(), config),
            HttpObjectStorage::new(client, config),
        )
    }
}

impl<S: RemoteStore, O: ObjectStorage> Storefront<S, O> {
    pub fn with_backends(store: S, storage: O) -> Self {
        let store = Arc::new(store);
        Self {
            products: ProductRepository::from_shared(store.clone()),
            wishlist: WishlistRepository::from_shared(store),
            uploads: FileUploadService::new(storage),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            products: ProductRepository::unconfigured(),
            wishlist: WishlistRepository::unconfigured(),
            uploads: FileUploadService::unconfigured(),
        }
    }
}

impl<S: RemoteStore, O: ObjectStorage> Clone for Storefront<S, O> {
    fn clone(&self) -> Self {
        Self {
            products: self.products.clone(),
            wishlist: self.wishlist.clone(),
            uploads: self.uploads.clone(),
        }
    }
}
