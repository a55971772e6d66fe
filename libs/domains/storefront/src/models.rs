use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Merchandising badge shown on a product card
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ProductTag {
    Bestseller,
    New,
    Sale,
    Trending,
    Hot,
}

/// Product as seen by UI code.
///
/// Relation fields are `None` when the query did not select the relation and
/// `Some(vec![])` when it was selected and nothing matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub gender: String,
    pub category: String,
    pub brand: String,
    pub rating: f64,
    pub review_count: i32,
    pub tag: Option<ProductTag>,
    pub is_active: bool,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ordered by `display_order`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_images: Option<Vec<ProductImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_variants: Option<Vec<ProductVariant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_attributes: Option<Vec<ProductAttribute>>,
}

impl Product {
    /// The representative image, if images were fetched and one is flagged.
    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.product_images
            .as_deref()
            .and_then(|images| images.iter().find(|image| image.is_primary))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: Uuid,
    pub image_url: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: Uuid,
    pub size: String,
    pub color: String,
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAttribute {
    pub id: Uuid,
    pub attribute_name: String,
    pub attribute_value: String,
}

/// Sort keys offered by the listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum SortBy {
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Rating,
    Newest,
}

/// Options selected on the listing page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub gender: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub tag: Option<ProductTag>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    /// Raw sort key; unknown values mean "no explicit ordering"
    pub sort_by: Option<String>,
}

impl FilterOptions {
    pub fn sort_key(&self) -> Option<SortBy> {
        self.sort_by.as_deref().and_then(|raw| raw.parse().ok())
    }
}

/// Distinct values available for the listing filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailableFilters {
    pub brands: Vec<String>,
    pub categories: Vec<String>,
    pub tags: Vec<ProductTag>,
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 0.0))]
    pub original_price: Option<f64>,
    pub gender: String,
    pub category: String,
    pub brand: String,
    pub tag: Option<ProductTag>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub stock_quantity: i32,
    /// Defaults to `true`
    pub is_active: Option<bool>,
    /// When present, stored as the product's single primary image
    #[validate(length(min = 1))]
    pub image_url: Option<String>,
}

/// Partial update; only present fields are written.
///
/// Fields outside this set (rating, tag, relations, ...) are not updatable
/// through this path and are ignored when deserializing a wider payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 200))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[validate(range(min = 0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// A product saved by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub user_id: Uuid,
    pub product_id: Uuid,
}
