//! Mapping between storage rows (snake_case, embedded relation arrays) and the
//! domain model.
//!
//! Three states are kept apart for relations: key absent (relation not
//! selected), `null` (selected, nothing there) and an array. Scalar optional
//! columns treat absent and `null` alike.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StorefrontResult;
use crate::models::{Product, ProductAttribute, ProductImage, ProductTag, ProductVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    /// Managed through separate inserts, never part of an update patch
    Relation,
}

/// One domain field and the storage column it maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub domain: &'static str,
    pub storage: &'static str,
    pub kind: FieldKind,
}

const fn scalar(domain: &'static str, storage: &'static str) -> FieldMapping {
    FieldMapping {
        domain,
        storage,
        kind: FieldKind::Scalar,
    }
}

const fn relation(domain: &'static str, storage: &'static str) -> FieldMapping {
    FieldMapping {
        domain,
        storage,
        kind: FieldKind::Relation,
    }
}

pub const PRODUCT_FIELDS: &[FieldMapping] = &[
    scalar("id", "id"),
    scalar("name", "name"),
    scalar("description", "description"),
    scalar("price", "price"),
    scalar("originalPrice", "original_price"),
    scalar("gender", "gender"),
    scalar("category", "category"),
    scalar("brand", "brand"),
    scalar("rating", "rating"),
    scalar("reviewCount", "review_count"),
    scalar("tag", "tag"),
    scalar("isActive", "is_active"),
    scalar("stockQuantity", "stock_quantity"),
    scalar("createdAt", "created_at"),
    scalar("updatedAt", "updated_at"),
    relation("productImages", "product_images"),
    relation("productVariants", "product_variants"),
    relation("productAttributes", "product_attributes"),
];

pub const IMAGE_FIELDS: &[FieldMapping] = &[
    scalar("id", "id"),
    scalar("imageUrl", "image_url"),
    scalar("altText", "alt_text"),
    scalar("isPrimary", "is_primary"),
    scalar("displayOrder", "display_order"),
];

pub const VARIANT_FIELDS: &[FieldMapping] = &[
    scalar("id", "id"),
    scalar("size", "size"),
    scalar("color", "color"),
    scalar("stockQuantity", "stock_quantity"),
];

pub const ATTRIBUTE_FIELDS: &[FieldMapping] = &[
    scalar("id", "id"),
    scalar("attributeName", "attribute_name"),
    scalar("attributeValue", "attribute_value"),
];

/// Look up the mapping for a domain field name
pub fn product_field(domain: &str) -> Option<&'static FieldMapping> {
    PRODUCT_FIELDS.iter().find(|field| field.domain == domain)
}

/// `products` row as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageProduct {
    pub id: Uuid,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    pub gender: String,
    pub category: String,
    pub brand: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub review_count: i32,
    #[serde(default)]
    pub tag: Option<String>,
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_images: Option<Option<Vec<StorageProductImage>>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_variants: Option<Option<Vec<StorageProductVariant>>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_attributes: Option<Option<Vec<StorageProductAttribute>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageProductImage {
    pub id: Uuid,
    pub image_url: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageProductVariant {
    pub id: Uuid,
    pub size: String,
    pub color: String,
    #[serde(default)]
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageProductAttribute {
    pub id: Uuid,
    pub attribute_name: String,
    pub attribute_value: String,
}

/// A key that is present decodes to `Some`, even when its value is `null`.
/// Combined with `#[serde(default)]`, a missing key stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Nullable columns with a natural zero value
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Decode one store row. A `null` row decodes to `None`.
pub fn decode_product(row: Value) -> StorefrontResult<Option<StorageProduct>> {
    if row.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(row)?))
}

pub fn decode_image(row: Value) -> StorefrontResult<StorageProductImage> {
    Ok(serde_json::from_value(row)?)
}

/// Storage → domain. Columns not declared above are dropped.
pub fn to_domain(record: Option<StorageProduct>) -> Option<Product> {
    let record = record?;

    Some(Product {
        id: record.id,
        tag: record.tag.as_deref().and_then(parse_tag),
        name: record.name,
        description: record.description,
        price: record.price,
        original_price: record.original_price,
        gender: record.gender,
        category: record.category,
        brand: record.brand,
        rating: record.rating,
        review_count: record.review_count,
        is_active: record.is_active,
        stock_quantity: record.stock_quantity,
        created_at: record.created_at,
        updated_at: record.updated_at,
        product_images: record.product_images.map(|images| {
            let mut images: Vec<ProductImage> = images
                .unwrap_or_default()
                .into_iter()
                .map(image_to_domain)
                .collect();
            images.sort_by_key(|image| image.display_order);
            images
        }),
        product_variants: record
            .product_variants
            .map(|variants| variants.unwrap_or_default().into_iter().map(variant_to_domain).collect()),
        product_attributes: record.product_attributes.map(|attributes| {
            attributes
                .unwrap_or_default()
                .into_iter()
                .map(attribute_to_domain)
                .collect()
        }),
    })
}

fn parse_tag(raw: &str) -> Option<ProductTag> {
    match raw.parse() {
        Ok(tag) => Some(tag),
        Err(_) => {
            if !raw.is_empty() {
                tracing::warn!(tag = raw, "Ignoring unknown product tag");
            }
            None
        }
    }
}

pub fn image_to_domain(image: StorageProductImage) -> ProductImage {
    ProductImage {
        id: image.id,
        image_url: image.image_url,
        alt_text: image.alt_text,
        is_primary: image.is_primary,
        display_order: image.display_order,
    }
}

fn variant_to_domain(variant: StorageProductVariant) -> ProductVariant {
    ProductVariant {
        id: variant.id,
        size: variant.size,
        color: variant.color,
        stock_quantity: variant.stock_quantity,
    }
}

fn attribute_to_domain(attribute: StorageProductAttribute) -> ProductAttribute {
    ProductAttribute {
        id: attribute.id,
        attribute_name: attribute.attribute_name,
        attribute_value: attribute.attribute_value,
    }
}

/// Domain → storage, the inverse of [`to_domain`] for every declared field.
pub fn to_storage(product: &Product) -> StorageProduct {
    StorageProduct {
        id: product.id,
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price,
        original_price: product.original_price,
        gender: product.gender.clone(),
        category: product.category.clone(),
        brand: product.brand.clone(),
        rating: product.rating,
        review_count: product.review_count,
        tag: product.tag.map(|tag| tag.to_string()),
        is_active: product.is_active,
        stock_quantity: product.stock_quantity,
        created_at: product.created_at,
        updated_at: product.updated_at,
        product_images: product.product_images.as_ref().map(|images| {
            Some(
                images
                    .iter()
                    .map(|image| StorageProductImage {
                        id: image.id,
                        image_url: image.image_url.clone(),
                        alt_text: image.alt_text.clone(),
                        is_primary: image.is_primary,
                        display_order: image.display_order,
                    })
                    .collect(),
            )
        }),
        product_variants: product.product_variants.as_ref().map(|variants| {
            Some(
                variants
                    .iter()
                    .map(|variant| StorageProductVariant {
                        id: variant.id,
                        size: variant.size.clone(),
                        color: variant.color.clone(),
                        stock_quantity: variant.stock_quantity,
                    })
                    .collect(),
            )
        }),
        product_attributes: product.product_attributes.as_ref().map(|attributes| {
            Some(
                attributes
                    .iter()
                    .map(|attribute| StorageProductAttribute {
                        id: attribute.id,
                        attribute_name: attribute.attribute_name.clone(),
                        attribute_value: attribute.attribute_value.clone(),
                    })
                    .collect(),
            )
        }),
    }
}

/// Build an update payload from a camelCase partial.
///
/// Only keys present in `partial` are emitted, whatever their value
/// (`false`, `0` and `null` included). Relation fields and undeclared keys
/// are skipped.
pub fn to_storage_patch(partial: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();
    for (key, value) in partial {
        match product_field(key) {
            Some(field) if field.kind == FieldKind::Scalar => {
                patch.insert(field.storage.to_string(), value.clone());
            }
            Some(_) => {}
            None => {
                tracing::debug!(field = %key, "Skipping undeclared field in update patch");
            }
        }
    }
    patch
}
