//! Integration tests for the Storefront domain
//!
//! These run every service against the in-memory store and object storage to
//! check the observable behaviour end to end:
//! - Writes are visible through the read paths
//! - Inactive products never leave the repository
//! - Uniqueness and overwrite rules surface as conflicts
//! - An unconfigured backend degrades reads instead of failing

use domain_storefront::*;
use uuid::Uuid;

type MemoryStorefront = Storefront<InMemoryStore, InMemoryObjectStorage>;

fn storefront() -> (MemoryStorefront, InMemoryStore, InMemoryObjectStorage) {
    let store = InMemoryStore::storefront();
    let storage = InMemoryObjectStorage::new("https://cdn.test");
    let storefront = Storefront::with_backends(store.clone(), storage.clone());
    (storefront, store, storage)
}

fn product(name: &str, brand: &str, price: f64) -> CreateProduct {
    CreateProduct {
        name: name.to_string(),
        description: format!("{name} by {brand}"),
        price,
        original_price: None,
        gender: "unisex".to_string(),
        category: "t-shirts".to_string(),
        brand: brand.to_string(),
        tag: None,
        stock_quantity: 10,
        is_active: None,
        image_url: Some(format!("https://cdn.test/{name}.jpg")),
    }
}

// ============================================================================
// Product Repository Tests
// ============================================================================

#[tokio::test]
async fn test_create_then_get_by_id_has_single_primary_image() {
    let (storefront, _, _) = storefront();

    let created = storefront
        .products
        .create_product(product("Tee", "Acme", 499.0))
        .await
        .unwrap();
    assert_eq!(created.rating, 0.0);
    assert_eq!(created.review_count, 0);
    assert!(created.is_active);

    let fetched = storefront
        .products
        .get_by_id(created.id)
        .await
        .unwrap()
        .expect("product should exist");

    let images = fetched.product_images.expect("images are fetched by id");
    assert_eq!(images.len(), 1);
    assert!(images[0].is_primary);
    assert_eq!(images[0].display_order, 1);
    assert_eq!(images[0].alt_text, "Tee");
    assert_eq!(fetched.product_variants, Some(vec![]));
    assert_eq!(fetched.product_attributes, Some(vec![]));
}

#[tokio::test]
async fn test_create_without_image_url_has_no_images() {
    let (storefront, store, _) = storefront();
    let mut input = product("Tee", "Acme", 499.0);
    input.image_url = None;

    let created = storefront.products.create_product(input).await.unwrap();

    assert_eq!(created.product_images, Some(vec![]));
    assert!(store.rows("product_images").await.is_empty());
}

#[tokio::test]
async fn test_update_price_only_changes_price() {
    let (storefront, _, _) = storefront();
    let created = storefront
        .products
        .create_product(product("Tee", "Acme", 499.0))
        .await
        .unwrap();
    let before = storefront.products.get_by_id(created.id).await.unwrap().unwrap();

    let update = UpdateProduct {
        price: Some(599.0),
        ..Default::default()
    };
    let updated = storefront
        .products
        .update_product(created.id, update)
        .await
        .unwrap();
    assert_eq!(updated.price, 599.0);

    let after = storefront.products.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(after, Product { price: 599.0, ..before });
}

#[tokio::test]
async fn test_update_stock_to_zero_is_written() {
    let (storefront, _, _) = storefront();
    let created = storefront
        .products
        .create_product(product("Tee", "Acme", 499.0))
        .await
        .unwrap();

    let update = UpdateProduct {
        stock_quantity: Some(0),
        is_active: Some(true),
        ..Default::default()
    };
    let updated = storefront
        .products
        .update_product(created.id, update)
        .await
        .unwrap();
    assert_eq!(updated.stock_quantity, 0);
}

#[tokio::test]
async fn test_empty_update_returns_current_product() {
    let (storefront, _, _) = storefront();
    let created = storefront
        .products
        .create_product(product("Tee", "Acme", 499.0))
        .await
        .unwrap();

    let unchanged = storefront
        .products
        .update_product(created.id, UpdateProduct::default())
        .await
        .unwrap();
    assert_eq!(unchanged.name, "Tee");
    assert_eq!(unchanged.price, 499.0);
}

#[tokio::test]
async fn test_update_and_delete_missing_product_are_not_found() {
    let (storefront, _, _) = storefront();
    let id = Uuid::now_v7();

    let update = UpdateProduct {
        price: Some(1.0),
        ..Default::default()
    };
    let err = storefront.products.update_product(id, update).await.unwrap_err();
    assert!(matches!(err, StorefrontError::NotFound(_)));

    let err = storefront.products.delete_product(id).await.unwrap_err();
    assert!(matches!(err, StorefrontError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_product() {
    let (storefront, _, _) = storefront();
    let created = storefront
        .products
        .create_product(product("Tee", "Acme", 499.0))
        .await
        .unwrap();

    assert!(storefront.products.delete_product(created.id).await.unwrap());
    assert!(storefront.products.get_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_inactive_products_are_hidden_from_every_read() {
    let (storefront, _, _) = storefront();
    let mut hidden = product("Hidden Tee", "Ghost", 499.0);
    hidden.is_active = Some(false);
    let hidden = storefront.products.create_product(hidden).await.unwrap();
    storefront
        .products
        .create_product(product("Visible Tee", "Acme", 499.0))
        .await
        .unwrap();

    let all = storefront
        .products
        .get_all(&FilterOptions::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all.iter().all(|p| p.is_active));

    assert!(storefront.products.get_by_id(hidden.id).await.unwrap().is_none());

    let found = storefront.products.search("tee").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Visible Tee");

    let filters = storefront.products.get_filter_options(None).await.unwrap();
    assert_eq!(filters.brands, vec!["Acme".to_string()]);
}

#[tokio::test]
async fn test_get_all_filters_and_sorts() {
    let (storefront, _, _) = storefront();
    for (name, brand, price) in [
        ("Basic Tee", "Acme", 299.0),
        ("Linen Shirt", "Northwind", 1299.0),
        ("Graphic Tee", "Acme", 799.0),
        ("Wool Coat", "Acme", 4999.0),
    ] {
        storefront
            .products
            .create_product(product(name, brand, price))
            .await
            .unwrap();
    }

    let filters = FilterOptions {
        brand: Some("Acme".to_string()),
        min_price: Some(500.0),
        max_price: Some(5000.0),
        sort_by: Some("price-desc".to_string()),
        ..Default::default()
    };
    let products = storefront.products.get_all(&filters).await.unwrap();
    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Wool Coat", "Graphic Tee"]);

    let listing_image = products[0].primary_image().expect("primary image embedded");
    assert!(listing_image.is_primary);
}

#[tokio::test]
async fn test_get_all_search_matches_description_and_brand() {
    let (storefront, _, _) = storefront();
    storefront
        .products
        .create_product(product("Basic Tee", "Acme", 299.0))
        .await
        .unwrap();
    storefront
        .products
        .create_product(product("Linen Shirt", "Northwind", 1299.0))
        .await
        .unwrap();

    let filters = FilterOptions {
        search: Some("NORTH".to_string()),
        ..Default::default()
    };
    let products = storefront.products.get_all(&filters).await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].brand, "Northwind");
}

#[tokio::test]
async fn test_blank_filter_values_are_ignored() {
    let (storefront, _, _) = storefront();
    storefront
        .products
        .create_product(product("Basic Tee", "Acme", 299.0))
        .await
        .unwrap();

    let filters = FilterOptions {
        gender: Some(String::new()),
        brand: Some("  ".to_string()),
        min_price: Some(f64::NAN),
        search: Some(" ".to_string()),
        ..Default::default()
    };
    assert_eq!(storefront.products.get_all(&filters).await.unwrap().len(), 1);

    let options = storefront.products.get_filter_options(Some("")).await.unwrap();
    assert_eq!(options.brands, vec!["Acme"]);
}

#[tokio::test]
async fn test_search_wildcards_are_literal() {
    let (storefront, _, _) = storefront();
    storefront
        .products
        .create_product(product("The Tee", "Acme", 299.0))
        .await
        .unwrap();

    assert!(storefront.products.search("*").await.unwrap().is_empty());
    assert!(storefront.products.search("t*e").await.unwrap().is_empty());
    assert_eq!(storefront.products.search("the").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_sort_key_keeps_results() {
    let (storefront, _, _) = storefront();
    storefront
        .products
        .create_product(product("Basic Tee", "Acme", 299.0))
        .await
        .unwrap();

    let filters = FilterOptions {
        sort_by: Some("popularity".to_string()),
        ..Default::default()
    };
    assert_eq!(storefront.products.get_all(&filters).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_is_capped() {
    let (storefront, _, _) = storefront();
    for i in 0..60 {
        storefront
            .products
            .create_product(product(&format!("Tee {i}"), "Acme", 100.0 + i as f64))
            .await
            .unwrap();
    }

    let found = storefront.products.search("tee").await.unwrap();
    assert_eq!(found.len(), 50);
}

#[tokio::test]
async fn test_search_requires_primary_image() {
    let (storefront, _, _) = storefront();
    let mut bare = product("Bare Tee", "Acme", 299.0);
    bare.image_url = None;
    storefront.products.create_product(bare).await.unwrap();

    assert!(storefront.products.search("tee").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_filter_options_are_sorted_and_distinct() {
    let (storefront, _, _) = storefront();
    for (name, brand, category, gender, tag) in [
        ("A", "Zeta", "shirts", "men", Some(ProductTag::Sale)),
        ("B", "Acme", "jackets", "men", None),
        ("C", "Acme", "shirts", "men", Some(ProductTag::Bestseller)),
        ("D", "Moda", "dresses", "women", Some(ProductTag::New)),
    ] {
        let mut input = product(name, brand, 100.0);
        input.category = category.to_string();
        input.gender = gender.to_string();
        input.tag = tag;
        storefront.products.create_product(input).await.unwrap();
    }

    let men = storefront.products.get_filter_options(Some("men")).await.unwrap();
    assert_eq!(men.brands, vec!["Acme", "Zeta"]);
    assert_eq!(men.categories, vec!["jackets", "shirts"]);
    assert_eq!(men.tags, vec![ProductTag::Bestseller, ProductTag::Sale]);

    let everyone = storefront.products.get_filter_options(None).await.unwrap();
    assert_eq!(everyone.brands, vec!["Acme", "Moda", "Zeta"]);
    assert_eq!(everyone.tags.len(), 3);
}

// ============================================================================
// Wishlist Repository Tests
// ============================================================================

#[tokio::test]
async fn test_wishlist_duplicate_add_conflicts() {
    let (storefront, _, _) = storefront();
    let (user, product) = (Uuid::now_v7(), Uuid::now_v7());

    storefront.wishlist.add(user, product).await.unwrap();
    let err = storefront.wishlist.add(user, product).await.unwrap_err();

    assert!(matches!(err, StorefrontError::Conflict(_)));
}

#[tokio::test]
async fn test_wishlist_remove_is_idempotent() {
    let (storefront, _, _) = storefront();
    let (user, product) = (Uuid::now_v7(), Uuid::now_v7());
    storefront.wishlist.add(user, product).await.unwrap();

    storefront.wishlist.remove(user, product).await.unwrap();
    storefront.wishlist.remove(user, product).await.unwrap();

    assert!(!storefront.wishlist.contains(user, product).await.unwrap());
}

#[tokio::test]
async fn test_wishlist_lists_only_the_users_products() {
    let (storefront, _, _) = storefront();
    let (alice, bob) = (Uuid::now_v7(), Uuid::now_v7());
    let (first, second) = (Uuid::now_v7(), Uuid::now_v7());

    storefront.wishlist.add(alice, first).await.unwrap();
    storefront.wishlist.add(alice, second).await.unwrap();
    storefront.wishlist.add(bob, first).await.unwrap();

    assert_eq!(
        storefront.wishlist.list_by_user(alice).await.unwrap(),
        vec![first, second]
    );
    assert_eq!(storefront.wishlist.list_by_user(bob).await.unwrap(), vec![first]);
    assert!(storefront.wishlist.contains(bob, first).await.unwrap());
    assert!(!storefront.wishlist.contains(bob, second).await.unwrap());
}

// ============================================================================
// Upload Tests
// ============================================================================

#[tokio::test]
async fn test_upload_stores_object_and_returns_public_url() {
    let (storefront, _, storage) = storefront();
    let file = UploadFile::new("front.JPG", vec![7; 1024]).with_content_type("image/jpeg");

    let result = storefront
        .uploads
        .upload_file(UploadRequest::new(Some(file)).folder("men"))
        .await
        .unwrap();

    assert!(result.path.starts_with("men/"));
    assert!(result.path.ends_with(".jpg"));
    assert_eq!(result.url, format!("https://cdn.test/products/{}", result.path));

    let stored = storage.get("products", &result.path).await.unwrap();
    assert_eq!(stored.payload.len(), 1024);
    assert!(!stored.options.upsert);
}

#[tokio::test]
async fn test_same_file_uploaded_twice_gets_two_paths() {
    let (storefront, _, storage) = storefront();
    let file = UploadFile::new("a.png", vec![1, 2, 3]);

    let first = storefront
        .uploads
        .upload_file(UploadRequest::new(Some(file.clone())))
        .await
        .unwrap();
    let second = storefront
        .uploads
        .upload_file(UploadRequest::new(Some(file)))
        .await
        .unwrap();

    assert_ne!(first.path, second.path);
    assert_eq!(storage.len().await, 2);
}

#[tokio::test]
async fn test_oversize_upload_writes_nothing() {
    let (storefront, _, storage) = storefront();
    let file = UploadFile::new("big.jpg", vec![0; 6 * 1024 * 1024]);

    let err = storefront
        .uploads
        .upload_file(UploadRequest::new(Some(file)))
        .await
        .unwrap_err();

    assert!(matches!(err, StorefrontError::Validation(_)));
    assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_delete_file() {
    let (storefront, _, storage) = storefront();
    let file = UploadFile::new("a.png", vec![1]);
    let uploaded = storefront
        .uploads
        .upload_file(UploadRequest::new(Some(file)).bucket("banners"))
        .await
        .unwrap();

    storefront
        .uploads
        .delete_file("banners", &uploaded.path)
        .await
        .unwrap();
    assert!(storage.is_empty().await);
}

// ============================================================================
// Unconfigured Backend Tests
// ============================================================================

#[tokio::test]
async fn test_unconfigured_storefront_degrades_reads() {
    let storefront = MemoryStorefront::unconfigured();

    assert!(storefront
        .products
        .get_all(&FilterOptions::default())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        storefront.products.get_filter_options(None).await.unwrap(),
        AvailableFilters::default()
    );

    let err = storefront
        .products
        .create_product(product("Tee", "Acme", 499.0))
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let file = UploadFile::new("a.png", vec![1]);
    let err = storefront
        .uploads
        .upload_file(UploadRequest::new(Some(file)))
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}
