//! Translation of listing options into store directives.
//!
//! The builder is pure: it only describes what the store should do. Output
//! order is fixed (equality → range → search → sort) so that generated
//! queries are reproducible.

use serde_json::Value;

use crate::models::{FilterOptions, SortBy};

/// Storage column name
pub type Column = &'static str;

/// Columns matched by free-text search
pub const SEARCH_COLUMNS: [Column; 3] = ["name", "description", "brand"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Column, Value),
    Gte(Column, Value),
    Lte(Column, Value),
    /// Case-insensitive substring match on any of the columns (OR group)
    AnyContains { columns: Vec<Column>, needle: String },
}

impl Predicate {
    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Predicate::Eq(column, value.into())
    }

    /// Free-text search across [`SEARCH_COLUMNS`]
    pub fn search(needle: impl Into<String>) -> Self {
        Predicate::AnyContains {
            columns: SEARCH_COLUMNS.to_vec(),
            needle: needle.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: Column,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            direction: Direction::Ascending,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            direction: Direction::Descending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Filter(Predicate),
    Order(Order),
}

impl From<SortBy> for Order {
    fn from(sort: SortBy) -> Self {
        match sort {
            SortBy::PriceAsc => Order::asc("price"),
            SortBy::PriceDesc => Order::desc("price"),
            SortBy::NameAsc => Order::asc("name"),
            SortBy::NameDesc => Order::desc("name"),
            SortBy::Rating => Order::desc("rating"),
            SortBy::Newest => Order::desc("created_at"),
        }
    }
}

/// Build the ordered directive list for a listing query.
///
/// Blank equality values and a blank search term are treated as absent, as
/// are non-finite price bounds. An unknown sort key emits no ordering
/// directive.
pub fn build_directives(options: &FilterOptions) -> Vec<Directive> {
    let mut directives = Vec::new();

    let equalities = [
        ("gender", options.gender.clone()),
        ("category", options.category.clone()),
        ("brand", options.brand.clone()),
        ("tag", options.tag.map(|tag| tag.to_string())),
    ];
    for (column, value) in equalities {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            directives.push(Directive::Filter(Predicate::eq(column, value)));
        }
    }

    if let Some(min) = options.min_price.filter(|v| v.is_finite()) {
        directives.push(Directive::Filter(Predicate::Gte("price", min.into())));
    }
    if let Some(max) = options.max_price.filter(|v| v.is_finite()) {
        directives.push(Directive::Filter(Predicate::Lte("price", max.into())));
    }

    if let Some(term) = options.search.as_deref().map(str::trim) {
        if !term.is_empty() {
            directives.push(Directive::Filter(Predicate::search(term)));
        }
    }

    if let Some(sort) = options.sort_key() {
        directives.push(Directive::Order(sort.into()));
    }

    directives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductTag;
    use serde_json::json;

    fn full_options() -> FilterOptions {
        FilterOptions {
            gender: Some("women".to_string()),
            category: Some("dresses".to_string()),
            brand: Some("Acme".to_string()),
            tag: Some(ProductTag::Sale),
            min_price: Some(100.0),
            max_price: Some(900.0),
            search: Some("linen".to_string()),
            sort_by: Some("price-desc".to_string()),
        }
    }

    #[test]
    fn test_build_directives_empty() {
        assert!(build_directives(&FilterOptions::default()).is_empty());
    }

    #[test]
    fn test_build_directives_fixed_precedence() {
        let directives = build_directives(&full_options());

        assert_eq!(
            directives,
            vec![
                Directive::Filter(Predicate::Eq("gender", json!("women"))),
                Directive::Filter(Predicate::Eq("category", json!("dresses"))),
                Directive::Filter(Predicate::Eq("brand", json!("Acme"))),
                Directive::Filter(Predicate::Eq("tag", json!("SALE"))),
                Directive::Filter(Predicate::Gte("price", json!(100.0))),
                Directive::Filter(Predicate::Lte("price", json!(900.0))),
                Directive::Filter(Predicate::AnyContains {
                    columns: vec!["name", "description", "brand"],
                    needle: "linen".to_string(),
                }),
                Directive::Order(Order::desc("price")),
            ]
        );
    }

    #[test]
    fn test_build_directives_is_pure() {
        let options = full_options();
        assert_eq!(build_directives(&options), build_directives(&options));
    }

    #[test]
    fn test_sort_table() {
        let cases = [
            ("price-asc", Order::asc("price")),
            ("price-desc", Order::desc("price")),
            ("name-asc", Order::asc("name")),
            ("name-desc", Order::desc("name")),
            ("rating", Order::desc("rating")),
            ("newest", Order::desc("created_at")),
        ];
        for (key, expected) in cases {
            let options = FilterOptions {
                sort_by: Some(key.to_string()),
                ..Default::default()
            };
            assert_eq!(
                build_directives(&options),
                vec![Directive::Order(expected)],
                "sort key {key}"
            );
        }
    }

    #[test]
    fn test_unknown_sort_emits_no_order() {
        let options = FilterOptions {
            sort_by: Some("best-match".to_string()),
            ..Default::default()
        };
        assert!(build_directives(&options).is_empty());
    }

    #[test]
    fn test_blank_search_is_skipped() {
        let options = FilterOptions {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(build_directives(&options).is_empty());
    }

    #[test]
    fn test_search_term_is_trimmed() {
        let options = FilterOptions {
            search: Some("  shirt ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_directives(&options),
            vec![Directive::Filter(Predicate::search("shirt"))]
        );
    }

    #[test]
    fn test_blank_equality_values_are_skipped() {
        let options = FilterOptions {
            gender: Some(String::new()),
            category: Some("  ".to_string()),
            brand: Some(" Acme ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_directives(&options),
            vec![Directive::Filter(Predicate::Eq("brand", json!("Acme")))]
        );
    }

    #[test]
    fn test_non_finite_price_bounds_are_skipped() {
        let options = FilterOptions {
            min_price: Some(f64::NAN),
            max_price: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(build_directives(&options).is_empty());

        let options = FilterOptions {
            min_price: Some(f64::NEG_INFINITY),
            max_price: Some(250.0),
            ..Default::default()
        };
        assert_eq!(
            build_directives(&options),
            vec![Directive::Filter(Predicate::Lte("price", json!(250.0)))]
        );
    }
}
