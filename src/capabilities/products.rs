use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    pub price: f64,
}

impl Product {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self { name: name.into(), price }
    }
}

/// Payload of a successful product search.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProductSearch {
    pub products: Vec<Product>,
    pub total: usize,
}

impl ProductSearch {
    pub fn new(products: Vec<Product>) -> Self {
        let total = products.len();
        Self { products, total }
    }
}

/// Arguments the model supplies for `search_products`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SearchProductsArgs {
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

/// In-memory product catalog keyed by lower-case category.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: BTreeMap<String, Vec<Product>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog the demo ships with.
    pub fn demo() -> Self {
        Self::new().with_category(
            "electronics",
            vec![
                Product::new("Dell USB Mouse", 12.99),
                Product::new("Dell Keyboard Cover", 19.99),
                Product::new("Dell Laptop Sleeve", 24.99),
                Product::new("Dell Wireless Mouse", 29.99),
                Product::new("Dell Power Bank", 49.99),
            ],
        )
    }

    pub fn with_category(mut self, category: impl Into<String>, products: Vec<Product>) -> Self {
        self.categories
            .entry(category.into().to_lowercase())
            .or_default()
            .extend(products);
        self
    }

    /// Case-insensitive substring match on product names.
    ///
    /// Without a category every category is searched; an unknown category
    /// yields an empty result. `max_price` is inclusive.
    pub fn search(&self, query: &str, category: Option<&str>, max_price: Option<f64>) -> ProductSearch {
        let needle = query.to_lowercase();

        let candidates: Vec<&Product> = match category {
            Some(c) => self
                .categories
                .get(&c.to_lowercase())
                .map(|products| products.iter().collect())
                .unwrap_or_default(),
            None => self.categories.values().flatten().collect(),
        };

        let products = candidates
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .filter(|p| max_price.map_or(true, |max| p.price <= max))
            .cloned()
            .collect();

        ProductSearch::new(products)
    }

    pub fn search_with(&self, args: &SearchProductsArgs) -> ProductSearch {
        self.search(&args.query, args.category.as_deref(), args.max_price)
    }
}
