//! # Product Catalog
//!
//! Maps product identifiers to the digital files delivered after purchase.
//! Products are loaded from `config/products.toml`; without one the built-in
//! catalog is used.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A product in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (e.g., "tracker-habitos")
    pub id: String,

    /// Display title
    pub title: String,

    /// File names delivered for this product, in attachment order
    pub files: Vec<String>,

    /// Whether this product is active and available for purchase
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

fn default_fallback_extension() -> String {
    "xlsx".to_string()
}

impl Product {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            files: Vec::new(),
            active: true,
        }
    }

    /// Builder: add a delivered file
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.files.push(file.into());
        self
    }
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,

    /// Extension used to synthesize a file name for unknown products
    #[serde(default = "default_fallback_extension")]
    pub fallback_extension: String,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
            fallback_extension: default_fallback_extension(),
        }
    }

    /// Catalog shipped with the store
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.add(
            Product::new("tracker-habitos", "Tracker de Hábitos").with_file("tracker-habitos.xlsx"),
        );
        catalog.add(
            Product::new("planificador-financiero", "Planificador Financiero")
                .with_file("planificador-financiero.xlsx"),
        );
        catalog.add(
            Product::new("pack-productividad", "Pack Productividad")
                .with_file("tracker-habitos.xlsx")
                .with_file("planificador-financiero.xlsx"),
        );
        catalog
    }

    /// Add a product to the catalog
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Get all active products
    pub fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.active)
    }

    /// Title for display, if the product is known
    pub fn title(&self, id: &str) -> Option<&str> {
        self.get(id).map(|p| p.title.as_str())
    }

    /// File names to deliver for a product.
    ///
    /// Unknown products (or products with no files listed) fall back to a
    /// single `<product_id>.<fallback_extension>` candidate. Never empty;
    /// whether the files exist is checked by the caller.
    pub fn resolve_files(&self, product_id: &str) -> Vec<String> {
        match self.get(product_id) {
            Some(product) if !product.files.is_empty() => product.files.clone(),
            _ => {
                warn!(
                    product_id,
                    "Product not in catalog, falling back to synthesized file name"
                );
                vec![format!("{}.{}", product_id, self.fallback_extension)]
            }
        }
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
