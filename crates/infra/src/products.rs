//! Product lookup (external collaborator).
//!
//! Product CRUD lives outside this service. Sizing only needs to know that a
//! product exists and which category it was created with.

use serde::{Deserialize, Serialize};

use atelier_core::{AggregateId, TenantId};
use atelier_sizing::{Category, ProductId};

use crate::read_model::{InMemoryTenantStore, TenantStore};

/// What the directory knows about a product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: ProductId,
    pub category: Category,
}

/// Read-only product lookup, tenant-scoped.
pub trait ProductDirectory: Send + Sync {
    /// Category of a product, or `None` if the tenant has no such product.
    fn category(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Category>;
}

impl<D> ProductDirectory for std::sync::Arc<D>
where
    D: ProductDirectory + ?Sized,
{
    fn category(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Category> {
        (**self).category(tenant_id, product_id)
    }
}

/// In-memory directory for the dev server and tests.
#[derive(Debug, Default)]
pub struct InMemoryProductDirectory {
    products: InMemoryTenantStore<ProductId, ProductRecord>,
}

impl InMemoryProductDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new product with a fresh id.
    pub fn register(&self, tenant_id: TenantId, category: Category) -> ProductRecord {
        let record = ProductRecord {
            product_id: ProductId::new(AggregateId::new()),
            category,
        };
        self.insert(tenant_id, record);
        record
    }

    /// Register (or overwrite) a product with a known id.
    pub fn insert(&self, tenant_id: TenantId, record: ProductRecord) {
        self.products.upsert(tenant_id, record.product_id, record);
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductRecord> {
        self.products.list(tenant_id)
    }
}

impl ProductDirectory for InMemoryProductDirectory {
    fn category(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Category> {
        self.products
            .get(tenant_id, &product_id)
            .map(|record| record.category)
    }
}
