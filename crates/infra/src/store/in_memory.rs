use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{PageResult, ProductId};
use stockroom_products::{Product, SearchCriteria, SortDirection, SortField, SortSpec, UpdateProduct};

use super::r#trait::{ProductStore, StoreError};

/// In-memory product store.
///
/// Intended for tests/dev. Conditional writes run under the table's write
/// lock, which makes them atomic the same way a single SQL statement is: the
/// predicate check and the mutation cannot be interleaved with another
/// writer.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    rows: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, product: &Product) -> Result<Product, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        // The unique index is global: deleted rows keep holding their sku.
        if rows.values().any(|p| p.sku() == product.sku()) {
            return Err(StoreError::DuplicateKey(product.sku().to_string()));
        }
        if rows.contains_key(&product.id()) {
            return Err(StoreError::DuplicateKey(product.id().to_string()));
        }

        rows.insert(product.id(), product.clone());
        Ok(product.clone())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(rows.get(&id).cloned())
    }

    async fn exists_by_sku(&self, sku: &str) -> Result<bool, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(rows.values().any(|p| p.sku() == sku))
    }

    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(rows.get(&id).is_some_and(|p| !p.is_deleted()))
    }

    async fn update_if_version_matches(
        &self,
        id: ProductId,
        fields: &UpdateProduct,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let collision = rows
            .values()
            .any(|p| p.id() != id && p.sku() == fields.sku);

        // Predicate first: a row that is missing, deleted, or at another
        // version is simply not written (0 rows), exactly like SQL, where a
        // non-matching WHERE means the unique index is never consulted.
        let Some(product) = rows.get_mut(&id) else {
            return Ok(0);
        };
        if product.is_deleted() || product.version() != fields.expected_version {
            return Ok(0);
        }

        if collision {
            return Err(StoreError::DuplicateKey(fields.sku.clone()));
        }

        product.apply_update(fields, updated_at);
        Ok(1)
    }

    async fn soft_delete(
        &self,
        id: ProductId,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        match rows.get_mut(&id) {
            Some(product) if !product.is_deleted() => {
                product.mark_deleted(deleted_at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<PageResult<Product>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let predicates = build_predicates(criteria);
        let mut matched: Vec<Product> = rows
            .values()
            .filter(|p| predicates.iter().all(|pred| pred(p)))
            .cloned()
            .collect();
        drop(rows);

        sort_products(&mut matched, criteria.sort());

        let total = matched.len() as u64;
        let items: Vec<Product> = matched
            .into_iter()
            .skip(criteria.offset() as usize)
            .take(criteria.size() as usize)
            .collect();

        Ok(PageResult::new(
            items,
            criteria.page(),
            criteria.size(),
            total,
        ))
    }
}

type Predicate = Box<dyn Fn(&Product) -> bool + Send + Sync>;

/// Fold the criteria into a conjunction of predicates, one per present
/// filter. Absent filters contribute nothing, so empty criteria match
/// everything visible.
fn build_predicates(criteria: &SearchCriteria) -> Vec<Predicate> {
    let mut predicates: Vec<Predicate> = Vec::new();

    if !criteria.include_deleted() {
        predicates.push(Box::new(|p| !p.is_deleted()));
    }
    if let Some(category) = criteria.category() {
        let category = category.to_lowercase();
        predicates.push(Box::new(move |p| {
            p.category().is_some_and(|c| c.to_lowercase() == category)
        }));
    }
    if let Some(min_price) = criteria.min_price() {
        predicates.push(Box::new(move |p| p.price() >= min_price));
    }
    if let Some(max_price) = criteria.max_price() {
        predicates.push(Box::new(move |p| p.price() <= max_price));
    }
    if let Some(text) = criteria.text() {
        let needle = text.to_lowercase();
        predicates.push(Box::new(move |p| {
            p.name().to_lowercase().contains(&needle)
                || p
                    .description()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        }));
    }

    predicates
}

fn sort_products(products: &mut [Product], sort: SortSpec) {
    products.sort_by(|a, b| {
        let ordering = match sort.field {
            SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
            SortField::Name => a.name().cmp(b.name()),
            SortField::Sku => a.sku().cmp(b.sku()),
            SortField::Price => a.price().cmp(&b.price()),
            SortField::Stock => a.stock().cmp(&b.stock()),
        };
        // Same tie-break as the Postgres backend: id ascending.
        let ordering = ordering.then_with(|| a.id().as_uuid().cmp(b.id().as_uuid()));
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}
