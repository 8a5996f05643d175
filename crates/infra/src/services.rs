//! Thin application services over the product store.
//!
//! These orchestrators validate command *shape*, delegate to the store, and
//! translate storage outcomes into the caller-facing [`ServiceError`]
//! taxonomy. Business-state enforcement — sku uniqueness, version matching,
//! deletion visibility — lives in the store's conditional writes, never here:
//! an in-process check could always be raced past between its read and the
//! write it was meant to guard.

use chrono::Utc;
use thiserror::Error;

use stockroom_core::{DomainError, PageResult, ProductId};
use stockroom_products::{CreateProduct, Product, SearchCriteria, UpdateProduct};

use crate::store::{ProductStore, StoreError};

/// Version assigned to new products unless configured otherwise.
pub const DEFAULT_INITIAL_VERSION: i64 = 0;

/// Caller-facing outcome taxonomy.
///
/// All four business variants are expected, recoverable results — returned,
/// never swallowed, never retried internally. Unexpected storage failures
/// pass through as [`ServiceError::Store`] untouched.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input, rejected before any store interaction.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The sku is already taken — by any record, soft-deleted ones included.
    #[error("sku already exists: {0}")]
    DuplicateSku(String),

    /// No record, or no *visible* record where visibility matters.
    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// The record exists and is active, but the caller's version token is
    /// stale. Re-read and retry with a fresh version; blind retries here
    /// could overwrite an intervening change the caller never saw.
    #[error("version conflict on product {id}: expected version {expected}")]
    VersionConflict { id: ProductId, expected: i64 },

    /// Infrastructure failure, propagated unchanged.
    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateKey(key) => ServiceError::DuplicateSku(key),
            other => ServiceError::Store(other),
        }
    }
}

/// Creates products.
pub struct ProductCreateService<S> {
    store: S,
    initial_version: i64,
}

impl<S: ProductStore> ProductCreateService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            initial_version: DEFAULT_INITIAL_VERSION,
        }
    }

    /// Override the version assigned to new products (default 0).
    pub fn with_initial_version(mut self, initial_version: i64) -> Self {
        self.initial_version = initial_version;
        self
    }

    /// Read the initial version from `PRODUCTS_INITIAL_VERSION` (default 0).
    pub fn from_env(store: S) -> Self {
        let initial_version = std::env::var("PRODUCTS_INITIAL_VERSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_INITIAL_VERSION);
        Self {
            store,
            initial_version,
        }
    }

    /// Create a product: id and timestamps assigned here, version from the
    /// configured initial value.
    pub async fn create(&self, cmd: CreateProduct) -> Result<Product, ServiceError> {
        cmd.validate()?;

        // Advisory fast path for a friendlier error; the unique index behind
        // `insert` remains the authoritative guard against racing creators.
        if self.store.exists_by_sku(&cmd.sku).await? {
            return Err(ServiceError::DuplicateSku(cmd.sku));
        }

        let product = Product::create(cmd, ProductId::new(), Utc::now(), self.initial_version)?;
        Ok(self.store.insert(&product).await?)
    }
}

/// Applies conditional updates.
pub struct ProductUpdateService<S> {
    store: S,
}

impl<S: ProductStore> ProductUpdateService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// One atomic conditional write; a zero-row outcome is disambiguated with
    /// a follow-up active-existence probe.
    pub async fn update(&self, id: ProductId, cmd: UpdateProduct) -> Result<(), ServiceError> {
        cmd.validate()?;

        let expected = cmd.expected_version;
        let updated = self
            .store
            .update_if_version_matches(id, &cmd, Utc::now())
            .await?;
        if updated == 1 {
            return Ok(());
        }

        if self.store.exists_active(id).await? {
            Err(ServiceError::VersionConflict { id, expected })
        } else {
            Err(ServiceError::NotFound(id))
        }
    }
}

/// Soft-deletes products.
pub struct ProductDeleteService<S> {
    store: S,
}

impl<S: ProductStore> ProductDeleteService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Absent and already-deleted collapse to the same outcome: a second
    /// delete always reports not-found.
    pub async fn delete(&self, id: ProductId) -> Result<(), ServiceError> {
        let deleted = self.store.soft_delete(id, Utc::now()).await?;
        if deleted == 1 {
            Ok(())
        } else {
            Err(ServiceError::NotFound(id))
        }
    }
}

/// Point lookups and filtered search.
pub struct ProductQueryService<S> {
    store: S,
}

impl<S: ProductStore> ProductQueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lookup by id. Soft-deleted records are returned when present —
    /// filtering them is the caller's decision for point reads.
    pub async fn get(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    pub async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<PageResult<Product>, ServiceError> {
        Ok(self.store.search(criteria).await?)
    }
}
