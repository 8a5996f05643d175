use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ProductId};

/// Aggregate root: a catalog product.
///
/// New instances go through [`Product::create`]; the store boundary
/// rehydrates persisted rows with [`Product::from_stored`]. Every
/// mutable-field path takes a command whose `validate()` has run, so each
/// instance in circulation satisfies `price >= 0` and `stock >= 0`.
///
/// `version` is the optimistic-concurrency token: it starts at a configurable
/// initial value and grows by exactly 1 per successful mutation. `deleted_at`
/// is the soft-delete marker; once set it is never cleared (there is no
/// undelete).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i64,
    category: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: i64,
}

impl Product {
    /// Build a new active product from a validated command.
    ///
    /// `created_at` and `updated_at` are both set to `now`; `version` starts
    /// at `initial_version`.
    pub fn create(
        cmd: CreateProduct,
        id: ProductId,
        now: DateTime<Utc>,
        initial_version: i64,
    ) -> DomainResult<Self> {
        cmd.validate()?;
        Ok(Self {
            id,
            sku: cmd.sku,
            name: cmd.name,
            description: cmd.description,
            price: cmd.price,
            stock: cmd.stock,
            category: cmd.category,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: initial_version,
        })
    }

    /// Rehydrate an aggregate from persisted state.
    ///
    /// This is the explicit mapping function at the store boundary; rows were
    /// validated on the way in, so no checks are repeated here.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: ProductId,
        sku: String,
        name: String,
        description: Option<String>,
        price: Decimal,
        stock: i64,
        category: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
        version: i64,
    ) -> Self {
        Self {
            id,
            sku,
            name,
            description,
            price,
            stock,
            category,
            created_at,
            updated_at,
            deleted_at,
            version,
        }
    }

    /// Replace the mutable fields from a validated update command, stamp
    /// `updated_at`, and bump the version.
    ///
    /// `description` is fixed at creation and deliberately untouched here.
    /// Predicate checks (active, version match) are the store's concern.
    pub fn apply_update(&mut self, fields: &UpdateProduct, updated_at: DateTime<Utc>) {
        self.sku = fields.sku.clone();
        self.name = fields.name.clone();
        self.price = fields.price;
        self.stock = fields.stock;
        self.category = fields.category.clone();
        self.updated_at = updated_at;
        self.version += 1;
    }

    /// Mark the product logically deleted and bump the version.
    ///
    /// Only `deleted_at` and `version` change; `updated_at` stays as the last
    /// field-level mutation left it.
    pub fn mark_deleted(&mut self, deleted_at: DateTime<Utc>) {
        self.deleted_at = Some(deleted_at);
        self.version += 1;
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn version(&self) -> i64 {
        self.version
    }
}

/// Command: create a new product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub category: Option<String>,
}

impl CreateProduct {
    pub fn validate(&self) -> DomainResult<()> {
        validate_fields(&self.sku, &self.name, self.price, self.stock)
    }
}

/// Command: replace a product's mutable fields, guarded by the caller's
/// last-seen version.
///
/// `expected_version` is compared against the stored version inside a single
/// conditional write; a mismatch affects zero rows rather than overwriting a
/// concurrent change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    pub category: Option<String>,
    pub expected_version: i64,
}

impl UpdateProduct {
    pub fn validate(&self) -> DomainResult<()> {
        validate_fields(&self.sku, &self.name, self.price, self.stock)
    }
}

fn validate_fields(sku: &str, name: &str, price: Decimal, stock: i64) -> DomainResult<()> {
    if sku.trim().is_empty() {
        return Err(DomainError::validation("sku cannot be empty"));
    }
    if name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if price < Decimal::ZERO {
        return Err(DomainError::validation("price must be >= 0"));
    }
    if stock < 0 {
        return Err(DomainError::validation("stock must be >= 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn test_cmd() -> CreateProduct {
        CreateProduct {
            sku: "SKU-001".to_string(),
            name: "Test Product".to_string(),
            description: Some("A product for tests".to_string()),
            price: Decimal::from_f64(10.00).unwrap(),
            stock: 5,
            category: Some("tools".to_string()),
        }
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_sets_timestamps_and_initial_version() {
        let now = test_time();
        let product = Product::create(test_cmd(), ProductId::new(), now, 0).unwrap();

        assert_eq!(product.sku(), "SKU-001");
        assert_eq!(product.created_at(), now);
        assert_eq!(product.updated_at(), now);
        assert_eq!(product.deleted_at(), None);
        assert!(!product.is_deleted());
        assert_eq!(product.version(), 0);
    }

    #[test]
    fn create_honors_configured_initial_version() {
        let product = Product::create(test_cmd(), ProductId::new(), test_time(), 7).unwrap();
        assert_eq!(product.version(), 7);
    }

    #[test]
    fn create_rejects_blank_sku() {
        let cmd = CreateProduct {
            sku: "   ".to_string(),
            ..test_cmd()
        };
        let err = Product::create(cmd, ProductId::new(), test_time(), 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_blank_name() {
        let cmd = CreateProduct {
            name: String::new(),
            ..test_cmd()
        };
        let err = Product::create(cmd, ProductId::new(), test_time(), 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_negative_price() {
        let cmd = CreateProduct {
            price: Decimal::from_f64(-0.01).unwrap(),
            ..test_cmd()
        };
        let err = Product::create(cmd, ProductId::new(), test_time(), 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_accepts_zero_price_and_stock() {
        let cmd = CreateProduct {
            price: Decimal::ZERO,
            stock: 0,
            ..test_cmd()
        };
        assert!(Product::create(cmd, ProductId::new(), test_time(), 0).is_ok());
    }

    #[test]
    fn update_command_rejects_negative_stock() {
        let cmd = UpdateProduct {
            sku: "SKU-001".to_string(),
            name: "Test Product".to_string(),
            price: Decimal::ONE,
            stock: -1,
            category: None,
            expected_version: 0,
        };
        assert!(matches!(
            cmd.validate().unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn apply_update_replaces_fields_and_bumps_version() {
        let mut product = Product::create(test_cmd(), ProductId::new(), test_time(), 0).unwrap();
        let created_at = product.created_at();

        let later = test_time();
        let cmd = UpdateProduct {
            sku: "SKU-002".to_string(),
            name: "Renamed".to_string(),
            price: Decimal::from_f64(12.00).unwrap(),
            stock: 3,
            category: None,
            expected_version: 0,
        };
        product.apply_update(&cmd, later);

        assert_eq!(product.sku(), "SKU-002");
        assert_eq!(product.name(), "Renamed");
        assert_eq!(product.category(), None);
        assert_eq!(product.version(), 1);
        assert_eq!(product.updated_at(), later);
        // create-only fields survive
        assert_eq!(product.created_at(), created_at);
        assert_eq!(product.description(), Some("A product for tests"));
    }

    #[test]
    fn mark_deleted_sets_marker_and_bumps_version() {
        let mut product = Product::create(test_cmd(), ProductId::new(), test_time(), 0).unwrap();
        let updated_at = product.updated_at();

        let ts = test_time();
        product.mark_deleted(ts);

        assert_eq!(product.deleted_at(), Some(ts));
        assert!(product.is_deleted());
        assert_eq!(product.version(), 1);
        assert_eq!(product.updated_at(), updated_at);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any command with non-blank sku/name and non-negative
            /// price/stock constructs, preserving every field.
            #[test]
            fn valid_commands_always_construct(
                sku in "[A-Z0-9-]{1,20}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,99}",
                cents in 0i64..10_000_000,
                stock in 0i64..1_000_000,
            ) {
                let price = Decimal::new(cents, 2);
                let cmd = CreateProduct {
                    sku: sku.clone(),
                    name: name.clone(),
                    description: None,
                    price,
                    stock,
                    category: None,
                };

                let product = Product::create(cmd, ProductId::new(), Utc::now(), 0).unwrap();
                prop_assert_eq!(product.sku(), sku.as_str());
                prop_assert_eq!(product.name(), name.as_str());
                prop_assert_eq!(product.price(), price);
                prop_assert_eq!(product.stock(), stock);
            }

            /// Property: a negative price is always rejected, regardless of the
            /// other fields.
            #[test]
            fn negative_price_always_rejected(
                sku in "[A-Z0-9-]{1,20}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,99}",
                cents in 1i64..10_000_000,
                stock in 0i64..1_000_000,
            ) {
                let cmd = CreateProduct {
                    sku,
                    name,
                    description: None,
                    price: Decimal::new(-cents, 2),
                    stock,
                    category: None,
                };
                prop_assert!(matches!(
                    Product::create(cmd, ProductId::new(), Utc::now(), 0),
                    Err(DomainError::Validation(_))
                ));
            }

            /// Property: version grows by exactly 1 per applied mutation, in
            /// any interleaving of updates and a final delete.
            #[test]
            fn version_increments_per_mutation(updates in 0usize..8) {
                let mut product =
                    Product::create(test_cmd(), ProductId::new(), Utc::now(), 0).unwrap();

                for i in 0..updates {
                    let cmd = UpdateProduct {
                        sku: format!("SKU-{i}"),
                        name: "Test Product".to_string(),
                        price: Decimal::ONE,
                        stock: i as i64,
                        category: None,
                        expected_version: product.version(),
                    };
                    product.apply_update(&cmd, Utc::now());
                }
                prop_assert_eq!(product.version(), updates as i64);

                product.mark_deleted(Utc::now());
                prop_assert_eq!(product.version(), updates as i64 + 1);
            }
        }
    }
}
