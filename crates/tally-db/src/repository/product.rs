//! # Product Repository
//!
//! Database operations for products and bundle recipes.
//!
//! ## Bundle Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                         bundle_components                     │
//! │  ┌──────────┬───────┬────────┐    ┌──────────┬───────────┬─────┬─────┐ │
//! │  │ id       │ stock │ bundle │    │ bundle   │ component │ qpu │ pos │ │
//! │  ├──────────┼───────┼────────┤    ├──────────┼───────────┼─────┼─────┤ │
//! │  │ tea      │    40 │   0    │◄───│ gift-box │ tea       │  2  │  0  │ │
//! │  │ mug      │    12 │   0    │◄───│ gift-box │ mug       │  1  │  1  │ │
//! │  │ gift-box │     0 │   1    │    └──────────┴───────────┴─────┴─────┘ │
//! │  └──────────┴───────┴────────┘                                         │
//! │                                                                         │
//! │  get_view("gift-box") → stock = min(40/2, 12/1) = 12                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tally_core::inventory::{product_view, ComponentLevel};
use tally_core::validation::{
    validate_amount, validate_bundle_components, validate_multiplier, validate_product_name,
};
use tally_core::{
    new_id, BundleComponent, BundleComponentInput, NewProduct, Product, ProductView, ValidationError,
};
use tracing::{debug, info, warn};

use super::Tx;
use crate::error::{DbError, DbResult};

const PRODUCT_SELECT: &str = r#"
    SELECT id, sku, name, unit, secondary_unit, multiplier, cost_cents, price_cents,
           stock, expiry_date, is_bundle, created_at, updated_at
    FROM products
"#;

// =============================================================================
// Query Helpers
// =============================================================================

pub(crate) async fn fetch_product<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{PRODUCT_SELECT} WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(product)
}

/// A bundle's recipe in position order.
pub(crate) async fn fetch_components<'e, E>(executor: E, bundle_id: &str) -> DbResult<Vec<BundleComponent>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let components = sqlx::query_as::<_, BundleComponent>(
        r#"
        SELECT bundle_id, component_id, quantity_per_unit, position
        FROM bundle_components
        WHERE bundle_id = ?1
        ORDER BY position
        "#,
    )
    .bind(bundle_id)
    .fetch_all(executor)
    .await?;
    Ok(components)
}

/// Current stock/cost of a bundle's components, lined up with
/// [`fetch_components`].
pub(crate) async fn fetch_component_levels<'e, E>(
    executor: E,
    bundle_id: &str,
) -> DbResult<Vec<ComponentLevel>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT bc.quantity_per_unit, p.stock, p.cost_cents
        FROM bundle_components bc
        INNER JOIN products p ON p.id = bc.component_id
        WHERE bc.bundle_id = ?1
        ORDER BY bc.position
        "#,
    )
    .bind(bundle_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(quantity_per_unit, stock, cost_cents)| ComponentLevel {
            quantity_per_unit,
            stock,
            cost_cents,
        })
        .collect())
}

/// Adds `delta` to a product's raw stock and returns the new level.
pub(crate) async fn adjust_stock(tx: &mut Tx<'_>, product_id: &str, delta: i64) -> DbResult<i64> {
    let new_stock: Option<i64> = sqlx::query_scalar(
        "UPDATE products SET stock = stock + ?1, updated_at = ?2 WHERE id = ?3 RETURNING stock",
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    let new_stock = new_stock.ok_or_else(|| {
        DbError::consistency(format!("product {} vanished while adjusting stock", product_id))
    })?;

    debug!(product_id = %product_id, delta, stock = new_stock, "Stock adjusted");
    if new_stock < 0 {
        warn!(product_id = %product_id, stock = new_stock, "Stock below zero");
    }
    Ok(new_stock)
}

/// Overwrites a product's cost (last-purchase costing).
pub(crate) async fn set_cost(tx: &mut Tx<'_>, product_id: &str, cost_cents: i64) -> DbResult<()> {
    sqlx::query("UPDATE products SET cost_cents = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(cost_cents)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let tea = repo.insert(new_tea).await?;
/// repo.set_bundle_components(&gift_box.id, recipe).await?;
/// let view = repo.get_view(&gift_box.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product. Bundles always start with stock 0.
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        validate_product_name(&new.name)?;
        validate_multiplier(new.multiplier)?;
        validate_amount("cost_cents", new.cost_cents)?;
        validate_amount("price_cents", new.price_cents)?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            sku: new.sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            name: new.name.trim().to_string(),
            unit: new.unit,
            secondary_unit: new.secondary_unit,
            multiplier: new.multiplier,
            cost_cents: new.cost_cents,
            price_cents: new.price_cents,
            stock: if new.is_bundle { 0 } else { new.stock },
            expiry_date: new.expiry_date,
            is_bundle: new.is_bundle,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, unit, secondary_unit, multiplier, cost_cents,
                price_cents, stock, expiry_date, is_bundle, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(&product.secondary_unit)
        .bind(product.multiplier)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.expiry_date)
        .bind(product.is_bundle)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("sku", product.sku.clone().unwrap_or_default())
            }
            other => other,
        })?;

        info!(id = %product.id, name = %product.name, bundle = product.is_bundle, "Product created");
        Ok(product)
    }

    /// Gets a product's stored row.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    /// Gets a product with stock and cost as the caller should see them.
    pub async fn get_view(&self, id: &str) -> DbResult<ProductView> {
        let mut conn = self.pool.acquire().await?;
        let product = fetch_product(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        view_of(&mut *conn, product).await
    }

    /// All products as views, ordered by name.
    pub async fn list_views(&self) -> DbResult<Vec<ProductView>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{PRODUCT_SELECT} ORDER BY name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&mut *conn)
            .await?;

        let mut views = Vec::with_capacity(products.len());
        for product in products {
            views.push(view_of(&mut *conn, product).await?);
        }
        Ok(views)
    }

    /// Replaces a bundle's recipe.
    ///
    /// ## Rules
    /// - the product must exist and be a bundle
    /// - every component must exist and must not itself be a bundle
    /// - see [`validate_bundle_components`] for the pure checks
    pub async fn set_bundle_components(
        &self,
        bundle_id: &str,
        components: Vec<BundleComponentInput>,
    ) -> DbResult<Vec<BundleComponent>> {
        validate_bundle_components(bundle_id, &components)?;

        let mut tx = self.pool.begin().await?;

        let bundle = fetch_product(&mut *tx, bundle_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", bundle_id))?;
        if !bundle.is_bundle {
            return Err(ValidationError::NotAllowed {
                field: "bundle_id".to_string(),
                reason: format!("{} is not a bundle", bundle.name),
            }
            .into());
        }

        for c in &components {
            let component = fetch_product(&mut *tx, &c.component_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", c.component_id.clone()))?;
            if component.is_bundle {
                return Err(ValidationError::NotAllowed {
                    field: "component_id".to_string(),
                    reason: format!("{} is itself a bundle", component.name),
                }
                .into());
            }
        }

        sqlx::query("DELETE FROM bundle_components WHERE bundle_id = ?1")
            .bind(bundle_id)
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(components.len());
        for (position, c) in components.into_iter().enumerate() {
            let component = BundleComponent {
                bundle_id: bundle_id.to_string(),
                component_id: c.component_id,
                quantity_per_unit: c.quantity_per_unit,
                position: position as i64,
            };
            sqlx::query(
                r#"
                INSERT INTO bundle_components (bundle_id, component_id, quantity_per_unit, position)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&component.bundle_id)
            .bind(&component.component_id)
            .bind(component.quantity_per_unit)
            .bind(component.position)
            .execute(&mut *tx)
            .await?;
            stored.push(component);
        }

        tx.commit().await?;

        info!(bundle_id = %bundle_id, components = stored.len(), "Bundle recipe replaced");
        Ok(stored)
    }

    /// Deletes a product that no order and no bundle refers to.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let (in_orders,): (i64,) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM order_lines WHERE product_id = ?1)
                 + (SELECT COUNT(*) FROM order_stock_moves WHERE product_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_orders > 0 {
            return Err(ValidationError::NotAllowed {
                field: "product".to_string(),
                reason: "product is used by existing orders".to_string(),
            }
            .into());
        }

        let (in_bundles,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM bundle_components WHERE component_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if in_bundles > 0 {
            return Err(ValidationError::NotAllowed {
                field: "product".to_string(),
                reason: "product is a component of a bundle".to_string(),
            }
            .into());
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        tx.commit().await?;
        info!(id = %id, "Product deleted");
        Ok(())
    }
}

async fn view_of(conn: &mut sqlx::SqliteConnection, product: Product) -> DbResult<ProductView> {
    if !product.is_bundle {
        return Ok(product_view(product, Vec::new(), &[]));
    }
    let components = fetch_components(&mut *conn, &product.id).await?;
    let levels = fetch_component_levels(&mut *conn, &product.id).await?;
    Ok(product_view(product, components, &levels))
}

// =============================================================================
// Unit Tests
// =============================================================================
