use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::calendar::CutoffConfig;
use crate::models::{Allocation, Breed, ChickenOrder, Hatch, NewOrder, OrderStatus};

/// Settings key holding the order cutoff as `{"year": .., "week": ..}`.
pub const CUTOFF_SETTING: &str = "order_cutoff";

/// Async-safe handle to the storefront database.
///
/// Wraps `StoreDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, keeping synchronous SQLite
/// I/O off the async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<StoreDb>>,
}

impl DbHandle {
    pub fn new(db: StoreDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&StoreDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            // Open transactions roll back when a panicking closure unwinds.
            let guard = db.lock().unwrap_or_else(|poisoned| {
                warn!("Recovering DB lock poisoned by a panicked task");
                db.clear_poison();
                poisoned.into_inner()
            });
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct StoreDb {
    conn: Connection,
}

impl StoreDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS breeds (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    slug TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1,
                    display_order INTEGER NOT NULL DEFAULT 0,
                    unit_price INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS hatches (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    breed_id INTEGER NOT NULL REFERENCES breeds(id) ON DELETE CASCADE,
                    hatch_date TEXT NOT NULL,
                    initial_count INTEGER NOT NULL CHECK (initial_count >= 0),
                    active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS chicken_orders (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    reference TEXT NOT NULL UNIQUE,
                    breed_id INTEGER NOT NULL REFERENCES breeds(id),
                    year INTEGER NOT NULL,
                    week INTEGER NOT NULL,
                    quantity INTEGER NOT NULL CHECK (quantity > 0),
                    customer_name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    phone TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT 'placed',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_hatches_breed ON hatches(breed_id);
                CREATE INDEX IF NOT EXISTS idx_orders_slot ON chicken_orders(breed_id, year, week);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Breeds ────────────────────────────────────────────────────────

    pub fn create_breed(
        &self,
        slug: &str,
        name: &str,
        display_order: i32,
        unit_price: i64,
    ) -> Result<Breed> {
        self.conn
            .execute(
                "INSERT INTO breeds (slug, name, display_order, unit_price) VALUES (?1, ?2, ?3, ?4)",
                params![slug, name, display_order, unit_price],
            )
            .with_context(|| format!("Failed to insert breed '{}'", slug))?;
        let id = self.conn.last_insert_rowid();
        self.get_breed(id)?.context("Breed not found after insert")
    }

    /// Breeds in display order; ties keep insertion order.
    pub fn list_breeds(&self, include_inactive: bool) -> Result<Vec<Breed>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, slug, name, active, display_order, unit_price FROM breeds
                 WHERE active = 1 OR ?1 ORDER BY display_order, id",
            )
            .context("Failed to prepare list_breeds")?;
        let rows = stmt
            .query_map(params![include_inactive], breed_from_row)
            .context("Failed to query breeds")?;
        let mut breeds = Vec::new();
        for row in rows {
            breeds.push(row.context("Failed to read breed row")?);
        }
        Ok(breeds)
    }

    pub fn get_breed(&self, id: i64) -> Result<Option<Breed>> {
        self.conn
            .query_row(
                "SELECT id, slug, name, active, display_order, unit_price FROM breeds WHERE id = ?1",
                params![id],
                breed_from_row,
            )
            .optional()
            .context("Failed to query breed")
    }

    pub fn get_breed_by_slug(&self, slug: &str) -> Result<Option<Breed>> {
        self.conn
            .query_row(
                "SELECT id, slug, name, active, display_order, unit_price FROM breeds WHERE slug = ?1",
                params![slug],
                breed_from_row,
            )
            .optional()
            .context("Failed to query breed by slug")
    }

    pub fn set_breed_active(&self, slug: &str, active: bool) -> Result<Option<Breed>> {
        self.conn
            .execute(
                "UPDATE breeds SET active = ?1 WHERE slug = ?2",
                params![active, slug],
            )
            .context("Failed to update breed")?;
        self.get_breed_by_slug(slug)
    }

    // ── Hatches ───────────────────────────────────────────────────────

    /// Store a hatch. The date is kept verbatim; the calendar decides
    /// whether it is usable.
    pub fn create_hatch(&self, breed_id: i64, hatch_date: &str, initial_count: u32) -> Result<Hatch> {
        self.conn
            .execute(
                "INSERT INTO hatches (breed_id, hatch_date, initial_count) VALUES (?1, ?2, ?3)",
                params![breed_id, hatch_date, initial_count],
            )
            .context("Failed to insert hatch")?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, breed_id, hatch_date, initial_count, active FROM hatches WHERE id = ?1",
                params![id],
                hatch_from_row,
            )
            .context("Hatch not found after insert")
    }

    pub fn list_hatches(&self, active_only: bool) -> Result<Vec<Hatch>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, breed_id, hatch_date, initial_count, active FROM hatches
                 WHERE active = 1 OR NOT ?1 ORDER BY hatch_date, id",
            )
            .context("Failed to prepare list_hatches")?;
        let rows = stmt
            .query_map(params![active_only], hatch_from_row)
            .context("Failed to query hatches")?;
        let mut hatches = Vec::new();
        for row in rows {
            hatches.push(row.context("Failed to read hatch row")?);
        }
        Ok(hatches)
    }

    // ── Orders ────────────────────────────────────────────────────────

    pub fn create_order(&self, order: &NewOrder) -> Result<ChickenOrder> {
        let reference = uuid::Uuid::new_v4().simple().to_string()[..12].to_uppercase();
        self.conn
            .execute(
                "INSERT INTO chicken_orders
                    (reference, breed_id, year, week, quantity, customer_name, email, phone)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    reference,
                    order.breed_id,
                    order.year,
                    order.week,
                    order.quantity,
                    order.customer_name,
                    order.email,
                    order.phone
                ],
            )
            .context("Failed to insert order")?;
        self.get_order(&reference)?
            .context("Order not found after insert")
    }

    pub fn get_order(&self, reference: &str) -> Result<Option<ChickenOrder>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, reference, breed_id, year, week, quantity, customer_name, email, phone,
                        status, created_at, updated_at
                 FROM chicken_orders WHERE reference = ?1",
                params![reference],
                |row| {
                    Ok(OrderRow {
                        id: row.get(0)?,
                        reference: row.get(1)?,
                        breed_id: row.get(2)?,
                        year: row.get(3)?,
                        week: row.get(4)?,
                        quantity: row.get(5)?,
                        customer_name: row.get(6)?,
                        email: row.get(7)?,
                        phone: row.get(8)?,
                        status: row.get(9)?,
                        created_at: row.get(10)?,
                        updated_at: row.get(11)?,
                    })
                },
            )
            .optional()
            .context("Failed to query order")?;
        row.map(OrderRow::into_order).transpose()
    }

    pub fn update_order_quantity(&self, reference: &str, quantity: u32) -> Result<ChickenOrder> {
        self.conn
            .execute(
                "UPDATE chicken_orders SET quantity = ?1, updated_at = datetime('now')
                 WHERE reference = ?2",
                params![quantity, reference],
            )
            .context("Failed to update order quantity")?;
        self.get_order(reference)?
            .context("Order not found after update")
    }

    pub fn cancel_order(&self, reference: &str) -> Result<ChickenOrder> {
        self.conn
            .execute(
                "UPDATE chicken_orders SET status = ?1, updated_at = datetime('now')
                 WHERE reference = ?2",
                params![OrderStatus::Cancelled.as_str(), reference],
            )
            .context("Failed to cancel order")?;
        self.get_order(reference)?
            .context("Order not found after cancel")
    }

    /// Quantities held by placed orders, summed per (breed, week).
    /// `exclude_reference` leaves one order out, for re-checking its own
    /// modification against the rest.
    pub fn list_allocations(&self, exclude_reference: Option<&str>) -> Result<Vec<Allocation>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT breed_id, year, week, SUM(quantity) FROM chicken_orders
                 WHERE status = 'placed' AND (?1 IS NULL OR reference != ?1)
                 GROUP BY breed_id, year, week
                 ORDER BY breed_id, year, week",
            )
            .context("Failed to prepare list_allocations")?;
        let rows = stmt
            .query_map(params![exclude_reference], |row| {
                Ok(Allocation {
                    breed_id: row.get(0)?,
                    year: row.get(1)?,
                    week: row.get(2)?,
                    quantity: row.get(3)?,
                })
            })
            .context("Failed to query allocations")?;
        let mut allocations = Vec::new();
        for row in rows {
            allocations.push(row.context("Failed to read allocation row")?);
        }
        Ok(allocations)
    }

    // ── Settings ──────────────────────────────────────────────────────

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query setting")
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .context("Failed to upsert setting")?;
        Ok(())
    }

    pub fn get_cutoff(&self) -> Result<Option<CutoffConfig>> {
        match self.get_setting(CUTOFF_SETTING)? {
            Some(raw) => {
                let cutoff = serde_json::from_str(&raw).context("Failed to parse cutoff setting")?;
                Ok(Some(cutoff))
            }
            None => Ok(None),
        }
    }

    pub fn set_cutoff(&self, cutoff: &CutoffConfig) -> Result<()> {
        let raw = serde_json::to_string(cutoff).context("Failed to serialize cutoff")?;
        self.set_setting(CUTOFF_SETTING, &raw)
    }
}

fn breed_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Breed> {
    Ok(Breed {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        active: row.get(3)?,
        display_order: row.get(4)?,
        unit_price: row.get(5)?,
    })
}

fn hatch_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Hatch> {
    Ok(Hatch {
        id: row.get(0)?,
        breed_id: row.get(1)?,
        hatch_date: row.get(2)?,
        initial_count: row.get(3)?,
        active: row.get(4)?,
    })
}

struct OrderRow {
    id: i64,
    reference: String,
    breed_id: i64,
    year: i32,
    week: u32,
    quantity: u32,
    customer_name: String,
    email: String,
    phone: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl OrderRow {
    fn into_order(self) -> Result<ChickenOrder> {
        let status = OrderStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse order status")?;
        Ok(ChickenOrder {
            id: self.id,
            reference: self.reference,
            breed_id: self.breed_id,
            year: self.year,
            week: self.week,
            quantity: self.quantity,
            customer_name: self.customer_name,
            email: self.email,
            phone: self.phone,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(breed_id: i64, week: u32, quantity: u32) -> NewOrder {
        NewOrder {
            breed_id,
            year: 2026,
            week,
            quantity,
            customer_name: "Kari Nordmann".to_string(),
            email: "kari@example.no".to_string(),
            phone: "+4791234567".to_string(),
        }
    }

    #[tokio::test]
    async fn test_handle_survives_panicking_call() -> Result<()> {
        let handle = DbHandle::new(StoreDb::new_in_memory()?);
        handle.call(|db| db.create_breed("sussex", "Light Sussex", 1, 8900)).await?;

        let failed = handle.call(|_db| -> Result<()> { panic!("boom") }).await;
        assert!(failed.is_err());

        let breeds = handle.call(|db| db.list_breeds(true)).await?;
        assert_eq!(breeds.len(), 1);
        Ok(())
    }

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('breeds', 'hatches', 'chicken_orders', 'settings')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 4, "Expected 4 tables to exist");
        Ok(())
    }

    #[test]
    fn test_migrations_are_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("shop.db");
        {
            let db = StoreDb::new(&path)?;
            db.create_breed("sussex", "Light Sussex", 1, 8900)?;
        }
        let db = StoreDb::new(&path)?;
        assert_eq!(db.list_breeds(true)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_breeds_listed_in_display_order() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        db.create_breed("brahma", "Brahma", 3, 12000)?;
        db.create_breed("sussex", "Light Sussex", 1, 8900)?;
        db.create_breed("orpington", "Orpington", 1, 9900)?;
        db.set_breed_active("brahma", false)?;

        let active: Vec<String> = db.list_breeds(false)?.into_iter().map(|b| b.slug).collect();
        assert_eq!(active, vec!["sussex", "orpington"]);

        let all: Vec<String> = db.list_breeds(true)?.into_iter().map(|b| b.slug).collect();
        assert_eq!(all, vec!["sussex", "orpington", "brahma"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_slug_is_rejected() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        db.create_breed("sussex", "Light Sussex", 1, 8900)?;
        assert!(db.create_breed("sussex", "Again", 2, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_get_breed_by_slug() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        let created = db.create_breed("sussex", "Light Sussex", 1, 8900)?;
        let fetched = db.get_breed_by_slug("sussex")?.expect("breed should exist");
        assert_eq!(fetched, created);
        assert!(fetched.active);
        assert!(db.get_breed_by_slug("missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_hatches_keep_raw_dates() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        let breed = db.create_breed("sussex", "Light Sussex", 1, 8900)?;
        db.create_hatch(breed.id, "2026-03-04", 50)?;
        db.create_hatch(breed.id, "garbage", 10)?;
        db.conn.execute("UPDATE hatches SET active = 0 WHERE hatch_date = 'garbage'", [])?;

        assert_eq!(db.list_hatches(false)?.len(), 2);
        let active = db.list_hatches(true)?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].hatch_date, "2026-03-04");
        assert_eq!(active[0].initial_count, 50);
        Ok(())
    }

    #[test]
    fn test_order_lifecycle_and_allocations() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        let breed = db.create_breed("sussex", "Light Sussex", 1, 8900)?;

        let a = db.create_order(&new_order(breed.id, 10, 5))?;
        let b = db.create_order(&new_order(breed.id, 10, 3))?;
        db.create_order(&new_order(breed.id, 11, 2))?;
        assert_eq!(a.status, OrderStatus::Placed);
        assert_eq!(a.reference.len(), 12);
        assert_ne!(a.reference, b.reference);

        let allocations = db.list_allocations(None)?;
        assert_eq!(
            allocations,
            vec![
                Allocation { breed_id: breed.id, year: 2026, week: 10, quantity: 8 },
                Allocation { breed_id: breed.id, year: 2026, week: 11, quantity: 2 },
            ]
        );

        let excluding_a = db.list_allocations(Some(&a.reference))?;
        assert_eq!(excluding_a[0].quantity, 3);

        let updated = db.update_order_quantity(&a.reference, 7)?;
        assert_eq!(updated.quantity, 7);

        let cancelled = db.cancel_order(&b.reference)?;
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(db.list_allocations(None)?[0].quantity, 7);
        Ok(())
    }

    #[test]
    fn test_get_order_missing() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        assert!(db.get_order("NOPE")?.is_none());
        Ok(())
    }

    #[test]
    fn test_cutoff_round_trip() -> Result<()> {
        let db = StoreDb::new_in_memory()?;
        assert!(db.get_cutoff()?.is_none());

        db.set_cutoff(&CutoffConfig::new(2026, 46))?;
        assert_eq!(db.get_cutoff()?, Some(CutoffConfig::new(2026, 46)));

        db.set_cutoff(&CutoffConfig::new(2027, 2))?;
        assert_eq!(db.get_cutoff()?, Some(CutoffConfig::new(2027, 2)));
        assert_eq!(
            db.get_setting(CUTOFF_SETTING)?.as_deref(),
            Some(r#"{"year":2027,"week":2}"#)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_db_handle_call_runs_on_blocking_pool() -> Result<()> {
        let handle = DbHandle::new(StoreDb::new_in_memory()?);
        let breed = handle
            .call(|db| db.create_breed("sussex", "Light Sussex", 1, 8900))
            .await?;
        let listed = handle.call(|db| db.list_breeds(false)).await?;
        assert_eq!(listed, vec![breed]);
        Ok(())
    }
}
