//! Storefront operations that combine the store with the calendar core.
//!
//! Order checks and writes run inside a single `DbHandle::call`, so the
//! availability read and the insert happen under the same lock.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::db::{DbHandle, StoreDb};
use crate::calendar::{Calendar, CalendarBuilder, CutoffConfig, IsoWeek};
use crate::errors::{CalendarError, StorefrontError};
use crate::models::{Breed, ChickenOrder, NewOrder, OrderStatus};

/// Source of "today" for request handling. Injected so tests can pin it.
pub type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub fn system_today() -> Today {
    Arc::new(|| chrono::Utc::now().date_naive())
}

pub fn fixed_today(date: NaiveDate) -> Today {
    Arc::new(move || date)
}

/// Cutoff as seen from a given date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutoffStatus {
    pub cutoff: Option<CutoffConfig>,
    pub current: IsoWeek,
    /// Orders and modifications are accepted. Always true without a cutoff.
    pub open: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub breed: String,
    pub year: i32,
    pub week: u32,
    pub quantity: u32,
    pub customer_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderChange {
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub cancel: bool,
}

#[derive(Clone)]
pub struct Storefront {
    db: DbHandle,
    horizon_weeks: u32,
}

impl Storefront {
    /// `horizon_weeks` is the window in which orders may be placed.
    pub fn new(db: DbHandle, horizon_weeks: u32) -> Self {
        Self { db, horizon_weeks }
    }

    pub fn db(&self) -> &DbHandle {
        &self.db
    }

    pub fn horizon_weeks(&self) -> u32 {
        self.horizon_weeks
    }

    pub async fn breeds(&self) -> Result<Vec<Breed>, StorefrontError> {
        self.db
            .call(|db| db.list_breeds(false))
            .await
            .map_err(StorefrontError::Database)
    }

    /// Availability for `horizon_weeks` weeks from `reference`, net of
    /// placed orders.
    pub async fn calendar(
        &self,
        reference: NaiveDate,
        horizon_weeks: u32,
    ) -> Result<Calendar, StorefrontError> {
        self.db
            .call(move |db| Ok(calendar_snapshot(db, reference, horizon_weeks, None)))
            .await
            .map_err(StorefrontError::Database)?
    }

    pub async fn cutoff_status(&self, today: NaiveDate) -> Result<CutoffStatus, StorefrontError> {
        let cutoff = self
            .db
            .call(|db| db.get_cutoff())
            .await
            .map_err(StorefrontError::Database)?;
        Ok(cutoff_status(cutoff, today)?)
    }

    pub async fn set_cutoff(&self, cutoff: CutoffConfig) -> Result<CutoffConfig, StorefrontError> {
        cutoff.validate().map_err(StorefrontError::BadRequest)?;
        self.db
            .call(move |db| db.set_cutoff(&cutoff))
            .await
            .map_err(StorefrontError::Database)?;
        info!(year = cutoff.year, week = cutoff.week, "Order cutoff updated");
        Ok(cutoff)
    }

    pub async fn get_order(&self, reference: String) -> Result<ChickenOrder, StorefrontError> {
        let lookup = reference.clone();
        self.db
            .call(move |db| db.get_order(&lookup))
            .await
            .map_err(StorefrontError::Database)?
            .ok_or(StorefrontError::OrderNotFound { reference })
    }

    pub async fn place_order(
        &self,
        request: PlaceOrder,
        today: NaiveDate,
    ) -> Result<ChickenOrder, StorefrontError> {
        validate_order_request(&request)?;
        let horizon = self.horizon_weeks;
        let order = self
            .db
            .call(move |db| Ok(place_order_locked(db, &request, today, horizon)))
            .await
            .map_err(StorefrontError::Database)??;
        info!(
            reference = %order.reference,
            breed_id = order.breed_id,
            week = %IsoWeek::new(order.year, order.week),
            quantity = order.quantity,
            "Order placed"
        );
        Ok(order)
    }

    pub async fn modify_order(
        &self,
        reference: String,
        change: OrderChange,
        today: NaiveDate,
    ) -> Result<ChickenOrder, StorefrontError> {
        if !change.cancel && change.quantity.is_none() {
            return Err(StorefrontError::BadRequest(
                "Nothing to change: set quantity or cancel".to_string(),
            ));
        }
        if change.quantity == Some(0) {
            return Err(StorefrontError::BadRequest(
                "Quantity must be at least 1; use cancel to drop the order".to_string(),
            ));
        }
        let horizon = self.horizon_weeks;
        let order = self
            .db
            .call(move |db| Ok(modify_order_locked(db, &reference, &change, today, horizon)))
            .await
            .map_err(StorefrontError::Database)??;
        info!(
            reference = %order.reference,
            status = order.status.as_str(),
            quantity = order.quantity,
            "Order modified"
        );
        Ok(order)
    }
}

pub fn cutoff_status(
    cutoff: Option<CutoffConfig>,
    today: NaiveDate,
) -> Result<CutoffStatus, CalendarError> {
    let current =
        IsoWeek::from_date(today).ok_or(CalendarError::DateOutOfRange { date: today })?;
    Ok(CutoffStatus {
        cutoff,
        current,
        open: cutoff.is_none_or(|c| c.allows(today)),
    })
}

/// Read breeds, hatches and allocations and project them.
pub fn calendar_snapshot(
    db: &StoreDb,
    reference: NaiveDate,
    horizon_weeks: u32,
    exclude_reference: Option<&str>,
) -> Result<Calendar, StorefrontError> {
    let breeds = db.list_breeds(false).map_err(StorefrontError::Database)?;
    let hatches = db.list_hatches(true).map_err(StorefrontError::Database)?;
    let allocations = db
        .list_allocations(exclude_reference)
        .map_err(StorefrontError::Database)?;
    let calendar = CalendarBuilder::new(reference, horizon_weeks)
        .with_allocations(&allocations)
        .build(&breeds, &hatches)?;
    Ok(calendar)
}

fn validate_order_request(request: &PlaceOrder) -> Result<(), StorefrontError> {
    if request.quantity == 0 {
        return Err(StorefrontError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if request.customer_name.trim().is_empty() {
        return Err(StorefrontError::BadRequest(
            "Customer name is required".to_string(),
        ));
    }
    if !request.email.contains('@') {
        return Err(StorefrontError::BadRequest(format!(
            "Invalid email '{}'",
            request.email
        )));
    }
    Ok(())
}

fn ensure_open(db: &StoreDb, today: NaiveDate) -> Result<(), StorefrontError> {
    let status = cutoff_status(db.get_cutoff().map_err(StorefrontError::Database)?, today)?;
    match status.cutoff {
        Some(cutoff) if !status.open => Err(StorefrontError::CutoffPassed {
            cutoff: cutoff.as_week(),
            current: status.current,
        }),
        _ => Ok(()),
    }
}

/// Check that `quantity` fits in the (breed, week) slot.
fn ensure_capacity(
    calendar: &Calendar,
    breed: &Breed,
    week: IsoWeek,
    quantity: u32,
) -> Result<(), StorefrontError> {
    let slot = calendar
        .slot(breed.id, week)
        .ok_or(StorefrontError::WeekOutsideHorizon { week })?;
    if slot.available < quantity {
        return Err(StorefrontError::InsufficientAvailability {
            breed: breed.slug.clone(),
            week,
            available: slot.available,
            requested: quantity,
        });
    }
    Ok(())
}

fn place_order_locked(
    db: &StoreDb,
    request: &PlaceOrder,
    today: NaiveDate,
    horizon_weeks: u32,
) -> Result<ChickenOrder, StorefrontError> {
    let breed = db
        .get_breed_by_slug(&request.breed)
        .map_err(StorefrontError::Database)?
        .filter(|b| b.active)
        .ok_or_else(|| StorefrontError::BreedNotFound {
            slug: request.breed.clone(),
        })?;
    ensure_open(db, today)?;

    let week = IsoWeek::new(request.year, request.week);
    let calendar = calendar_snapshot(db, today, horizon_weeks, None)?;
    ensure_capacity(&calendar, &breed, week, request.quantity)?;

    db.create_order(&NewOrder {
        breed_id: breed.id,
        year: week.year,
        week: week.week,
        quantity: request.quantity,
        customer_name: request.customer_name.trim().to_string(),
        email: request.email.trim().to_string(),
        phone: request.phone.trim().to_string(),
    })
    .map_err(StorefrontError::Database)
}

fn modify_order_locked(
    db: &StoreDb,
    reference: &str,
    change: &OrderChange,
    today: NaiveDate,
    horizon_weeks: u32,
) -> Result<ChickenOrder, StorefrontError> {
    let order = db
        .get_order(reference)
        .map_err(StorefrontError::Database)?
        .ok_or_else(|| StorefrontError::OrderNotFound {
            reference: reference.to_string(),
        })?;
    if order.status == OrderStatus::Cancelled {
        return Err(StorefrontError::OrderCancelled {
            reference: reference.to_string(),
        });
    }
    ensure_open(db, today)?;

    if change.cancel {
        return db.cancel_order(reference).map_err(StorefrontError::Database);
    }
    let Some(quantity) = change.quantity else {
        return Ok(order);
    };

    let breed = db
        .get_breed(order.breed_id)
        .map_err(StorefrontError::Database)?
        .ok_or_else(|| StorefrontError::Other(anyhow::anyhow!("Order breed missing")))?;
    // The order's own quantity is released before re-checking.
    let calendar = calendar_snapshot(db, today, horizon_weeks, Some(reference))?;
    ensure_capacity(
        &calendar,
        &breed,
        IsoWeek::new(order.year, order.week),
        quantity,
    )?;
    db.update_order_quantity(reference, quantity)
        .map_err(StorefrontError::Database)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Monday, 2026-W08
    fn today() -> NaiveDate {
        date(2026, 2, 16)
    }

    fn shop() -> Storefront {
        let db = StoreDb::new_in_memory().unwrap();
        let breed = db.create_breed("sussex", "Light Sussex", 1, 8900).unwrap();
        // 2026-W10
        db.create_hatch(breed.id, "2026-03-04", 20).unwrap();
        Storefront::new(DbHandle::new(db), 16)
    }

    fn order(quantity: u32) -> PlaceOrder {
        PlaceOrder {
            breed: "sussex".to_string(),
            year: 2026,
            week: 10,
            quantity,
            customer_name: "Ola Nordmann".to_string(),
            email: "ola@example.no".to_string(),
            phone: String::new(),
        }
    }

    #[tokio::test]
    async fn test_place_order_reduces_calendar_availability() {
        let shop = shop();
        shop.place_order(order(15), today()).await.unwrap();
        let cal = shop.calendar(today(), 16).await.unwrap();
        let slot = cal.slot(1, IsoWeek::new(2026, 10)).unwrap();
        assert_eq!(slot.available, 5);
    }

    #[tokio::test]
    async fn test_overbooking_is_rejected() {
        let shop = shop();
        shop.place_order(order(15), today()).await.unwrap();
        let err = shop.place_order(order(6), today()).await.unwrap_err();
        match err {
            StorefrontError::InsufficientAvailability {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("Expected InsufficientAvailability, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_breed_and_week_outside_horizon() {
        let shop = shop();
        let mut req = order(1);
        req.breed = "dodo".to_string();
        assert!(matches!(
            shop.place_order(req, today()).await,
            Err(StorefrontError::BreedNotFound { .. })
        ));

        let mut req = order(1);
        req.week = 40;
        assert!(matches!(
            shop.place_order(req, today()).await,
            Err(StorefrontError::WeekOutsideHorizon { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_requests_are_bad_requests() {
        let shop = shop();
        assert!(matches!(
            shop.place_order(order(0), today()).await,
            Err(StorefrontError::BadRequest(_))
        ));
        let mut req = order(1);
        req.email = "not-an-email".to_string();
        assert!(matches!(
            shop.place_order(req, today()).await,
            Err(StorefrontError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_cutoff_blocks_orders_and_modifications() {
        let shop = shop();
        let placed = shop.place_order(order(2), today()).await.unwrap();

        shop.set_cutoff(CutoffConfig::new(2026, 7)).await.unwrap();
        let status = shop.cutoff_status(today()).await.unwrap();
        assert!(!status.open);
        assert_eq!(status.current, IsoWeek::new(2026, 8));

        assert!(matches!(
            shop.place_order(order(1), today()).await,
            Err(StorefrontError::CutoffPassed { .. })
        ));
        let change = OrderChange {
            quantity: Some(3),
            cancel: false,
        };
        assert!(matches!(
            shop.modify_order(placed.reference.clone(), change, today()).await,
            Err(StorefrontError::CutoffPassed { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_cutoff_rejects_impossible_week() {
        let shop = shop();
        assert!(matches!(
            shop.set_cutoff(CutoffConfig::new(2026, 60)).await,
            Err(StorefrontError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_no_cutoff_means_open() {
        let status = cutoff_status(None, today()).unwrap();
        assert!(status.open);
        assert!(status.cutoff.is_none());
    }

    #[tokio::test]
    async fn test_calendar_at_end_of_date_range_is_rejected_and_store_stays_usable() {
        let shop = shop();
        let late = NaiveDate::MAX - chrono::Duration::weeks(2);
        assert!(matches!(
            shop.calendar(late, 16).await,
            Err(StorefrontError::Calendar(CalendarError::DateOutOfRange { .. }))
        ));
        assert!(matches!(
            shop.cutoff_status(NaiveDate::MAX).await,
            Err(StorefrontError::Calendar(CalendarError::DateOutOfRange { .. }))
        ));

        let cal = shop.calendar(today(), 16).await.unwrap();
        assert_eq!(cal.breeds.len(), 1);
        assert!(shop.place_order(order(1), today()).await.is_ok());
    }

    #[tokio::test]
    async fn test_modify_quantity_excludes_own_allocation() {
        let shop = shop();
        let placed = shop.place_order(order(15), today()).await.unwrap();
        // 20 in total: raising our own 15 to 20 fits once ours is released.
        let change = OrderChange {
            quantity: Some(20),
            cancel: false,
        };
        let updated = shop
            .modify_order(placed.reference.clone(), change, today())
            .await
            .unwrap();
        assert_eq!(updated.quantity, 20);

        let change = OrderChange {
            quantity: Some(21),
            cancel: false,
        };
        assert!(matches!(
            shop.modify_order(placed.reference, change, today()).await,
            Err(StorefrontError::InsufficientAvailability { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_releases_capacity_and_is_final() {
        let shop = shop();
        let placed = shop.place_order(order(20), today()).await.unwrap();
        let change = OrderChange {
            quantity: None,
            cancel: true,
        };
        let cancelled = shop
            .modify_order(placed.reference.clone(), change.clone(), today())
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let cal = shop.calendar(today(), 16).await.unwrap();
        assert_eq!(cal.slot(1, IsoWeek::new(2026, 10)).unwrap().available, 20);

        assert!(matches!(
            shop.modify_order(placed.reference, change, today()).await,
            Err(StorefrontError::OrderCancelled { .. })
        ));
    }

    #[tokio::test]
    async fn test_modify_requires_a_change() {
        let shop = shop();
        let placed = shop.place_order(order(1), today()).await.unwrap();
        assert!(matches!(
            shop.modify_order(placed.reference.clone(), OrderChange::default(), today())
                .await,
            Err(StorefrontError::BadRequest(_))
        ));
        assert!(matches!(
            shop.modify_order("MISSING".to_string(), OrderChange { quantity: Some(1), cancel: false }, today())
                .await,
            Err(StorefrontError::OrderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let shop = shop();
        assert!(matches!(
            shop.get_order("NOPE".to_string()).await,
            Err(StorefrontError::OrderNotFound { .. })
        ));
    }
}
