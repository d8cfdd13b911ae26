//! redb-based order store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Canonical order records |
//! | `customer_orders` | `(customer_id, order_number)` | `order_id` | Customer projection |
//! | `rider_orders` | `(rider_id, order_number)` | `order_id` | Rider projection (current and former) |
//! | `order_riders` | `(order_id, rider_id)` | `order_number` | Reverse of `rider_orders`, for deletes |
//! | `sequence_counter` | `"order_number"` | `u64` | Human-facing order numbers |
//!
//! # Write guard
//!
//! Every record carries a `revision`. [`OrderStorage::compare_and_swap`]
//! commits only when the stored revision still equals the one the caller
//! read, and [`OrderStorage::update_guarded`] wraps the read-modify-write
//! cycle with a single retry against the fresh record before giving up with
//! [`StorageError::Conflict`]. No in-process lock is held across the cycle.
//!
//! # Durability
//!
//! redb commits are durable once `commit()` returns (copy-on-write with an
//! atomic root swap), so a crash never exposes a half-written order.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::order::Order;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Order records: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Customer index: key = (customer_id, order_number), value = order_id
const CUSTOMER_ORDERS_TABLE: TableDefinition<(&str, u64), &str> =
    TableDefinition::new("customer_orders");

/// Rider index: key = (rider_id, order_number), value = order_id
///
/// Entries are added on every assignment and only removed when the order
/// itself is deleted.
const RIDER_ORDERS_TABLE: TableDefinition<(&str, u64), &str> =
    TableDefinition::new("rider_orders");

/// Reverse rider index: key = (order_id, rider_id), value = order_number
///
/// Written alongside `rider_orders` so a delete finds its rider keys
/// without scanning.
const ORDER_RIDERS_TABLE: TableDefinition<(&str, &str), u64> = TableDefinition::new("order_riders");

/// Sequence counters: key = counter name, value = last issued value
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const ORDER_NUMBER_KEY: &str = "order_number";

/// Retries after the first stale write in [`OrderStorage::update_guarded`]
const GUARD_RETRIES: usize = 1;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Concurrent modification of order {0}")]
    Conflict(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a guarded write
#[derive(Debug, Clone)]
pub enum CasOutcome {
    /// Written; carries the stored record with its bumped revision
    Committed(Order),
    /// Revision moved since the caller read; carries the fresh record
    Stale(Order),
}

/// Result of [`OrderStorage::update_guarded`]
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Updated { previous: Order, current: Order },
    /// The mutation declined to write (idempotent repeat)
    Unchanged(Order),
}

impl UpdateOutcome {
    /// The record as it is stored now
    pub fn into_current(self) -> Order {
        match self {
            UpdateOutcome::Updated { current, .. } => current,
            UpdateOutcome::Unchanged(order) => order,
        }
    }
}

/// Result of [`OrderStorage::delete_if`]
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    Deleted(Order),
    /// Predicate rejected the stored record; nothing was removed
    Kept(Order),
    NotFound,
}

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(CUSTOMER_ORDERS_TABLE)?;
            let _ = write_txn.open_table(RIDER_ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_RIDERS_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(ORDER_NUMBER_KEY)?.is_none() {
                seq_table.insert(ORDER_NUMBER_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Create ==========

    /// Persist a freshly placed order
    ///
    /// The order number is drawn from the counter inside the same
    /// transaction, so numbers are unique and never reused even after a
    /// delete. Returns the stored record (number and revision filled in).
    pub fn insert_new(&self, mut order: Order) -> StorageResult<Order> {
        let txn = self.db.begin_write()?;
        {
            let mut seq_table = txn.open_table(SEQUENCE_TABLE)?;
            let next = seq_table
                .get(ORDER_NUMBER_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0)
                + 1;
            seq_table.insert(ORDER_NUMBER_KEY, next)?;

            order.order_number = next;
            order.revision = 1;

            let bytes = serde_json::to_vec(&order)?;
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            orders.insert(order.order_id.as_str(), bytes.as_slice())?;

            let mut by_customer = txn.open_table(CUSTOMER_ORDERS_TABLE)?;
            by_customer.insert(
                (order.customer_id.as_str(), order.order_number),
                order.order_id.as_str(),
            )?;
        }
        txn.commit()?;

        tracing::debug!(order_id = %order.order_id, order_number = order.order_number, "Order inserted");
        Ok(order)
    }

    // ========== Read ==========

    /// Load one order
    pub fn get(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All orders, newest first
    pub fn list_all(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let order: Order = serde_json::from_slice(value.value())?;
            orders.push(order);
        }
        orders.sort_by(|a, b| b.order_number.cmp(&a.order_number));
        Ok(orders)
    }

    /// Orders placed by one customer, newest first
    pub fn list_for_customer(&self, customer_id: &str) -> StorageResult<Vec<Order>> {
        self.list_indexed(CUSTOMER_ORDERS_TABLE, customer_id)
    }

    /// Orders currently or formerly assigned to one rider, newest first
    pub fn list_for_rider(&self, rider_id: &str) -> StorageResult<Vec<Order>> {
        self.list_indexed(RIDER_ORDERS_TABLE, rider_id)
    }

    fn list_indexed(
        &self,
        index: TableDefinition<'static, (&'static str, u64), &'static str>,
        owner: &str,
    ) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let index_table = read_txn.open_table(index)?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in index_table.range((owner, 0u64)..=(owner, u64::MAX))? {
            let (_key, order_id) = result?;
            if let Some(value) = orders_table.get(order_id.value())? {
                let order: Order = serde_json::from_slice(value.value())?;
                orders.push(order);
            }
        }
        orders.reverse();
        Ok(orders)
    }

    // ========== Guarded write ==========

    /// Replace the stored record if its revision still equals `expected_revision`
    ///
    /// The new record is stored with `expected_revision + 1`. A rider named in
    /// the new record is added to the rider index.
    pub fn compare_and_swap(&self, expected_revision: u64, order: &Order) -> StorageResult<CasOutcome> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let stored: Option<Order> = match orders.get(order.order_id.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            let Some(stored) = stored else {
                drop(orders);
                txn.abort()?;
                return Err(StorageError::OrderNotFound(order.order_id.clone()));
            };

            if stored.revision != expected_revision {
                CasOutcome::Stale(stored)
            } else {
                let mut next = order.clone();
                next.revision = expected_revision + 1;
                let bytes = serde_json::to_vec(&next)?;
                orders.insert(next.order_id.as_str(), bytes.as_slice())?;

                if let Some(rider) = &next.rider {
                    let mut by_rider = txn.open_table(RIDER_ORDERS_TABLE)?;
                    by_rider.insert(
                        (rider.rider_id.as_str(), next.order_number),
                        next.order_id.as_str(),
                    )?;
                    let mut by_order = txn.open_table(ORDER_RIDERS_TABLE)?;
                    by_order.insert(
                        (next.order_id.as_str(), rider.rider_id.as_str()),
                        next.order_number,
                    )?;
                }
                CasOutcome::Committed(next)
            }
        };

        match outcome {
            CasOutcome::Committed(_) => txn.commit()?,
            CasOutcome::Stale(_) => txn.abort()?,
        }
        Ok(outcome)
    }

    /// Read-modify-write one order under the revision guard
    ///
    /// `mutate` receives the current record and returns the replacement, or
    /// `None` to leave the record untouched. It may run twice (once more
    /// against the fresh record after a stale write), so it must not have
    /// side effects. A second stale write surfaces as
    /// [`StorageError::Conflict`].
    pub fn update_guarded<E, F>(&self, order_id: &str, mut mutate: F) -> Result<UpdateOutcome, E>
    where
        E: From<StorageError>,
        F: FnMut(&Order) -> Result<Option<Order>, E>,
    {
        let mut current = self
            .get(order_id)?
            .ok_or_else(|| StorageError::OrderNotFound(order_id.to_string()))?;

        for attempt in 0..=GUARD_RETRIES {
            let Some(next) = mutate(&current)? else {
                return Ok(UpdateOutcome::Unchanged(current));
            };

            match self.compare_and_swap(current.revision, &next)? {
                CasOutcome::Committed(stored) => {
                    return Ok(UpdateOutcome::Updated {
                        previous: current,
                        current: stored,
                    });
                }
                CasOutcome::Stale(fresh) => {
                    tracing::debug!(
                        order_id = %order_id,
                        attempt,
                        expected = current.revision,
                        found = fresh.revision,
                        "Stale order write, re-reading"
                    );
                    current = fresh;
                }
            }
        }

        Err(StorageError::Conflict(order_id.to_string()).into())
    }

    // ========== Delete ==========

    /// Delete one order unconditionally; returns whether it existed
    pub fn delete(&self, order_id: &str) -> StorageResult<bool> {
        match self.delete_if(order_id, |_| true)? {
            DeleteOutcome::Deleted(_) => Ok(true),
            DeleteOutcome::Kept(_) | DeleteOutcome::NotFound => Ok(false),
        }
    }

    /// Delete one order if `predicate` accepts the stored record
    ///
    /// The check and the removal happen in one write transaction.
    pub fn delete_if<P>(&self, order_id: &str, predicate: P) -> StorageResult<DeleteOutcome>
    where
        P: Fn(&Order) -> bool,
    {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let stored: Option<Order> = match orders.get(order_id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            match stored {
                None => DeleteOutcome::NotFound,
                Some(order) if !predicate(&order) => DeleteOutcome::Kept(order),
                Some(order) => {
                    orders.remove(order_id)?;

                    let mut by_customer = txn.open_table(CUSTOMER_ORDERS_TABLE)?;
                    by_customer.remove((order.customer_id.as_str(), order.order_number))?;

                    let mut by_order = txn.open_table(ORDER_RIDERS_TABLE)?;
                    let mut rider_ids: Vec<String> = Vec::new();
                    for result in by_order.range((order_id, "")..)? {
                        let (key, _number) = result?;
                        let (owner, rider_id) = key.value();
                        if owner != order_id {
                            break;
                        }
                        rider_ids.push(rider_id.to_string());
                    }

                    let mut by_rider = txn.open_table(RIDER_ORDERS_TABLE)?;
                    for rider_id in &rider_ids {
                        by_rider.remove((rider_id.as_str(), order.order_number))?;
                        by_order.remove((order_id, rider_id.as_str()))?;
                    }

                    DeleteOutcome::Deleted(order)
                }
            }
        };

        match outcome {
            DeleteOutcome::Deleted(_) => txn.commit()?,
            DeleteOutcome::Kept(_) | DeleteOutcome::NotFound => txn.abort()?,
        }
        Ok(outcome)
    }

    /// Number of stored orders
    pub fn count(&self) -> StorageResult<u64> {
        use redb::ReadableTableMetadata;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        Ok(table.len()?)
    }
}
