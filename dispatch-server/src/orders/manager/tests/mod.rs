use super::*;
use crate::services::{PaymentError, ProofError};
use async_trait::async_trait;
use shared::order::GeoLocation;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::orders::requests::{AddressInput, PlaceOrderItem};
use crate::riders::DirectoryError;

// ========================================================================
// Test doubles
// ========================================================================

/// Proof storage kept in memory; `store` can be switched to fail
#[derive(Default)]
struct MemoryProofStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fail_store: AtomicBool,
    stored: AtomicUsize,
}

impl MemoryProofStorage {
    fn with_reference(reference: &str) -> Self {
        let storage = Self::default();
        storage
            .files
            .lock()
            .unwrap()
            .insert(reference.to_string(), vec![0xFF, 0xD8]);
        storage
    }
}

#[async_trait]
impl ProofStorage for MemoryProofStorage {
    async fn store(&self, bytes: Vec<u8>, _filename: &str) -> Result<String, ProofError> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(ProofError::Backend("disk unavailable".into()));
        }
        if bytes.is_empty() {
            return Err(ProofError::Empty);
        }
        let n = self.stored.fetch_add(1, Ordering::SeqCst);
        let reference = format!("upload-{n}.jpg");
        self.files.lock().unwrap().insert(reference.clone(), bytes);
        Ok(reference)
    }

    async fn exists(&self, reference: &str) -> Result<bool, ProofError> {
        Ok(self.files.lock().unwrap().contains_key(reference))
    }

    async fn read(&self, reference: &str) -> Result<Vec<u8>, ProofError> {
        self.files
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| ProofError::NotFound(reference.to_string()))
    }
}

/// Payment gateway that records requests and returns a fixed URL (or fails)
struct FakeGateway {
    fail: bool,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakeGateway {
    fn ok() -> Self {
        Self {
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, PaymentError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(PaymentError::Rejected("provider down".into()));
        }
        Ok(format!("https://checkout.test/{}", request.order_id))
    }
}

/// Directory with a fixed set of riders
struct StaticDirectory(Vec<RiderProfile>);

#[async_trait]
impl RiderDirectory for StaticDirectory {
    async fn lookup_rider(&self, rider_id: &str) -> Result<Option<RiderProfile>, DirectoryError> {
        Ok(self.0.iter().find(|r| r.rider_id == rider_id).cloned())
    }
}

// ========================================================================
// Fixtures
// ========================================================================

struct TestContext {
    manager: DispatchManager,
    proofs: Arc<MemoryProofStorage>,
}

fn admin() -> CurrentUser {
    CurrentUser::new("admin-1", "Admin", Role::Admin)
}

fn customer(id: &str) -> CurrentUser {
    CurrentUser::new(id, "Customer", Role::Customer)
}

fn rider(id: &str) -> CurrentUser {
    CurrentUser::new(id, "Rider", Role::Rider)
}

fn rider_profile(id: &str, name: &str, phone: &str) -> RiderProfile {
    RiderProfile {
        rider_id: id.into(),
        name: name.into(),
        phone: phone.into(),
        active: true,
        updated_at: 0,
    }
}

fn create_test_context() -> TestContext {
    create_test_context_with(MemoryProofStorage::with_reference("proof123"))
}

fn create_test_context_with(proofs: MemoryProofStorage) -> TestContext {
    let storage = OrderStorage::open_in_memory().unwrap();
    let riders = RiderRegistry::open_in_memory().unwrap();
    riders.upsert(rider_profile("R1", "Ben Reyes", "0917 111 1111")).unwrap();
    riders.upsert(rider_profile("R2", "Cara Lim", "0917 222 2222")).unwrap();

    let proofs = Arc::new(proofs);
    let manager = DispatchManager::new(storage, DispatchHub::new(), riders, proofs.clone());
    TestContext { manager, proofs }
}

fn address() -> AddressInput {
    AddressInput {
        first_name: "Ana".into(),
        last_name: "Cruz".into(),
        email: "ana@example.com".into(),
        phone: "0917 000 0000".into(),
        street: "1 Rizal St".into(),
        barangay: Some("Poblacion".into()),
        purok: None,
        city: "Davao".into(),
        state: "Davao del Sur".into(),
        country: "PH".into(),
        zipcode: "8000".into(),
    }
}

fn place_request(items: &[(&str, i64, u32)], delivery_fee: i64, discount: i64) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: items
            .iter()
            .enumerate()
            .map(|(i, (name, price, quantity))| PlaceOrderItem {
                product_id: format!("p{i}"),
                name: name.to_string(),
                unit_price: Decimal::from(*price),
                quantity: *quantity,
            })
            .collect(),
        address: address(),
        location: GeoLocation {
            lat: 7.0731,
            lng: 125.6128,
            label: Some("Gate 2".into()),
        },
        distance_km: 3.2,
        delivery_fee: Decimal::from(delivery_fee),
        discount: Decimal::from(discount),
    }
}

/// Two items totaling 100, fee 15
fn standard_request() -> PlaceOrderRequest {
    place_request(&[("Chicken Adobo", 60, 1), ("Garlic Rice", 20, 2)], 15, 0)
}

/// Placed and paid (`Processing`)
async fn paid_order(ctx: &TestContext, customer_id: &str) -> Order {
    let placed = ctx
        .manager
        .place(&customer(customer_id), standard_request())
        .await
        .unwrap();
    ctx.manager
        .confirm_payment_verified(&placed.order_id, PaymentOutcome::Success)
        .await
        .unwrap()
        .unwrap()
}

/// Paid and assigned to `rider_id`
async fn assigned_order(ctx: &TestContext, rider_id: &str) -> Order {
    let order = paid_order(ctx, "C1").await;
    ctx.manager
        .assign_rider(&admin(), &order.order_id, rider_id)
        .await
        .unwrap()
}

fn assert_code<T: std::fmt::Debug>(result: DispatchResult<T>, code: ErrorCode) {
    match result {
        Err(e) => assert_eq!(e.code(), code, "unexpected error: {e}"),
        Ok(v) => panic!("expected {code:?}, got Ok({v:?})"),
    }
}

mod test_concurrency;
