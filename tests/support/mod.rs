#![allow(dead_code)]

//! In-memory doubles for the store, the payment gateway and the image store.
//!
//! Every double appends to one shared [`Journal`], so tests can assert both
//! which calls happened and the order they happened in.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use shop_admin_api::{
    error::{AppError, AppResult},
    models::{
        Category, OrderDetail, OrderHeader, OrderStatus, PaymentStatus, Product,
        ProductWithCategory,
    },
    payment::{PaymentError, PaymentGateway, Refund},
    state::AppState,
    storage::{ImageStore, StorageError, image_url},
    store::{
        CategoryRepository, OrderDetailRepository, OrderFilter, OrderHeaderRepository,
        ProductRepository, Store, UnitOfWork,
    },
};

pub const JWT_SECRET: &str = "test-secret";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin,
    Commit,
    AddCategory,
    UpdateCategory(i32),
    DeleteCategory(i32),
    AddProduct,
    UpdateProduct(i32),
    DeleteProduct(i32),
    UpdateHeader(i32),
    UpdateStatus {
        id: i32,
        order_status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    },
    CreateRefund {
        payment_intent_id: String,
        idempotency_key: String,
    },
    ListRefunds(String),
    SaveImage(String),
    DeleteImage(String),
}

#[derive(Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
    open_units: Arc<AtomicUsize>,
    open_during_refund: Arc<AtomicUsize>,
}

impl Journal {
    pub fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Most units of work that were open at once while a refund was requested.
    pub fn open_units_during_refund(&self) -> usize {
        self.open_during_refund.load(Ordering::SeqCst)
    }

    fn note_refund(&self) {
        let open = self.open_units.load(Ordering::SeqCst);
        self.open_during_refund.fetch_max(open, Ordering::SeqCst);
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn commits(&self) -> usize {
        self.count(|c| *c == Call::Commit)
    }

    pub fn refunds(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateRefund { .. }))
    }

    /// Calls that touch the store at all, including opening a unit of work.
    pub fn store_calls(&self) -> usize {
        self.count(|c| {
            !matches!(
                c,
                Call::CreateRefund { .. }
                    | Call::ListRefunds(_)
                    | Call::SaveImage(_)
                    | Call::DeleteImage(_)
            )
        })
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub categories: BTreeMap<i32, Category>,
    pub products: BTreeMap<i32, Product>,
    pub headers: BTreeMap<i32, OrderHeader>,
    pub details: Vec<OrderDetail>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Writes go to a private copy of the tables that replaces the shared copy
/// on commit, so an uncommitted unit of work leaves no trace.
#[derive(Clone, Default)]
pub struct MockStore {
    pub tables: Arc<Mutex<Tables>>,
    pub journal: Journal,
    pub fail_commit: Arc<AtomicBool>,
}

impl MockStore {
    pub fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }

    pub fn insert_category(&self, name: &str) -> Category {
        let mut tables = self.tables.lock().unwrap();
        let category = Category {
            id: tables.next_id(),
            name: name.to_string(),
        };
        tables.categories.insert(category.id, category.clone());
        category
    }

    pub fn insert_product(&self, name: &str, category_id: i32, image_url: Option<&str>) -> Product {
        let mut tables = self.tables.lock().unwrap();
        let product = Product {
            id: tables.next_id(),
            name: name.to_string(),
            description: None,
            price: 1000,
            category_id,
            image_url: image_url.map(str::to_string),
        };
        tables.products.insert(product.id, product.clone());
        product
    }

    pub fn insert_order(
        &self,
        order_status: OrderStatus,
        payment_status: PaymentStatus,
        payment_intent_id: Option<&str>,
    ) -> OrderHeader {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let header = OrderHeader {
            id: tables.next_id(),
            order_date: now,
            order_total: 0,
            order_status,
            payment_status,
            payment_intent_id: payment_intent_id.map(str::to_string),
            session_id: None,
            payment_date: None,
            shipping_date: None,
            carrier: None,
            tracking_number: None,
            name: "Ada Lovelace".to_string(),
            phone: "555-0100".to_string(),
            address: "12 Analytical Row".to_string(),
            city: "London".to_string(),
            postal_code: "N1 9GU".to_string(),
            updated_at: now,
        };
        tables.headers.insert(header.id, header.clone());
        header
    }

    pub fn insert_detail(&self, order_header_id: i32, product_id: i32, quantity: i32, price: i64) {
        let mut tables = self.tables.lock().unwrap();
        let detail = OrderDetail {
            id: tables.next_id(),
            order_header_id,
            product_id,
            quantity,
            price,
        };
        if let Some(header) = tables.headers.get_mut(&order_header_id) {
            header.order_total += i64::from(quantity) * price;
        }
        tables.details.push(detail);
    }

    pub fn header(&self, id: i32) -> OrderHeader {
        self.tables.lock().unwrap().headers[&id].clone()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        self.journal.push(Call::Begin);
        self.journal.open_units.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockUnitOfWork {
            working: Mutex::new(self.snapshot()),
            store: self.clone(),
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MockUnitOfWork {
    working: Mutex<Tables>,
    store: MockStore,
}

impl MockUnitOfWork {
    fn record(&self, call: Call) {
        self.store.journal.push(call);
    }
}

impl Drop for MockUnitOfWork {
    fn drop(&mut self) {
        self.store.journal.open_units.fetch_sub(1, Ordering::SeqCst);
    }
}

fn duplicate_name() -> AppError {
    AppError::Conflict("a record with the same name already exists".into())
}

#[async_trait]
impl UnitOfWork for MockUnitOfWork {
    fn categories(&self) -> &dyn CategoryRepository {
        self
    }

    fn products(&self) -> &dyn ProductRepository {
        self
    }

    fn order_headers(&self) -> &dyn OrderHeaderRepository {
        self
    }

    fn order_details(&self) -> &dyn OrderDetailRepository {
        self
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.record(Call::Commit);
        if self.store.fail_commit.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("commit failed")));
        }
        let working = self.working.lock().unwrap().clone();
        *self.store.tables.lock().unwrap() = working;
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for MockUnitOfWork {
    async fn get_all(&self) -> AppResult<Vec<Category>> {
        let mut all: Vec<_> = self.working.lock().unwrap().categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn get(&self, id: i32) -> AppResult<Option<Category>> {
        Ok(self.working.lock().unwrap().categories.get(&id).cloned())
    }

    async fn add(&self, mut category: Category) -> AppResult<Category> {
        self.record(Call::AddCategory);
        let mut tables = self.working.lock().unwrap();
        if tables.categories.values().any(|c| c.name == category.name) {
            return Err(duplicate_name());
        }
        category.id = tables.next_id();
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update(&self, category: Category) -> AppResult<Category> {
        self.record(Call::UpdateCategory(category.id));
        let mut tables = self.working.lock().unwrap();
        if tables
            .categories
            .values()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(duplicate_name());
        }
        match tables.categories.get_mut(&category.id) {
            Some(row) => {
                *row = category.clone();
                Ok(category)
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn delete(&self, category: &Category) -> AppResult<()> {
        self.record(Call::DeleteCategory(category.id));
        self.working
            .lock()
            .unwrap()
            .categories
            .remove(&category.id)
            .map(|_| ())
            .ok_or(AppError::NotFound)
    }
}

#[async_trait]
impl ProductRepository for MockUnitOfWork {
    async fn get_all(&self) -> AppResult<Vec<ProductWithCategory>> {
        let tables = self.working.lock().unwrap();
        Ok(tables
            .products
            .values()
            .map(|product| ProductWithCategory {
                product: product.clone(),
                category: tables.categories.get(&product.category_id).cloned(),
            })
            .collect())
    }

    async fn get(&self, id: i32) -> AppResult<Option<Product>> {
        Ok(self.working.lock().unwrap().products.get(&id).cloned())
    }

    async fn count_by_category(&self, category_id: i32) -> AppResult<u64> {
        let tables = self.working.lock().unwrap();
        Ok(tables
            .products
            .values()
            .filter(|p| p.category_id == category_id)
            .count() as u64)
    }

    async fn add(&self, mut product: Product) -> AppResult<Product> {
        self.record(Call::AddProduct);
        let mut tables = self.working.lock().unwrap();
        if tables.products.values().any(|p| p.name == product.name) {
            return Err(duplicate_name());
        }
        product.id = tables.next_id();
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, product: Product) -> AppResult<Product> {
        self.record(Call::UpdateProduct(product.id));
        let mut tables = self.working.lock().unwrap();
        if tables
            .products
            .values()
            .any(|p| p.id != product.id && p.name == product.name)
        {
            return Err(duplicate_name());
        }
        match tables.products.get_mut(&product.id) {
            Some(row) => {
                *row = product.clone();
                Ok(product)
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn delete(&self, product: &Product) -> AppResult<()> {
        self.record(Call::DeleteProduct(product.id));
        self.working
            .lock()
            .unwrap()
            .products
            .remove(&product.id)
            .map(|_| ())
            .ok_or(AppError::NotFound)
    }
}

#[async_trait]
impl OrderHeaderRepository for MockUnitOfWork {
    async fn list(&self, filter: &OrderFilter) -> AppResult<(Vec<OrderHeader>, u64)> {
        let tables = self.working.lock().unwrap();
        let mut matching: Vec<_> = tables
            .headers
            .values()
            .filter(|h| filter.status.is_none_or(|s| h.order_status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(b.id.cmp(&a.id)));
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get(&self, id: i32) -> AppResult<Option<OrderHeader>> {
        Ok(self.working.lock().unwrap().headers.get(&id).cloned())
    }

    async fn update(&self, header: OrderHeader) -> AppResult<OrderHeader> {
        self.record(Call::UpdateHeader(header.id));
        let mut tables = self.working.lock().unwrap();
        match tables.headers.get_mut(&header.id) {
            Some(row) => {
                *row = header.clone();
                Ok(header)
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn update_status(
        &self,
        id: i32,
        order_status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> AppResult<()> {
        self.record(Call::UpdateStatus {
            id,
            order_status,
            payment_status,
        });
        let mut tables = self.working.lock().unwrap();
        let header = tables.headers.get_mut(&id).ok_or(AppError::NotFound)?;
        header.order_status = order_status;
        if let Some(payment_status) = payment_status {
            header.payment_status = payment_status;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderDetailRepository for MockUnitOfWork {
    async fn list_by_order(&self, order_header_id: i32) -> AppResult<Vec<OrderDetail>> {
        Ok(self
            .working
            .lock()
            .unwrap()
            .details
            .iter()
            .filter(|d| d.order_header_id == order_header_id)
            .cloned()
            .collect())
    }

    async fn count_by_product(&self, product_id: i32) -> AppResult<u64> {
        let tables = self.working.lock().unwrap();
        Ok(tables
            .details
            .iter()
            .filter(|d| d.product_id == product_id)
            .count() as u64)
    }
}

type RefundHook = Box<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct MockGateway {
    pub journal: Journal,
    pub fail: Arc<AtomicBool>,
    /// Reject refunds the way the processor does for a charge refunded earlier.
    pub already_refunded: Arc<AtomicBool>,
    pub during_refund: Arc<Mutex<Option<RefundHook>>>,
}

impl MockGateway {
    /// Runs `hook` while a refund request is in flight.
    pub fn during_refund(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.during_refund.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> Result<Refund, PaymentError> {
        self.journal.push(Call::CreateRefund {
            payment_intent_id: payment_intent_id.to_string(),
            idempotency_key: idempotency_key.to_string(),
        });
        self.journal.note_refund();
        if let Some(hook) = self.during_refund.lock().unwrap().as_ref() {
            hook();
        }
        if self.already_refunded.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                status: 400,
                code: Some("charge_already_refunded".to_string()),
                message: "Charge has already been refunded.".to_string(),
            });
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                status: 402,
                code: Some("card_declined".to_string()),
                message: "refund declined".to_string(),
            });
        }
        Ok(refund_for(payment_intent_id))
    }

    async fn list_refunds(&self, payment_intent_id: &str) -> Result<Vec<Refund>, PaymentError> {
        self.journal.push(Call::ListRefunds(payment_intent_id.to_string()));
        Ok(vec![refund_for(payment_intent_id)])
    }
}

pub fn refund_for(payment_intent_id: &str) -> Refund {
    Refund {
        id: format!("re_{payment_intent_id}"),
        payment_intent: Some(payment_intent_id.to_string()),
        amount: 2500,
        currency: "usd".to_string(),
        status: "succeeded".to_string(),
    }
}

#[derive(Clone, Default)]
pub struct MockImageStore {
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub journal: Journal,
    /// Saves report success without keeping the file.
    pub drop_writes: Arc<AtomicBool>,
}

impl MockImageStore {
    pub fn put(&self, url: &str) {
        self.files.lock().unwrap().insert(url.to_string(), b"old".to_vec());
    }

    pub fn has(&self, url: &str) -> bool {
        self.files.lock().unwrap().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn save(&self, bytes: &[u8], file_name: &str) -> Result<String, StorageError> {
        let url = image_url(file_name);
        self.journal.push(Call::SaveImage(url.clone()));
        if !self.drop_writes.load(Ordering::SeqCst) {
            self.files.lock().unwrap().insert(url.clone(), bytes.to_vec());
        }
        Ok(url)
    }

    async fn delete(&self, image_url: &str) -> Result<(), StorageError> {
        self.journal.push(Call::DeleteImage(image_url.to_string()));
        self.files.lock().unwrap().remove(image_url);
        Ok(())
    }

    async fn exists(&self, image_url: &str) -> Result<bool, StorageError> {
        Ok(self.has(image_url))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: MockStore,
    pub gateway: MockGateway,
    pub images: MockImageStore,
    pub journal: Journal,
}

pub fn test_app() -> TestApp {
    let journal = Journal::default();
    let store = MockStore {
        journal: journal.clone(),
        ..Default::default()
    };
    let gateway = MockGateway {
        journal: journal.clone(),
        ..Default::default()
    };
    let images = MockImageStore {
        journal: journal.clone(),
        ..Default::default()
    };
    let state = AppState {
        store: Arc::new(store.clone()),
        payments: Arc::new(gateway.clone()),
        images: Arc::new(images.clone()),
        jwt_secret: JWT_SECRET.into(),
    };
    TestApp {
        state,
        store,
        gateway,
        images,
        journal,
    }
}
