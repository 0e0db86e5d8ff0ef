//! Data access seams.
//!
//! Each entity gets its own repository trait. A [`UnitOfWork`] hands out all
//! of them over one transaction and exposes the single `commit` that makes
//! their writes visible. Dropping a unit of work without committing discards
//! every write made through it.

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        Category, OrderDetail, OrderHeader, OrderStatus, PaymentStatus, Product,
        ProductWithCategory,
    },
};

pub mod sea_orm_store;

pub use sea_orm_store::SeaOrmStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    async fn ping(&self) -> AppResult<()>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn categories(&self) -> &dyn CategoryRepository;
    fn products(&self) -> &dyn ProductRepository;
    fn order_headers(&self) -> &dyn OrderHeaderRepository;
    fn order_details(&self) -> &dyn OrderDetailRepository;

    /// Persist every pending change. A unit of work can be committed once.
    async fn commit(&mut self) -> AppResult<()>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn get_all(&self) -> AppResult<Vec<Category>>;
    async fn get(&self, id: i32) -> AppResult<Option<Category>>;
    /// Inserts the category, ignoring its `id`, and returns the stored row.
    async fn add(&self, category: Category) -> AppResult<Category>;
    /// Fails with `NotFound` when no row has `category.id`.
    async fn update(&self, category: Category) -> AppResult<Category>;
    async fn delete(&self, category: &Category) -> AppResult<()>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_all(&self) -> AppResult<Vec<ProductWithCategory>>;
    async fn get(&self, id: i32) -> AppResult<Option<Product>>;
    async fn count_by_category(&self, category_id: i32) -> AppResult<u64>;
    async fn add(&self, product: Product) -> AppResult<Product>;
    async fn update(&self, product: Product) -> AppResult<Product>;
    async fn delete(&self, product: &Product) -> AppResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: u64,
    pub offset: u64,
}

#[async_trait]
pub trait OrderHeaderRepository: Send + Sync {
    /// Newest orders first, plus the total number of matching rows.
    async fn list(&self, filter: &OrderFilter) -> AppResult<(Vec<OrderHeader>, u64)>;
    async fn get(&self, id: i32) -> AppResult<Option<OrderHeader>>;
    /// Writes the whole record.
    async fn update(&self, header: OrderHeader) -> AppResult<OrderHeader>;
    /// Writes only the status columns; `payment_status: None` leaves the
    /// payment status as it is.
    async fn update_status(
        &self,
        id: i32,
        order_status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait OrderDetailRepository: Send + Sync {
    async fn list_by_order(&self, order_header_id: i32) -> AppResult<Vec<OrderDetail>>;
    /// Number of order lines, in any order, that reference the product.
    async fn count_by_product(&self, product_id: i32) -> AppResult<u64>;
}
