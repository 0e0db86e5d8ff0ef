use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::{NotSet, Set, Unchanged};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};

use super::{
    CategoryRepository, OrderDetailRepository, OrderFilter, OrderHeaderRepository,
    ProductRepository, Store, UnitOfWork,
};
use crate::{
    entity::{
        categories::{
            ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories,
            Model as CategoryModel,
        },
        order_details::{
            Column as DetailCol, Entity as OrderDetails, Model as OrderDetailModel,
        },
        order_headers::{
            ActiveModel as OrderHeaderActive, Column as HeaderCol, Entity as OrderHeaders,
            Model as OrderHeaderModel,
        },
        products::{
            ActiveModel as ProductActive, Column as ProdCol, Entity as Products,
            Model as ProductModel,
        },
    },
    error::{AppError, AppResult},
    models::{
        Category, OrderDetail, OrderHeader, OrderStatus, PaymentStatus, Product,
        ProductWithCategory,
    },
};

/// PostgreSQL-backed store. Every unit of work is one database transaction.
#[derive(Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Store for SeaOrmStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let txn = self.conn.begin().await?;
        Ok(Box::new(SeaOrmUnitOfWork { txn: Some(txn) }))
    }

    async fn ping(&self) -> AppResult<()> {
        self.conn.ping().await?;
        Ok(())
    }
}

pub struct SeaOrmUnitOfWork {
    txn: Option<DatabaseTransaction>,
}

impl SeaOrmUnitOfWork {
    fn txn(&self) -> AppResult<&DatabaseTransaction> {
        self.txn
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow!("unit of work already committed")))
    }
}

#[async_trait]
impl UnitOfWork for SeaOrmUnitOfWork {
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
        let txn = self
            .txn
            .take()
            .ok_or_else(|| AppError::Internal(anyhow!("unit of work already committed")))?;
        txn.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for SeaOrmUnitOfWork {
    async fn get_all(&self) -> AppResult<Vec<Category>> {
        let categories = Categories::find()
            .order_by_asc(CategoryCol::Name)
            .all(self.txn()?)
            .await?
            .into_iter()
            .map(category_from_entity)
            .collect();
        Ok(categories)
    }

    async fn get(&self, id: i32) -> AppResult<Option<Category>> {
        let category = Categories::find_by_id(id)
            .one(self.txn()?)
            .await?
            .map(category_from_entity);
        Ok(category)
    }

    async fn add(&self, category: Category) -> AppResult<Category> {
        let model = CategoryActive {
            id: NotSet,
            name: Set(category.name),
        }
        .insert(self.txn()?)
        .await
        .map_err(write_error)?;
        Ok(category_from_entity(model))
    }

    async fn update(&self, category: Category) -> AppResult<Category> {
        let model = CategoryActive {
            id: Unchanged(category.id),
            name: Set(category.name),
        }
        .update(self.txn()?)
        .await
        .map_err(write_error)?;
        Ok(category_from_entity(model))
    }

    async fn delete(&self, category: &Category) -> AppResult<()> {
        let result = Categories::delete_by_id(category.id)
            .exec(self.txn()?)
            .await
            .map_err(write_error)?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for SeaOrmUnitOfWork {
    async fn get_all(&self) -> AppResult<Vec<ProductWithCategory>> {
        let rows = Products::find()
            .find_also_related(Categories)
            .order_by_asc(ProdCol::Id)
            .all(self.txn()?)
            .await?
            .into_iter()
            .map(|(product, category)| ProductWithCategory {
                product: product_from_entity(product),
                category: category.map(category_from_entity),
            })
            .collect();
        Ok(rows)
    }

    async fn get(&self, id: i32) -> AppResult<Option<Product>> {
        let product = Products::find_by_id(id)
            .one(self.txn()?)
            .await?
            .map(product_from_entity);
        Ok(product)
    }

    async fn count_by_category(&self, category_id: i32) -> AppResult<u64> {
        let count = Products::find()
            .filter(ProdCol::CategoryId.eq(category_id))
            .count(self.txn()?)
            .await?;
        Ok(count)
    }

    async fn add(&self, product: Product) -> AppResult<Product> {
        let model = ProductActive {
            id: NotSet,
            name: Set(product.name),
            description: Set(product.description),
            price: Set(product.price),
            category_id: Set(product.category_id),
            image_url: Set(product.image_url),
        }
        .insert(self.txn()?)
        .await
        .map_err(write_error)?;
        Ok(product_from_entity(model))
    }

    async fn update(&self, product: Product) -> AppResult<Product> {
        let model = ProductActive {
            id: Unchanged(product.id),
            name: Set(product.name),
            description: Set(product.description),
            price: Set(product.price),
            category_id: Set(product.category_id),
            image_url: Set(product.image_url),
        }
        .update(self.txn()?)
        .await
        .map_err(write_error)?;
        Ok(product_from_entity(model))
    }

    async fn delete(&self, product: &Product) -> AppResult<()> {
        let result = Products::delete_by_id(product.id)
            .exec(self.txn()?)
            .await
            .map_err(write_error)?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderHeaderRepository for SeaOrmUnitOfWork {
    async fn list(&self, filter: &OrderFilter) -> AppResult<(Vec<OrderHeader>, u64)> {
        let mut condition = Condition::all();
        if let Some(status) = filter.status {
            condition = condition.add(HeaderCol::OrderStatus.eq(status.as_str()));
        }

        let finder = OrderHeaders::find()
            .filter(condition)
            .order_by_desc(HeaderCol::OrderDate)
            .order_by_desc(HeaderCol::Id);

        let txn = self.txn()?;
        let total = finder.clone().count(txn).await?;
        let headers = finder
            .limit(filter.limit)
            .offset(filter.offset)
            .all(txn)
            .await?
            .into_iter()
            .map(order_header_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((headers, total))
    }

    async fn get(&self, id: i32) -> AppResult<Option<OrderHeader>> {
        OrderHeaders::find_by_id(id)
            .one(self.txn()?)
            .await?
            .map(order_header_from_entity)
            .transpose()
    }

    async fn update(&self, header: OrderHeader) -> AppResult<OrderHeader> {
        let model = OrderHeaderActive {
            id: Unchanged(header.id),
            order_date: Set(header.order_date.into()),
            order_total: Set(header.order_total),
            order_status: Set(header.order_status.as_str().to_string()),
            payment_status: Set(header.payment_status.as_str().to_string()),
            payment_intent_id: Set(header.payment_intent_id),
            session_id: Set(header.session_id),
            payment_date: Set(header.payment_date.map(Into::into)),
            shipping_date: Set(header.shipping_date.map(Into::into)),
            carrier: Set(header.carrier),
            tracking_number: Set(header.tracking_number),
            name: Set(header.name),
            phone: Set(header.phone),
            address: Set(header.address),
            city: Set(header.city),
            postal_code: Set(header.postal_code),
            updated_at: Set(Utc::now().into()),
        }
        .update(self.txn()?)
        .await
        .map_err(write_error)?;
        order_header_from_entity(model)
    }

    async fn update_status(
        &self,
        id: i32,
        order_status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> AppResult<()> {
        let mut update = OrderHeaders::update_many()
            .col_expr(HeaderCol::OrderStatus, Expr::value(order_status.as_str()))
            .col_expr(HeaderCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(HeaderCol::Id.eq(id));
        if let Some(payment_status) = payment_status {
            update = update.col_expr(HeaderCol::PaymentStatus, Expr::value(payment_status.as_str()));
        }

        let result = update.exec(self.txn()?).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        tracing::debug!(order_id = id, %order_status, "order status written");
        Ok(())
    }
}

#[async_trait]
impl OrderDetailRepository for SeaOrmUnitOfWork {
    async fn list_by_order(&self, order_header_id: i32) -> AppResult<Vec<OrderDetail>> {
        let details = OrderDetails::find()
            .filter(DetailCol::OrderHeaderId.eq(order_header_id))
            .order_by_asc(DetailCol::Id)
            .all(self.txn()?)
            .await?
            .into_iter()
            .map(order_detail_from_entity)
            .collect();
        Ok(details)
    }

    async fn count_by_product(&self, product_id: i32) -> AppResult<u64> {
        let count = OrderDetails::find()
            .filter(DetailCol::ProductId.eq(product_id))
            .count(self.txn()?)
            .await?;
        Ok(count)
    }
}

/// Constraint violations a client can cause become 409s; a missing row on
/// update is a 404.
fn write_error(err: DbErr) -> AppError {
    if let DbErr::RecordNotUpdated = err {
        return AppError::NotFound;
    }
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(%detail, "unique constraint violated");
            AppError::Conflict("a record with the same name already exists".into())
        }
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
            tracing::debug!(%detail, "foreign key constraint violated");
            AppError::Conflict("the record is still referenced by other records".into())
        }
        _ => AppError::OrmError(err),
    }
}

fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
    }
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        category_id: model.category_id,
        image_url: model.image_url,
    }
}

fn order_header_from_entity(model: OrderHeaderModel) -> AppResult<OrderHeader> {
    let order_status = model
        .order_status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow!(e)))?;
    let payment_status = model
        .payment_status
        .parse::<PaymentStatus>()
        .map_err(|e| AppError::Internal(anyhow!(e)))?;

    Ok(OrderHeader {
        id: model.id,
        order_date: model.order_date.with_timezone(&Utc),
        order_total: model.order_total,
        order_status,
        payment_status,
        payment_intent_id: model.payment_intent_id,
        session_id: model.session_id,
        payment_date: model.payment_date.map(|dt| dt.with_timezone(&Utc)),
        shipping_date: model.shipping_date.map(|dt| dt.with_timezone(&Utc)),
        carrier: model.carrier,
        tracking_number: model.tracking_number,
        name: model.name,
        phone: model.phone,
        address: model.address,
        city: model.city,
        postal_code: model.postal_code,
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_detail_from_entity(model: OrderDetailModel) -> OrderDetail {
    OrderDetail {
        id: model.id,
        order_header_id: model.order_header_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
    }
}
