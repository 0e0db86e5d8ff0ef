use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        categories::{CategoryForm, CategoryList},
        orders::{CancelledOrder, OrderList, OrderWithDetails, ShipOrderRequest},
        products::{ProductForm, ProductList, ProductUploadForm},
    },
    models::{
        Category, OrderDetail, OrderHeader, OrderStatus, PaymentStatus, Product,
        ProductWithCategory,
    },
    payment::Refund,
    response::Meta,
    routes::{categories, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        categories::list_categories,
        categories::get_category,
        categories::upsert_category,
        categories::delete_category,
        products::list_products,
        products::get_product,
        products::upsert_product,
        products::delete_product,
        orders::list_orders,
        orders::get_order,
        orders::start_processing,
        orders::ship_order,
        orders::cancel_order,
        orders::list_refunds
    ),
    components(
        schemas(
            Category,
            Product,
            ProductWithCategory,
            OrderHeader,
            OrderDetail,
            OrderStatus,
            PaymentStatus,
            Refund,
            CategoryForm,
            CategoryList,
            ProductForm,
            ProductList,
            ProductUploadForm,
            ShipOrderRequest,
            OrderWithDetails,
            OrderList,
            CancelledOrder,
            params::Pagination,
            params::OrderListQuery,
            health::HealthData,
            Meta
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Categories", description = "Category management"),
        (name = "Products", description = "Product management and image upload"),
        (name = "Orders", description = "Order workflow and refunds"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
