use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_headers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_date: DateTimeWithTimeZone,
    pub order_total: i64,
    pub order_status: String,
    pub payment_status: String,
    pub payment_intent_id: Option<String>,
    pub session_id: Option<String>,
    pub payment_date: Option<DateTimeWithTimeZone>,
    pub shipping_date: Option<DateTimeWithTimeZone>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_details::Entity")]
    OrderDetails,
}

impl Related<super::order_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderDetails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
