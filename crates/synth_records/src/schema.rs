//! Table catalog: the supported table kinds, their columns and parents.
//!
//! Every generated record is a positional row aligned with the column list
//! returned by [`TableKind::columns`]. Column 0 is always the primary id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical column types understood by the columnar writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Unsigned 64-bit identifier (primary or foreign key)
    Id,
    /// 64-bit signed integer
    Integer,
    /// Double precision float
    Double,
    /// Variable-length string
    Text,
    /// Boolean
    Boolean,
    /// Calendar date
    Date,
    /// Timestamp without time zone (UTC normalized)
    Timestamp,
}

impl ColumnType {
    /// Returns the DuckDB type name
    pub fn to_duckdb(&self) -> &'static str {
        match self {
            ColumnType::Id => "UBIGINT",
            ColumnType::Integer => "BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Text => "VARCHAR",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

/// Column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column {
        name,
        ty,
        nullable: false,
    }
}

const fn nullable(name: &'static str, ty: ColumnType) -> Column {
    Column {
        name,
        ty,
        nullable: true,
    }
}

use ColumnType::{Boolean, Date, Double, Id, Integer, Text, Timestamp};

const USERS: &[Column] = &[
    col("user_id", Id),
    col("email", Text),
    col("username", Text),
    col("first_name", Text),
    col("last_name", Text),
    col("date_of_birth", Date),
    col("gender", Text),
    col("phone_number", Text),
    col("address_line_1", Text),
    nullable("address_line_2", Text),
    col("city", Text),
    col("state_province", Text),
    col("postal_code", Text),
    col("country", Text),
    col("registration_date", Timestamp),
    col("last_login_date", Timestamp),
    col("account_status", Text),
    col("email_verified", Boolean),
    col("marketing_opt_in", Boolean),
    col("preferred_language", Text),
    col("loyalty_tier", Text),
    col("referral_code", Text),
    col("source_channel", Text),
    col("customer_segment", Text),
    col("credit_score_range", Text),
];

const PRODUCTS: &[Column] = &[
    col("product_id", Id),
    col("sku", Text),
    col("product_name", Text),
    col("brand", Text),
    col("category", Text),
    col("subcategory", Text),
    col("description", Text),
    col("price", Double),
    col("cost", Double),
    col("weight_kg", Double),
    col("dimensions_cm", Text),
    col("color", Text),
    col("size", Text),
    col("material", Text),
    col("stock_quantity", Integer),
    col("reorder_level", Integer),
    col("supplier_id", Integer),
    col("supplier_name", Text),
    col("created_date", Timestamp),
    col("last_updated", Timestamp),
    col("is_active", Boolean),
    col("is_featured", Boolean),
    col("rating_avg", Double),
    col("rating_count", Integer),
    col("sales_rank", Integer),
    col("seasonal", Boolean),
    col("eco_friendly", Boolean),
    col("warranty_months", Integer),
    col("tags", Text),
];

const ORDERS: &[Column] = &[
    col("order_id", Id),
    col("user_id", Id),
    col("product_ids", Text),
    col("order_number", Text),
    col("order_date", Timestamp),
    col("order_status", Text),
    col("payment_status", Text),
    col("payment_method", Text),
    col("shipping_method", Text),
    col("billing_address", Text),
    col("shipping_address", Text),
    col("subtotal_amount", Double),
    col("tax_amount", Double),
    col("shipping_cost", Double),
    col("discount_amount", Double),
    col("total_amount", Double),
    col("currency", Text),
    col("total_items", Integer),
    col("total_quantity", Integer),
    nullable("coupon_code", Text),
    col("sales_channel", Text),
    col("customer_type", Text),
    col("order_source", Text),
    col("estimated_delivery_date", Timestamp),
    nullable("actual_delivery_date", Timestamp),
    nullable("tracking_number", Text),
    nullable("notes", Text),
    nullable("gift_message", Text),
    col("priority_level", Text),
];

/// Supported table kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Users,
    Products,
    Orders,
}

impl TableKind {
    /// All known tables, parents before dependents
    pub const ALL: [TableKind; 3] = [TableKind::Users, TableKind::Products, TableKind::Orders];

    /// Table name as used in the ledger and in object keys
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Users => "users",
            TableKind::Products => "products",
            TableKind::Orders => "orders",
        }
    }

    /// Tables whose ids this table references
    pub fn parents(&self) -> &'static [TableKind] {
        match self {
            TableKind::Users | TableKind::Products => &[],
            TableKind::Orders => &[TableKind::Users, TableKind::Products],
        }
    }

    /// Whether this table references another table's ids
    pub fn is_dependent(&self) -> bool {
        !self.parents().is_empty()
    }

    /// Ordered column list
    pub fn columns(&self) -> &'static [Column] {
        match self {
            TableKind::Users => USERS,
            TableKind::Products => PRODUCTS,
            TableKind::Orders => ORDERS,
        }
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == name)
    }

    /// Name of the primary id column
    pub fn id_column(&self) -> &'static str {
        self.columns()[0].name
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl std::str::FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "users" => Ok(TableKind::Users),
            "products" => Ok(TableKind::Products),
            "orders" => Ok(TableKind::Orders),
            _ => Err(format!(
                "Unknown table: {}. Valid options: users, products, orders",
                s
            )),
        }
    }
}
