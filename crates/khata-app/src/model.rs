// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::filter::{BooleanFlag, ListEntity};
use crate::forms::{CategoryFormInput, CustomerFormInput, ProductFormInput};
use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Customers,
    Products,
    Categories,
}

impl EntityKind {
    pub const ALL: [Self; 3] = [Self::Customers, Self::Products, Self::Categories];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Categories => "categories",
        }
    }

    /// Collection path segment on the remote API.
    pub const fn path(self) -> &'static str {
        self.label()
    }

    pub const fn singular(self) -> &'static str {
        match self {
            Self::Customers => "customer",
            Self::Products => "product",
            Self::Categories => "category",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customers" | "customer" => Some(Self::Customers),
            "products" | "product" => Some(Self::Products),
            "categories" | "category" => Some(Self::Categories),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Unpaid,
    Paid,
}

impl LoanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(Self::Unpaid),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(alias = "_id")]
    pub id: CustomerId,
    pub name: String,
    pub mobile_number: String,
    pub address: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(with = "wire::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub total_loans: u32,
    #[serde(default)]
    pub unpaid_loans: u32,
    #[serde(default, with = "wire::optional_date")]
    pub last_loan_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: ProductId,
    pub name: String,
    pub unit: String,
    pub category: CategoryId,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(with = "wire::timestamp")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub products_count: u32,
    #[serde(with = "wire::timestamp")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    #[serde(alias = "_id")]
    pub id: LoanId,
    pub customer_id: CustomerId,
    pub product_name: String,
    #[serde(rename = "amount", with = "wire::paise")]
    pub amount_paise: i64,
    #[serde(with = "wire::date")]
    pub loan_date: Date,
    #[serde(with = "wire::date")]
    pub due_date: Date,
    pub status: LoanStatus,
    #[serde(default, with = "wire::optional_date")]
    pub payment_date: Option<Date>,
}

impl Loan {
    pub fn is_overdue(&self, today: Date) -> bool {
        self.status == LoanStatus::Unpaid && self.due_date < today
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_loans: u64,
    #[serde(rename = "totalUnpaidAmount", with = "wire::paise")]
    pub total_unpaid_paise: i64,
    #[serde(rename = "totalPaidAmount", with = "wire::paise")]
    pub total_paid_paise: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    #[serde(rename = "loans", with = "wire::paise")]
    pub loans_paise: i64,
    #[serde(rename = "collections", with = "wire::paise")]
    pub collections_paise: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    #[serde(default)]
    pub chart_data: Vec<ChartPoint>,
}

impl ListEntity for Customer {
    type Id = CustomerId;
    type Draft = CustomerFormInput;
    const KIND: EntityKind = EntityKind::Customers;

    fn id(&self) -> &CustomerId {
        &self.id
    }

    fn searchable_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.mobile_number.as_str(),
            self.address.as_str(),
        ]
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn satisfies_flag(&self, flag: BooleanFlag) -> bool {
        match flag {
            BooleanFlag::UnpaidOnly => self.unpaid_loans > 0,
        }
    }
}

impl ListEntity for Product {
    type Id = ProductId;
    type Draft = ProductFormInput;
    const KIND: EntityKind = EntityKind::Products;

    fn id(&self) -> &ProductId {
        &self.id
    }

    fn searchable_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn category_field(&self) -> Option<&str> {
        Some(self.category.as_str())
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

impl ListEntity for Category {
    type Id = CategoryId;
    type Draft = CategoryFormInput;
    const KIND: EntityKind = EntityKind::Categories;

    fn id(&self) -> &CategoryId {
        &self.id
    }

    fn searchable_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

/// Renders paise as rupees with two decimals, e.g. `1250.50`.
pub fn format_rupees(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Serde adapters for the API's JSON shapes.
pub mod wire {
    use time::format_description::BorrowedFormatItem;
    use time::format_description::well_known::Rfc3339;
    use time::macros::format_description;
    use time::{Date, OffsetDateTime, PrimitiveDateTime};

    pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]");
    const NAIVE_FORMAT: &[BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    const NAIVE_FRACTION_FORMAT: &[BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

    /// Accepts RFC 3339, naive ISO timestamps (read as UTC), and bare dates.
    pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
        let raw = raw.trim();
        if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Some(value);
        }
        for format in [NAIVE_FORMAT, NAIVE_FRACTION_FORMAT] {
            if let Ok(value) = PrimitiveDateTime::parse(raw, format) {
                return Some(value.assume_utc());
            }
        }
        Date::parse(raw, DATE_FORMAT)
            .ok()
            .map(|date| date.midnight().assume_utc())
    }

    pub fn parse_date(raw: &str) -> Option<Date> {
        Date::parse(raw.trim(), DATE_FORMAT).ok()
    }

    pub fn format_date(date: Date) -> String {
        date.format(DATE_FORMAT)
            .unwrap_or_else(|_| date.to_string())
    }

    pub mod timestamp {
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
        use time::OffsetDateTime;
        use time::format_description::well_known::Rfc3339;

        pub fn serialize<S: Serializer>(
            value: &OffsetDateTime,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let formatted = value.format(&Rfc3339).map_err(S::Error::custom)?;
            serializer.serialize_str(&formatted)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<OffsetDateTime, D::Error> {
            let raw = String::deserialize(deserializer)?;
            super::parse_timestamp(&raw)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}")))
        }
    }

    pub mod date {
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
        use time::Date;

        pub fn serialize<S: Serializer>(value: &Date, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&super::format_date(*value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
            let raw = String::deserialize(deserializer)?;
            super::parse_date(&raw)
                .ok_or_else(|| D::Error::custom(format!("invalid date {raw:?}; expected YYYY-MM-DD")))
        }
    }

    pub mod optional_date {
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
        use time::Date;

        pub fn serialize<S: Serializer>(
            value: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(date) => serializer.serialize_some(&super::format_date(*date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(value) => super::parse_date(value)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid date {value:?}"))),
            }
        }
    }

    /// Decimal rupees on the wire, integer paise in memory.
    pub mod paise {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_f64(*value as f64 / 100.0)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
            let rupees = f64::deserialize(deserializer)?;
            Ok((rupees * 100.0).round() as i64)
        }
    }
}
