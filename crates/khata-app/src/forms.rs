// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Serialize;
use time::Date;

use crate::error::ValidationError;
use crate::model::wire;
use crate::{CategoryId, LoanStatus};

type Validation = std::result::Result<(), ValidationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Customer,
    Product,
    Category,
    Loan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFormInput {
    pub name: String,
    pub mobile_number: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFormInput {
    pub name: String,
    pub unit: String,
    pub category: CategoryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFormInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanFormInput {
    pub product_name: String,
    #[serde(rename = "amount", with = "wire::paise")]
    pub amount_paise: i64,
    #[serde(with = "wire::date")]
    pub loan_date: Date,
    #[serde(with = "wire::date")]
    pub due_date: Date,
    pub status: LoanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Customer(CustomerFormInput),
    Product(ProductFormInput),
    Category(CategoryFormInput),
    Loan(LoanFormInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Customer(_) => FormKind::Customer,
            Self::Product(_) => FormKind::Product,
            Self::Category(_) => FormKind::Category,
            Self::Loan(_) => FormKind::Loan,
        }
    }

    pub fn blank_for(kind: FormKind, today: Date) -> Self {
        match kind {
            FormKind::Customer => Self::Customer(CustomerFormInput {
                name: String::new(),
                mobile_number: String::new(),
                address: String::new(),
                photo: None,
            }),
            FormKind::Product => Self::Product(ProductFormInput {
                name: String::new(),
                unit: String::new(),
                category: CategoryId::new(""),
                photo: None,
            }),
            FormKind::Category => Self::Category(CategoryFormInput {
                name: String::new(),
                description: None,
                image: None,
            }),
            FormKind::Loan => Self::Loan(LoanFormInput {
                product_name: String::new(),
                amount_paise: 0,
                loan_date: today,
                due_date: today,
                status: LoanStatus::Unpaid,
            }),
        }
    }

    pub fn validate(&self) -> Validation {
        match self {
            Self::Customer(customer) => customer.validate(),
            Self::Product(product) => product.validate(),
            Self::Category(category) => category.validate(),
            Self::Loan(loan) => loan.validate(),
        }
    }
}

impl CustomerFormInput {
    pub fn validate(&self) -> Validation {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "name is required"));
        }
        let mobile = self.mobile_number.trim();
        if mobile.is_empty() {
            return Err(ValidationError::new(
                "mobile_number",
                "mobile number is required",
            ));
        }
        if mobile.len() != 10 || !mobile.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::new(
                "mobile_number",
                "mobile number must be exactly 10 digits",
            ));
        }
        if self.address.trim().is_empty() {
            return Err(ValidationError::new("address", "address is required"));
        }
        Ok(())
    }
}

impl ProductFormInput {
    pub fn validate(&self) -> Validation {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "product name is required"));
        }
        if self.unit.trim().is_empty() {
            return Err(ValidationError::new("unit", "unit is required"));
        }
        if self.category.as_str().trim().is_empty() {
            return Err(ValidationError::new("category", "category is required"));
        }
        Ok(())
    }
}

impl CategoryFormInput {
    pub fn validate(&self) -> Validation {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "category name is required"));
        }
        Ok(())
    }
}

impl LoanFormInput {
    pub fn validate(&self) -> Validation {
        if self.product_name.trim().is_empty() {
            return Err(ValidationError::new(
                "product_name",
                "product is required -- choose what was lent",
            ));
        }
        if self.amount_paise <= 0 {
            return Err(ValidationError::new("amount", "loan amount must be positive"));
        }
        if self.due_date < self.loan_date {
            return Err(ValidationError::new(
                "due_date",
                "due date must be on/after the loan date",
            ));
        }
        Ok(())
    }
}
