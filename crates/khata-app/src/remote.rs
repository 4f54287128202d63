// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::error::Result;
use crate::filter::{DateRange, ListCriteria, ListEntity};
use crate::forms::LoanFormInput;
use crate::{CustomerId, Dashboard, Loan, LoanId};

/// Remote collection endpoints for one entity type.
pub trait RemoteCollection<E: ListEntity> {
    fn list(&self, criteria: &ListCriteria) -> Result<Vec<E>>;
    fn get(&self, id: &E::Id) -> Result<E>;
    fn create(&self, draft: &E::Draft) -> Result<E>;
    fn update(&self, id: &E::Id, draft: &E::Draft) -> Result<E>;
    fn delete(&self, id: &E::Id) -> Result<()>;
    /// Server-rendered CSV for the rows matching `criteria`.
    fn export_csv(&self, criteria: &ListCriteria) -> Result<Vec<u8>>;
}

pub trait LoanApi {
    fn list_loans(&self, customer: &CustomerId) -> Result<Vec<Loan>>;
    fn create_loan(&self, customer: &CustomerId, draft: &LoanFormInput) -> Result<Loan>;
    fn mark_loan_paid(&self, customer: &CustomerId, loan: &LoanId) -> Result<Loan>;
}

pub trait DashboardApi {
    fn dashboard(&self, range: DateRange) -> Result<Dashboard>;
}
