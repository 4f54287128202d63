// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Date;
use tracing::{info, warn};

use crate::controller::LoadPhase;
use crate::error::Result;
use crate::forms::LoanFormInput;
use crate::remote::LoanApi;
use crate::{CustomerId, Loan, LoanId, LoanStatus};

/// Loans for a single customer.
#[derive(Debug)]
pub struct LoanBook<R> {
    remote: R,
    customer_id: CustomerId,
    loans: Vec<Loan>,
    phase: LoadPhase,
    last_error: Option<String>,
    submitting: bool,
}

impl<R: LoanApi> LoanBook<R> {
    pub fn new(remote: R, customer_id: CustomerId) -> Self {
        Self {
            remote,
            customer_id,
            loans: Vec::new(),
            phase: LoadPhase::Idle,
            last_error: None,
            submitting: false,
        }
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn fetch(&mut self) -> Result<usize> {
        self.phase = LoadPhase::Loading;
        match self.remote.list_loans(&self.customer_id) {
            Ok(loans) => {
                self.loans = loans;
                self.last_error = None;
                self.phase = LoadPhase::Ready;
                Ok(self.loans.len())
            }
            Err(error) => {
                warn!(customer = %self.customer_id, %error, "loan fetch failed");
                self.last_error = Some(error.to_string());
                self.phase = LoadPhase::Error;
                Err(error)
            }
        }
    }

    /// Records a loan, then refetches so server-side ordering is kept.
    pub fn create_loan(&mut self, draft: &LoanFormInput) -> Result<Loan> {
        draft.validate()?;
        self.submitting = true;
        let result = self.remote.create_loan(&self.customer_id, draft);
        self.submitting = false;
        let loan = result?;
        info!(customer = %self.customer_id, loan = %loan.id, "loan recorded");
        if let Err(error) = self.fetch() {
            warn!(customer = %self.customer_id, %error, "refresh after new loan failed");
        }
        Ok(loan)
    }

    /// Marks `loan_id` paid remotely and patches the local copy in place.
    pub fn mark_paid(&mut self, loan_id: &LoanId, today: Date) -> Result<Loan> {
        self.submitting = true;
        let result = self.remote.mark_loan_paid(&self.customer_id, loan_id);
        self.submitting = false;
        let mut updated = result?;
        updated.status = LoanStatus::Paid;
        updated.payment_date = updated.payment_date.or(Some(today));
        if let Some(local) = self.loans.iter_mut().find(|loan| &loan.id == loan_id) {
            local.status = LoanStatus::Paid;
            local.payment_date = updated.payment_date;
        }
        info!(customer = %self.customer_id, loan = %loan_id, "loan marked paid");
        Ok(updated)
    }

    pub fn unpaid(&self) -> impl Iterator<Item = &Loan> {
        self.loans
            .iter()
            .filter(|loan| loan.status == LoanStatus::Unpaid)
    }

    pub fn unpaid_total(&self) -> i64 {
        self.unpaid().map(|loan| loan.amount_paise).sum()
    }

    pub fn paid_total(&self) -> i64 {
        self.loans
            .iter()
            .filter(|loan| loan.status == LoanStatus::Paid)
            .map(|loan| loan.amount_paise)
            .sum()
    }

    pub fn overdue(&self, today: Date) -> Vec<&Loan> {
        self.loans.iter().filter(|loan| loan.is_overdue(today)).collect()
    }
}
