// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use khata_app::{
    Category, CategoryFormInput, CsvRecord, Customer, CustomerFormInput, CustomerId, Dashboard,
    DashboardApi, DashboardStats, DateRange, FailureKind, FilterState, KhataError, ListCriteria,
    Loan, LoanApi, LoanFormInput, LoanId, LoanStatus, Product, ProductFormInput, RemoteCollection,
    Result, apply_filters, apply_text_search, write_csv,
};
use time::OffsetDateTime;

/// Row types the in-memory remote can build from a form draft.
pub trait MemoryEntity: CsvRecord {
    fn from_draft(id: String, draft: &Self::Draft, created_at: OffsetDateTime) -> Self;
    fn apply_draft(&mut self, draft: &Self::Draft);
}

impl MemoryEntity for Customer {
    fn from_draft(id: String, draft: &CustomerFormInput, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            name: draft.name.clone(),
            mobile_number: draft.mobile_number.clone(),
            address: draft.address.clone(),
            photo: draft.photo.clone(),
            created_at,
            total_loans: 0,
            unpaid_loans: 0,
            last_loan_date: None,
        }
    }

    fn apply_draft(&mut self, draft: &CustomerFormInput) {
        self.name = draft.name.clone();
        self.mobile_number = draft.mobile_number.clone();
        self.address = draft.address.clone();
        self.photo = draft.photo.clone();
    }
}

impl MemoryEntity for Product {
    fn from_draft(id: String, draft: &ProductFormInput, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            name: draft.name.clone(),
            unit: draft.unit.clone(),
            category: draft.category.clone(),
            photo: draft.photo.clone(),
            created_at,
        }
    }

    fn apply_draft(&mut self, draft: &ProductFormInput) {
        self.name = draft.name.clone();
        self.unit = draft.unit.clone();
        self.category = draft.category.clone();
        self.photo = draft.photo.clone();
    }
}

impl MemoryEntity for Category {
    fn from_draft(id: String, draft: &CategoryFormInput, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            image: draft.image.clone(),
            products_count: 0,
            created_at,
        }
    }

    fn apply_draft(&mut self, draft: &CategoryFormInput) {
        self.name = draft.name.clone();
        self.description = draft.description.clone();
        self.image = draft.image.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    List(ListCriteria),
    Get(String),
    Create,
    Update(String),
    Delete(String),
    ExportCsv(ListCriteria),
}

#[derive(Debug)]
struct MemoryState<E> {
    rows: Vec<E>,
    failures: VecDeque<FailureKind>,
    calls: Vec<RemoteCall>,
    next_id: u64,
    created_at: OffsetDateTime,
}

fn injected_failure(failures: &mut VecDeque<FailureKind>, operation: &str) -> Result<()> {
    match failures.pop_front() {
        Some(FailureKind::Network) => Err(KhataError::network(format!(
            "{operation}: connection refused"
        ))),
        Some(FailureKind::Server) => Err(KhataError::server(format!(
            "{operation}: 500 Internal Server Error"
        ))),
        None => Ok(()),
    }
}

/// Shared in-memory collection; clones observe the same rows.
///
/// The server side ignores list filters, so every filter a test observes was
/// applied by the controller.
#[derive(Debug)]
pub struct MemoryRemote<E> {
    state: Arc<Mutex<MemoryState<E>>>,
}

impl<E> Clone for MemoryRemote<E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<E: MemoryEntity> MemoryRemote<E> {
    pub fn new(rows: Vec<E>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                rows,
                failures: VecDeque::new(),
                calls: Vec::new(),
                next_id: 1,
                created_at: OffsetDateTime::UNIX_EPOCH,
            })),
        }
    }

    /// Creation timestamp stamped on rows built by `create`.
    pub fn with_created_at(self, created_at: OffsetDateTime) -> Self {
        self.lock().created_at = created_at;
        self
    }

    /// Queues a failure for the next remote call, whichever it is.
    pub fn fail_next(&self, kind: FailureKind) {
        self.lock().failures.push_back(kind);
    }

    pub fn rows(&self) -> Vec<E> {
        self.lock().rows.clone()
    }

    pub fn set_rows(&self, rows: Vec<E>) {
        self.lock().rows = rows;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, RemoteCall::List(_)))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState<E>> {
        self.state.lock().expect("memory remote lock poisoned")
    }

    fn not_found(id: &E::Id) -> KhataError {
        KhataError::server(format!(
            "404: {} {id} not found",
            E::KIND.singular()
        ))
    }
}

impl<E: MemoryEntity> RemoteCollection<E> for MemoryRemote<E> {
    fn list(&self, criteria: &ListCriteria) -> Result<Vec<E>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::List(criteria.clone()));
        injected_failure(&mut state.failures, "list")?;
        Ok(state.rows.clone())
    }

    fn get(&self, id: &E::Id) -> Result<E> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Get(id.to_string()));
        injected_failure(&mut state.failures, "get")?;
        state
            .rows
            .iter()
            .find(|row| row.id() == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    fn create(&self, draft: &E::Draft) -> Result<E> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Create);
        injected_failure(&mut state.failures, "create")?;
        let id = format!("mem-{:04}", state.next_id);
        state.next_id += 1;
        let row = E::from_draft(id, draft, state.created_at);
        state.rows.push(row.clone());
        Ok(row)
    }

    fn update(&self, id: &E::Id, draft: &E::Draft) -> Result<E> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Update(id.to_string()));
        injected_failure(&mut state.failures, "update")?;
        let row = state
            .rows
            .iter_mut()
            .find(|row| row.id() == id)
            .ok_or_else(|| Self::not_found(id))?;
        row.apply_draft(draft);
        Ok(row.clone())
    }

    fn delete(&self, id: &E::Id) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Delete(id.to_string()));
        injected_failure(&mut state.failures, "delete")?;
        let index = state
            .rows
            .iter()
            .position(|row| row.id() == id)
            .ok_or_else(|| Self::not_found(id))?;
        state.rows.remove(index);
        Ok(())
    }

    fn export_csv(&self, criteria: &ListCriteria) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::ExportCsv(criteria.clone()));
        injected_failure(&mut state.failures, "export")?;
        let filters = FilterState {
            category: criteria.category.clone(),
            date_range: criteria.date_range,
            flags: criteria.flags.clone(),
        };
        let query = criteria.search.clone().unwrap_or_default();
        let rows = apply_text_search(apply_filters(&state.rows, &filters), &query);
        let (content, _) = write_csv(rows)?;
        Ok(content)
    }
}

#[derive(Debug, Default)]
struct LoanLedger {
    loans: BTreeMap<String, Vec<Loan>>,
    failures: VecDeque<FailureKind>,
    next_id: u64,
}

/// In-memory loan endpoints keyed by customer id.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoans {
    state: Arc<Mutex<LoanLedger>>,
}

impl MemoryLoans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, loan: Loan) {
        self.lock()
            .loans
            .entry(loan.customer_id.to_string())
            .or_default()
            .push(loan);
    }

    pub fn fail_next(&self, kind: FailureKind) {
        self.lock().failures.push_back(kind);
    }

    pub fn loans_for(&self, customer: &CustomerId) -> Vec<Loan> {
        self.lock()
            .loans
            .get(customer.as_str())
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, LoanLedger> {
        self.state.lock().expect("memory loans lock poisoned")
    }
}

impl LoanApi for MemoryLoans {
    fn list_loans(&self, customer: &CustomerId) -> Result<Vec<Loan>> {
        let mut ledger = self.lock();
        injected_failure(&mut ledger.failures, "list loans")?;
        Ok(ledger
            .loans
            .get(customer.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn create_loan(&self, customer: &CustomerId, draft: &LoanFormInput) -> Result<Loan> {
        let mut ledger = self.lock();
        injected_failure(&mut ledger.failures, "create loan")?;
        ledger.next_id += 1;
        let loan = Loan {
            id: LoanId::new(format!("mem-loan-{:04}", ledger.next_id)),
            customer_id: customer.clone(),
            product_name: draft.product_name.clone(),
            amount_paise: draft.amount_paise,
            loan_date: draft.loan_date,
            due_date: draft.due_date,
            status: draft.status,
            payment_date: None,
        };
        ledger
            .loans
            .entry(customer.to_string())
            .or_default()
            .push(loan.clone());
        Ok(loan)
    }

    fn mark_loan_paid(&self, customer: &CustomerId, loan: &LoanId) -> Result<Loan> {
        let mut ledger = self.lock();
        injected_failure(&mut ledger.failures, "mark paid")?;
        let found = ledger
            .loans
            .get_mut(customer.as_str())
            .and_then(|loans| loans.iter_mut().find(|candidate| &candidate.id == loan))
            .ok_or_else(|| KhataError::server(format!("404: loan {loan} not found")))?;
        if found.status == LoanStatus::Paid {
            return Err(KhataError::server("400: Loan already paid"));
        }
        found.status = LoanStatus::Paid;
        Ok(found.clone())
    }
}

impl DashboardApi for MemoryLoans {
    fn dashboard(&self, range: DateRange) -> Result<Dashboard> {
        let mut ledger = self.lock();
        injected_failure(&mut ledger.failures, "dashboard")?;
        let mut stats = DashboardStats {
            total_customers: ledger.loans.len() as u64,
            ..DashboardStats::default()
        };
        let loans = ledger.loans.values().flatten().filter(|loan| {
            range.contains(loan.loan_date.midnight().assume_utc())
        });
        for loan in loans {
            stats.total_loans += 1;
            match loan.status {
                LoanStatus::Unpaid => stats.total_unpaid_paise += loan.amount_paise,
                LoanStatus::Paid => stats.total_paid_paise += loan.amount_paise,
            }
        }
        Ok(Dashboard {
            stats,
            chart_data: Vec::new(),
        })
    }
}
