// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use khata_app::{
    BooleanFlag, CsvRecord, Customer, CustomerFormInput, CustomerId, DateRange, FailureKind,
    FetchOutcome, FilterPatch, FilterState, KhataError, ListCriteria, ListDataController,
    LoadPhase, LoanBook, LoanFormInput, LoanId, LoanStatus, PageWindow, Product, RemoteCollection,
    apply_filters, apply_text_search,
};
use khata_testkit::{MemoryLoans, MemoryRemote, RemoteCall, ShopFaker, at_noon, customer, day, product};
use time::Month;

type Customers = ListDataController<Customer, MemoryRemote<Customer>>;

fn loaded(rows: Vec<Customer>) -> Result<(Customers, MemoryRemote<Customer>)> {
    let remote = MemoryRemote::new(rows);
    let mut controller = ListDataController::new(remote.clone());
    controller.fetch()?;
    Ok((controller, remote))
}

fn mixed_customers() -> Vec<Customer> {
    vec![
        customer("c1", "Rajesh Kumar", "9876512345", day(2024, Month::January, 15), 2),
        customer("c2", "Priya Patel", "9199000001", day(2024, Month::February, 1), 0),
        customer("c3", "Amit Shah", "9876599123", day(2024, Month::January, 31), 1),
        customer("c4", "Neha Sharma", "9000011111", day(2023, Month::December, 31), 0),
    ]
}

fn ids(rows: &[&Customer]) -> Vec<String> {
    rows.iter().map(|row| row.id.to_string()).collect()
}

#[test]
fn twenty_five_customers_paginate_into_three_pages() -> Result<()> {
    let rows = ShopFaker::new(1).customers(25, day(2024, Month::January, 1));
    let (mut controller, _) = loaded(rows)?;

    assert_eq!(controller.phase(), LoadPhase::Ready);
    assert_eq!(controller.total_pages(), 3);
    assert_eq!(controller.visible_items().len(), 10);

    assert!(controller.set_page(3));
    assert_eq!(controller.visible_items().len(), 5);
    assert_eq!(
        controller.page_window(),
        Some(PageWindow {
            first: 21,
            last: 25,
            total: 25
        })
    );

    assert!(!controller.set_page(4));
    assert_eq!(controller.current_page(), 3);
    assert!(!controller.set_page(0));
    assert_eq!(controller.current_page(), 3);
    Ok(())
}

#[test]
fn next_and_prev_stop_at_the_edges() -> Result<()> {
    let rows = ShopFaker::new(2).customers(15, day(2024, Month::January, 1));
    let (mut controller, _) = loaded(rows)?;

    assert!(!controller.prev_page());
    assert!(controller.next_page());
    assert_eq!(controller.current_page(), 2);
    assert!(!controller.next_page());
    assert!(controller.prev_page());
    assert_eq!(controller.current_page(), 1);
    Ok(())
}

#[test]
fn empty_collection_has_zero_pages() -> Result<()> {
    let (mut controller, _) = loaded(Vec::new())?;
    assert_eq!(controller.total_pages(), 0);
    assert!(controller.visible_items().is_empty());
    assert_eq!(controller.page_window(), None);
    assert!(!controller.set_page(1));
    assert_eq!(controller.current_page(), 1);
    Ok(())
}

#[test]
fn search_matches_mobile_numbers_as_substrings() -> Result<()> {
    let (mut controller, _) = loaded(mixed_customers())?;

    controller.set_search_query("99");
    assert_eq!(ids(&controller.visible_items()), vec!["c2", "c3"]);

    controller.set_search_query("PRIYA");
    assert_eq!(ids(&controller.visible_items()), vec!["c2"]);

    controller.set_search_query("");
    assert_eq!(controller.visible_items().len(), 4);
    Ok(())
}

#[test]
fn search_and_filter_changes_reset_to_first_page() -> Result<()> {
    let rows = ShopFaker::new(3).customers(25, day(2024, Month::January, 1));
    let (mut controller, _) = loaded(rows)?;

    assert!(controller.set_page(3));
    controller.set_search_query("a");
    assert_eq!(controller.current_page(), 1);

    controller.set_search_query("");
    assert!(controller.set_page(2));
    controller.set_filter(FilterPatch::new().flag(BooleanFlag::UnpaidOnly, true));
    assert_eq!(controller.current_page(), 1);
    assert!(controller.current_page() <= controller.total_pages().max(1));
    Ok(())
}

#[test]
fn january_range_keeps_only_january_rows() -> Result<()> {
    let (mut controller, _) = loaded(mixed_customers())?;

    controller.set_filter(FilterPatch::new().date_range(DateRange::between(
        day(2024, Month::January, 1),
        day(2024, Month::January, 31),
    )));
    assert_eq!(ids(&controller.visible_items()), vec!["c1", "c3"]);

    // Only one bound set: the range is inactive.
    controller.set_filter(FilterPatch::new().date_range(DateRange::new(
        Some(day(2024, Month::January, 1)),
        None,
    )));
    assert_eq!(controller.visible_items().len(), 4);
    Ok(())
}

#[test]
fn unpaid_flag_keeps_customers_with_open_loans() -> Result<()> {
    let (mut controller, _) = loaded(mixed_customers())?;

    assert!(controller.toggle_flag(BooleanFlag::UnpaidOnly));
    assert_eq!(ids(&controller.visible_items()), vec!["c1", "c3"]);

    controller.set_search_query("amit");
    assert_eq!(ids(&controller.visible_items()), vec!["c3"]);

    assert!(!controller.toggle_flag(BooleanFlag::UnpaidOnly));
    controller.set_search_query("");
    assert_eq!(controller.visible_items().len(), 4);
    Ok(())
}

#[test]
fn category_filter_is_exact_match() -> Result<()> {
    let rows = vec![
        product("p1", "Pure Sesame Oil", "cooking-oils", day(2024, Month::January, 5)),
        product("p2", "Black Sesame Oil", "specialty-oils", day(2024, Month::January, 6)),
        product("p3", "Rice Bran Oil", "cooking-oils-extra", day(2024, Month::January, 7)),
    ];
    let remote = MemoryRemote::new(rows);
    let mut controller: ListDataController<Product, _> = ListDataController::new(remote);
    controller.fetch()?;

    controller.set_filter(FilterPatch::new().category("cooking-oils"));
    let visible: Vec<String> = controller
        .visible_items()
        .iter()
        .map(|row| row.id.to_string())
        .collect();
    assert_eq!(visible, vec!["p1"]);

    controller.set_filter(FilterPatch::new().category(""));
    assert_eq!(controller.visible_items().len(), 3);
    Ok(())
}

#[test]
fn fetch_asks_for_the_whole_collection() -> Result<()> {
    let remote = MemoryRemote::new(mixed_customers());
    let mut controller: Customers =
        ListDataController::new(remote.clone()).with_fetch_limit(Some(100));
    controller.set_search_query("kumar");
    controller.set_filter(FilterPatch::new().flag(BooleanFlag::UnpaidOnly, true));
    controller.fetch()?;

    let calls = remote.calls();
    let Some(RemoteCall::List(criteria)) = calls.last() else {
        panic!("expected a list call, got {calls:?}");
    };
    assert_eq!(criteria, &ListCriteria::default().with_limit(Some(100)));
    assert_eq!(ids(&controller.filtered_items()), vec!["c1"]);
    Ok(())
}

/// A server that applies every filter hint it receives.
struct NarrowingRemote {
    rows: Vec<Customer>,
}

impl RemoteCollection<Customer> for NarrowingRemote {
    fn list(&self, criteria: &ListCriteria) -> khata_app::Result<Vec<Customer>> {
        let filters = FilterState {
            category: criteria.category.clone(),
            date_range: criteria.date_range,
            flags: criteria.flags.clone(),
        };
        let query = criteria.search.clone().unwrap_or_default();
        Ok(apply_text_search(apply_filters(&self.rows, &filters), &query)
            .into_iter()
            .cloned()
            .collect())
    }

    fn get(&self, id: &CustomerId) -> khata_app::Result<Customer> {
        Err(KhataError::server(format!("404: customer {id} not found")))
    }

    fn create(&self, _draft: &CustomerFormInput) -> khata_app::Result<Customer> {
        Err(KhataError::server("405: read only"))
    }

    fn update(&self, _id: &CustomerId, _draft: &CustomerFormInput) -> khata_app::Result<Customer> {
        Err(KhataError::server("405: read only"))
    }

    fn delete(&self, _id: &CustomerId) -> khata_app::Result<()> {
        Err(KhataError::server("405: read only"))
    }

    fn export_csv(&self, _criteria: &ListCriteria) -> khata_app::Result<Vec<u8>> {
        Err(KhataError::server("405: read only"))
    }
}

#[test]
fn clearing_search_after_a_refetch_shows_every_row_again() -> Result<()> {
    let mut controller = ListDataController::new(NarrowingRemote {
        rows: mixed_customers(),
    });
    controller.fetch()?;
    controller.set_search_query("priya");
    controller.set_filter(FilterPatch::new().flag(BooleanFlag::UnpaidOnly, true));
    controller.fetch()?;
    assert_eq!(controller.filtered_count(), 0);

    controller.set_search_query("");
    controller.clear_filters();
    assert_eq!(controller.items().len(), 4);
    assert_eq!(controller.filtered_count(), 4);
    Ok(())
}

#[test]
fn failed_fetch_keeps_previous_rows_and_records_error() -> Result<()> {
    let (mut controller, remote) = loaded(mixed_customers())?;
    remote.fail_next(FailureKind::Network);

    let error = controller.fetch().expect_err("fetch should fail");
    assert_eq!(error.failure_kind(), Some(FailureKind::Network));
    assert_eq!(controller.phase(), LoadPhase::Error);
    assert!(!controller.is_loading());
    assert_eq!(controller.items().len(), 4);
    assert!(controller.last_error().is_some_and(|m| m.contains("network")));

    controller.fetch()?;
    assert_eq!(controller.phase(), LoadPhase::Ready);
    assert_eq!(controller.last_error(), None);
    Ok(())
}

#[test]
fn newer_fetch_wins_over_late_older_result() -> Result<()> {
    let remote = MemoryRemote::new(Vec::<Customer>::new());
    let mut controller: Customers = ListDataController::new(remote);

    let first = controller.begin_fetch();
    let second = controller.begin_fetch();
    assert!(controller.is_loading());

    let fresh = vec![customer("new", "Priya Patel", "9199000001", day(2024, Month::March, 1), 0)];
    let outcome = controller.finish_fetch(second.ticket, Ok(fresh))?;
    assert_eq!(outcome, FetchOutcome::Applied { rows: 1 });
    assert_eq!(controller.phase(), LoadPhase::Ready);

    let old = mixed_customers();
    let outcome = controller.finish_fetch(first.ticket, Ok(old))?;
    assert_eq!(outcome, FetchOutcome::Stale);
    assert_eq!(controller.items().len(), 1);
    assert_eq!(controller.items()[0].id.as_str(), "new");

    let late_error = controller.finish_fetch(first.ticket, Err(KhataError::network("late")));
    assert_eq!(late_error?, FetchOutcome::Stale);
    assert_eq!(controller.phase(), LoadPhase::Ready);
    Ok(())
}

#[test]
fn in_order_results_apply_and_stay_loading_until_the_last() -> Result<()> {
    let remote = MemoryRemote::new(Vec::<Customer>::new());
    let mut controller: Customers = ListDataController::new(remote);

    let first = controller.begin_fetch();
    let second = controller.begin_fetch();

    controller.finish_fetch(first.ticket, Ok(mixed_customers()))?;
    assert_eq!(controller.items().len(), 4);
    assert_eq!(controller.phase(), LoadPhase::Loading);

    controller.finish_fetch(second.ticket, Ok(Vec::new()))?;
    assert!(controller.items().is_empty());
    assert_eq!(controller.phase(), LoadPhase::Ready);
    Ok(())
}

#[test]
fn request_then_cancel_never_calls_remote() -> Result<()> {
    let (mut controller, remote) = loaded(mixed_customers())?;
    let target = controller.items()[1].clone();

    controller.request_delete(target.clone());
    assert_eq!(controller.pending_deletion(), Some(&target));

    assert_eq!(controller.cancel_delete(), Some(target));
    assert_eq!(controller.pending_deletion(), None);
    assert_eq!(controller.items().len(), 4);
    assert!(
        !remote
            .calls()
            .iter()
            .any(|call| matches!(call, RemoteCall::Delete(_)))
    );
    Ok(())
}

#[test]
fn confirm_delete_removes_exactly_one_row_without_refetch() -> Result<()> {
    let (mut controller, remote) = loaded(mixed_customers())?;
    assert!(controller.request_delete_id(&CustomerId::new("c2")));

    let removed = controller.confirm_delete()?;
    assert_eq!(removed.map(|row| row.id), Some(CustomerId::new("c2")));
    assert_eq!(ids(&controller.visible_items()), vec!["c1", "c3", "c4"]);
    assert_eq!(controller.pending_deletion(), None);
    assert!(!controller.is_submitting());
    assert_eq!(remote.list_calls(), 1);
    assert_eq!(remote.rows().len(), 3);
    Ok(())
}

#[test]
fn failed_delete_keeps_row_and_pending_dialog() -> Result<()> {
    let (mut controller, remote) = loaded(mixed_customers())?;
    assert!(controller.request_delete_id(&CustomerId::new("c1")));
    remote.fail_next(FailureKind::Server);

    let error = controller.confirm_delete().expect_err("delete should fail");
    assert_eq!(error.failure_kind(), Some(FailureKind::Server));
    assert_eq!(controller.items().len(), 4);
    assert_eq!(
        controller.pending_deletion().map(|row| row.id.as_str()),
        Some("c1")
    );
    assert!(!controller.is_submitting());
    Ok(())
}

#[test]
fn confirm_without_pending_is_a_quiet_no_op() -> Result<()> {
    let (mut controller, remote) = loaded(mixed_customers())?;
    let calls_before = remote.calls().len();
    assert_eq!(controller.confirm_delete()?, None);
    assert_eq!(remote.calls().len(), calls_before);
    Ok(())
}

#[test]
fn deleting_the_last_row_on_the_last_page_pulls_the_page_back() -> Result<()> {
    let rows = ShopFaker::new(4).customers(11, day(2024, Month::January, 1));
    let (mut controller, _) = loaded(rows)?;
    assert!(controller.set_page(2));
    let last = controller.visible_items()[0].clone();

    controller.request_delete(last);
    controller.confirm_delete()?;
    assert_eq!(controller.total_pages(), 1);
    assert_eq!(controller.current_page(), 1);
    assert_eq!(controller.visible_items().len(), 10);
    Ok(())
}

fn draft(name: &str) -> CustomerFormInput {
    CustomerFormInput {
        name: name.to_owned(),
        mobile_number: "9876500000".to_owned(),
        address: "7 Patel Nagar, Delhi".to_owned(),
        photo: None,
    }
}

#[test]
fn create_refetches_the_collection() -> Result<()> {
    let (mut controller, remote) = loaded(mixed_customers())?;
    let created = controller.create_or_update(&draft("Kavita Rao"), None)?;

    assert_eq!(created.name, "Kavita Rao");
    assert_eq!(remote.list_calls(), 2);
    assert!(controller.find(&created.id).is_some());
    assert!(!controller.is_submitting());
    Ok(())
}

#[test]
fn update_rewrites_the_row() -> Result<()> {
    let (mut controller, _) = loaded(mixed_customers())?;
    let id = CustomerId::new("c4");
    controller.create_or_update(&draft("Neha Verma"), Some(&id))?;

    let row = controller.find(&id).expect("row still present");
    assert_eq!(row.name, "Neha Verma");
    Ok(())
}

#[test]
fn failed_save_leaves_local_state_alone() -> Result<()> {
    let (mut controller, remote) = loaded(mixed_customers())?;
    remote.fail_next(FailureKind::Network);

    let result = controller.create_or_update(&draft("Arjun Nair"), None);
    assert!(result.is_err());
    assert_eq!(controller.items().len(), 4);
    assert_eq!(remote.list_calls(), 1);
    assert!(!controller.is_submitting());
    Ok(())
}

#[test]
fn csv_export_uses_filtered_rows_and_fixed_columns() -> Result<()> {
    let (mut controller, _) = loaded(mixed_customers())?;
    controller.set_filter(FilterPatch::new().flag(BooleanFlag::UnpaidOnly, true));
    let today = day(2024, Month::March, 5);

    let export = controller.export_csv(None, today)?;
    assert_eq!(export.file_name, "customers_2024-03-05.csv");
    assert_eq!(export.rows, controller.filtered_count());

    let text = String::from_utf8(export.content)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], Customer::HEADERS.join(","));
    assert_eq!(lines.len(), 1 + export.rows);
    assert!(lines[1].starts_with("c1,Rajesh Kumar,9876512345,"));
    Ok(())
}

#[test]
fn csv_export_range_narrows_the_filtered_set() -> Result<()> {
    let (controller, _) = loaded(mixed_customers())?;
    let january = DateRange::between(day(2024, Month::January, 20), day(2024, Month::January, 31));

    let export = controller.export_csv(Some(january), day(2024, Month::March, 5))?;
    assert_eq!(export.rows, 1);
    let text = String::from_utf8(export.content)?;
    assert!(text.lines().nth(1).is_some_and(|line| line.starts_with("c3,")));
    Ok(())
}

#[test]
fn remote_export_sends_the_range_as_criteria() -> Result<()> {
    let (controller, remote) = loaded(mixed_customers())?;
    let january = DateRange::between(day(2024, Month::January, 1), day(2024, Month::January, 31));

    let export = controller.export_csv_remote(Some(january), day(2024, Month::March, 5))?;
    assert_eq!(export.rows, 2);

    let calls = remote.calls();
    let Some(RemoteCall::ExportCsv(criteria)) = calls.last() else {
        panic!("expected an export call, got {calls:?}");
    };
    assert_eq!(criteria.date_range, january);
    assert_eq!(criteria.limit, None);
    Ok(())
}

#[test]
fn remote_export_counts_records_not_lines() -> Result<()> {
    let mut rows = mixed_customers();
    rows[1].address = "Shop 4\nMain Bazaar".to_owned();
    let (controller, _) = loaded(rows)?;

    let export = controller.export_csv_remote(None, day(2024, Month::March, 5))?;
    assert_eq!(export.rows, 4);
    let text = String::from_utf8(export.content)?;
    assert_eq!(text.lines().count(), 6);
    Ok(())
}

fn loan_draft(amount_paise: i64) -> LoanFormInput {
    LoanFormInput {
        product_name: "Cold Pressed Mustard Oil".to_owned(),
        amount_paise,
        loan_date: day(2024, Month::February, 1),
        due_date: day(2024, Month::March, 1),
        status: LoanStatus::Unpaid,
    }
}

#[test]
fn loan_book_tracks_unpaid_totals() -> Result<()> {
    let loans = MemoryLoans::new();
    let customer_id = CustomerId::new("c1");
    let mut faker = ShopFaker::new(8);
    let first = faker.loan(&customer_id, day(2024, Month::January, 2));
    let second = faker.loan(&customer_id, day(2024, Month::January, 9));
    loans.insert(first.clone());
    loans.insert(second.clone());

    let mut book = LoanBook::new(loans.clone(), customer_id);
    assert_eq!(book.fetch()?, 2);
    assert_eq!(book.unpaid_total(), first.amount_paise + second.amount_paise);
    assert_eq!(book.overdue(day(2024, Month::February, 10)).len(), 2);
    Ok(())
}

#[test]
fn loan_book_create_refetches_and_mark_paid_patches_locally() -> Result<()> {
    let loans = MemoryLoans::new();
    let customer_id = CustomerId::new("c1");
    let mut book = LoanBook::new(loans.clone(), customer_id.clone());
    book.fetch()?;

    let loan = book.create_loan(&loan_draft(125_050))?;
    assert_eq!(book.loans().len(), 1);
    assert_eq!(book.unpaid_total(), 125_050);

    let today = day(2024, Month::February, 20);
    let paid = book.mark_paid(&loan.id, today)?;
    assert_eq!(paid.status, LoanStatus::Paid);
    assert_eq!(book.loans()[0].status, LoanStatus::Paid);
    assert_eq!(book.loans()[0].payment_date, Some(today));
    assert_eq!(book.unpaid_total(), 0);
    assert_eq!(book.paid_total(), 125_050);
    assert!(!book.is_submitting());

    let again = book.mark_paid(&loan.id, today);
    assert!(again.is_err());
    assert_eq!(loans.loans_for(&customer_id).len(), 1);
    Ok(())
}

#[test]
fn loan_book_rejects_invalid_draft_before_calling_remote() -> Result<()> {
    let loans = MemoryLoans::new();
    let customer_id = CustomerId::new("c1");
    let mut book = LoanBook::new(loans.clone(), customer_id.clone());

    let error = book.create_loan(&loan_draft(0)).expect_err("zero amount");
    assert!(matches!(error, KhataError::Validation(_)));
    assert!(loans.loans_for(&customer_id).is_empty());

    let unknown = book.mark_paid(&LoanId::new("missing"), day(2024, Month::March, 1));
    assert!(unknown.is_err());
    Ok(())
}

#[test]
fn created_rows_carry_the_remote_timestamp() -> Result<()> {
    let stamp = at_noon(day(2024, Month::April, 2));
    let remote = MemoryRemote::new(Vec::<Customer>::new()).with_created_at(stamp);
    let mut controller: Customers = ListDataController::new(remote).with_page_size(2);
    let created = controller.create_or_update(&draft("Sunita Iyer"), None)?;
    assert_eq!(created.created_at, stamp);
    assert_eq!(controller.page_size(), 2);
    Ok(())
}
