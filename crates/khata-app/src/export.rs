// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use csv::Writer;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::{KhataError, Result};
use crate::filter::ListEntity;
use crate::model::{Category, Customer, EntityKind, Product, wire};

/// Fixed, human-labelled CSV layout for a row type.
pub trait CsvRecord: ListEntity {
    const HEADERS: &'static [&'static str];

    /// One value per entry in [`CsvRecord::HEADERS`], in the same order.
    fn record(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub content: Vec<u8>,
    pub rows: usize,
}

pub fn export_file_name(kind: EntityKind, today: Date) -> String {
    format!("{}_{}.csv", kind.label(), wire::format_date(today))
}

pub fn write_csv<'a, E, I>(rows: I) -> Result<(Vec<u8>, usize)>
where
    E: CsvRecord + 'a,
    I: IntoIterator<Item = &'a E>,
{
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(E::HEADERS)?;
    let mut count = 0;
    for row in rows {
        writer.write_record(row.record())?;
        count += 1;
    }
    let content = writer
        .into_inner()
        .map_err(|error| KhataError::Csv(error.into_error().into()))?;
    Ok((content, count))
}

/// The UTC calendar day, matching what the date-range filter compares.
fn utc_date_cell(at: OffsetDateTime) -> String {
    wire::format_date(at.to_offset(UtcOffset::UTC).date())
}

fn date_cell(value: Option<Date>) -> String {
    value.map(wire::format_date).unwrap_or_default()
}

impl CsvRecord for Customer {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Name",
        "Mobile Number",
        "Address",
        "Created At",
        "Total Loans",
        "Unpaid Loans",
        "Last Loan Date",
    ];

    fn record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.mobile_number.clone(),
            self.address.clone(),
            utc_date_cell(self.created_at),
            self.total_loans.to_string(),
            self.unpaid_loans.to_string(),
            date_cell(self.last_loan_date),
        ]
    }
}

impl CsvRecord for Product {
    const HEADERS: &'static [&'static str] = &["ID", "Name", "Unit", "Category", "Created At"];

    fn record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.unit.clone(),
            self.category.to_string(),
            utc_date_cell(self.created_at),
        ]
    }
}

impl CsvRecord for Category {
    const HEADERS: &'static [&'static str] =
        &["ID", "Name", "Description", "Products", "Created At"];

    fn record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.description.clone().unwrap_or_default(),
            self.products_count.to_string(),
            utc_date_cell(self.created_at),
        ]
    }
}
