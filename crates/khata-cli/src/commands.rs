// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use khata_app::{
    BooleanFlag, Category, CategoryFormInput, CategoryId, Customer, CustomerFormInput, CustomerId,
    DashboardApi, DateRange, EntityKind, FilterPatch, FormPayload, ListDataController, LoanApi,
    LoanBook, LoanFormInput, LoanId, LoanStatus, Product, ProductFormInput, ProductId,
    RemoteCollection, format_rupees, wire,
};
use khata_tui::{SharedRemote, Shop, TableRow};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::PathBuf;
use time::Date;
use tracing::info;

use crate::runtime::write_export;

const FILTER_FLAGS: [&str; 4] = ["--search", "--category", "--from", "--to"];
const FIELD_FLAGS: [&str; 8] = [
    "--name",
    "--mobile",
    "--address",
    "--photo",
    "--unit",
    "--category",
    "--description",
    "--image",
];

/// Filters shared by `list` and `export`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: String,
    pub category: Option<String>,
    pub range: DateRange,
    pub unpaid: bool,
    pub page: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: None,
            range: DateRange::unbounded(),
            unpaid: false,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tui,
    Ping,
    List {
        kind: EntityKind,
        query: ListQuery,
    },
    Export {
        kind: EntityKind,
        query: ListQuery,
        out: Option<PathBuf>,
        remote: bool,
    },
    Delete {
        kind: EntityKind,
        id: String,
        confirmed: bool,
    },
    /// `add` when `id` is absent, `edit` otherwise.
    Save {
        kind: EntityKind,
        id: Option<String>,
        fields: BTreeMap<String, String>,
    },
    Loans {
        customer: CustomerId,
    },
    Lend {
        customer: CustomerId,
        product: String,
        amount_paise: i64,
        loan_date: Option<Date>,
        due_date: Date,
    },
    MarkPaid {
        customer: CustomerId,
        loan: LoanId,
    },
    Dashboard {
        range: DateRange,
    },
}

#[derive(Debug, Default)]
struct ParsedArgs {
    positionals: Vec<String>,
    values: BTreeMap<String, String>,
    switches: BTreeSet<String>,
}

impl ParsedArgs {
    fn value(&self, flag: &str) -> Option<&str> {
        self.values.get(flag).map(String::as_str)
    }

    fn has(&self, flag: &str) -> bool {
        self.switches.contains(flag)
    }
}

fn split_args(
    command: &str,
    args: &[String],
    value_flags: &[&str],
    switch_flags: &[&str],
) -> Result<ParsedArgs> {
    let mut parsed = ParsedArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if value_flags.contains(&arg.as_str()) {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("{arg} requires a value"))?;
            parsed.values.insert(arg.clone(), value.clone());
        } else if switch_flags.contains(&arg.as_str()) {
            parsed.switches.insert(arg.clone());
        } else if arg.starts_with("--") {
            bail!("unknown option {arg:?} for `{command}`; run with --help to see supported options");
        } else {
            parsed.positionals.push(arg.clone());
        }
    }
    Ok(parsed)
}

fn expect_positionals(command: &str, parsed: &ParsedArgs, names: &[&str]) -> Result<()> {
    if parsed.positionals.len() < names.len() {
        let missing = names[parsed.positionals.len()];
        bail!("`{command}` needs a <{missing}> argument");
    }
    if parsed.positionals.len() > names.len() {
        bail!(
            "unexpected argument {:?} for `{command}`",
            parsed.positionals[names.len()]
        );
    }
    Ok(())
}

fn parse_kind(raw: &str) -> Result<EntityKind> {
    EntityKind::parse(raw)
        .ok_or_else(|| anyhow!("unknown entity {raw:?}; use customers, products, or categories"))
}

fn parse_date_flag(flag: &str, raw: &str) -> Result<Date> {
    wire::parse_date(raw).ok_or_else(|| anyhow!("{flag} expects YYYY-MM-DD, got {raw:?}"))
}

fn parse_range(parsed: &ParsedArgs) -> Result<DateRange> {
    match (parsed.value("--from"), parsed.value("--to")) {
        (None, None) => Ok(DateRange::unbounded()),
        (Some(from), Some(to)) => {
            let start = parse_date_flag("--from", from)?;
            let end = parse_date_flag("--to", to)?;
            if end < start {
                bail!("--to {to} is before --from {from}");
            }
            Ok(DateRange::between(start, end))
        }
        _ => bail!("--from and --to must be given together"),
    }
}

/// Parses a rupee amount like `450` or `450.5` into paise.
pub fn parse_rupees(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    let invalid = || anyhow!("amount {raw:?} is not a rupee value like 450 or 450.50");
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    let digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if whole.is_empty() || fraction.len() > 2 || !digits(whole) || !digits(fraction) {
        return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };
    whole
        .checked_mul(100)
        .and_then(|paise| paise.checked_add(fraction))
        .ok_or_else(invalid)
}

fn parse_query(kind: EntityKind, parsed: &ParsedArgs) -> Result<ListQuery> {
    let category = parsed.value("--category").map(str::to_owned);
    if category.is_some() && kind != EntityKind::Products {
        bail!("--category applies to products");
    }
    let unpaid = parsed.has("--unpaid");
    if unpaid && kind != EntityKind::Customers {
        bail!("--unpaid applies to customers");
    }
    let page = match parsed.value("--page") {
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| anyhow!("--page expects a positive number, got {raw:?}"))?,
        None => 1,
    };
    Ok(ListQuery {
        search: parsed.value("--search").unwrap_or_default().to_owned(),
        category,
        range: parse_range(parsed)?,
        unpaid,
        page,
    })
}

fn field_map(parsed: &ParsedArgs) -> BTreeMap<String, String> {
    parsed
        .values
        .iter()
        .map(|(flag, value)| (flag.trim_start_matches("--").to_owned(), value.clone()))
        .collect()
}

/// Parses everything after the global options. No words means the TUI.
pub fn parse_command(args: &[String]) -> Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Tui);
    };
    match name.as_str() {
        "tui" => {
            expect_positionals("tui", &split_args("tui", rest, &[], &[])?, &[])?;
            Ok(Command::Tui)
        }
        "ping" => {
            expect_positionals("ping", &split_args("ping", rest, &[], &[])?, &[])?;
            Ok(Command::Ping)
        }
        "list" => {
            let mut value_flags = FILTER_FLAGS.to_vec();
            value_flags.push("--page");
            let parsed = split_args("list", rest, &value_flags, &["--unpaid"])?;
            expect_positionals("list", &parsed, &["entity"])?;
            let kind = parse_kind(&parsed.positionals[0])?;
            Ok(Command::List {
                kind,
                query: parse_query(kind, &parsed)?,
            })
        }
        "export" => {
            let mut value_flags = FILTER_FLAGS.to_vec();
            value_flags.push("--out");
            let parsed = split_args("export", rest, &value_flags, &["--unpaid", "--remote"])?;
            expect_positionals("export", &parsed, &["entity"])?;
            let kind = parse_kind(&parsed.positionals[0])?;
            Ok(Command::Export {
                kind,
                query: parse_query(kind, &parsed)?,
                out: parsed.value("--out").map(PathBuf::from),
                remote: parsed.has("--remote"),
            })
        }
        "delete" => {
            let parsed = split_args("delete", rest, &[], &["--yes"])?;
            expect_positionals("delete", &parsed, &["entity", "id"])?;
            Ok(Command::Delete {
                kind: parse_kind(&parsed.positionals[0])?,
                id: parsed.positionals[1].clone(),
                confirmed: parsed.has("--yes"),
            })
        }
        "add" => {
            let parsed = split_args("add", rest, &FIELD_FLAGS, &[])?;
            expect_positionals("add", &parsed, &["entity"])?;
            Ok(Command::Save {
                kind: parse_kind(&parsed.positionals[0])?,
                id: None,
                fields: field_map(&parsed),
            })
        }
        "edit" => {
            let parsed = split_args("edit", rest, &FIELD_FLAGS, &[])?;
            expect_positionals("edit", &parsed, &["entity", "id"])?;
            if parsed.values.is_empty() {
                bail!("`edit` needs at least one field, for example --name \"New Name\"");
            }
            Ok(Command::Save {
                kind: parse_kind(&parsed.positionals[0])?,
                id: Some(parsed.positionals[1].clone()),
                fields: field_map(&parsed),
            })
        }
        "loans" => {
            let parsed = split_args("loans", rest, &[], &[])?;
            expect_positionals("loans", &parsed, &["customer"])?;
            Ok(Command::Loans {
                customer: CustomerId::new(parsed.positionals[0].clone()),
            })
        }
        "lend" => {
            let parsed = split_args(
                "lend",
                rest,
                &["--product", "--amount", "--date", "--due"],
                &[],
            )?;
            expect_positionals("lend", &parsed, &["customer"])?;
            let amount = parsed
                .value("--amount")
                .ok_or_else(|| anyhow!("`lend` needs --amount, for example --amount 450.50"))?;
            let due = parsed
                .value("--due")
                .ok_or_else(|| anyhow!("`lend` needs --due YYYY-MM-DD"))?;
            Ok(Command::Lend {
                customer: CustomerId::new(parsed.positionals[0].clone()),
                product: parsed.value("--product").unwrap_or_default().to_owned(),
                amount_paise: parse_rupees(amount)?,
                loan_date: parsed
                    .value("--date")
                    .map(|raw| parse_date_flag("--date", raw))
                    .transpose()?,
                due_date: parse_date_flag("--due", due)?,
            })
        }
        "mark-paid" => {
            let parsed = split_args("mark-paid", rest, &[], &[])?;
            expect_positionals("mark-paid", &parsed, &["customer", "loan"])?;
            Ok(Command::MarkPaid {
                customer: CustomerId::new(parsed.positionals[0].clone()),
                loan: LoanId::new(parsed.positionals[1].clone()),
            })
        }
        "dashboard" => {
            let parsed = split_args("dashboard", rest, &["--from", "--to"], &[])?;
            expect_positionals("dashboard", &parsed, &[])?;
            Ok(Command::Dashboard {
                range: parse_range(&parsed)?,
            })
        }
        unknown => bail!("unknown command {unknown:?}; run with --help to see supported commands"),
    }
}

/// Row types the command line can create and edit from `--field value` pairs.
pub trait CliEntity: TableRow {
    fn parse_id(raw: &str) -> Self::Id;
    fn blank_draft() -> Self::Draft;
    fn draft_of(&self) -> Self::Draft;
    fn apply_field(draft: &mut Self::Draft, field: &str, value: &str) -> Result<()>;
    /// Wraps a draft for the shared form validation.
    fn payload(draft: &Self::Draft) -> FormPayload;
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn field_not_applicable(field: &str, kind: EntityKind) -> anyhow::Error {
    anyhow!("--{field} does not apply to {}", kind.label())
}

impl CliEntity for Customer {
    fn parse_id(raw: &str) -> CustomerId {
        CustomerId::from(raw)
    }

    fn blank_draft() -> CustomerFormInput {
        CustomerFormInput {
            name: String::new(),
            mobile_number: String::new(),
            address: String::new(),
            photo: None,
        }
    }

    fn draft_of(&self) -> CustomerFormInput {
        CustomerFormInput {
            name: self.name.clone(),
            mobile_number: self.mobile_number.clone(),
            address: self.address.clone(),
            photo: self.photo.clone(),
        }
    }

    fn apply_field(draft: &mut CustomerFormInput, field: &str, value: &str) -> Result<()> {
        match field {
            "name" => draft.name = value.trim().to_owned(),
            "mobile" => draft.mobile_number = value.trim().to_owned(),
            "address" => draft.address = value.trim().to_owned(),
            "photo" => draft.photo = optional(value),
            other => return Err(field_not_applicable(other, EntityKind::Customers)),
        }
        Ok(())
    }

    fn payload(draft: &CustomerFormInput) -> FormPayload {
        FormPayload::Customer(draft.clone())
    }
}

impl CliEntity for Product {
    fn parse_id(raw: &str) -> ProductId {
        ProductId::from(raw)
    }

    fn blank_draft() -> ProductFormInput {
        ProductFormInput {
            name: String::new(),
            unit: String::new(),
            category: CategoryId::new(""),
            photo: None,
        }
    }

    fn draft_of(&self) -> ProductFormInput {
        ProductFormInput {
            name: self.name.clone(),
            unit: self.unit.clone(),
            category: self.category.clone(),
            photo: self.photo.clone(),
        }
    }

    fn apply_field(draft: &mut ProductFormInput, field: &str, value: &str) -> Result<()> {
        match field {
            "name" => draft.name = value.trim().to_owned(),
            "unit" => draft.unit = value.trim().to_owned(),
            "category" => draft.category = CategoryId::new(value.trim()),
            "photo" => draft.photo = optional(value),
            other => return Err(field_not_applicable(other, EntityKind::Products)),
        }
        Ok(())
    }

    fn payload(draft: &ProductFormInput) -> FormPayload {
        FormPayload::Product(draft.clone())
    }
}

impl CliEntity for Category {
    fn parse_id(raw: &str) -> CategoryId {
        CategoryId::from(raw)
    }

    fn blank_draft() -> CategoryFormInput {
        CategoryFormInput {
            name: String::new(),
            description: None,
            image: None,
        }
    }

    fn draft_of(&self) -> CategoryFormInput {
        CategoryFormInput {
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
        }
    }

    fn apply_field(draft: &mut CategoryFormInput, field: &str, value: &str) -> Result<()> {
        match field {
            "name" => draft.name = value.trim().to_owned(),
            "description" => draft.description = optional(value),
            "image" => draft.image = optional(value),
            other => return Err(field_not_applicable(other, EntityKind::Categories)),
        }
        Ok(())
    }

    fn payload(draft: &CategoryFormInput) -> FormPayload {
        FormPayload::Category(draft.clone())
    }
}

/// Loan and dashboard endpoints, cloned into each short-lived loan book.
pub trait Ledger: LoanApi + DashboardApi + Clone {}

impl<T: LoanApi + DashboardApi + Clone> Ledger for T {}

/// Everything one command run needs: the list controllers, the loan
/// endpoints, and today's date.
pub struct Session<C, P, K, L> {
    pub shop: Shop<C, P, K>,
    pub ledger: L,
    pub today: Date,
}

impl<C, P, K, L> Session<C, P, K, L>
where
    C: SharedRemote<Customer>,
    P: SharedRemote<Product>,
    K: SharedRemote<Category>,
    L: Ledger,
{
    pub fn new(
        customers: C,
        products: P,
        categories: K,
        ledger: L,
        page_size: usize,
        fetch_limit: u32,
        today: Date,
    ) -> Self {
        let shop = Shop::new(
            ListDataController::new(customers)
                .with_page_size(page_size)
                .with_fetch_limit(Some(fetch_limit)),
            ListDataController::new(products)
                .with_page_size(page_size)
                .with_fetch_limit(Some(fetch_limit)),
            ListDataController::new(categories)
                .with_page_size(page_size)
                .with_fetch_limit(Some(fetch_limit)),
        );
        Self {
            shop,
            ledger,
            today,
        }
    }

    fn loan_book(&self, customer: &CustomerId) -> LoanBook<L> {
        LoanBook::new(self.ledger.clone(), customer.clone())
    }
}

macro_rules! with_controller {
    ($session:expr, $kind:expr, |$controller:ident| $body:expr) => {
        match $kind {
            EntityKind::Customers => {
                let $controller = &mut $session.shop.customers;
                $body
            }
            EntityKind::Products => {
                let $controller = &mut $session.shop.products;
                $body
            }
            EntityKind::Categories => {
                let $controller = &mut $session.shop.categories;
                $body
            }
        }
    };
}

/// Runs a non-interactive command, writing human-readable output to `out`.
pub fn execute<C, P, K, L, W>(
    command: &Command,
    session: &mut Session<C, P, K, L>,
    out: &mut W,
) -> Result<()>
where
    C: SharedRemote<Customer>,
    P: SharedRemote<Product>,
    K: SharedRemote<Category>,
    L: Ledger,
    W: Write,
{
    let today = session.today;
    match command {
        Command::Tui | Command::Ping => bail!("{command:?} is handled by the binary, not a session"),
        Command::List { kind, query } => {
            with_controller!(session, *kind, |controller| list(controller, query, out))
        }
        Command::Export {
            kind,
            query,
            out: path,
            remote,
        } => with_controller!(session, *kind, |controller| export(
            controller,
            query,
            path.as_ref(),
            *remote,
            today,
            out
        )),
        Command::Delete {
            kind,
            id,
            confirmed,
        } => with_controller!(session, *kind, |controller| delete(
            controller, id, *confirmed, out
        )),
        Command::Save { kind, id, fields } => with_controller!(session, *kind, |controller| save(
            controller,
            id.as_deref(),
            fields,
            out
        )),
        Command::Loans { customer } => {
            let mut book = session.loan_book(customer);
            book.fetch()
                .with_context(|| format!("load loans for customer {customer}"))?;
            write_loans(&book, today, out)
        }
        Command::Lend {
            customer,
            product,
            amount_paise,
            loan_date,
            due_date,
        } => {
            let draft = LoanFormInput {
                product_name: product.trim().to_owned(),
                amount_paise: *amount_paise,
                loan_date: loan_date.unwrap_or(today),
                due_date: *due_date,
                status: LoanStatus::Unpaid,
            };
            let mut book = session.loan_book(customer);
            let loan = book
                .create_loan(&draft)
                .with_context(|| format!("record loan for customer {customer}"))?;
            writeln!(
                out,
                "recorded loan {} for {}: {} Rs {} due {}",
                loan.id,
                customer,
                loan.product_name,
                format_rupees(loan.amount_paise),
                wire::format_date(loan.due_date)
            )?;
            writeln!(
                out,
                "customer now owes Rs {} across {} unpaid loans",
                format_rupees(book.unpaid_total()),
                book.unpaid().count()
            )?;
            Ok(())
        }
        Command::MarkPaid { customer, loan } => {
            let mut book = session.loan_book(customer);
            let paid = book
                .mark_paid(loan, today)
                .with_context(|| format!("mark loan {loan} paid"))?;
            let paid_on = paid.payment_date.unwrap_or(today);
            writeln!(
                out,
                "marked loan {} paid on {} (Rs {})",
                paid.id,
                wire::format_date(paid_on),
                format_rupees(paid.amount_paise)
            )?;
            Ok(())
        }
        Command::Dashboard { range } => {
            let dashboard = session.ledger.dashboard(*range).context("load dashboard")?;
            let stats = &dashboard.stats;
            if let Some(label) = range.label() {
                writeln!(out, "period {label}")?;
            }
            writeln!(out, "customers     {}", stats.total_customers)?;
            writeln!(out, "loans         {}", stats.total_loans)?;
            writeln!(out, "unpaid        Rs {}", format_rupees(stats.total_unpaid_paise))?;
            writeln!(out, "collected     Rs {}", format_rupees(stats.total_paid_paise))?;
            if !dashboard.chart_data.is_empty() {
                let rows = dashboard
                    .chart_data
                    .iter()
                    .map(|point| {
                        vec![
                            point.name.clone(),
                            format_rupees(point.loans_paise),
                            format_rupees(point.collections_paise),
                        ]
                    })
                    .collect::<Vec<_>>();
                writeln!(out)?;
                write_table(out, &["Month", "Lent", "Collected"], &rows)?;
            }
            Ok(())
        }
    }
}

fn apply_query<E, R>(controller: &mut ListDataController<E, R>, query: &ListQuery)
where
    E: TableRow,
    R: RemoteCollection<E>,
{
    controller.set_search_query(query.search.clone());
    let mut patch = FilterPatch::new().flag(BooleanFlag::UnpaidOnly, query.unpaid);
    if let Some(category) = &query.category {
        patch = patch.category(category.clone());
    }
    controller.set_filter(patch);
}

fn list<E, R, W>(
    controller: &mut ListDataController<E, R>,
    query: &ListQuery,
    out: &mut W,
) -> Result<()>
where
    E: TableRow,
    R: RemoteCollection<E>,
    W: Write,
{
    apply_query(controller, query);
    controller.set_filter(FilterPatch::new().date_range(query.range));
    controller
        .fetch()
        .with_context(|| format!("load {}", E::KIND.label()))?;
    if query.page != 1 && !controller.set_page(query.page) {
        bail!(
            "page {} is out of range; {} has {} page(s)",
            query.page,
            E::KIND.label(),
            controller.total_pages()
        );
    }

    let Some(window) = controller.page_window() else {
        writeln!(out, "no {} match", E::KIND.label())?;
        return Ok(());
    };
    let mut headers = vec!["ID"];
    headers.extend_from_slice(E::COLUMNS);
    let rows = controller
        .visible_items()
        .into_iter()
        .map(|entity| {
            let mut cells = vec![entity.id().to_string()];
            cells.extend(entity.cells());
            cells
        })
        .collect::<Vec<_>>();
    write_table(out, &headers, &rows)?;
    writeln!(
        out,
        "Showing {} to {} of {} | page {}/{}",
        window.first,
        window.last,
        window.total,
        controller.current_page(),
        controller.total_pages()
    )?;
    Ok(())
}

fn export<E, R, W>(
    controller: &mut ListDataController<E, R>,
    query: &ListQuery,
    path: Option<&PathBuf>,
    remote: bool,
    today: Date,
    out: &mut W,
) -> Result<()>
where
    E: TableRow,
    R: RemoteCollection<E>,
    W: Write,
{
    apply_query(controller, query);
    let range = query.range.is_active().then_some(query.range);
    let export = if remote {
        controller.export_csv_remote(range, today)
    } else {
        controller
            .fetch()
            .with_context(|| format!("load {}", E::KIND.label()))?;
        controller.export_csv(range, today)
    }
    .with_context(|| format!("export {}", E::KIND.label()))?;

    match path {
        Some(path) if path.as_os_str() == "-" => {
            out.write_all(&export.content)?;
        }
        Some(path) if !path.is_dir() => {
            std::fs::write(path, &export.content)
                .with_context(|| format!("write export {}", path.display()))?;
            writeln!(out, "exported {} {} to {}", export.rows, E::KIND.label(), path.display())?;
        }
        Some(dir) => {
            let written = write_export(dir, &export)?;
            writeln!(out, "exported {} {} to {}", export.rows, E::KIND.label(), written.display())?;
        }
        None => {
            let written = write_export(&std::env::current_dir()?, &export)?;
            writeln!(out, "exported {} {} to {}", export.rows, E::KIND.label(), written.display())?;
        }
    }
    Ok(())
}

fn delete<E, R, W>(
    controller: &mut ListDataController<E, R>,
    raw_id: &str,
    confirmed: bool,
    out: &mut W,
) -> Result<()>
where
    E: CliEntity,
    R: RemoteCollection<E>,
    W: Write,
{
    let id = E::parse_id(raw_id);
    let entity = controller
        .remote()
        .get(&id)
        .with_context(|| format!("look up {} {id}", E::KIND.singular()))?;
    let name = entity.display_name().to_owned();
    controller.request_delete(entity);
    if !confirmed {
        controller.cancel_delete();
        bail!(
            "refusing to delete {} {id} ({name}) without --yes",
            E::KIND.singular()
        );
    }
    controller
        .confirm_delete()
        .with_context(|| format!("delete {} {id}", E::KIND.singular()))?;
    info!(entity = E::KIND.label(), %id, "deleted from command line");
    writeln!(out, "deleted {} {id} ({name})", E::KIND.singular())?;
    Ok(())
}

fn save<E, R, W>(
    controller: &mut ListDataController<E, R>,
    raw_id: Option<&str>,
    fields: &BTreeMap<String, String>,
    out: &mut W,
) -> Result<()>
where
    E: CliEntity,
    R: RemoteCollection<E>,
    W: Write,
{
    let id = raw_id.map(E::parse_id);
    let mut draft = match &id {
        Some(id) => controller
            .remote()
            .get(id)
            .with_context(|| format!("look up {} {id}", E::KIND.singular()))?
            .draft_of(),
        None => E::blank_draft(),
    };
    for (field, value) in fields {
        E::apply_field(&mut draft, field, value)?;
    }
    E::payload(&draft)
        .validate()
        .with_context(|| format!("invalid {}", E::KIND.singular()))?;

    let saved = controller
        .create_or_update(&draft, id.as_ref())
        .with_context(|| format!("save {}", E::KIND.singular()))?;
    let verb = if id.is_some() { "updated" } else { "created" };
    writeln!(
        out,
        "{verb} {} {} ({})",
        E::KIND.singular(),
        saved.id(),
        saved.display_name()
    )?;
    Ok(())
}

fn write_loans<L: LoanApi, W: Write>(book: &LoanBook<L>, today: Date, out: &mut W) -> Result<()> {
    if book.loans().is_empty() {
        writeln!(out, "no loans for customer {}", book.customer_id())?;
        return Ok(());
    }
    let rows = book
        .loans()
        .iter()
        .map(|loan| {
            let status = if loan.is_overdue(today) {
                "overdue".to_owned()
            } else {
                loan.status.as_str().to_owned()
            };
            vec![
                loan.id.to_string(),
                loan.product_name.clone(),
                format_rupees(loan.amount_paise),
                wire::format_date(loan.loan_date),
                wire::format_date(loan.due_date),
                status,
                loan.payment_date
                    .map(wire::format_date)
                    .unwrap_or_else(|| "-".to_owned()),
            ]
        })
        .collect::<Vec<_>>();
    write_table(
        out,
        &["ID", "Product", "Amount", "Lent on", "Due", "Status", "Paid on"],
        &rows,
    )?;
    writeln!(
        out,
        "unpaid Rs {} | paid Rs {} | overdue {}",
        format_rupees(book.unpaid_total()),
        format_rupees(book.paid_total()),
        book.overdue(today).len()
    )?;
    Ok(())
}

/// Left-aligned columns separated by two spaces.
fn write_table<W: Write>(out: &mut W, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_cells = headers.iter().map(|header| (*header).to_owned()).collect::<Vec<_>>();
    for cells in std::iter::once(&header_cells).chain(rows) {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Command, ListQuery, Session, execute, parse_command, parse_rupees};
    use anyhow::Result;
    use khata_app::{
        Category, CustomerId, DateRange, EntityKind, FailureKind, LoanStatus, Product,
    };
    use khata_testkit::{MemoryLoans, MemoryRemote, ShopFaker, customer, day, product};
    use std::path::PathBuf;
    use time::Month;

    type TestSession = Session<
        MemoryRemote<khata_app::Customer>,
        MemoryRemote<Product>,
        MemoryRemote<Category>,
        MemoryLoans,
    >;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    fn session() -> TestSession {
        let customers = vec![
            customer("c1", "Rajesh Kumar", "9876512345", day(2024, Month::January, 15), 2),
            customer("c2", "Priya Patel", "9199000001", day(2024, Month::February, 1), 0),
            customer("c3", "Amit Shah", "9876599123", day(2024, Month::January, 31), 1),
        ];
        let products = vec![
            product("p1", "Pure Sesame Oil", "cooking-oils", day(2024, Month::January, 2)),
            product("p2", "Organic Sunflower Oil", "organic-oils", day(2024, Month::January, 3)),
        ];
        let categories = ShopFaker::new(1).categories(day(2024, Month::January, 1));
        Session::new(
            MemoryRemote::new(customers),
            MemoryRemote::new(products),
            MemoryRemote::new(categories),
            MemoryLoans::new(),
            2,
            100,
            day(2024, Month::March, 5),
        )
    }

    fn run(session: &mut TestSession, line: &str) -> Result<String> {
        let command = parse_command(&words(line))?;
        let mut out = Vec::new();
        execute(&command, session, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn no_words_means_tui() -> Result<()> {
        assert_eq!(parse_command(&[])?, Command::Tui);
        assert_eq!(parse_command(&words("tui"))?, Command::Tui);
        Ok(())
    }

    #[test]
    fn list_parses_filters() -> Result<()> {
        let command = parse_command(&words(
            "list customers --search 99 --from 2024-01-01 --to 2024-01-31 --unpaid --page 2",
        ))?;
        assert_eq!(
            command,
            Command::List {
                kind: EntityKind::Customers,
                query: ListQuery {
                    search: "99".to_owned(),
                    category: None,
                    range: DateRange::between(
                        day(2024, Month::January, 1),
                        day(2024, Month::January, 31)
                    ),
                    unpaid: true,
                    page: 2,
                },
            }
        );
        Ok(())
    }

    #[test]
    fn list_rejects_filters_for_the_wrong_entity() {
        let error = parse_command(&words("list products --unpaid")).expect_err("unpaid on products");
        assert!(error.to_string().contains("--unpaid applies to customers"));

        let error = parse_command(&words("list customers --category cooking-oils"))
            .expect_err("category on customers");
        assert!(error.to_string().contains("--category applies to products"));
    }

    #[test]
    fn half_open_ranges_are_rejected() {
        let error = parse_command(&words("list customers --from 2024-01-01"))
            .expect_err("from without to");
        assert!(error.to_string().contains("must be given together"));

        let error = parse_command(&words("dashboard --from 2024-02-01 --to 2024-01-01"))
            .expect_err("reversed range");
        assert!(error.to_string().contains("is before"));
    }

    #[test]
    fn unknown_words_point_at_help() {
        let error = parse_command(&words("frobnicate")).expect_err("unknown command");
        assert!(error.to_string().contains("--help"));

        let error = parse_command(&words("list customers --wat")).expect_err("unknown option");
        assert!(error.to_string().contains("unknown option"));

        let error = parse_command(&words("list widgets")).expect_err("unknown entity");
        assert!(error.to_string().contains("unknown entity"));

        let error = parse_command(&words("delete customers")).expect_err("missing id");
        assert!(error.to_string().contains("<id>"));
    }

    #[test]
    fn rupee_amounts_become_paise() -> Result<()> {
        assert_eq!(parse_rupees("450")?, 45_000);
        assert_eq!(parse_rupees("450.5")?, 45_050);
        assert_eq!(parse_rupees("450.05")?, 45_005);
        assert!(parse_rupees("450.123").is_err());
        assert!(parse_rupees(".5").is_err());
        assert!(parse_rupees("abc").is_err());
        assert!(parse_rupees("-5").is_err());
        Ok(())
    }

    #[test]
    fn lend_parses_amount_and_dates() -> Result<()> {
        let command = parse_command(&words(
            "lend c1 --product Sesame --amount 1250.50 --date 2024-02-01 --due 2024-03-01",
        ))?;
        assert_eq!(
            command,
            Command::Lend {
                customer: CustomerId::new("c1"),
                product: "Sesame".to_owned(),
                amount_paise: 125_050,
                loan_date: Some(day(2024, Month::February, 1)),
                due_date: day(2024, Month::March, 1),
            }
        );

        let error = parse_command(&words("lend c1 --product Sesame --due 2024-03-01"))
            .expect_err("missing amount");
        assert!(error.to_string().contains("--amount"));
        Ok(())
    }

    #[test]
    fn list_prints_a_page_and_summary() -> Result<()> {
        let mut session = session();
        let output = run(&mut session, "list customers")?;
        let lines = output.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("ID  Name"));
        assert!(lines[1].starts_with("c1  Rajesh Kumar"));
        assert!(lines[2].starts_with("c2  Priya Patel"));
        assert_eq!(lines[3], "Showing 1 to 2 of 3 | page 1/2");

        let output = run(&mut session, "list customers --page 2")?;
        assert!(output.contains("c3  Amit Shah"));
        assert!(output.ends_with("Showing 3 to 3 of 3 | page 2/2\n"));
        Ok(())
    }

    #[test]
    fn list_applies_search_and_reports_empty_results() -> Result<()> {
        let mut session = session();
        let output = run(&mut session, "list customers --search 99")?;
        assert!(output.contains("Priya Patel"));
        assert!(output.contains("Amit Shah"));
        assert!(!output.contains("Rajesh Kumar"));

        let output = run(&mut session, "list products --search ghee")?;
        assert_eq!(output, "no products match\n");

        let criteria = match session.shop.products.remote().calls().last() {
            Some(khata_testkit::RemoteCall::List(criteria)) => criteria.clone(),
            other => panic!("expected a list call, got {other:?}"),
        };
        assert_eq!(criteria.search, None);
        assert_eq!(criteria.limit, Some(100));
        Ok(())
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let mut session = session();
        let error = run(&mut session, "list customers --page 9").expect_err("page 9");
        assert!(error.to_string().contains("has 2 page(s)"));
    }

    #[test]
    fn list_failure_names_the_collection() {
        let mut session = session();
        session.shop.customers.remote().fail_next(FailureKind::Network);
        let error = run(&mut session, "list customers").expect_err("network down");
        assert_eq!(error.to_string(), "load customers");
        assert!(format!("{error:#}").contains("network error"));
    }

    #[test]
    fn delete_requires_yes() -> Result<()> {
        let mut session = session();
        let error = run(&mut session, "delete customers c2").expect_err("unconfirmed delete");
        assert!(error.to_string().contains("without --yes"));
        assert_eq!(session.shop.customers.remote().rows().len(), 3);
        assert!(session.shop.customers.pending_deletion().is_none());

        let output = run(&mut session, "delete customers c2 --yes")?;
        assert_eq!(output, "deleted customer c2 (Priya Patel)\n");
        assert_eq!(session.shop.customers.remote().rows().len(), 2);

        let error = run(&mut session, "delete customers c2 --yes").expect_err("already gone");
        assert!(format!("{error:#}").contains("404"));
        Ok(())
    }

    #[test]
    fn add_validates_before_calling_the_server() -> Result<()> {
        let mut session = session();
        let command = parse_command(&[
            "add".to_owned(),
            "customer".to_owned(),
            "--name".to_owned(),
            "Neha Singh".to_owned(),
            "--mobile".to_owned(),
            "98765".to_owned(),
            "--address".to_owned(),
            "7 Patel Nagar, Delhi".to_owned(),
        ])?;
        let error = execute(&command, &mut session, &mut Vec::new()).expect_err("short mobile");
        assert!(format!("{error:#}").contains("exactly 10 digits"));
        assert!(
            !session
                .shop
                .customers
                .remote()
                .calls()
                .contains(&khata_testkit::RemoteCall::Create)
        );

        let output = run(
            &mut session,
            "add customer --name Neha --mobile 9876500000 --address Delhi",
        )?;
        assert_eq!(output, "created customer mem-0001 (Neha)\n");
        assert_eq!(session.shop.customers.items().len(), 4);
        Ok(())
    }

    #[test]
    fn add_rejects_fields_from_other_entities() {
        let mut session = session();
        let error = run(&mut session, "add category --name Ghee --unit kg").expect_err("unit");
        assert_eq!(error.to_string(), "--unit does not apply to categories");
    }

    #[test]
    fn edit_keeps_untouched_fields() -> Result<()> {
        let mut session = session();
        let output = run(&mut session, "edit products p1 --unit tin")?;
        assert_eq!(output, "updated product p1 (Pure Sesame Oil)\n");

        let rows = session.shop.products.remote().rows();
        assert_eq!(rows[0].unit, "tin");
        assert_eq!(rows[0].category.as_str(), "cooking-oils");

        let error = parse_command(&words("edit products p1")).expect_err("no fields");
        assert!(error.to_string().contains("at least one field"));
        Ok(())
    }

    #[test]
    fn export_writes_filtered_rows_for_the_range() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut session = session();
        let line = format!(
            "export customers --from 2024-01-01 --to 2024-01-31 --out {}",
            temp.path().display()
        );
        let output = run(&mut session, &line)?;
        let path: PathBuf = temp.path().join("customers_2024-03-05.csv");
        assert_eq!(
            output,
            format!("exported 2 customers to {}\n", path.display())
        );

        let content = std::fs::read_to_string(&path)?;
        let mut lines = content.lines();
        assert!(lines.next().is_some_and(|header| header.starts_with("ID,Name")));
        assert_eq!(lines.count(), 2);
        Ok(())
    }

    #[test]
    fn remote_export_can_stream_to_stdout() -> Result<()> {
        let mut session = session();
        let output = run(&mut session, "export customers --unpaid --remote --out -")?;
        assert!(output.starts_with("ID,Name"));
        assert_eq!(output.lines().count(), 3);
        assert_eq!(session.shop.customers.remote().list_calls(), 0);
        Ok(())
    }

    #[test]
    fn lending_and_marking_paid_flow_through_the_ledger() -> Result<()> {
        let mut session = session();
        let output = run(
            &mut session,
            "lend c1 --product Sesame --amount 450 --due 2024-03-01",
        )?;
        assert!(output.starts_with("recorded loan mem-loan-0001 for c1: Sesame Rs 450.00 due 2024-03-01"));
        assert!(output.contains("customer now owes Rs 450.00 across 1 unpaid loans"));

        let output = run(&mut session, "loans c1")?;
        assert!(output.contains("overdue"));
        assert!(output.contains("2024-03-05"));
        assert!(output.ends_with("unpaid Rs 450.00 | paid Rs 0.00 | overdue 1\n"));

        let output = run(&mut session, "mark-paid c1 mem-loan-0001")?;
        assert_eq!(output, "marked loan mem-loan-0001 paid on 2024-03-05 (Rs 450.00)\n");
        let stored = session.ledger.loans_for(&CustomerId::new("c1"));
        assert_eq!(stored[0].status, LoanStatus::Paid);

        let error = run(&mut session, "mark-paid c1 mem-loan-0001").expect_err("already paid");
        assert!(format!("{error:#}").contains("Loan already paid"));
        Ok(())
    }

    #[test]
    fn invalid_loan_never_reaches_the_ledger() {
        let mut session = session();
        let error = run(
            &mut session,
            "lend c1 --amount 450 --due 2024-03-01",
        )
        .expect_err("missing product");
        assert!(format!("{error:#}").contains("product is required"));
        assert!(session.ledger.loans_for(&CustomerId::new("c1")).is_empty());
    }

    #[test]
    fn loans_for_a_quiet_customer() -> Result<()> {
        let mut session = session();
        assert_eq!(run(&mut session, "loans c2")?, "no loans for customer c2\n");
        Ok(())
    }

    #[test]
    fn dashboard_prints_totals() -> Result<()> {
        let mut session = session();
        let mut faker = ShopFaker::new(3);
        let loan = faker.loan(&CustomerId::new("c1"), day(2024, Month::January, 10));
        let amount = loan.amount_paise;
        session.ledger.insert(loan);

        let output = run(&mut session, "dashboard --from 2024-01-01 --to 2024-01-31")?;
        assert!(output.starts_with("period 2024-01-01..2024-01-31\n"));
        assert!(output.contains("loans         1"));
        assert!(output.contains(&format!(
            "unpaid        Rs {}",
            khata_app::format_rupees(amount)
        )));

        let output = run(&mut session, "dashboard --from 2024-02-01 --to 2024-02-28")?;
        assert!(output.contains("loans         0"));
        Ok(())
    }
}
