// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod memory;

pub use memory::{MemoryEntity, MemoryLoans, MemoryRemote, RemoteCall};

use khata_app::{
    Category, CategoryId, Customer, CustomerId, Loan, LoanId, LoanStatus, Product, ProductId,
};
use time::{Date, Duration, Month, OffsetDateTime, Time};

const FIRST_NAMES: [&str; 20] = [
    "Rajesh", "Priya", "Amit", "Deepika", "Suresh", "Anita", "Vikram", "Neha", "Arun", "Meera",
    "Sanjay", "Pooja", "Rahul", "Kavita", "Arjun", "Sunita", "Karthik", "Anjali", "Dinesh",
    "Lakshmi",
];
const LAST_NAMES: [&str; 16] = [
    "Kumar", "Patel", "Shah", "Singh", "Reddy", "Desai", "Mehta", "Sharma", "Verma", "Kapoor",
    "Gupta", "Malhotra", "Joshi", "Rao", "Nair", "Iyer",
];
const STREETS: [&str; 5] = [
    "Gandhi Road",
    "Nehru Street",
    "Patel Nagar",
    "MG Road",
    "Subhash Marg",
];
const CITIES: [&str; 5] = ["Mumbai", "Delhi", "Bangalore", "Chennai", "Hyderabad"];

const CATEGORIES: [(&str, &str, &str); 5] = [
    ("cooking-oils", "Cooking Oils", "Pure and natural cooking oils"),
    (
        "specialty-oils",
        "Specialty Oils",
        "Premium and specialty cooking oils",
    ),
    ("organic-oils", "Organic Oils", "Certified organic oils"),
    (
        "cold-pressed",
        "Cold Pressed Oils",
        "Traditional cold pressed oils",
    ),
    ("blended-oils", "Blended Oils", "Healthy oil blends"),
];

const PRODUCT_NAMES: [&str; 15] = [
    "Premium Groundnut Oil",
    "Pure Sesame Oil",
    "Virgin Coconut Oil",
    "Cold Pressed Mustard Oil",
    "Extra Virgin Olive Oil",
    "Traditional Wood Pressed Oil",
    "Organic Sunflower Oil",
    "Black Sesame Oil",
    "Pure Castor Oil",
    "Rice Bran Oil",
    "Filtered Groundnut Oil",
    "Cold Pressed Coconut Oil",
    "Premium Mustard Oil",
    "Organic Sesame Oil",
    "Blended Cooking Oil",
];
const UNITS: [&str; 3] = ["litre", "kg", "tin"];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for shop fixtures; the same seed yields the same rows.
#[derive(Debug, Clone)]
pub struct ShopFaker {
    rng: DeterministicRng,
    next_id: u64,
}

impl ShopFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 1,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn customer_name(&mut self) -> String {
        format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES))
    }

    /// Ten digits starting with `98765`, like the shop's walk-in records.
    pub fn mobile_number(&mut self) -> String {
        format!("98765{:05}", 10_000 + self.rng.int_n(90_000))
    }

    pub fn address(&mut self) -> String {
        format!(
            "{} {}, {}",
            100 + self.rng.int_n(900),
            self.pick(&STREETS),
            self.pick(&CITIES),
        )
    }

    pub fn customer(&mut self, created: Date) -> Customer {
        let total_loans = self.rng.int_n(10) as u32;
        let unpaid_loans = self.rng.int_n(total_loans as usize + 1) as u32;
        let last_loan_date =
            (total_loans > 0).then(|| created + Duration::days(self.rng.int_n(30) as i64));
        Customer {
            id: CustomerId::new(self.next_id("cust")),
            name: self.customer_name(),
            mobile_number: self.mobile_number(),
            address: self.address(),
            photo: None,
            created_at: at_noon(created),
            total_loans,
            unpaid_loans,
            last_loan_date,
        }
    }

    /// `count` customers created one per day starting at `first_day`.
    pub fn customers(&mut self, count: usize, first_day: Date) -> Vec<Customer> {
        (0..count)
            .map(|offset| self.customer(first_day + Duration::days(offset as i64)))
            .collect()
    }

    pub fn product(&mut self, created: Date) -> Product {
        let (category, _, _) = CATEGORIES[self.rng.int_n(CATEGORIES.len())];
        Product {
            id: ProductId::new(self.next_id("prod")),
            name: self.pick(&PRODUCT_NAMES).to_owned(),
            unit: self.pick(&UNITS).to_owned(),
            category: CategoryId::new(category),
            photo: None,
            created_at: at_noon(created),
        }
    }

    pub fn categories(&mut self, created: Date) -> Vec<Category> {
        CATEGORIES
            .iter()
            .map(|(id, name, description)| Category {
                id: CategoryId::new(*id),
                name: (*name).to_owned(),
                description: Some((*description).to_owned()),
                image: None,
                products_count: self.rng.int_n(8) as u32,
                created_at: at_noon(created),
            })
            .collect()
    }

    pub fn loan(&mut self, customer: &CustomerId, loan_date: Date) -> Loan {
        let amount_rupees = 100 + self.rng.int_n(4_900) as i64;
        Loan {
            id: LoanId::new(self.next_id("loan")),
            customer_id: customer.clone(),
            product_name: self.pick(&PRODUCT_NAMES).to_owned(),
            amount_paise: amount_rupees * 100,
            loan_date,
            due_date: loan_date + Duration::days(30),
            status: LoanStatus::Unpaid,
            payment_date: None,
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}-{:04}", self.next_id);
        self.next_id += 1;
        id
    }
}

pub fn category_ids() -> Vec<&'static str> {
    CATEGORIES.iter().map(|(id, _, _)| *id).collect()
}

pub fn day(year: i32, month: Month, day: u8) -> Date {
    Date::from_calendar_date(year, month, day).expect("valid fixture date")
}

/// Midday UTC, so a timestamp never straddles a calendar boundary in tests.
pub fn at_noon(date: Date) -> OffsetDateTime {
    date.with_time(Time::from_hms(12, 0, 0).expect("valid fixture time"))
        .assume_utc()
}

/// A customer with explicit, test-controlled fields.
pub fn customer(id: &str, name: &str, mobile: &str, created: Date, unpaid_loans: u32) -> Customer {
    Customer {
        id: CustomerId::new(id),
        name: name.to_owned(),
        mobile_number: mobile.to_owned(),
        address: "12 MG Road, Bangalore".to_owned(),
        photo: None,
        created_at: at_noon(created),
        total_loans: unpaid_loans,
        unpaid_loans,
        last_loan_date: None,
    }
}

pub fn product(id: &str, name: &str, category: &str, created: Date) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        unit: "litre".to_owned(),
        category: CategoryId::new(category),
        photo: None,
        created_at: at_noon(created),
    }
}
