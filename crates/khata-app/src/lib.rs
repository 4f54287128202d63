// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod controller;
pub mod error;
pub mod export;
pub mod filter;
pub mod forms;
pub mod ids;
pub mod loans;
pub mod model;
pub mod remote;
pub mod state;

pub use controller::*;
pub use error::*;
pub use export::*;
pub use filter::*;
pub use forms::*;
pub use ids::*;
pub use loans::*;
pub use model::*;
pub use remote::*;
pub use state::*;
