//! Google Sheets backend.
//!
//! The spreadsheet has one tab per table (users, transactions, referrals,
//! tasks). [`SheetLayout`] owns the column mapping, [`SheetsClient`] speaks
//! the REST API and [`SheetsBackend`] implements [`crate::LedgerBackend`] on
//! top of both.

mod auth;
mod backend;
mod client;
mod layout;

pub use auth::{ServiceAccountKey, SheetsCredentials, SPREADSHEETS_SCOPE};
pub use backend::SheetsBackend;
pub use client::{SheetsClient, ValueRange, DEFAULT_API_URL};
pub use layout::{format_timestamp, SheetLayout, UserColumns, FIRST_DATA_ROW, TIMESTAMP_FORMAT};
