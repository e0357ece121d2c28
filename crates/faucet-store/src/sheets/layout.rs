//! Mapping between ledger records and spreadsheet rows.
//!
//! Every table lives on its own tab with a header row, so data starts at row
//! 2. Cells arrive as JSON values (`UNFORMATTED_VALUE` rendering), which means
//! numbers may show up as JSON numbers or as strings typed by hand.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use faucet_core::{
    ReferralRecord, Task, Transaction, TransactionId, TransactionKind, UserAccount, UserId,
};

use crate::error::{Result, StoreError};

/// First row holding data; row 1 is the header.
pub const FIRST_DATA_ROW: usize = 2;

/// Timestamp format written to the sheet.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const USERS_WIDTH: usize = 7;
const TRANSACTIONS_WIDTH: usize = 7;
const REFERRALS_WIDTH: usize = 4;
const TASKS_WIDTH: usize = 3;

/// Column order of the users tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumns {
    /// `A` user ID, `B` display name, `C` balance, `D` last claim,
    /// `E` referrer, `F` referral code, `G` created at.
    Canonical,
    /// Sheets created by the first faucet release: `B` name, `C` user ID,
    /// `D` balance, `E` last claim, `F` referral code, `G` referrer. Column
    /// `A` is left alone.
    Legacy,
}

// Zero-based column indexes into a users row.
struct UserIndexes {
    user_id: usize,
    display_name: usize,
    balance: usize,
    last_claim: usize,
    referrer: usize,
    referral_code: usize,
    created_at: Option<usize>,
}

impl UserColumns {
    const fn indexes(self) -> UserIndexes {
        match self {
            Self::Canonical => UserIndexes {
                user_id: 0,
                display_name: 1,
                balance: 2,
                last_claim: 3,
                referrer: 4,
                referral_code: 5,
                created_at: Some(6),
            },
            Self::Legacy => UserIndexes {
                user_id: 2,
                display_name: 1,
                balance: 3,
                last_claim: 4,
                referral_code: 5,
                referrer: 6,
                created_at: None,
            },
        }
    }
}

/// Tab names and column order of the ledger spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    /// Tab holding one row per account.
    pub users_sheet: String,
    /// Tab holding the transaction log.
    pub transactions_sheet: String,
    /// Tab holding the referral log.
    pub referrals_sheet: String,
    /// Tab holding the task catalog.
    pub tasks_sheet: String,
    /// Column order of the users tab.
    pub users: UserColumns,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::canonical()
    }
}

impl SheetLayout {
    /// The layout written by this service.
    #[must_use]
    pub fn canonical() -> Self {
        Self::with_columns(UserColumns::Canonical)
    }

    /// The layout of sheets created by the first faucet release.
    #[must_use]
    pub fn legacy() -> Self {
        Self::with_columns(UserColumns::Legacy)
    }

    fn with_columns(users: UserColumns) -> Self {
        Self {
            users_sheet: "Users".into(),
            transactions_sheet: "Transactions".into(),
            referrals_sheet: "Referrals".into(),
            tasks_sheet: "Tasks".into(),
            users,
        }
    }

    /// Parse a layout name (`canonical` or `legacy`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "canonical" => Some(Self::canonical()),
            "legacy" => Some(Self::legacy()),
            _ => None,
        }
    }

    // =========================================================================
    // Ranges
    // =========================================================================

    /// The first header cell of the users tab.
    #[must_use]
    pub fn users_header_range(&self) -> String {
        format!("{}!A1", quote_sheet(&self.users_sheet))
    }

    /// All data rows of the users tab.
    #[must_use]
    pub fn users_range(&self) -> String {
        data_range(&self.users_sheet, USERS_WIDTH)
    }

    /// The user ID column of the users tab, used to locate rows.
    #[must_use]
    pub fn user_id_column_range(&self) -> String {
        let column = column_letter(self.users.indexes().user_id);
        format!(
            "{}!{column}{FIRST_DATA_ROW}:{column}",
            quote_sheet(&self.users_sheet)
        )
    }

    /// All data rows of the transactions tab.
    #[must_use]
    pub fn transactions_range(&self) -> String {
        data_range(&self.transactions_sheet, TRANSACTIONS_WIDTH)
    }

    /// Column `A` of the transactions tab, used to find the next free row.
    #[must_use]
    pub fn transactions_key_range(&self) -> String {
        key_range(&self.transactions_sheet)
    }

    /// All data rows of the referrals tab.
    #[must_use]
    pub fn referrals_range(&self) -> String {
        data_range(&self.referrals_sheet, REFERRALS_WIDTH)
    }

    /// Column `A` of the referrals tab, used to find the next free row.
    #[must_use]
    pub fn referrals_key_range(&self) -> String {
        key_range(&self.referrals_sheet)
    }

    /// All data rows of the tasks tab.
    #[must_use]
    pub fn tasks_range(&self) -> String {
        data_range(&self.tasks_sheet, TASKS_WIDTH)
    }

    /// The users row at a 1-based row number.
    #[must_use]
    pub fn user_row_range(&self, row: usize) -> String {
        row_range(&self.users_sheet, row, row, USERS_WIDTH)
    }

    /// A block of transaction rows starting at `first_row`.
    #[must_use]
    pub fn transaction_rows_range(&self, first_row: usize, count: usize) -> String {
        row_range(
            &self.transactions_sheet,
            first_row,
            first_row + count.saturating_sub(1),
            TRANSACTIONS_WIDTH,
        )
    }

    /// A block of referral rows starting at `first_row`.
    #[must_use]
    pub fn referral_rows_range(&self, first_row: usize, count: usize) -> String {
        row_range(
            &self.referrals_sheet,
            first_row,
            first_row + count.saturating_sub(1),
            REFERRALS_WIDTH,
        )
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Parse a users row. Rows without a user ID are skipped (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRow`] if a populated cell cannot be parsed.
    pub fn account_from_row(&self, row_number: usize, row: &[Value]) -> Result<Option<UserAccount>> {
        let idx = self.users.indexes();
        let corrupt = |reason: String| StoreError::CorruptRow {
            table: self.users_sheet.clone(),
            row: row_number,
            reason,
        };

        let Some(raw_id) = cell_string(row.get(idx.user_id)) else {
            return Ok(None);
        };
        let user_id = UserId::new(&raw_id).map_err(|e| corrupt(format!("user id: {e}")))?;

        let balance = cell_i64(row.get(idx.balance)).map_err(|e| corrupt(format!("balance: {e}")))?;
        let last_claim_at = cell_timestamp(row.get(idx.last_claim))
            .map_err(|e| corrupt(format!("last claim: {e}")))?;
        let referrer_id = cell_string(row.get(idx.referrer))
            .map(|raw| UserId::new(raw).map_err(|e| corrupt(format!("referrer: {e}"))))
            .transpose()?;
        let created_at = match idx.created_at {
            Some(i) => cell_timestamp(row.get(i)).map_err(|e| corrupt(format!("created at: {e}")))?,
            None => None,
        };

        Ok(Some(UserAccount {
            display_name: cell_string(row.get(idx.display_name))
                .unwrap_or_else(|| UserAccount::placeholder_name(&user_id)),
            referral_code: cell_string(row.get(idx.referral_code))
                .unwrap_or_else(|| user_id.to_string()),
            user_id,
            balance: balance.unwrap_or(0),
            last_claim_at,
            referrer_id,
            created_at: created_at.unwrap_or_default(),
        }))
    }

    /// Encode an account as a users row. Cells this layout does not own are
    /// `null`, which leaves them untouched on write.
    #[must_use]
    pub fn account_to_row(&self, account: &UserAccount) -> Vec<Value> {
        let idx = self.users.indexes();
        let mut row = vec![Value::Null; USERS_WIDTH];
        row[idx.user_id] = Value::from(account.user_id.as_str());
        row[idx.display_name] = Value::from(account.display_name.as_str());
        row[idx.balance] = Value::from(account.balance);
        row[idx.last_claim] = account
            .last_claim_at
            .map_or_else(|| Value::from(""), |at| Value::from(format_timestamp(at)));
        row[idx.referrer] = account
            .referrer_id
            .as_ref()
            .map_or_else(|| Value::from(""), |r| Value::from(r.as_str()));
        row[idx.referral_code] = Value::from(account.referral_code.as_str());
        if let Some(i) = idx.created_at {
            row[i] = Value::from(format_timestamp(account.created_at));
        }
        row
    }

    /// The user ID cell of a full users row, if not blank.
    #[must_use]
    pub fn user_id_cell(&self, row: &[Value]) -> Option<String> {
        cell_string(row.get(self.users.indexes().user_id))
    }

    /// The first cell of a single-column row (see
    /// [`user_id_column_range`](Self::user_id_column_range)), if not blank.
    #[must_use]
    pub fn key_cell(row: &[Value]) -> Option<String> {
        cell_string(row.first())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Parse a transactions row. Blank rows are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRow`] if a populated cell cannot be parsed.
    pub fn transaction_from_row(&self, row_number: usize, row: &[Value]) -> Result<Option<Transaction>> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            table: self.transactions_sheet.clone(),
            row: row_number,
            reason,
        };

        let Some(raw_user) = cell_string(row.first()) else {
            return Ok(None);
        };
        let user_id = UserId::new(&raw_user).map_err(|e| corrupt(format!("user id: {e}")))?;
        let amount = cell_i64(row.get(1))
            .map_err(|e| corrupt(format!("amount: {e}")))?
            .unwrap_or(0);
        let kind_label = cell_string(row.get(2)).unwrap_or_default();
        let kind = TransactionKind::from_label(&kind_label)
            .ok_or_else(|| corrupt(format!("unknown kind '{kind_label}'")))?;
        let timestamp = cell_timestamp(row.get(3))
            .map_err(|e| corrupt(format!("timestamp: {e}")))?
            .unwrap_or_default();
        let source_user_id = cell_string(row.get(4))
            .map(|raw| UserId::new(raw).map_err(|e| corrupt(format!("source user: {e}"))))
            .transpose()?;
        let reference = cell_string(row.get(5));
        // Rows typed by hand may lack an ID; they still count.
        let id = match cell_string(row.get(6)) {
            Some(raw) => raw
                .parse::<TransactionId>()
                .map_err(|e| corrupt(format!("id: {e}")))?,
            None => TransactionId::generate(),
        };

        Ok(Some(Transaction {
            id,
            user_id,
            amount,
            kind,
            timestamp,
            source_user_id,
            reference,
        }))
    }

    /// Encode a transaction as a row.
    #[must_use]
    pub fn transaction_to_row(&self, tx: &Transaction) -> Vec<Value> {
        vec![
            Value::from(tx.user_id.as_str()),
            Value::from(tx.amount),
            Value::from(tx.kind.as_str()),
            Value::from(format_timestamp(tx.timestamp)),
            Value::from(tx.source_user_id.as_ref().map_or("", UserId::as_str)),
            Value::from(tx.reference.as_deref().unwrap_or("")),
            Value::from(tx.id.to_string()),
        ]
    }

    // =========================================================================
    // Referrals and tasks
    // =========================================================================

    /// Parse a referrals row. Blank rows are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRow`] if a populated cell cannot be parsed.
    pub fn referral_from_row(&self, row_number: usize, row: &[Value]) -> Result<Option<ReferralRecord>> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            table: self.referrals_sheet.clone(),
            row: row_number,
            reason,
        };

        let (Some(referrer), Some(referee)) = (cell_string(row.first()), cell_string(row.get(1)))
        else {
            return Ok(None);
        };

        Ok(Some(ReferralRecord {
            referrer_id: UserId::new(referrer).map_err(|e| corrupt(format!("referrer: {e}")))?,
            referee_id: UserId::new(referee).map_err(|e| corrupt(format!("referee: {e}")))?,
            points: cell_i64(row.get(2))
                .map_err(|e| corrupt(format!("points: {e}")))?
                .unwrap_or(0),
            timestamp: cell_timestamp(row.get(3))
                .map_err(|e| corrupt(format!("timestamp: {e}")))?
                .unwrap_or_default(),
        }))
    }

    /// Encode a referral record as a row.
    #[must_use]
    pub fn referral_to_row(&self, record: &ReferralRecord) -> Vec<Value> {
        vec![
            Value::from(record.referrer_id.as_str()),
            Value::from(record.referee_id.as_str()),
            Value::from(record.points),
            Value::from(format_timestamp(record.timestamp)),
        ]
    }

    /// Parse a tasks row. Rows without a name are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRow`] if the reward cannot be parsed.
    pub fn task_from_row(&self, row_number: usize, row: &[Value]) -> Result<Option<Task>> {
        let Some(name) = cell_string(row.first()) else {
            return Ok(None);
        };
        let reward = cell_i64(row.get(2))
            .map_err(|e| StoreError::CorruptRow {
                table: self.tasks_sheet.clone(),
                row: row_number,
                reason: format!("reward: {e}"),
            })?
            .unwrap_or(0);
        Ok(Some(Task::new(
            name,
            cell_string(row.get(1)).unwrap_or_default(),
            reward,
        )))
    }
}

// =============================================================================
// Cell helpers
// =============================================================================

/// Quote a tab name for A1 notation when it is not a plain identifier.
fn quote_sheet(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn column_letter(index: usize) -> char {
    // Layouts never exceed column Z.
    char::from(b'A' + u8::try_from(index.min(25)).unwrap_or(25))
}

fn data_range(sheet: &str, width: usize) -> String {
    format!(
        "{}!A{FIRST_DATA_ROW}:{}",
        quote_sheet(sheet),
        column_letter(width - 1)
    )
}

fn key_range(sheet: &str) -> String {
    format!("{}!A{FIRST_DATA_ROW}:A", quote_sheet(sheet))
}

fn row_range(sheet: &str, first: usize, last: usize, width: usize) -> String {
    format!(
        "{}!A{first}:{}{last}",
        quote_sheet(sheet),
        column_letter(width - 1)
    )
}

/// Format a timestamp the way the sheet stores it.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// A non-blank cell as a trimmed string.
fn cell_string(cell: Option<&Value>) -> Option<String> {
    let text = match cell? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// An integer cell. Blank cells are `None`; whole floats are accepted.
fn cell_i64(cell: Option<&Value>) -> std::result::Result<Option<i64>, String> {
    match cell {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| format!("'{n}' is not a whole number")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
                .map(Some)
                .ok_or_else(|| format!("'{s}' is not a whole number"))
        }
        Some(other) => Err(format!("unexpected value {other}")),
    }
}

/// A timestamp cell in sheet format or RFC 3339. Blank cells are `None`.
fn cell_timestamp(cell: Option<&Value>) -> std::result::Result<Option<DateTime<Utc>>, String> {
    let Some(text) = cell_string(cell) else {
        return Ok(None);
    };
    if let Ok(naive) = NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT) {
        return Ok(Some(naive.and_utc()));
    }
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| format!("'{text}' is not a timestamp"))
}
