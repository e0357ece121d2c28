//! Ledger backend over a Google spreadsheet.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use faucet_core::{ReferralRecord, Task, Transaction, UserAccount, UserId};

use super::client::{SheetsClient, ValueRange};
use super::layout::{SheetLayout, FIRST_DATA_ROW};
use crate::error::Result;
use crate::ledger::ChangeSet;
use crate::retry::RetryPolicy;
use crate::LedgerBackend;

/// A ledger stored in four tabs of one spreadsheet.
///
/// The Sheets API offers neither transactions nor conditional writes. A
/// commit therefore reads the row positions it needs in one `batchGet` and
/// writes every staged row with explicit ranges in one `batchUpdate`. The
/// update is idempotent, so retrying it after an ambiguous failure rewrites
/// the same cells rather than appending duplicates.
pub struct SheetsBackend {
    client: SheetsClient,
    layout: SheetLayout,
    retry: RetryPolicy,
}

impl SheetsBackend {
    /// Create a backend.
    #[must_use]
    pub fn new(client: SheetsClient, layout: SheetLayout, retry: RetryPolicy) -> Self {
        Self {
            client,
            layout,
            retry,
        }
    }

    /// The layout in use.
    #[must_use]
    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    async fn read(&self, operation: &str, range: &str) -> Result<Vec<Vec<Value>>> {
        self.retry
            .run(operation, || self.client.get_values(range))
            .await
    }

    /// Rows of a range paired with their 1-based row numbers.
    fn numbered(rows: Vec<Vec<Value>>) -> impl Iterator<Item = (usize, Vec<Value>)> {
        rows.into_iter()
            .enumerate()
            .map(|(i, row)| (FIRST_DATA_ROW + i, row))
    }

    /// Build the ranges for a commit from the current key columns.
    fn plan_update(
        &self,
        changes: &ChangeSet,
        user_ids: &[Vec<Value>],
        transaction_keys: &[Vec<Value>],
        referral_keys: &[Vec<Value>],
    ) -> Vec<ValueRange> {
        let mut existing: HashMap<String, usize> = HashMap::new();
        for (row, cells) in Self::numbered(user_ids.to_vec()) {
            if let Some(id) = SheetLayout::key_cell(&cells) {
                existing.entry(id).or_insert(row);
            }
        }

        let mut data = Vec::new();
        let mut next_user_row = FIRST_DATA_ROW + user_ids.len();
        for account in &changes.accounts {
            let row = if let Some(row) = existing.get(account.user_id.as_str()) {
                *row
            } else {
                let row = next_user_row;
                next_user_row += 1;
                row
            };
            data.push(ValueRange::new(
                self.layout.user_row_range(row),
                vec![self.layout.account_to_row(account)],
            ));
        }

        if !changes.transactions.is_empty() {
            let first = FIRST_DATA_ROW + transaction_keys.len();
            data.push(ValueRange::new(
                self.layout
                    .transaction_rows_range(first, changes.transactions.len()),
                changes
                    .transactions
                    .iter()
                    .map(|tx| self.layout.transaction_to_row(tx))
                    .collect(),
            ));
        }

        if !changes.referrals.is_empty() {
            let first = FIRST_DATA_ROW + referral_keys.len();
            data.push(ValueRange::new(
                self.layout
                    .referral_rows_range(first, changes.referrals.len()),
                changes
                    .referrals
                    .iter()
                    .map(|r| self.layout.referral_to_row(r))
                    .collect(),
            ));
        }

        data
    }
}

#[async_trait]
impl LedgerBackend for SheetsBackend {
    fn name(&self) -> &'static str {
        "sheets"
    }

    async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        let rows = self.read("get_account", &self.layout.users_range()).await?;
        for (row_number, row) in Self::numbered(rows) {
            if self.layout.user_id_cell(&row).as_deref() == Some(user_id.as_str()) {
                return self.layout.account_from_row(row_number, &row);
            }
        }
        Ok(None)
    }

    async fn list_accounts(&self) -> Result<Vec<UserAccount>> {
        let rows = self.read("list_accounts", &self.layout.users_range()).await?;
        let mut accounts = Vec::with_capacity(rows.len());
        for (row_number, row) in Self::numbered(rows) {
            match self.layout.account_from_row(row_number, &row) {
                Ok(Some(account)) => accounts.push(account),
                Ok(None) => {}
                // One bad hand-edited row should not hide everyone else.
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable users row"),
            }
        }
        Ok(accounts)
    }

    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        let rows = self
            .read("list_transactions", &self.layout.transactions_range())
            .await?;
        let mut transactions = Vec::new();
        for (row_number, row) in Self::numbered(rows) {
            if SheetLayout::key_cell(&row).as_deref() != Some(user_id.as_str()) {
                continue;
            }
            if let Some(tx) = self.layout.transaction_from_row(row_number, &row)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    async fn list_referrals(&self, referrer_id: &UserId) -> Result<Vec<ReferralRecord>> {
        let rows = self
            .read("list_referrals", &self.layout.referrals_range())
            .await?;
        let mut referrals = Vec::new();
        for (row_number, row) in Self::numbered(rows) {
            if SheetLayout::key_cell(&row).as_deref() != Some(referrer_id.as_str()) {
                continue;
            }
            if let Some(record) = self.layout.referral_from_row(row_number, &row)? {
                referrals.push(record);
            }
        }
        Ok(referrals)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows = self.read("list_tasks", &self.layout.tasks_range()).await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for (row_number, row) in Self::numbered(rows) {
            if let Some(task) = self.layout.task_from_row(row_number, &row)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn apply(&self, changes: &ChangeSet) -> Result<()> {
        let ranges = vec![
            self.layout.user_id_column_range(),
            self.layout.transactions_key_range(),
            self.layout.referrals_key_range(),
        ];
        let mut columns = self
            .retry
            .run("apply.locate", || self.client.batch_get(&ranges))
            .await?
            .into_iter();
        let user_ids = columns.next().unwrap_or_default();
        let transaction_keys = columns.next().unwrap_or_default();
        let referral_keys = columns.next().unwrap_or_default();

        let data = self.plan_update(changes, &user_ids, &transaction_keys, &referral_keys);

        let result = self
            .retry
            .run("apply.write", || self.client.batch_update(&data))
            .await;

        if let Err(e) = &result {
            // The last attempt may have landed before the connection failed.
            tracing::error!(
                spreadsheet_id = %self.client.spreadsheet_id(),
                ranges = ?data.iter().map(|d| d.range.as_str()).collect::<Vec<_>>(),
                error = %e,
                "Sheets commit failed, outcome unknown"
            );
        }
        result
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .get_values(&self.layout.users_header_range())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::sheets::SheetsCredentials;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn backend(server: &MockServer, layout: SheetLayout) -> SheetsBackend {
        let client = SheetsClient::with_base_url(
            &format!("{}/v4/", server.uri()),
            "ledger",
            SheetsCredentials::static_token("t"),
            Duration::from_secs(2),
        )
        .unwrap();
        let retry = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        SheetsBackend::new(client, layout, retry)
    }

    async fn mount_values(server: &MockServer, range: &str, values: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v4/spreadsheets/ledger/values/{range}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"range": range, "values": values})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn get_account_finds_row_by_user_id() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Users!A2:G",
            json!([
                ["7", "Bob", 5],
                ["42", "Alice", 120, "2024-03-01 12:00:00", "7", "ALICE", "2024-02-01 08:00:00"]
            ]),
        )
        .await;

        let backend = backend(&server, SheetLayout::canonical());
        let account = backend.get_account(&uid("42")).await.unwrap().unwrap();
        assert_eq!(account.balance, 120);
        assert_eq!(account.referrer_id, Some(uid("7")));
        assert_eq!(
            account.last_claim_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert!(backend.get_account(&uid("99")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn legacy_layout_locates_users_by_column_c() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Users!A2:G",
            json!([["", "Alice", "42", "55", "", "ALICE"]]),
        )
        .await;

        let backend = backend(&server, SheetLayout::legacy());
        let account = backend.get_account(&uid("42")).await.unwrap().unwrap();
        assert_eq!(account.balance, 55);
        assert_eq!(account.display_name, "Alice");
    }

    #[tokio::test]
    async fn transactions_are_filtered_by_user() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Transactions!A2:G",
            json!([
                ["42", 30, "claim", "2024-03-01 12:00:00", "", "", ""],
                ["7", 10, "claim", "2024-03-01 12:01:00"],
                ["42", 50, "task", "2024-03-01 12:02:00", "", "join"]
            ]),
        )
        .await;

        let backend = backend(&server, SheetLayout::canonical());
        let transactions = backend.list_transactions(&uid("42")).await.unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[1].reference.as_deref(), Some("join"));
    }

    #[tokio::test]
    async fn apply_updates_existing_rows_and_appends_logs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/ledger/values:batchGet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valueRanges": [
                    {"range": "Users!A2:A3", "values": [["7"], ["42"]]},
                    {"range": "Transactions!A2:A2", "values": [["7"]]},
                    {"range": "Referrals!A2:A"}
                ]
            })))
            .mount(&server)
            .await;

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut existing = UserAccount::new(uid("42"), at);
        existing.balance = 30;
        let newcomer = UserAccount::new(uid("99"), at);
        let tx = Transaction::claim(uid("42"), 30, at);
        let referral = ReferralRecord::registered(uid("42"), uid("99"), at);

        let layout = SheetLayout::canonical();
        let expected = json!({
            "valueInputOption": "RAW",
            "data": [
                {"range": "Users!A3:G3", "values": [layout.account_to_row(&existing)]},
                {"range": "Users!A4:G4", "values": [layout.account_to_row(&newcomer)]},
                {"range": "Transactions!A3:G3", "values": [layout.transaction_to_row(&tx)]},
                {"range": "Referrals!A2:D2", "values": [layout.referral_to_row(&referral)]}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/ledger/values:batchUpdate"))
            .and(body_json(expected))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let changes = ChangeSet {
            accounts: vec![existing, newcomer],
            transactions: vec![tx],
            referrals: vec![referral],
        };
        backend(&server, layout).apply(&changes).await.unwrap();
    }

    #[tokio::test]
    async fn apply_retries_then_reports_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/ledger/values:batchGet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valueRanges": [{"range": "Users!A2:A"}, {"range": "Transactions!A2:A"}, {"range": "Referrals!A2:A"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/ledger/values:batchUpdate"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let changes = ChangeSet {
            accounts: vec![UserAccount::new(uid("1"), Utc::now())],
            ..ChangeSet::default()
        };
        let err = backend(&server, SheetLayout::canonical())
            .apply(&changes)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn tasks_are_read_from_catalog() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Tasks!A2:C",
            json!([["join", "Join the channel", 50], [], ["follow", "Follow us", "25"]]),
        )
        .await;

        let tasks = backend(&server, SheetLayout::canonical())
            .list_tasks()
            .await
            .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].reward, 25);
    }
}
