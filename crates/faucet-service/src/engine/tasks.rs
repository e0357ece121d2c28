//! One-off tasks from the catalog.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use faucet_core::{FaucetError, Result, Transaction, TransactionKind, UserId};

use super::ClaimEngine;

/// A catalog task as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    /// Task name (unique key).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Points paid on completion.
    pub reward: i64,
    /// Whether the user has already been paid for it.
    pub completed: bool,
}

/// A completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCompletion {
    /// Task name.
    pub task_name: String,
    /// Points credited.
    pub reward: i64,
    /// Balance after the reward.
    pub new_balance: i64,
}

fn completed_tasks(transactions: &[Transaction]) -> HashSet<&str> {
    transactions
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Task)
        .filter_map(|tx| tx.reference.as_deref())
        .collect()
}

impl ClaimEngine {
    /// The task catalog, with completion flags when a user is given.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the ledger cannot be read.
    pub async fn list_tasks(&self, user_id: Option<&UserId>) -> Result<Vec<TaskStatus>> {
        let tasks = self.ledger.list_tasks().await?;
        let transactions = match user_id {
            Some(user_id) => self.ledger.list_transactions(user_id).await?,
            None => Vec::new(),
        };
        let done = completed_tasks(&transactions);

        Ok(tasks
            .into_iter()
            .map(|task| TaskStatus {
                completed: done.contains(task.name.as_str()),
                name: task.name,
                description: task.description,
                reward: task.reward,
            })
            .collect())
    }

    /// Pay the reward of `task_name` to `user_id`, once per user.
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if the catalog has no such task
    /// - `AccountNotFound` if the user has never been seen
    /// - `TaskAlreadyCompleted` if the reward was already paid
    /// - `StorageUnavailable` if the ledger fails
    pub async fn complete_task(
        &self,
        user_id: &UserId,
        task_name: &str,
        now: DateTime<Utc>,
    ) -> Result<TaskCompletion> {
        let task_name = task_name.trim();
        let mut session = self.ledger.begin().await;

        let task = session
            .tasks()
            .await?
            .into_iter()
            .find(|t| t.name == task_name)
            .ok_or_else(|| FaucetError::TaskNotFound {
                name: task_name.to_string(),
            })?;

        let mut account =
            session
                .account(user_id)
                .await?
                .ok_or_else(|| FaucetError::AccountNotFound {
                    user_id: user_id.to_string(),
                })?;

        if completed_tasks(&session.transactions(user_id).await?).contains(task.name.as_str()) {
            return Err(FaucetError::TaskAlreadyCompleted {
                name: task.name,
                user_id: user_id.to_string(),
            });
        }

        account.balance = account.balance.saturating_add(task.reward);
        let new_balance = account.balance;
        session.put_account(account);
        session.append_transaction(Transaction::task(
            user_id.clone(),
            &task.name,
            task.reward,
            now,
        ));
        session.commit().await?;

        tracing::info!(
            user_id = %user_id,
            task = %task.name,
            reward = %task.reward,
            new_balance = %new_balance,
            "Task completed"
        );

        Ok(TaskCompletion {
            task_name: task.name,
            reward: task.reward,
            new_balance,
        })
    }
}
