//! Transaction control on [`Database`].
//!
//! There is no nesting: `transaction()` inside an open transaction simply
//! runs its callback as part of the outer one, and `begin_transaction()` while
//! one is open is an error.
//!
//! # Example
//!
//! ```ignore
//! use dbkit::{record, DbResult};
//!
//! db.transaction(async |db| {
//!     db.update("accounts", &record! { "balance" => 50 }, &record! { "id" => 1 }).await?;
//!     db.update("accounts", &record! { "balance" => 150 }, &record! { "id" => 2 }).await?;
//!     Ok(())
//! })
//! .await?;
//! ```

use crate::database::Database;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::event::Event;

impl<D: Driver> Database<D> {
    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Open a transaction.
    pub async fn begin_transaction(&mut self) -> DbResult<()> {
        if self.in_transaction {
            return Err(DbError::transaction("A transaction is already active"));
        }
        match self.driver_mut().begin().await {
            Ok(()) => {
                self.in_transaction = true;
                self.notify(Event::TransactionBegin, |p| p);
                Ok(())
            }
            Err(err) => Err(self.tx_failed(err)),
        }
    }

    /// Commit the open transaction.
    ///
    /// On failure the transaction stays open so the caller can roll back.
    pub async fn commit(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            return Err(DbError::transaction("No active transaction to commit"));
        }
        match self.driver_mut().commit().await {
            Ok(()) => {
                self.in_transaction = false;
                self.notify(Event::TransactionCommit, |p| p);
                Ok(())
            }
            Err(err) => Err(self.tx_failed(err)),
        }
    }

    /// Roll back the open transaction.
    ///
    /// The transaction is considered closed afterwards, even if the rollback
    /// itself failed.
    pub async fn rollback(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            return Err(DbError::transaction("No active transaction to roll back"));
        }
        let result = self.driver_mut().rollback().await;
        self.in_transaction = false;
        match result {
            Ok(()) => {
                self.notify(Event::TransactionRollback, |p| p);
                Ok(())
            }
            Err(err) => Err(self.tx_failed(err)),
        }
    }

    fn tx_failed(&self, err: DbError) -> DbError {
        self.notify(Event::Error, |p| p.with_error(err.to_string()));
        err
    }

    /// Run `f` inside a transaction.
    ///
    /// - Commits when `f` returns `Ok`.
    /// - Rolls back when `f` returns `Err` and returns that error; a failed
    ///   rollback is logged, never surfaced in its place.
    /// - Inside an already open transaction `f` runs as part of it and
    ///   nothing is committed or rolled back here.
    pub async fn transaction<T, F>(&mut self, f: F) -> DbResult<T>
    where
        F: AsyncFnOnce(&mut Self) -> DbResult<T>,
    {
        if self.in_transaction {
            return f(self).await;
        }

        self.begin_transaction().await?;
        match f(self).await {
            Ok(value) => match self.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    self.rollback_quietly(&commit_err).await;
                    Err(commit_err)
                }
            },
            Err(err) => {
                self.rollback_quietly(&err).await;
                Err(err)
            }
        }
    }

    async fn rollback_quietly(&mut self, cause: &DbError) {
        if !self.in_transaction {
            return;
        }
        if let Err(rollback_err) = self.rollback().await {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                target: "dbkit.tx",
                error = %rollback_err,
                debug = rollback_err.debug_info(),
                cause = %cause,
                "rollback failed"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = (rollback_err, cause);
        }
    }
}
