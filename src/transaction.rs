use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::error::AppResult;

/// A database transaction carrying side effects that run only once it has
/// committed. Dropping or rolling back discards the queued effects unrun.
pub struct Transaction {
    txn: DatabaseTransaction,
    on_commit: Vec<BoxFuture<'static, ()>>,
}

impl Transaction {
    pub async fn begin(db: &DatabaseConnection) -> AppResult<Self> {
        Ok(Self { txn: db.begin().await?, on_commit: Vec::new() })
    }

    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub fn on_commit<F>(&mut self, effect: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.on_commit.push(effect.boxed());
    }

    pub fn pending_effects(&self) -> usize {
        self.on_commit.len()
    }

    pub async fn commit(self) -> AppResult<()> {
        let Self { txn, on_commit } = self;
        txn.commit().await?;
        for effect in on_commit {
            effect.await;
        }
        Ok(())
    }

    pub async fn rollback(self) -> AppResult<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
