// src/exec/accounts.rs

use std::collections::BTreeMap;

use anyhow::Result;

use crate::backend::{Account, AccountDirectory, BoxFuture};
use crate::types::AccountId;

/// Account directory built once from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts {
    accounts: BTreeMap<AccountId, Account>,
}

impl StaticAccounts {
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountDirectory for StaticAccounts {
    fn find<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<Option<Account>>> {
        Box::pin(async move { Ok(self.accounts.get(account_id).cloned()) })
    }
}
