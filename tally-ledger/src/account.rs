use std::fmt;

use serde::{Deserialize, Serialize};

use tally_common::error::{LedgerError, Result};
use tally_common::utils::time::current_time;

/// The five classes of accounts in the double-entry system.
///
/// The class determines the sign convention: a debit increases asset and
/// expense balances and decreases the rest; a credit is the inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Asset => write!(f, "asset"),
            AccountType::Liability => write!(f, "liability"),
            AccountType::Equity => write!(f, "equity"),
            AccountType::Revenue => write!(f, "revenue"),
            AccountType::Expense => write!(f, "expense"),
        }
    }
}

impl AccountType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asset" => Some(AccountType::Asset),
            "liability" => Some(AccountType::Liability),
            "equity" => Some(AccountType::Equity),
            "revenue" => Some(AccountType::Revenue),
            "expense" => Some(AccountType::Expense),
            _ => None,
        }
    }

    /// True when a debit grows this class of account.
    pub fn debit_increases(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// New balance after a debit of `amount`, refusing to wrap.
    pub fn debited(&self, balance: i64, amount: i64) -> Result<i64> {
        let next = if self.debit_increases() {
            balance.checked_add(amount)
        } else {
            balance.checked_sub(amount)
        };
        next.ok_or(LedgerError::Overflow)
    }

    /// New balance after a credit of `amount`, refusing to wrap.
    pub fn credited(&self, balance: i64, amount: i64) -> Result<i64> {
        let next = if self.debit_increases() {
            balance.checked_sub(amount)
        } else {
            balance.checked_add(amount)
        };
        next.ok_or(LedgerError::Overflow)
    }
}

/// A named holder of a balance for one asset.
///
/// `balance` is a signed integer in the asset's smallest unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    pub balance: i64,
    pub created_at: i64,
}

impl Account {
    pub fn new(name: &str, account_type: AccountType, currency: &str) -> Self {
        Self {
            name: name.to_string(),
            account_type,
            currency: currency.to_string(),
            balance: 0,
            created_at: current_time(),
        }
    }

    pub fn debit(&mut self, amount: i64) -> Result<()> {
        self.balance = self.account_type.debited(self.balance, amount)?;
        Ok(())
    }

    pub fn credit(&mut self, amount: i64) -> Result<()> {
        self.balance = self.account_type.credited(self.balance, amount)?;
        Ok(())
    }
}
