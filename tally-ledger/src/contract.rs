use serde::{Deserialize, Serialize};

use tally_common::error::Result;
use tally_common::transaction::Transaction;

use crate::audit::AuditEventKind;
use crate::ledger::Ledger;

/// How contract gas is billed: the asset it is denominated in, the pool
/// account that collects it, and the price per gas unit in smallest units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasBillingConfig {
    pub gas_asset: String,
    pub pool_account: String,
    pub price_per_unit: i64,
}

/// Reporting surface consumed by an external contract execution engine.
///
/// The ledger does not interpret contract code, keep contract storage, or
/// schedule execution; it only records value-opaque counters and emits
/// ledger-facing events (plus a billing transaction when configured).
#[derive(Debug, Default)]
pub struct ContractHooks {
    billing: Option<GasBillingConfig>,
    gas_consumed: u64,
    executions: u64,
}

impl ContractHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_billing(billing: GasBillingConfig) -> Self {
        Self {
            billing: Some(billing),
            gas_consumed: 0,
            executions: 0,
        }
    }

    /// Total gas reported across every recorded execution.
    pub fn gas_consumed(&self) -> u64 {
        self.gas_consumed
    }

    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Records one contract execution.
    ///
    /// Always appends a `contract_executed` event to the ledger's proof
    /// chain. When billing is configured, also emits a transaction debiting
    /// the executing address and crediting the gas pool; the caller owns
    /// journaling the returned transaction.
    pub fn record_contract_execution(
        &mut self,
        ledger: &mut Ledger,
        address: &str,
        gas_used: u64,
        success: bool,
    ) -> Result<Option<Transaction>> {
        self.gas_consumed = self.gas_consumed.saturating_add(gas_used);
        self.executions += 1;
        ledger.proof_chain.record(
            AuditEventKind::ContractExecuted,
            format!("{}:gas={}:success={}", address, gas_used, success),
        );
        tracing::debug!(address, gas_used, success, "contract execution recorded");

        let billing = match &self.billing {
            Some(b) => b,
            None => return Ok(None),
        };
        let cost = (gas_used as i64).saturating_mul(billing.price_per_unit);
        if cost == 0 {
            return Ok(None);
        }

        let tx = Transaction::new(cost, &billing.gas_asset, address, &billing.pool_account)
            .with_memo("gas");
        ledger.process_transaction(&tx)?;
        Ok(Some(tx))
    }

    /// Records a contract state-root change as a `state_changed` event.
    pub fn record_state_change(&self, ledger: &mut Ledger, address: &str, state_hash: &str) {
        ledger.proof_chain.record(
            AuditEventKind::StateChanged,
            format!("{}:{}", address, state_hash),
        );
    }
}
