use crate::domain::ports::{MarketStore, SettlementStore, TransactionStore, VehicleStore};
use crate::domain::settlement::SettlementStatus;
use crate::domain::transaction::TransactionStatus;
use crate::domain::vehicle::VehicleStatus;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-status counts for the admin dashboard. Every status is present, with
/// zero when nothing is in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketStats {
    pub vehicles: BTreeMap<&'static str, usize>,
    pub transactions: BTreeMap<&'static str, usize>,
    pub settlements: BTreeMap<&'static str, usize>,
}

impl MarketStats {
    pub async fn collect(store: &dyn MarketStore) -> Result<Self> {
        let mut vehicles: BTreeMap<_, _> =
            VehicleStatus::ALL.iter().map(|s| (s.label(), 0)).collect();
        for v in store.vehicles().await? {
            *vehicles.entry(v.status.label()).or_default() += 1;
        }

        let mut transactions: BTreeMap<_, _> =
            TransactionStatus::ALL.iter().map(|s| (s.label(), 0)).collect();
        for t in store.transactions().await? {
            *transactions.entry(t.status.label()).or_default() += 1;
        }

        let mut settlements: BTreeMap<_, _> =
            SettlementStatus::ALL.iter().map(|s| (s.label(), 0)).collect();
        for s in store.settlements().await? {
            *settlements.entry(s.status.label()).or_default() += 1;
        }

        Ok(Self {
            vehicles,
            transactions,
            settlements,
        })
    }
}
