use crate::domain::identity::Company;
use crate::domain::ids::{CompanyId, SettlementId, TransactionId, UserId, VehicleId};
use crate::domain::ports::{
    ChangeSet, CommitView, CompanyStore, IdKind, SettlementStore, TransactionStore, UnitOfWork,
    VehicleStore, Write,
};
use crate::domain::settlement::Settlement;
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::domain::vehicle::Vehicle;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_COMPANIES: &str = "companies";
pub const CF_VEHICLES: &str = "vehicles";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_SETTLEMENTS: &str = "settlements";
/// Id counters.
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_COMPANIES,
    CF_VEHICLES,
    CF_TRANSACTIONS,
    CF_SETTLEMENTS,
    CF_META,
];

/// A persistent market store backed by RocksDB.
///
/// Each entity kind lives in its own column family, keyed by big-endian id
/// and stored as JSON. Commits are serialized through `commit_lock` and
/// written as one `WriteBatch`, so a change set lands completely or not at
/// all, including across a crash.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            MarketError::Storage(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, id: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn all_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        id: u64,
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    fn counter(&self, key: &str) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        match self.db.get_pinned_cf(cf, key.as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    MarketError::Storage(Box::new(std::io::Error::other(format!(
                        "corrupt counter {key}"
                    ))))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn counter_key(kind: IdKind) -> &'static str {
        match kind {
            IdKind::Vehicle => "next_vehicle",
            IdKind::Transaction => "next_transaction",
            IdKind::Settlement => "next_settlement",
        }
    }
}

impl CommitView for RocksDBStore {
    fn stored_version(&self, write: &Write) -> Result<Option<u64>> {
        Ok(match write {
            Write::Vehicle(v) => self
                .get_json::<Vehicle>(CF_VEHICLES, v.id.0)?
                .map(|v| v.version),
            Write::Transaction(t) => self
                .get_json::<Transaction>(CF_TRANSACTIONS, t.id.0)?
                .map(|t| t.version),
            Write::Settlement(s) => self
                .get_json::<Settlement>(CF_SETTLEMENTS, s.id.0)?
                .map(|s| s.version),
        })
    }

    fn vehicle_version(&self, id: VehicleId) -> Result<Option<u64>> {
        Ok(self
            .get_json::<Vehicle>(CF_VEHICLES, id.0)?
            .map(|v| v.version))
    }

    fn has_other_pending_request(&self, transaction: &Transaction) -> Result<bool> {
        Ok(self
            .all_json::<Transaction>(CF_TRANSACTIONS)?
            .iter()
            .any(|t| {
                t.id != transaction.id
                    && t.is_pending_request_of(transaction.buyer, transaction.vehicle)
            }))
    }

    fn stored_transaction_status(&self, id: TransactionId) -> Result<Option<TransactionStatus>> {
        Ok(self
            .get_json::<Transaction>(CF_TRANSACTIONS, id.0)?
            .map(|t| t.status))
    }

    fn has_settlement_for(&self, id: TransactionId) -> Result<bool> {
        Ok(self
            .all_json::<Settlement>(CF_SETTLEMENTS)?
            .iter()
            .any(|s| s.transaction == id))
    }
}

#[async_trait]
impl CompanyStore for RocksDBStore {
    async fn put_company(&self, company: Company) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_COMPANIES, company.id.0, &company)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>> {
        self.get_json(CF_COMPANIES, id.0)
    }
}

#[async_trait]
impl VehicleStore for RocksDBStore {
    async fn vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        self.get_json(CF_VEHICLES, id.0)
    }

    async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        self.all_json(CF_VEHICLES)
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.get_json(CF_TRANSACTIONS, id.0)
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.all_json(CF_TRANSACTIONS)
    }

    async fn has_pending_request(&self, buyer: UserId, vehicle: VehicleId) -> Result<bool> {
        Ok(self
            .all_json::<Transaction>(CF_TRANSACTIONS)?
            .iter()
            .any(|t| t.is_pending_request_of(buyer, vehicle)))
    }
}

#[async_trait]
impl SettlementStore for RocksDBStore {
    async fn settlement(&self, id: SettlementId) -> Result<Option<Settlement>> {
        self.get_json(CF_SETTLEMENTS, id.0)
    }

    async fn settlement_for_transaction(&self, id: TransactionId) -> Result<Option<Settlement>> {
        Ok(self
            .all_json::<Settlement>(CF_SETTLEMENTS)?
            .into_iter()
            .find(|s| s.transaction == id))
    }

    async fn settlements(&self) -> Result<Vec<Settlement>> {
        self.all_json(CF_SETTLEMENTS)
    }
}

#[async_trait]
impl UnitOfWork for RocksDBStore {
    async fn next_id(&self, kind: IdKind) -> Result<u64> {
        let _guard = self.commit_lock.lock().await;
        let key = Self::counter_key(kind);
        let next = self.counter(key)? + 1;
        self.db
            .put_cf(self.cf(CF_META)?, key.as_bytes(), next.to_be_bytes())?;
        Ok(next)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        changes.validate(self)?;

        let mut batch = WriteBatch::default();
        let mut vehicle_high_water = self.counter(Self::counter_key(IdKind::Vehicle))?;
        for write in changes.into_writes() {
            match write {
                Write::Vehicle(mut v) => {
                    v.version += 1;
                    vehicle_high_water = vehicle_high_water.max(v.id.0);
                    self.put_json(&mut batch, CF_VEHICLES, v.id.0, &v)?;
                }
                Write::Transaction(mut t) => {
                    t.version += 1;
                    self.put_json(&mut batch, CF_TRANSACTIONS, t.id.0, &t)?;
                }
                Write::Settlement(mut s) => {
                    s.version += 1;
                    self.put_json(&mut batch, CF_SETTLEMENTS, s.id.0, &s)?;
                }
            }
        }
        batch.put_cf(
            self.cf(CF_META)?,
            Self::counter_key(IdKind::Vehicle).as_bytes(),
            vehicle_high_water.to_be_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }
}
