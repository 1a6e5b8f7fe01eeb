use crate::domain::identity::{Actor, Company};
use crate::domain::ids::UserId;
use crate::domain::ports::{ChangeSet, CompanyStore, MarketStore, UnitOfWork, VehicleStore};
use crate::domain::vehicle::Vehicle;
use crate::error::{MarketError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

/// Initial marketplace contents: companies, resolved user identities and
/// listings. Stands in for the identity and listing services when running
/// the engine from the command line.
#[derive(Debug, Deserialize, Default)]
pub struct Seed {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub users: Vec<Actor>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(skip)]
    currency_scale: u32,
}

impl Seed {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Decimal places a seeded listing price may carry.
    pub fn with_currency_scale(mut self, scale: u32) -> Self {
        self.currency_scale = scale;
        self
    }

    /// Writes companies and listings into `store` and returns the user
    /// directory. Listings already in the store are left untouched, so a
    /// persistent store can be re-seeded.
    pub async fn apply(self, store: &dyn MarketStore) -> Result<Directory> {
        for company in self.companies {
            store.put_company(company).await?;
        }
        for mut vehicle in self.vehicles {
            if store.vehicle(vehicle.id).await?.is_some() {
                continue;
            }
            if store.company(vehicle.company).await?.is_none() {
                return Err(MarketError::not_found("company", vehicle.company));
            }
            vehicle.price.ensure_scale(self.currency_scale)?;
            vehicle.version = 0;
            store.commit(ChangeSet::new().with_vehicle(vehicle)).await?;
        }
        Ok(Directory::new(self.users))
    }
}

/// Resolves user ids to the identities the engine trusts.
#[derive(Debug, Default, Clone)]
pub struct Directory {
    users: HashMap<UserId, Actor>,
}

impl Directory {
    pub fn new(users: impl IntoIterator<Item = Actor>) -> Self {
        Self {
            users: users.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    pub fn resolve(&self, id: UserId) -> Result<Actor> {
        self.users
            .get(&id)
            .copied()
            .ok_or_else(|| MarketError::not_found("user", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Role;
    use crate::domain::ids::{CompanyId, VehicleId};
    use crate::domain::vehicle::VehicleStatus;
    use crate::infrastructure::in_memory::InMemoryMarketStore;

    const SEED: &str = r#"{
        "companies": [{ "id": 1, "owner": 100 }],
        "users": [
            { "id": 100, "role": "company_owner", "company": 1 },
            { "id": 200, "role": "customer" }
        ],
        "vehicles": [
            { "id": 1, "company": 1, "registered_by": 101, "model": "Grandeur",
              "price": "20000000", "status": "on_sale" }
        ]
    }"#;

    #[tokio::test]
    async fn test_seed_populates_store() {
        let store = InMemoryMarketStore::new();
        let seed = Seed::from_reader(SEED.as_bytes()).unwrap();
        let directory = seed.apply(&store).await.unwrap();

        assert!(store.company(CompanyId(1)).await.unwrap().is_some());
        let vehicle = store.vehicle(VehicleId(1)).await.unwrap().unwrap();
        assert_eq!(vehicle.status, VehicleStatus::OnSale);
        assert_eq!(vehicle.version, 1);

        assert_eq!(directory.resolve(UserId(200)).unwrap().role, Role::Customer);
        assert!(matches!(
            directory.resolve(UserId(999)),
            Err(MarketError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_seed_rejects_unknown_company() {
        let seed = Seed::from_reader(
            r#"{ "vehicles": [{ "id": 1, "company": 9, "registered_by": 1,
                 "model": "Morning", "price": "1", "status": "pending" }] }"#
                .as_bytes(),
        )
        .unwrap();
        let result = seed.apply(&InMemoryMarketStore::new()).await;
        assert!(matches!(result, Err(MarketError::NotFound { entity: "company", .. })));
    }

    #[tokio::test]
    async fn test_reseed_keeps_existing_listings() {
        let store = InMemoryMarketStore::new();
        Seed::from_reader(SEED.as_bytes())
            .unwrap()
            .apply(&store)
            .await
            .unwrap();
        Seed::from_reader(SEED.as_bytes())
            .unwrap()
            .apply(&store)
            .await
            .unwrap();
        let vehicle = store.vehicle(VehicleId(1)).await.unwrap().unwrap();
        assert_eq!(vehicle.version, 1);
    }

    #[tokio::test]
    async fn test_seed_rejects_price_finer_than_currency() {
        let store = InMemoryMarketStore::new();
        let seed = Seed::from_reader(
            r#"{ "companies": [{ "id": 1, "owner": 100 }],
                 "vehicles": [{ "id": 1, "company": 1, "registered_by": 100,
                 "model": "Ray", "price": "9000000.5", "status": "on_sale" }] }"#
                .as_bytes(),
        )
        .unwrap();
        let result = seed.apply(&store).await;
        assert!(matches!(result, Err(MarketError::Validation(_))));
        assert!(store.vehicle(VehicleId(1)).await.unwrap().is_none());

        let seed = Seed::from_reader(
            r#"{ "vehicles": [{ "id": 1, "company": 1, "registered_by": 100,
                 "model": "Ray", "price": "9000000.5", "status": "on_sale" }] }"#
                .as_bytes(),
        )
        .unwrap()
        .with_currency_scale(2);
        seed.apply(&store).await.unwrap();
        let vehicle = store.vehicle(VehicleId(1)).await.unwrap().unwrap();
        assert_eq!(vehicle.price.to_string(), "9000000.5");
    }
}
