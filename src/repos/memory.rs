use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::{
    bookkeeping::domain::{Resource, ResourceId, UserId},
    pagination::{self, PageOptions, PageResult},
};

use super::{ResourceFilter, ResourceRepo};

/// A store that keeps resources in memory, in insertion order.
#[derive(Debug)]
pub struct MemoryRepo<R> {
    records: RwLock<Vec<R>>,
}

impl<R> Default for MemoryRepo<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(vec![]),
        }
    }
}

#[async_trait]
impl<R: Resource> ResourceRepo<R> for MemoryRepo<R> {
    async fn insert(&self, resource: &R) -> anyhow::Result<()> {
        trace!(resource = R::NAME, id = %resource.id(), "Storing resource in memory.");

        self.records.write().await.push(resource.clone());

        Ok(())
    }

    async fn find_by_id(&self, id: ResourceId) -> anyhow::Result<Option<R>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|record| record.id() == id)
            .cloned())
    }

    async fn find_many(&self, owner: &UserId, ids: &[ResourceId]) -> anyhow::Result<Vec<R>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.owner() == Some(owner) && ids.contains(&record.id()))
            .cloned()
            .collect())
    }

    async fn query(
        &self,
        filter: &ResourceFilter,
        options: &PageOptions,
    ) -> anyhow::Result<PageResult<R>> {
        let matching = self
            .records
            .read()
            .await
            .iter()
            .filter(|record| filter.matches(*record))
            .cloned()
            .collect::<Vec<_>>();

        Ok(pagination::paginate(matching, options))
    }

    async fn save(&self, resource: &R) -> anyhow::Result<bool> {
        let mut records = self.records.write().await;

        match records.iter_mut().find(|record| record.id() == resource.id()) {
            Some(record) => {
                *record = resource.clone();

                Ok(true)
            }
            None => {
                debug!(
                    resource = R::NAME,
                    id = %resource.id(),
                    "Resource was removed before it could be saved."
                );

                Ok(false)
            }
        }
    }

    async fn remove(&self, id: ResourceId) -> anyhow::Result<()> {
        self.records.write().await.retain(|record| record.id() != id);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::bookkeeping::domain::{
        accounts::{AccountPatch, NewAccount},
        Account, AccountType, Constraint, FieldValue,
    };
    use crate::bookkeeping::services::ResourceError;

    use super::*;

    fn account(owner: &str, name: &str) -> Account {
        Account::from_new(
            ResourceId::new(),
            UserId::from(owner),
            NewAccount {
                name: name.to_owned(),
                account_type: AccountType::Cash,
                is_default: false,
            },
        )
    }

    #[tokio::test]
    async fn query_only_returns_owned_matches() {
        let repo = MemoryRepo::default();
        repo.insert(&account("user-a", "Wallet")).await.unwrap();
        repo.insert(&account("user-a", "Jar")).await.unwrap();
        repo.insert(&account("user-b", "Wallet")).await.unwrap();

        let filter = ResourceFilter::owned_by(UserId::from("user-a")).with_constraints(vec![
            Constraint::new("name", FieldValue::Text("Wallet".to_owned())),
        ]);
        let page = repo.query(&filter, &PageOptions::default()).await.unwrap();

        assert_eq!(1, page.total_results);
        assert_eq!(Some(&UserId::from("user-a")), page.results[0].owner());
    }

    #[tokio::test]
    async fn find_many_skips_other_owners() {
        let repo = MemoryRepo::default();
        let mine = account("user-a", "Wallet");
        let theirs = account("user-b", "Wallet");
        repo.insert(&mine).await.unwrap();
        repo.insert(&theirs).await.unwrap();

        let found = repo
            .find_many(&UserId::from("user-a"), &[mine.id, theirs.id])
            .await
            .unwrap();

        assert_eq!(vec![mine], found);
    }

    #[tokio::test]
    async fn create_rejects_invalid_resource() {
        let repo = MemoryRepo::default();

        let error = repo
            .create(account("user-a", ""))
            .await
            .expect_err("blank name");

        assert!(matches!(error, ResourceError::Validation(_)));
        assert_eq!(
            0,
            repo.query(
                &ResourceFilter::owned_by(UserId::from("user-a")),
                &PageOptions::default()
            )
            .await
            .unwrap()
            .total_results
        );
    }

    #[tokio::test]
    async fn update_and_delete() {
        let repo = MemoryRepo::default();
        let created = repo.create(account("user-a", "Wallet")).await.unwrap();

        let updated = repo
            .update(
                created.clone(),
                AccountPatch {
                    is_default: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.is_default);
        assert_eq!(Some(updated.clone()), repo.find_by_id(created.id).await.unwrap());

        repo.delete(&updated).await.unwrap();

        assert_eq!(None, repo.find_by_id(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_after_removal_is_not_found() {
        let repo = MemoryRepo::default();
        let created = repo.create(account("user-a", "Wallet")).await.unwrap();
        repo.remove(created.id).await.unwrap();

        assert!(!repo.save(&created).await.unwrap());

        let error = repo
            .update(
                created.clone(),
                AccountPatch {
                    name: Some("Jar".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("removed");

        assert!(matches!(error, ResourceError::NotFound("Account")));
        assert_eq!(None, repo.find_by_id(created.id).await.unwrap());
    }
}
