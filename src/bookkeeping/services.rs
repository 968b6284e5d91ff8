use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, info};
use validator::{Validate, ValidationErrors};

use crate::{
    pagination::{InvalidSort, PageOptions, PageQuery, PageResult},
    repos::{DynRepo, RepoFor, Repositories, ResourceFilter, ResourceRepo},
};

use super::{
    domain::{InvalidIdError, ReferenceKind, ReferencedId, Resource, ResourceId, UserId},
    ownership::{authorize, Access},
    populate::Populate,
};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    InvalidId(#[from] InvalidIdError),

    #[error("{field} references an unknown resource: {id}")]
    InvalidReference { field: &'static str, id: ResourceId },

    #[error(transparent)]
    InvalidSort(#[from] InvalidSort),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("access to the resource is forbidden")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// The CRUD operations for a single resource type.
///
/// The requester is passed explicitly to every operation that needs it.
/// Operations that act on an existing resource expect it to have been loaded
/// through [`ResourceService::load_authorized`].
#[derive(Clone)]
pub struct ResourceService<R: Resource> {
    repo: DynRepo<R>,
    repos: Repositories,
}

impl<R: Populate> ResourceService<R> {
    pub fn new(repos: Repositories) -> Self
    where
        Repositories: RepoFor<R>,
    {
        Self {
            repo: repos.repo(),
            repos,
        }
    }

    pub async fn create(&self, new: R::New, owner: &UserId) -> Result<R, ResourceError> {
        new.validate()?;

        let resource = R::from_new(ResourceId::new(), owner.clone(), new);
        self.check_references(owner, resource.references()).await?;

        let resource = self.repo.create(resource).await?;
        info!(resource = R::NAME, id = %resource.id(), user_id = %owner, "Created resource.");

        Ok(resource)
    }

    /// List a page of the owner's resources, with the resource's default
    /// relations populated.
    pub async fn list(
        &self,
        filter: R::Filter,
        query: PageQuery,
        owner: &UserId,
    ) -> Result<PageResult<R>, ResourceError> {
        filter.validate()?;

        let options =
            PageOptions::from_query(query, R::SORTABLE)?.with_populate(R::default_populate());
        let filter = ResourceFilter::owned_by(owner.clone()).with_constraints(filter.into());

        let mut page = self.repo.query(&filter, &options).await?;
        R::populate(&mut page.results, &options.populate, &self.repos, owner).await?;

        debug!(
            resource = R::NAME,
            user_id = %owner,
            total = page.total_results,
            "Listed resources."
        );

        Ok(page)
    }

    /// Look up a resource by a client provided ID, without any access check.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<R>, ResourceError> {
        let id = ResourceId::parse(id)?;

        Ok(self.repo.find_by_id(id).await?)
    }

    /// Look up a resource and make sure the requester is allowed to act on
    /// it.
    pub async fn load_authorized(&self, id: &str, requester: &UserId) -> Result<R, ResourceError> {
        let resource = self.get_by_id(id).await?;

        match authorize(resource.as_ref(), requester) {
            Access::Allow => resource.ok_or(ResourceError::NotFound(R::NAME)),
            Access::NotFound => Err(ResourceError::NotFound(R::NAME)),
            Access::Forbidden => {
                info!(resource = R::NAME, %id, user_id = %requester, "Denied access to resource.");

                Err(ResourceError::Forbidden)
            }
        }
    }

    pub async fn update(&self, resource: R, patch: R::Patch) -> Result<R, ResourceError> {
        patch.validate()?;

        let mut candidate = resource.clone();
        candidate.apply_patch(patch.clone());

        // Only references introduced by the patch need checking.
        let existing = resource
            .references()
            .into_iter()
            .map(|r| r.id)
            .collect::<HashSet<_>>();
        let introduced = candidate
            .references()
            .into_iter()
            .filter(|r| !existing.contains(&r.id))
            .collect::<Vec<_>>();

        if let Some(owner) = resource.owner() {
            self.check_references(owner, introduced).await?;
        }

        let updated = self.repo.update(resource, patch).await?;
        info!(resource = R::NAME, id = %updated.id(), "Updated resource.");

        Ok(updated)
    }

    pub async fn delete(&self, resource: R) -> Result<(), ResourceError> {
        self.repo.delete(&resource).await?;
        info!(resource = R::NAME, id = %resource.id(), "Deleted resource.");

        Ok(())
    }

    /// Make sure every reference points at an existing resource of the same
    /// owner.
    async fn check_references(
        &self,
        owner: &UserId,
        references: Vec<ReferencedId>,
    ) -> Result<(), ResourceError> {
        let mut by_kind: HashMap<ReferenceKind, Vec<ResourceId>> = HashMap::new();
        for reference in &references {
            by_kind.entry(reference.kind).or_default().push(reference.id);
        }

        let mut known = HashSet::new();
        for (kind, ids) in by_kind {
            let found = match kind {
                ReferenceKind::Account => existing_ids(&self.repos.accounts, owner, &ids).await?,
                ReferenceKind::LineItemCategory => {
                    existing_ids(&self.repos.line_item_categories, owner, &ids).await?
                }
                ReferenceKind::Shop => existing_ids(&self.repos.shops, owner, &ids).await?,
                ReferenceKind::ShopType => {
                    existing_ids(&self.repos.shop_types, owner, &ids).await?
                }
            };

            known.extend(found.into_iter().map(|id| (kind, id)));
        }

        match references
            .into_iter()
            .find(|r| !known.contains(&(r.kind, r.id)))
        {
            Some(missing) => {
                debug!(field = missing.field, id = %missing.id, "Rejected unknown reference.");

                Err(ResourceError::InvalidReference {
                    field: missing.field,
                    id: missing.id,
                })
            }
            None => Ok(()),
        }
    }
}

async fn existing_ids<T: Resource>(
    repo: &DynRepo<T>,
    owner: &UserId,
    ids: &[ResourceId],
) -> anyhow::Result<Vec<ResourceId>> {
    Ok(repo
        .find_many(owner, ids)
        .await?
        .iter()
        .map(T::id)
        .collect())
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use serde_json::json;

    use crate::bookkeeping::domain::{
        accounts::{AccountFilter, AccountPatch, NewAccount},
        balances::{BalanceFilter, NewBalance},
        goals::GoalPatch,
        line_containers::LineContainerFilter,
        line_item_categories::NewLineItemCategory,
        shop_types::NewShopType,
        shops::NewShop,
        Account, AccountType, Balance, Goal, LineContainer, LineItemCategory, Shop, ShopType,
    };

    use super::*;

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    fn service<R: Populate>(repos: &Repositories) -> ResourceService<R>
    where
        Repositories: RepoFor<R>,
    {
        ResourceService::new(repos.clone())
    }

    async fn create_account(repos: &Repositories, owner: &str, name: &str) -> Account {
        service::<Account>(repos)
            .create(
                NewAccount {
                    name: name.to_owned(),
                    account_type: AccountType::Bank,
                    is_default: true,
                },
                &user(owner),
            )
            .await
            .expect("valid account")
    }

    fn new_balance(account: ResourceId, amount: serde_json::Value) -> NewBalance {
        serde_json::from_value(json!({
            "month": 5,
            "year": 2020,
            "account": account.to_string(),
            "amount": amount,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn account_scenario() {
        let repos = Repositories::in_memory();
        let accounts = service::<Account>(&repos);

        let created = create_account(&repos, "user-a", "Checking").await;
        let rendered = serde_json::to_value(&created).unwrap();

        assert_eq!(json!("Checking"), rendered["name"]);
        assert_eq!(json!("Bank"), rendered["accountType"]);
        assert_eq!(json!(true), rendered["isDefault"]);
        assert!(rendered.get("user").is_none());
        assert!(rendered.get("owner").is_none());

        let page = accounts
            .list(AccountFilter::default(), PageQuery::default(), &user("user-a"))
            .await
            .unwrap();
        assert_eq!(vec![created.clone()], page.results);

        let other = accounts
            .list(AccountFilter::default(), PageQuery::default(), &user("user-b"))
            .await
            .unwrap();
        assert!(other.results.is_empty());
        assert_eq!(0, other.total_results);
    }

    #[tokio::test]
    async fn balance_scenario() {
        let repos = Repositories::in_memory();
        let account = create_account(&repos, "user-a", "Checking").await;
        let balances = service::<Balance>(&repos);

        let created = balances
            .create(new_balance(account.id, json!(3000)), &user("user-a"))
            .await
            .unwrap();
        assert_eq!(json!(3000), serde_json::to_value(&created).unwrap()["amount"]);

        let page = balances
            .list(
                BalanceFilter {
                    month: 5,
                    year: 2020,
                    account: None,
                },
                PageQuery::default(),
                &user("user-a"),
            )
            .await
            .unwrap();
        let rendered = serde_json::to_value(&page).unwrap();

        assert_eq!(json!(1), rendered["totalResults"]);
        assert_eq!(json!(3000), rendered["results"][0]["amount"]);
        assert_eq!(json!("Checking"), rendered["results"][0]["account"]["name"]);
    }

    #[tokio::test]
    async fn ownership_isolation() {
        let repos = Repositories::in_memory();
        let accounts = service::<Account>(&repos);
        let created = create_account(&repos, "user-a", "Checking").await;
        let id = created.id.to_string();

        let error = accounts
            .load_authorized(&id, &user("user-b"))
            .await
            .expect_err("other users are forbidden");
        assert!(matches!(error, ResourceError::Forbidden));

        assert_eq!(
            created,
            accounts.load_authorized(&id, &user("user-a")).await.unwrap()
        );
    }

    #[tokio::test]
    async fn existence_precedes_ownership() {
        let repos = Repositories::in_memory();
        let accounts = service::<Account>(&repos);
        let missing = ResourceId::new().to_string();

        for requester in ["user-a", "user-b"] {
            let error = accounts
                .load_authorized(&missing, &user(requester))
                .await
                .expect_err("missing resource");

            assert!(matches!(error, ResourceError::NotFound("Account")));
        }
    }

    #[tokio::test]
    async fn malformed_id_is_rejected_before_lookup() {
        let repos = Repositories::in_memory();

        let error = service::<Account>(&repos)
            .get_by_id("5ebac534954b54139806c112")
            .await
            .expect_err("malformed id");

        assert!(matches!(error, ResourceError::InvalidId(_)));
    }

    #[tokio::test]
    async fn forbidden_update_causes_no_mutation() {
        let repos = Repositories::in_memory();
        let accounts = service::<Account>(&repos);
        let created = create_account(&repos, "user-a", "Checking").await;
        let id = created.id.to_string();

        let result = accounts.load_authorized(&id, &user("user-b")).await;
        assert!(matches!(result, Err(ResourceError::Forbidden)));

        assert_eq!(Some(created), accounts.get_by_id(&id).await.unwrap());
    }

    #[tokio::test]
    async fn update_merges_patch() {
        let repos = Repositories::in_memory();
        let accounts = service::<Account>(&repos);
        let created = create_account(&repos, "user-a", "Checking").await;

        let updated = accounts
            .update(
                created.clone(),
                AccountPatch {
                    name: Some("Main".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(created.owner, updated.owner);
        assert_eq!("Main", updated.name);
        assert_eq!(
            Some(updated),
            accounts.get_by_id(&created.id.to_string()).await.unwrap()
        );
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let repos = Repositories::in_memory();
        let created = create_account(&repos, "user-a", "Checking").await;

        let error = service::<Account>(&repos)
            .update(created, AccountPatch::default())
            .await
            .expect_err("nothing to change");

        assert!(matches!(error, ResourceError::Validation(_)));
    }

    #[tokio::test]
    async fn references_must_belong_to_owner() {
        let repos = Repositories::in_memory();
        let theirs = create_account(&repos, "user-b", "Theirs").await;
        let balances = service::<Balance>(&repos);

        let error = balances
            .create(new_balance(theirs.id, json!(10)), &user("user-a"))
            .await
            .expect_err("foreign account");
        assert!(matches!(
            error,
            ResourceError::InvalidReference { field: "account", id } if id == theirs.id
        ));

        let error = balances
            .create(new_balance(ResourceId::new(), json!(10)), &user("user-a"))
            .await
            .expect_err("unknown account");
        assert!(matches!(error, ResourceError::InvalidReference { .. }));
    }

    #[tokio::test]
    async fn update_checks_introduced_references() {
        let repos = Repositories::in_memory();
        let mine = create_account(&repos, "user-a", "Mine").await;
        let theirs = create_account(&repos, "user-b", "Theirs").await;
        let goals = service::<Goal>(&repos);

        let goal = goals
            .create(
                serde_json::from_value(json!({
                    "name": "Holiday",
                    "amount": 1500,
                    "account": mine.id.to_string(),
                    "goalType": "AmountSaved",
                }))
                .unwrap(),
                &user("user-a"),
            )
            .await
            .unwrap();

        let error = goals
            .update(
                goal.clone(),
                GoalPatch {
                    account: Some(theirs.id),
                    ..Default::default()
                },
            )
            .await
            .expect_err("foreign account");
        assert!(matches!(error, ResourceError::InvalidReference { .. }));

        let updated = goals
            .update(
                goal,
                GoalPatch {
                    amount: Some(BigDecimal::from_str("1750.25").unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(mine.id, updated.account.id());
    }

    #[tokio::test]
    async fn list_sorts_and_pages() {
        let repos = Repositories::in_memory();
        for name in ["b", "c", "a"] {
            create_account(&repos, "user-a", name).await;
        }

        let page = service::<Account>(&repos)
            .list(
                AccountFilter::default(),
                PageQuery {
                    sort_by: Some("name:desc".to_owned()),
                    limit: Some(2),
                    page: Some(1),
                },
                &user("user-a"),
            )
            .await
            .unwrap();

        assert_eq!(
            vec!["c", "b"],
            page.results.iter().map(|a| a.name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(2, page.total_pages());
    }

    #[tokio::test]
    async fn unknown_sort_field_is_rejected() {
        let repos = Repositories::in_memory();

        let error = service::<Account>(&repos)
            .list(
                AccountFilter::default(),
                PageQuery {
                    sort_by: Some("user:asc".to_owned()),
                    ..Default::default()
                },
                &user("user-a"),
            )
            .await
            .expect_err("owner is not sortable");

        assert!(matches!(error, ResourceError::InvalidSort(_)));
    }

    #[tokio::test]
    async fn shop_lists_with_shop_type() {
        let repos = Repositories::in_memory();
        let shops = service::<Shop>(&repos);

        let created = shops
            .create(
                NewShop {
                    name: "Corner store".to_owned(),
                    shop_type: None,
                },
                &user("user-a"),
            )
            .await
            .unwrap();

        let page = shops
            .list(Default::default(), PageQuery::default(), &user("user-a"))
            .await
            .unwrap();

        assert_eq!(vec![created], page.results);
    }

    #[tokio::test]
    async fn delete_removes_resource() {
        let repos = Repositories::in_memory();
        let accounts = service::<Account>(&repos);
        let created = create_account(&repos, "user-a", "Checking").await;
        let id = created.id.to_string();

        accounts.delete(created).await.unwrap();

        let error = accounts
            .load_authorized(&id, &user("user-a"))
            .await
            .expect_err("deleted");
        assert!(matches!(error, ResourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_of_deleted_resource_is_not_found() {
        let repos = Repositories::in_memory();
        let accounts = service::<Account>(&repos);
        let created = create_account(&repos, "user-a", "Checking").await;
        let loaded = accounts
            .load_authorized(&created.id.to_string(), &user("user-a"))
            .await
            .unwrap();

        accounts.delete(created).await.unwrap();

        let error = accounts
            .update(
                loaded,
                AccountPatch {
                    name: Some("Main".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("deleted in between");
        assert!(matches!(error, ResourceError::NotFound("Account")));
    }

    #[tokio::test]
    async fn line_containers_filter_by_account_and_populate() {
        let repos = Repositories::in_memory();
        let owner = user("user-a");
        let groceries = create_account(&repos, "user-a", "Groceries").await;
        let savings = create_account(&repos, "user-a", "Savings").await;

        let supermarket = service::<ShopType>(&repos)
            .create(
                NewShopType {
                    name: "Supermarket".to_owned(),
                },
                &owner,
            )
            .await
            .unwrap();
        let shop = service::<Shop>(&repos)
            .create(
                NewShop {
                    name: "Corner store".to_owned(),
                    shop_type: Some(supermarket.id),
                },
                &owner,
            )
            .await
            .unwrap();
        let food = service::<LineItemCategory>(&repos)
            .create(
                NewLineItemCategory {
                    name: "Food".to_owned(),
                },
                &owner,
            )
            .await
            .unwrap();

        let containers = service::<LineContainer>(&repos);
        for (account, category) in [(groceries.id, Some(food.id)), (savings.id, None)] {
            containers
                .create(
                    serde_json::from_value(json!({
                        "date": 1634567890000_i64,
                        "shop": shop.id.to_string(),
                        "totalAmount": 12.5,
                        "month": 10,
                        "year": 2021,
                        "lineItems": [{
                            "description": "Weekly shop",
                            "lineCategory": category.map(|id| id.to_string()),
                            "amount": 12.5,
                            "account": account.to_string(),
                            "paymentType": "Expense",
                        }],
                    }))
                    .unwrap(),
                    &owner,
                )
                .await
                .unwrap();
        }

        let page = containers
            .list(
                LineContainerFilter {
                    month: 10,
                    year: 2021,
                    date: None,
                    shop: None,
                    account: Some(groceries.id),
                },
                PageQuery::default(),
                &owner,
            )
            .await
            .unwrap();
        let rendered = serde_json::to_value(&page).unwrap();

        assert_eq!(json!(1), rendered["totalResults"]);
        let container = &rendered["results"][0];
        assert_eq!(json!("Corner store"), container["shop"]["name"]);
        assert_eq!(json!("Supermarket"), container["shop"]["shopType"]["name"]);
        assert_eq!(json!("Groceries"), container["lineItems"][0]["account"]["name"]);
        assert_eq!(json!("Food"), container["lineItems"][0]["lineCategory"]["name"]);
        assert_eq!(json!(12.5), container["lineItems"][0]["amount"]);

        let other = containers
            .list(
                LineContainerFilter {
                    month: 10,
                    year: 2021,
                    date: None,
                    shop: None,
                    account: None,
                },
                PageQuery::default(),
                &user("user-b"),
            )
            .await
            .unwrap();
        assert_eq!(0, other.total_results);
    }
}
