//! Storage for bookkeeping resources.
//!
//! Every resource type is stored through the same [`ResourceRepo`] interface,
//! which is implemented by the Postgres connection and by an in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use crate::{
    bookkeeping::{
        domain::{
            Account, Balance, Constraint, Goal, LineContainer, LineItemCategory, Resource,
            ResourceId, Shop, ShopType, UserId,
        },
        services::ResourceError,
    },
    database::PostgresConnection,
    pagination::{PageOptions, PageResult},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepo;

pub type DynRepo<R> = Arc<dyn ResourceRepo<R> + Send + Sync>;

/// The criteria used to list resources.
///
/// A filter can only be constructed for a specific owner, so there is no way
/// to query across users.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceFilter {
    owner: UserId,
    constraints: Vec<Constraint>,
}

impl ResourceFilter {
    pub fn owned_by(owner: UserId) -> Self {
        Self {
            owner,
            constraints: vec![],
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Determine if a resource is owned by the filter's owner and satisfies
    /// every constraint.
    pub fn matches<R: Resource>(&self, resource: &R) -> bool {
        resource.owner() == Some(&self.owner)
            && self
                .constraints
                .iter()
                .all(|constraint| resource.matches(constraint))
    }
}

#[async_trait]
pub trait ResourceRepo<R: Resource> {
    /// Persist a new resource.
    async fn insert(&self, resource: &R) -> anyhow::Result<()>;

    /// Find a resource by its ID, regardless of its owner.
    async fn find_by_id(&self, id: ResourceId) -> anyhow::Result<Option<R>>;

    /// Find the resources with the given IDs that belong to `owner`. IDs that
    /// match nothing are skipped.
    async fn find_many(&self, owner: &UserId, ids: &[ResourceId]) -> anyhow::Result<Vec<R>>;

    /// List a page of the resources matching a filter.
    async fn query(
        &self,
        filter: &ResourceFilter,
        options: &PageOptions,
    ) -> anyhow::Result<PageResult<R>>;

    /// Overwrite the stored version of a resource. Returns `false` if there
    /// was no stored version to overwrite.
    async fn save(&self, resource: &R) -> anyhow::Result<bool>;

    async fn remove(&self, id: ResourceId) -> anyhow::Result<()>;

    /// Validate and persist a newly built resource.
    async fn create(&self, resource: R) -> Result<R, ResourceError> {
        resource.validate()?;
        self.insert(&resource).await?;

        Ok(resource)
    }

    /// Apply a partial update to a resource and persist the result.
    ///
    /// The patch is validated on its own before it is merged, and the merged
    /// resource is validated again before it is saved.
    async fn update(&self, mut resource: R, patch: R::Patch) -> Result<R, ResourceError> {
        patch.validate()?;

        resource.apply_patch(patch);
        resource.validate()?;

        if !self.save(&resource).await? {
            return Err(ResourceError::NotFound(R::NAME));
        }

        Ok(resource)
    }

    async fn delete(&self, resource: &R) -> Result<(), ResourceError> {
        Ok(self.remove(resource.id()).await?)
    }
}

/// The repositories for every resource type.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: DynRepo<Account>,
    pub balances: DynRepo<Balance>,
    pub goals: DynRepo<Goal>,
    pub line_containers: DynRepo<LineContainer>,
    pub line_item_categories: DynRepo<LineItemCategory>,
    pub shop_types: DynRepo<ShopType>,
    pub shops: DynRepo<Shop>,
}

impl Repositories {
    pub fn postgres(connection: PostgresConnection) -> Self {
        let connection = Arc::new(connection);

        Self {
            accounts: connection.clone(),
            balances: connection.clone(),
            goals: connection.clone(),
            line_containers: connection.clone(),
            line_item_categories: connection.clone(),
            shop_types: connection.clone(),
            shops: connection,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            accounts: Arc::new(MemoryRepo::default()),
            balances: Arc::new(MemoryRepo::default()),
            goals: Arc::new(MemoryRepo::default()),
            line_containers: Arc::new(MemoryRepo::default()),
            line_item_categories: Arc::new(MemoryRepo::default()),
            shop_types: Arc::new(MemoryRepo::default()),
            shops: Arc::new(MemoryRepo::default()),
        }
    }
}

/// Select the repository for a resource type.
pub trait RepoFor<R: Resource> {
    fn repo(&self) -> DynRepo<R>;
}

macro_rules! repo_for {
    ($resource:ty, $field:ident) => {
        impl RepoFor<$resource> for Repositories {
            fn repo(&self) -> DynRepo<$resource> {
                self.$field.clone()
            }
        }
    };
}

repo_for!(Account, accounts);
repo_for!(Balance, balances);
repo_for!(Goal, goals);
repo_for!(LineContainer, line_containers);
repo_for!(LineItemCategory, line_item_categories);
repo_for!(ShopType, shop_types);
repo_for!(Shop, shops);
