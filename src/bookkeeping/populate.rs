//! Inline resolution of references.
//!
//! Populating a path replaces the bare identifiers found at that path with the
//! resources they point at. References are only resolved against resources of
//! the same owner; anything that can't be resolved is left as an identifier.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::repos::{DynRepo, Repositories, ResourceRepo};

use super::domain::{
    Account, Balance, Goal, LineContainer, LineItemCategory, PopulatePath, Reference, Resource,
    ResourceId, Shop, ShopType, UserId,
};

#[async_trait]
pub trait Populate: Resource {
    /// Resolve the references at `paths` for every record, in place.
    async fn populate(
        _records: &mut [Self],
        _paths: &[PopulatePath],
        _repos: &Repositories,
        _owner: &UserId,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

fn find_path<'a>(paths: &'a [PopulatePath], name: &str) -> Option<&'a PopulatePath> {
    paths.iter().find(|path| path.path == name)
}

/// Load the owner's resources with the given IDs, populating their own
/// references at `nested`.
async fn resolve<T: Populate>(
    repo: &DynRepo<T>,
    repos: &Repositories,
    owner: &UserId,
    mut ids: Vec<ResourceId>,
    nested: &[PopulatePath],
) -> anyhow::Result<HashMap<ResourceId, T>> {
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut found = repo.find_many(owner, &ids).await?;
    if !nested.is_empty() {
        T::populate(&mut found, nested, repos, owner).await?;
    }

    Ok(found
        .into_iter()
        .map(|resource| (resource.id(), resource))
        .collect())
}

fn attach<T: Resource>(reference: &mut Reference<T>, found: &HashMap<ResourceId, T>) {
    if let Some(resource) = found.get(&reference.id()) {
        *reference = Reference::Populated(Box::new(resource.clone()));
    }
}

impl Populate for Account {}
impl Populate for LineItemCategory {}
impl Populate for ShopType {}

#[async_trait]
impl Populate for Balance {
    async fn populate(
        records: &mut [Self],
        paths: &[PopulatePath],
        repos: &Repositories,
        owner: &UserId,
    ) -> anyhow::Result<()> {
        if let Some(path) = find_path(paths, "account") {
            let ids = records.iter().map(|r| r.account.id()).collect();
            let accounts = resolve(&repos.accounts, repos, owner, ids, &path.populate).await?;

            for record in records.iter_mut() {
                attach(&mut record.account, &accounts);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Populate for Goal {
    async fn populate(
        records: &mut [Self],
        paths: &[PopulatePath],
        repos: &Repositories,
        owner: &UserId,
    ) -> anyhow::Result<()> {
        if let Some(path) = find_path(paths, "account") {
            let ids = records.iter().map(|r| r.account.id()).collect();
            let accounts = resolve(&repos.accounts, repos, owner, ids, &path.populate).await?;

            for record in records.iter_mut() {
                attach(&mut record.account, &accounts);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Populate for Shop {
    async fn populate(
        records: &mut [Self],
        paths: &[PopulatePath],
        repos: &Repositories,
        owner: &UserId,
    ) -> anyhow::Result<()> {
        if let Some(path) = find_path(paths, "shopType") {
            let ids = records
                .iter()
                .filter_map(|r| r.shop_type.as_ref().map(Reference::id))
                .collect();
            let shop_types =
                resolve(&repos.shop_types, repos, owner, ids, &path.populate).await?;

            for shop_type in records.iter_mut().filter_map(|r| r.shop_type.as_mut()) {
                attach(shop_type, &shop_types);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Populate for LineContainer {
    async fn populate(
        records: &mut [Self],
        paths: &[PopulatePath],
        repos: &Repositories,
        owner: &UserId,
    ) -> anyhow::Result<()> {
        if let Some(path) = find_path(paths, "shop") {
            let ids = records.iter().map(|r| r.shop.id()).collect();
            let shops = resolve(&repos.shops, repos, owner, ids, &path.populate).await?;

            for record in records.iter_mut() {
                attach(&mut record.shop, &shops);
            }
        }

        if let Some(path) = find_path(paths, "lineItems.account") {
            let ids = records
                .iter()
                .flat_map(|r| r.line_items.iter().map(|item| item.account.id()))
                .collect();
            let accounts = resolve(&repos.accounts, repos, owner, ids, &path.populate).await?;

            for item in records.iter_mut().flat_map(|r| r.line_items.iter_mut()) {
                attach(&mut item.account, &accounts);
            }
        }

        if let Some(path) = find_path(paths, "lineItems.lineCategory") {
            let ids = records
                .iter()
                .flat_map(|r| r.line_items.iter())
                .filter_map(|item| item.line_category.as_ref().map(Reference::id))
                .collect();
            let categories =
                resolve(&repos.line_item_categories, repos, owner, ids, &path.populate).await?;

            for category in records
                .iter_mut()
                .flat_map(|r| r.line_items.iter_mut())
                .filter_map(|item| item.line_category.as_mut())
            {
                attach(category, &categories);
            }
        }

        Ok(())
    }
}
