use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    require_changes, trimmed, trimmed_optional, Constraint, Constraints, FieldValue, Resource,
    ResourceId, UserId,
};

/// A grouping of shops, such as supermarkets or restaurants.
#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShopType {
    pub id: ResourceId,
    #[serde(skip_serializing)]
    pub owner: Option<UserId>,
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewShopType {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_shop_type_patch"))]
pub struct ShopTypePatch {
    #[serde(default, deserialize_with = "trimmed_optional")]
    #[validate(length(min = 1))]
    pub name: Option<String>,
}

fn validate_shop_type_patch(patch: &ShopTypePatch) -> Result<(), ValidationError> {
    require_changes(patch.name.is_none())
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShopTypeFilter {
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub name: Option<String>,
}

impl From<ShopTypeFilter> for Vec<Constraint> {
    fn from(filter: ShopTypeFilter) -> Self {
        Constraints::default().with("name", filter.name).build()
    }
}

impl Resource for ShopType {
    const NAME: &'static str = "ShopType";
    const SORTABLE: &'static [&'static str] = &["name"];

    type New = NewShopType;
    type Patch = ShopTypePatch;
    type Filter = ShopTypeFilter;

    fn from_new(id: ResourceId, owner: UserId, new: NewShopType) -> Self {
        Self {
            id,
            owner: Some(owner),
            name: new.name,
        }
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    fn apply_patch(&mut self, patch: ShopTypePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
}
