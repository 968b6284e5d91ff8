use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    require_changes, trimmed, trimmed_optional, Constraint, Constraints, FieldValue, Resource,
    ResourceId, UserId,
};

#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemCategory {
    pub id: ResourceId,
    #[serde(skip_serializing)]
    pub owner: Option<UserId>,
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewLineItemCategory {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_category_patch"))]
pub struct LineItemCategoryPatch {
    #[serde(default, deserialize_with = "trimmed_optional")]
    #[validate(length(min = 1))]
    pub name: Option<String>,
}

fn validate_category_patch(patch: &LineItemCategoryPatch) -> Result<(), ValidationError> {
    require_changes(patch.name.is_none())
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemCategoryFilter {
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub name: Option<String>,
}

impl From<LineItemCategoryFilter> for Vec<Constraint> {
    fn from(filter: LineItemCategoryFilter) -> Self {
        Constraints::default().with("name", filter.name).build()
    }
}

impl Resource for LineItemCategory {
    const NAME: &'static str = "LineItemCategory";
    const SORTABLE: &'static [&'static str] = &["name"];

    type New = NewLineItemCategory;
    type Patch = LineItemCategoryPatch;
    type Filter = LineItemCategoryFilter;

    fn from_new(id: ResourceId, owner: UserId, new: NewLineItemCategory) -> Self {
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

    fn apply_patch(&mut self, patch: LineItemCategoryPatch) {
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
