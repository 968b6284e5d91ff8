use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    require_changes, shop_types::ShopType, trimmed, trimmed_optional, Constraint, Constraints,
    FieldValue, PopulatePath, Reference, ReferenceKind, ReferencedId, Resource, ResourceId,
    UserId,
};

#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: ResourceId,
    #[serde(skip_serializing)]
    pub owner: Option<UserId>,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_type: Option<Reference<ShopType>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewShop {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub shop_type: Option<ResourceId>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_shop_patch"))]
pub struct ShopPatch {
    #[serde(default, deserialize_with = "trimmed_optional")]
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub shop_type: Option<ResourceId>,
}

fn validate_shop_patch(patch: &ShopPatch) -> Result<(), ValidationError> {
    require_changes(patch.name.is_none() && patch.shop_type.is_none())
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShopFilter {
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub name: Option<String>,
    pub shop_type: Option<ResourceId>,
}

impl From<ShopFilter> for Vec<Constraint> {
    fn from(filter: ShopFilter) -> Self {
        Constraints::default()
            .with("name", filter.name)
            .with("shopType", filter.shop_type)
            .build()
    }
}

impl Resource for Shop {
    const NAME: &'static str = "Shop";
    const SORTABLE: &'static [&'static str] = &["name", "shopType"];

    type New = NewShop;
    type Patch = ShopPatch;
    type Filter = ShopFilter;

    fn from_new(id: ResourceId, owner: UserId, new: NewShop) -> Self {
        Self {
            id,
            owner: Some(owner),
            name: new.name,
            shop_type: new.shop_type.map(Reference::from),
        }
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    fn apply_patch(&mut self, patch: ShopPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(shop_type) = patch.shop_type {
            self.shop_type = Some(shop_type.into());
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            "shopType" => self.shop_type.as_ref().map(|r| r.id().into()),
            _ => None,
        }
    }

    fn references(&self) -> Vec<ReferencedId> {
        self.shop_type
            .iter()
            .map(|r| ReferencedId::new("shopType", ReferenceKind::ShopType, r.id()))
            .collect()
    }

    fn default_populate() -> Vec<PopulatePath> {
        vec![PopulatePath::new("shopType")]
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn shop_type_is_optional() {
        let data: NewShop = serde_json::from_value(json!({"name": "Corner store"})).unwrap();

        let shop = Shop::from_new(ResourceId::new(), UserId::from("user-a"), data);

        assert!(shop.references().is_empty());
        assert!(serde_json::to_value(&shop)
            .unwrap()
            .get("shopType")
            .is_none());
    }

    #[test]
    fn populated_shop_type_is_embedded() {
        let shop_type = ShopType {
            id: ResourceId::new(),
            owner: Some(UserId::from("user-a")),
            name: "Supermarket".to_owned(),
        };
        let shop = Shop {
            id: ResourceId::new(),
            owner: Some(UserId::from("user-a")),
            name: "Corner store".to_owned(),
            shop_type: Some(Reference::Populated(Box::new(shop_type.clone()))),
        };

        assert_eq!(
            json!({"id": shop_type.id.to_string(), "name": "Supermarket"}),
            serde_json::to_value(&shop).unwrap()["shopType"]
        );
        assert_eq!(
            vec![ReferencedId::new(
                "shopType",
                ReferenceKind::ShopType,
                shop_type.id
            )],
            shop.references()
        );
    }
}
