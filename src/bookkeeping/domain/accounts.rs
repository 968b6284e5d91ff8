use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    require_changes, trimmed, trimmed_optional, Constraint, Constraints, FieldValue, Resource,
    ResourceId, UnknownVariant, UserId,
};

/// A place where money is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: ResourceId,
    #[serde(skip_serializing)]
    pub owner: Option<UserId>,
    #[validate(length(min = 1))]
    pub name: String,
    pub account_type: AccountType,
    pub is_default: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AccountType {
    Bank,
    Mealvouchers,
    Cash,
    Savings,
    Investment,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "Bank",
            Self::Mealvouchers => "Mealvouchers",
            Self::Cash => "Cash",
            Self::Savings => "Savings",
            Self::Investment => "Investment",
        }
    }
}

impl FromStr for AccountType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bank" => Ok(Self::Bank),
            "Mealvouchers" => Ok(Self::Mealvouchers),
            "Cash" => Ok(Self::Cash),
            "Savings" => Ok(Self::Savings),
            "Investment" => Ok(Self::Investment),
            other => Err(UnknownVariant {
                kind: "account type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Data provided by a user to create an account.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1))]
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_account_patch"))]
pub struct AccountPatch {
    #[serde(default, deserialize_with = "trimmed_optional")]
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub is_default: Option<bool>,
}

fn validate_account_patch(patch: &AccountPatch) -> Result<(), ValidationError> {
    require_changes(
        patch.name.is_none() && patch.account_type.is_none() && patch.is_default.is_none(),
    )
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AccountFilter {
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub is_default: Option<bool>,
}

impl From<AccountFilter> for Vec<Constraint> {
    fn from(filter: AccountFilter) -> Self {
        Constraints::default()
            .with("name", filter.name)
            .with(
                "accountType",
                filter.account_type.map(|t| t.as_str().to_owned()),
            )
            .with("isDefault", filter.is_default)
            .build()
    }
}

impl Resource for Account {
    const NAME: &'static str = "Account";
    const SORTABLE: &'static [&'static str] = &["name", "accountType", "isDefault"];

    type New = NewAccount;
    type Patch = AccountPatch;
    type Filter = AccountFilter;

    fn from_new(id: ResourceId, owner: UserId, new: NewAccount) -> Self {
        Self {
            id,
            owner: Some(owner),
            name: new.name,
            account_type: new.account_type,
            is_default: new.is_default,
        }
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    fn apply_patch(&mut self, patch: AccountPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(account_type) = patch.account_type {
            self.account_type = account_type;
        }
        if let Some(is_default) = patch.is_default {
            self.is_default = is_default;
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            "accountType" => Some(self.account_type.as_str().to_owned().into()),
            "isDefault" => Some(self.is_default.into()),
            _ => None,
        }
    }
}
