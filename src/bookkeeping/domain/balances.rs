use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    accounts::Account,
    decimal::{self, validate_amount},
    require_changes, Constraint, Constraints, FieldValue, PopulatePath, Reference, ReferenceKind,
    ReferencedId, Resource, ResourceId, UserId,
};

/// The amount held by an account at the end of a month.
#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub id: ResourceId,
    #[serde(skip_serializing)]
    pub owner: Option<UserId>,
    #[validate(range(min = 1, max = 12))]
    pub month: u8,
    #[validate(range(min = 2019, max = 2100))]
    pub year: u16,
    pub account: Reference<Account>,
    #[serde(serialize_with = "decimal::serialize")]
    #[validate(custom = "validate_amount")]
    pub amount: BigDecimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewBalance {
    #[validate(range(min = 1, max = 12))]
    pub month: u8,
    #[validate(range(min = 2019, max = 2100))]
    pub year: u16,
    pub account: ResourceId,
    #[serde(deserialize_with = "decimal::deserialize")]
    #[validate(custom = "validate_amount")]
    pub amount: BigDecimal,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_balance_patch"))]
pub struct BalancePatch {
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u8>,
    #[validate(range(min = 2019, max = 2100))]
    pub year: Option<u16>,
    pub account: Option<ResourceId>,
    #[serde(default, deserialize_with = "decimal::deserialize_optional")]
    #[validate(custom = "validate_amount")]
    pub amount: Option<BigDecimal>,
}

fn validate_balance_patch(patch: &BalancePatch) -> Result<(), ValidationError> {
    require_changes(
        patch.month.is_none()
            && patch.year.is_none()
            && patch.account.is_none()
            && patch.amount.is_none(),
    )
}

/// Balances are always listed for a single period.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BalanceFilter {
    #[validate(range(min = 1, max = 12))]
    pub month: u8,
    #[validate(range(min = 2019, max = 2100))]
    pub year: u16,
    pub account: Option<ResourceId>,
}

impl From<BalanceFilter> for Vec<Constraint> {
    fn from(filter: BalanceFilter) -> Self {
        Constraints::default()
            .with("month", Some(filter.month))
            .with("year", Some(filter.year))
            .with("account", filter.account)
            .build()
    }
}

impl Resource for Balance {
    const NAME: &'static str = "Balance";
    const SORTABLE: &'static [&'static str] = &["month", "year", "account", "amount"];

    type New = NewBalance;
    type Patch = BalancePatch;
    type Filter = BalanceFilter;

    fn from_new(id: ResourceId, owner: UserId, new: NewBalance) -> Self {
        Self {
            id,
            owner: Some(owner),
            month: new.month,
            year: new.year,
            account: new.account.into(),
            amount: new.amount,
        }
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    fn apply_patch(&mut self, patch: BalancePatch) {
        if let Some(month) = patch.month {
            self.month = month;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(account) = patch.account {
            self.account = account.into();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "month" => Some(self.month.into()),
            "year" => Some(self.year.into()),
            "account" => Some(self.account.id().into()),
            "amount" => Some(self.amount.clone().into()),
            _ => None,
        }
    }

    fn references(&self) -> Vec<ReferencedId> {
        vec![ReferencedId::new(
            "account",
            ReferenceKind::Account,
            self.account.id(),
        )]
    }

    fn default_populate() -> Vec<PopulatePath> {
        vec![PopulatePath::new("account")]
    }
}
