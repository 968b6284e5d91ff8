//! Receipts.
//!
//! A line container groups the line items bought at a shop on a given date.
//! Line items have no identity of their own and only exist inside their
//! container.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    accounts::Account,
    decimal::{self, validate_amount},
    flexible_date, flexible_date_optional,
    line_item_categories::LineItemCategory,
    require_changes,
    shops::Shop,
    trimmed_optional, Constraint, Constraints, FieldValue, PopulatePath, Reference, ReferenceKind,
    ReferencedId, Resource, ResourceId, UnknownVariant, UserId,
};

#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineContainer {
    pub id: ResourceId,
    #[serde(skip_serializing)]
    pub owner: Option<UserId>,
    pub date: DateTime<Utc>,
    pub shop: Reference<Shop>,
    #[serde(serialize_with = "decimal::serialize")]
    #[validate(custom = "validate_amount")]
    pub total_amount: BigDecimal,
    #[validate(range(min = 1, max = 12))]
    pub month: u8,
    #[validate(range(min = 2019, max = 2100))]
    pub year: u16,
    #[validate]
    pub line_items: Vec<LineItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Identifier chosen by the client, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_category: Option<Reference<LineItemCategory>>,
    #[serde(serialize_with = "decimal::serialize")]
    #[validate(custom = "validate_amount")]
    pub amount: BigDecimal,
    pub account: Reference<Account>,
    pub payment_type: PaymentType,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PaymentType {
    Income,
    Expense,
    CashFlow,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Expense => "Expense",
            Self::CashFlow => "CashFlow",
        }
    }
}

impl FromStr for PaymentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Income" => Ok(Self::Income),
            "Expense" => Ok(Self::Expense),
            "CashFlow" => Ok(Self::CashFlow),
            other => Err(UnknownVariant {
                kind: "payment type",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewLineContainer {
    #[serde(deserialize_with = "flexible_date")]
    pub date: DateTime<Utc>,
    pub shop: ResourceId,
    #[serde(deserialize_with = "decimal::deserialize")]
    #[validate(custom = "validate_amount")]
    pub total_amount: BigDecimal,
    #[validate(range(min = 1, max = 12))]
    pub month: u8,
    #[validate(range(min = 2019, max = 2100))]
    pub year: u16,
    #[serde(default)]
    #[validate]
    pub line_items: Vec<NewLineItem>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewLineItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub description: Option<String>,
    #[serde(default)]
    pub line_category: Option<ResourceId>,
    #[serde(deserialize_with = "decimal::deserialize")]
    #[validate(custom = "validate_amount")]
    pub amount: BigDecimal,
    pub account: ResourceId,
    pub payment_type: PaymentType,
}

impl From<NewLineItem> for LineItem {
    fn from(item: NewLineItem) -> Self {
        Self {
            id: item.id,
            description: item.description,
            line_category: item.line_category.map(Reference::from),
            amount: item.amount,
            account: item.account.into(),
            payment_type: item.payment_type,
        }
    }
}

/// A partial update of a line container. Providing `lineItems` replaces the
/// whole list.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_line_container_patch"))]
pub struct LineContainerPatch {
    #[serde(default, deserialize_with = "flexible_date_optional")]
    pub date: Option<DateTime<Utc>>,
    pub shop: Option<ResourceId>,
    #[serde(default, deserialize_with = "decimal::deserialize_optional")]
    #[validate(custom = "validate_amount")]
    pub total_amount: Option<BigDecimal>,
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u8>,
    #[validate(range(min = 2019, max = 2100))]
    pub year: Option<u16>,
    #[validate]
    pub line_items: Option<Vec<NewLineItem>>,
}

fn validate_line_container_patch(patch: &LineContainerPatch) -> Result<(), ValidationError> {
    require_changes(
        patch.date.is_none()
            && patch.shop.is_none()
            && patch.total_amount.is_none()
            && patch.month.is_none()
            && patch.year.is_none()
            && patch.line_items.is_none(),
    )
}

/// Line containers are always listed for a single period.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineContainerFilter {
    #[validate(range(min = 1, max = 12))]
    pub month: u8,
    #[validate(range(min = 2019, max = 2100))]
    pub year: u16,
    #[serde(default, deserialize_with = "flexible_date_optional")]
    pub date: Option<DateTime<Utc>>,
    pub shop: Option<ResourceId>,
    /// Only containers with at least one line item booked on this account.
    pub account: Option<ResourceId>,
}

impl From<LineContainerFilter> for Vec<Constraint> {
    fn from(filter: LineContainerFilter) -> Self {
        Constraints::default()
            .with("month", Some(filter.month))
            .with("year", Some(filter.year))
            .with("date", filter.date)
            .with("shop", filter.shop)
            .with("account", filter.account)
            .build()
    }
}

impl Resource for LineContainer {
    const NAME: &'static str = "LineContainer";
    const SORTABLE: &'static [&'static str] =
        &["date", "shop", "totalAmount", "month", "year"];

    type New = NewLineContainer;
    type Patch = LineContainerPatch;
    type Filter = LineContainerFilter;

    fn from_new(id: ResourceId, owner: UserId, new: NewLineContainer) -> Self {
        Self {
            id,
            owner: Some(owner),
            date: new.date,
            shop: new.shop.into(),
            total_amount: new.total_amount,
            month: new.month,
            year: new.year,
            line_items: new.line_items.into_iter().map(LineItem::from).collect(),
        }
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    fn apply_patch(&mut self, patch: LineContainerPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(shop) = patch.shop {
            self.shop = shop.into();
        }
        if let Some(total_amount) = patch.total_amount {
            self.total_amount = total_amount;
        }
        if let Some(month) = patch.month {
            self.month = month;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(line_items) = patch.line_items {
            self.line_items = line_items.into_iter().map(LineItem::from).collect();
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "date" => Some(self.date.into()),
            "shop" => Some(self.shop.id().into()),
            "totalAmount" => Some(self.total_amount.clone().into()),
            "month" => Some(self.month.into()),
            "year" => Some(self.year.into()),
            _ => None,
        }
    }

    fn matches(&self, constraint: &Constraint) -> bool {
        match (constraint.field, &constraint.value) {
            ("account", FieldValue::Id(account)) => self
                .line_items
                .iter()
                .any(|item| item.account.id() == *account),
            _ => self.field(constraint.field).as_ref() == Some(&constraint.value),
        }
    }

    fn references(&self) -> Vec<ReferencedId> {
        let mut references = vec![ReferencedId::new(
            "shop",
            ReferenceKind::Shop,
            self.shop.id(),
        )];

        for item in &self.line_items {
            references.push(ReferencedId::new(
                "lineItems.account",
                ReferenceKind::Account,
                item.account.id(),
            ));

            if let Some(category) = &item.line_category {
                references.push(ReferencedId::new(
                    "lineItems.lineCategory",
                    ReferenceKind::LineItemCategory,
                    category.id(),
                ));
            }
        }

        references
    }

    fn default_populate() -> Vec<PopulatePath> {
        vec![
            PopulatePath::new("lineItems.lineCategory"),
            PopulatePath::new("lineItems.account"),
            PopulatePath::with_nested("shop", vec![PopulatePath::new("shopType")]),
        ]
    }
}
