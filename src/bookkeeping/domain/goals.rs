use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    accounts::Account,
    decimal::{self, validate_amount},
    require_changes, trimmed, trimmed_nullable, trimmed_optional, Constraint, Constraints, FieldValue,
    PopulatePath, Reference, ReferenceKind, ReferencedId, Resource, ResourceId, UnknownVariant,
    UserId,
};

/// A savings target tied to an account.
#[derive(Clone, Debug, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: ResourceId,
    #[serde(skip_serializing)]
    pub owner: Option<UserId>,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(serialize_with = "decimal::serialize")]
    #[validate(custom = "validate_amount")]
    pub amount: BigDecimal,
    pub account: Reference<Account>,
    pub goal_type: GoalType,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GoalType {
    /// The goal is met once the amount has been put aside.
    AmountSaved,
    /// The goal is met once the account balance reaches the amount.
    AmountReached,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmountSaved => "AmountSaved",
            Self::AmountReached => "AmountReached",
        }
    }
}

impl FromStr for GoalType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AmountSaved" => Ok(Self::AmountSaved),
            "AmountReached" => Ok(Self::AmountReached),
            other => Err(UnknownVariant {
                kind: "goal type",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewGoal {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub description: Option<String>,
    #[serde(deserialize_with = "decimal::deserialize")]
    #[validate(custom = "validate_amount")]
    pub amount: BigDecimal,
    pub account: ResourceId,
    pub goal_type: GoalType,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_goal_patch"))]
pub struct GoalPatch {
    #[serde(default, deserialize_with = "trimmed_optional")]
    #[validate(length(min = 1))]
    pub name: Option<String>,
    /// `null` clears the description.
    #[serde(default, deserialize_with = "trimmed_nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "decimal::deserialize_optional")]
    #[validate(custom = "validate_amount")]
    pub amount: Option<BigDecimal>,
    pub account: Option<ResourceId>,
    pub goal_type: Option<GoalType>,
}

fn validate_goal_patch(patch: &GoalPatch) -> Result<(), ValidationError> {
    require_changes(
        patch.name.is_none()
            && patch.description.is_none()
            && patch.amount.is_none()
            && patch.account.is_none()
            && patch.goal_type.is_none(),
    )
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GoalFilter {
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "trimmed_optional")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "decimal::deserialize_optional")]
    pub amount: Option<BigDecimal>,
    pub account: Option<ResourceId>,
    pub goal_type: Option<GoalType>,
}

impl From<GoalFilter> for Vec<Constraint> {
    fn from(filter: GoalFilter) -> Self {
        Constraints::default()
            .with("name", filter.name)
            .with("description", filter.description)
            .with("amount", filter.amount)
            .with("account", filter.account)
            .with("goalType", filter.goal_type.map(|t| t.as_str().to_owned()))
            .build()
    }
}

impl Resource for Goal {
    const NAME: &'static str = "Goal";
    const SORTABLE: &'static [&'static str] =
        &["name", "description", "amount", "account", "goalType"];

    type New = NewGoal;
    type Patch = GoalPatch;
    type Filter = GoalFilter;

    fn from_new(id: ResourceId, owner: UserId, new: NewGoal) -> Self {
        Self {
            id,
            owner: Some(owner),
            name: new.name,
            description: new.description,
            amount: new.amount,
            account: new.account.into(),
            goal_type: new.goal_type,
        }
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    fn apply_patch(&mut self, patch: GoalPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(account) = patch.account {
            self.account = account.into();
        }
        if let Some(goal_type) = patch.goal_type {
            self.goal_type = goal_type;
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(self.name.clone().into()),
            "description" => self.description.clone().map(Into::into),
            "amount" => Some(self.amount.clone().into()),
            "account" => Some(self.account.id().into()),
            "goalType" => Some(self.goal_type.as_str().to_owned().into()),
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

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_goal_without_description() {
        let data: NewGoal = serde_json::from_value(json!({
            "name": " Holiday ",
            "amount": 1500.5,
            "account": ResourceId::new().to_string(),
            "goalType": "AmountSaved",
        }))
        .unwrap();
        data.validate().expect("valid goal");

        let goal = Goal::from_new(ResourceId::new(), UserId::from("user-a"), data);
        let rendered = serde_json::to_value(&goal).unwrap();

        assert_eq!(json!("Holiday"), rendered["name"]);
        assert_eq!(json!(1500.5), rendered["amount"]);
        assert!(rendered.get("description").is_none());
    }

    #[test]
    fn unknown_goal_type_is_rejected() {
        let result = serde_json::from_value::<NewGoal>(json!({
            "name": "Holiday",
            "amount": 10,
            "account": ResourceId::new().to_string(),
            "goalType": "AmountSpent",
        }));

        assert!(result.is_err());
        assert!("AmountSpent".parse::<GoalType>().is_err());
    }

    #[test]
    fn filter_matches_amount_numerically() {
        let goal = Goal::from_new(
            ResourceId::new(),
            UserId::from("user-a"),
            NewGoal {
                name: "Car".to_owned(),
                description: None,
                amount: BigDecimal::from_str("3000.00").unwrap(),
                account: ResourceId::new(),
                goal_type: GoalType::AmountReached,
            },
        );
        let constraints: Vec<Constraint> = GoalFilter {
            amount: Some(BigDecimal::from(3000)),
            goal_type: Some(GoalType::AmountReached),
            ..Default::default()
        }
        .into();

        assert!(constraints.iter().all(|c| goal.matches(c)));
    }

    #[test]
    fn missing_description_never_matches() {
        let goal = Goal::from_new(
            ResourceId::new(),
            UserId::from("user-a"),
            NewGoal {
                name: "Car".to_owned(),
                description: None,
                amount: BigDecimal::from(1),
                account: ResourceId::new(),
                goal_type: GoalType::AmountSaved,
            },
        );

        assert!(!goal.matches(&Constraint::new(
            "description",
            FieldValue::Text(String::new())
        )));
    }

    #[test]
    fn patch_distinguishes_missing_and_null_description() {
        let mut goal = Goal::from_new(
            ResourceId::new(),
            UserId::from("user-a"),
            serde_json::from_value(json!({
                "name": "Holiday",
                "description": "Two weeks",
                "amount": 1500,
                "account": ResourceId::new().to_string(),
                "goalType": "AmountSaved",
            }))
            .unwrap(),
        );

        let rename: GoalPatch = serde_json::from_value(json!({"name": "Trip"})).unwrap();
        assert_eq!(None, rename.description);
        goal.apply_patch(rename);
        assert_eq!(Some("Two weeks".to_owned()), goal.description);

        let clear: GoalPatch = serde_json::from_value(json!({"description": null})).unwrap();
        assert!(clear.validate().is_ok());
        goal.apply_patch(clear);
        assert_eq!(None, goal.description);
        assert_eq!("Trip", goal.name);
    }
}
