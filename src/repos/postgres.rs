//! Postgres storage.
//!
//! Each resource type maps onto its own table. Every table has an `id`, the
//! owning `user_id`, and a `seq` column recording insertion order, which is
//! used to break ties when sorting.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{postgres::PgRow, types::Json, FromRow, Postgres, QueryBuilder, Row};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
    bookkeeping::domain::{
        Account, Balance, Constraint, FieldValue, Goal, LineContainer, LineItem,
        LineItemCategory, Reference, Resource, ResourceId, Shop, ShopType, UserId,
    },
    database::PostgresConnection,
    pagination::{PageOptions, PageResult, SortKey},
};

use super::{ResourceFilter, ResourceRepo};

/// A value written to a column.
#[derive(Clone, Debug)]
pub enum SqlValue {
    Bool(bool),
    Integer(i32),
    Decimal(BigDecimal),
    Text(String),
    OptionalText(Option<String>),
    Id(Uuid),
    OptionalId(Option<Uuid>),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    fn push_bind(self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Bool(value) => builder.push_bind(value),
            Self::Integer(value) => builder.push_bind(value),
            Self::Decimal(value) => builder.push_bind(value),
            Self::Text(value) => builder.push_bind(value),
            Self::OptionalText(value) => builder.push_bind(value),
            Self::Id(value) => builder.push_bind(value),
            Self::OptionalId(value) => builder.push_bind(value),
            Self::Timestamp(value) => builder.push_bind(value),
            Self::Json(value) => builder.push_bind(value),
        };
    }
}

fn push_field_value(builder: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Bool(value) => builder.push_bind(*value),
        FieldValue::Integer(value) => builder.push_bind(*value),
        FieldValue::Decimal(value) => builder.push_bind(value.clone()),
        FieldValue::Text(value) => builder.push_bind(value.clone()),
        FieldValue::Id(value) => builder.push_bind(value.as_uuid()),
        FieldValue::Timestamp(value) => builder.push_bind(*value),
    };
}

/// The mapping between a resource and its table.
pub trait PgResource: Resource {
    const TABLE: &'static str;

    /// The columns written on insert and update, excluding `id` and `user_id`.
    /// These must be in the same order as the output of [`values`].
    ///
    /// [`values`]: PgResource::values
    const COLUMNS: &'static [&'static str];

    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    fn from_row(row: Self::Row) -> anyhow::Result<Self>;

    fn values(&self) -> Vec<SqlValue>;

    /// The column backing a public field name.
    fn column(field: &str) -> Option<&'static str>;

    fn push_constraint(builder: &mut QueryBuilder<'_, Postgres>, constraint: &Constraint) {
        match Self::column(constraint.field) {
            Some(column) => {
                builder.push(column).push(" = ");
                push_field_value(builder, &constraint.value);
            }
            None => {
                builder.push("FALSE");
            }
        }
    }
}

fn owner_of<R: Resource>(resource: &R) -> anyhow::Result<&UserId> {
    resource
        .owner()
        .ok_or_else(|| anyhow!("{} {} has no owner", R::NAME, resource.id()))
}

/// Missing values sort before present ones in ascending order, matching the
/// ordering of optional fields in memory. Ties fall back to insertion order.
fn push_order<R: PgResource>(
    builder: &mut QueryBuilder<'_, Postgres>,
    sort: &[SortKey],
) -> anyhow::Result<()> {
    builder.push(" ORDER BY ");
    for key in sort {
        let column = R::column(key.field)
            .with_context(|| format!("{} cannot be sorted by {}", R::NAME, key.field))?;

        builder.push(column).push(if key.descending {
            " DESC NULLS LAST, "
        } else {
            " ASC NULLS FIRST, "
        });
    }
    builder.push("seq");

    Ok(())
}

fn push_where<R: PgResource>(builder: &mut QueryBuilder<'_, Postgres>, filter: &ResourceFilter) {
    builder
        .push(" WHERE user_id = ")
        .push_bind(filter.owner().as_str().to_owned());

    for constraint in filter.constraints() {
        builder.push(" AND ");
        R::push_constraint(builder, constraint);
    }
}

#[async_trait]
impl<R: PgResource> ResourceRepo<R> for PostgresConnection {
    async fn insert(&self, resource: &R) -> anyhow::Result<()> {
        let owner = owner_of(resource)?;
        trace!(resource = R::NAME, id = %resource.id(), "Inserting resource.");

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("INSERT INTO ");
        builder
            .push(R::TABLE)
            .push(" (id, user_id, ")
            .push(R::COLUMNS.join(", "))
            .push(") VALUES (")
            .push_bind(resource.id().as_uuid())
            .push(", ")
            .push_bind(owner.as_str().to_owned());

        for value in resource.values() {
            builder.push(", ");
            value.push_bind(&mut builder);
        }

        builder.push(")");
        builder.build().execute(&**self).await?;

        Ok(())
    }

    async fn find_by_id(&self, id: ResourceId) -> anyhow::Result<Option<R>> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", R::TABLE);

        sqlx::query_as::<_, R::Row>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&**self)
            .await?
            .map(R::from_row)
            .transpose()
    }

    async fn find_many(&self, owner: &UserId, ids: &[ResourceId]) -> anyhow::Result<Vec<R>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!(
            "SELECT * FROM {} WHERE user_id = $1 AND id = ANY($2) ORDER BY seq",
            R::TABLE
        );
        let ids = ids.iter().map(ResourceId::as_uuid).collect::<Vec<_>>();

        sqlx::query_as::<_, R::Row>(&sql)
            .bind(owner.as_str())
            .bind(&ids)
            .fetch_all(&**self)
            .await?
            .into_iter()
            .map(R::from_row)
            .collect()
    }

    async fn query(
        &self,
        filter: &ResourceFilter,
        options: &PageOptions,
    ) -> anyhow::Result<PageResult<R>> {
        let mut count_builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM ");
        count_builder.push(R::TABLE);
        push_where::<R>(&mut count_builder, filter);

        let total_results: i64 = count_builder
            .build()
            .fetch_one(&**self)
            .await?
            .try_get(0)?;

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM ");
        builder.push(R::TABLE);
        push_where::<R>(&mut builder, filter);

        push_order::<R>(&mut builder, &options.sort)?;
        builder
            .push(" LIMIT ")
            .push_bind(options.limit)
            .push(" OFFSET ")
            .push_bind(options.offset());

        let results = builder
            .build_query_as::<R::Row>()
            .fetch_all(&**self)
            .await?
            .into_iter()
            .map(R::from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(PageResult::new(results, total_results, options))
    }

    async fn save(&self, resource: &R) -> anyhow::Result<bool> {
        trace!(resource = R::NAME, id = %resource.id(), "Updating resource.");

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE ");
        builder.push(R::TABLE).push(" SET ");

        for (index, (column, value)) in R::COLUMNS.iter().zip(resource.values()).enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(*column).push(" = ");
            value.push_bind(&mut builder);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(resource.id().as_uuid());
        let result = builder.build().execute(&**self).await?;

        if result.rows_affected() == 0 {
            debug!(resource = R::NAME, id = %resource.id(), "No stored resource to update.");
        }

        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, id: ResourceId) -> anyhow::Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", R::TABLE);

        sqlx::query(&sql)
            .bind(id.as_uuid())
            .execute(&**self)
            .await?;

        Ok(())
    }
}

fn small_int<T: TryFrom<i32>>(value: i32, column: &str) -> anyhow::Result<T> {
    T::try_from(value).map_err(|_| anyhow!("{} is out of range: {}", column, value))
}

#[derive(FromRow)]
pub struct AccountRow {
    id: Uuid,
    user_id: String,
    name: String,
    account_type: String,
    is_default: bool,
}

impl PgResource for Account {
    const TABLE: &'static str = "account";
    const COLUMNS: &'static [&'static str] = &["name", "account_type", "is_default"];

    type Row = AccountRow;

    fn from_row(row: AccountRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id.into(),
            owner: Some(UserId::new(row.user_id)),
            name: row.name,
            account_type: row.account_type.parse()?,
            is_default: row.is_default,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.name.clone()),
            SqlValue::Text(self.account_type.as_str().to_owned()),
            SqlValue::Bool(self.is_default),
        ]
    }

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "name" => Some("name"),
            "accountType" => Some("account_type"),
            "isDefault" => Some("is_default"),
            _ => None,
        }
    }
}

#[derive(FromRow)]
pub struct BalanceRow {
    id: Uuid,
    user_id: String,
    month: i32,
    year: i32,
    account_id: Uuid,
    amount: BigDecimal,
}

impl PgResource for Balance {
    const TABLE: &'static str = "balance";
    const COLUMNS: &'static [&'static str] = &["month", "year", "account_id", "amount"];

    type Row = BalanceRow;

    fn from_row(row: BalanceRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id.into(),
            owner: Some(UserId::new(row.user_id)),
            month: small_int(row.month, "month")?,
            year: small_int(row.year, "year")?,
            account: ResourceId::from(row.account_id).into(),
            amount: row.amount,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.month.into()),
            SqlValue::Integer(self.year.into()),
            SqlValue::Id(self.account.id().as_uuid()),
            SqlValue::Decimal(self.amount.clone()),
        ]
    }

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "month" => Some("month"),
            "year" => Some("year"),
            "account" => Some("account_id"),
            "amount" => Some("amount"),
            _ => None,
        }
    }
}

#[derive(FromRow)]
pub struct GoalRow {
    id: Uuid,
    user_id: String,
    name: String,
    description: Option<String>,
    amount: BigDecimal,
    account_id: Uuid,
    goal_type: String,
}

impl PgResource for Goal {
    const TABLE: &'static str = "goal";
    const COLUMNS: &'static [&'static str] =
        &["name", "description", "amount", "account_id", "goal_type"];

    type Row = GoalRow;

    fn from_row(row: GoalRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id.into(),
            owner: Some(UserId::new(row.user_id)),
            name: row.name,
            description: row.description,
            amount: row.amount,
            account: ResourceId::from(row.account_id).into(),
            goal_type: row.goal_type.parse()?,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.name.clone()),
            SqlValue::OptionalText(self.description.clone()),
            SqlValue::Decimal(self.amount.clone()),
            SqlValue::Id(self.account.id().as_uuid()),
            SqlValue::Text(self.goal_type.as_str().to_owned()),
        ]
    }

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "name" => Some("name"),
            "description" => Some("description"),
            "amount" => Some("amount"),
            "account" => Some("account_id"),
            "goalType" => Some("goal_type"),
            _ => None,
        }
    }
}

/// Row for the resources that only carry a name.
#[derive(FromRow)]
pub struct NamedRow {
    id: Uuid,
    user_id: String,
    name: String,
}

impl PgResource for ShopType {
    const TABLE: &'static str = "shop_type";
    const COLUMNS: &'static [&'static str] = &["name"];

    type Row = NamedRow;

    fn from_row(row: NamedRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id.into(),
            owner: Some(UserId::new(row.user_id)),
            name: row.name,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![SqlValue::Text(self.name.clone())]
    }

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "name" => Some("name"),
            _ => None,
        }
    }
}

impl PgResource for LineItemCategory {
    const TABLE: &'static str = "line_item_category";
    const COLUMNS: &'static [&'static str] = &["name"];

    type Row = NamedRow;

    fn from_row(row: NamedRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id.into(),
            owner: Some(UserId::new(row.user_id)),
            name: row.name,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![SqlValue::Text(self.name.clone())]
    }

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "name" => Some("name"),
            _ => None,
        }
    }
}

#[derive(FromRow)]
pub struct ShopRow {
    id: Uuid,
    user_id: String,
    name: String,
    shop_type_id: Option<Uuid>,
}

impl PgResource for Shop {
    const TABLE: &'static str = "shop";
    const COLUMNS: &'static [&'static str] = &["name", "shop_type_id"];

    type Row = ShopRow;

    fn from_row(row: ShopRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id.into(),
            owner: Some(UserId::new(row.user_id)),
            name: row.name,
            shop_type: row
                .shop_type_id
                .map(|id| Reference::from(ResourceId::from(id))),
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.name.clone()),
            SqlValue::OptionalId(self.shop_type.as_ref().map(|r| r.id().as_uuid())),
        ]
    }

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "name" => Some("name"),
            "shopType" => Some("shop_type_id"),
            _ => None,
        }
    }
}

/// A line item as stored inside its container. Amounts are kept as decimal
/// strings so they survive the trip through JSON unchanged.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line_category: Option<Uuid>,
    amount: String,
    account: Uuid,
    payment_type: String,
}

impl From<&LineItem> for LineItemRecord {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id.clone(),
            description: item.description.clone(),
            line_category: item.line_category.as_ref().map(|r| r.id().as_uuid()),
            amount: item.amount.to_string(),
            account: item.account.id().as_uuid(),
            payment_type: item.payment_type.as_str().to_owned(),
        }
    }
}

impl TryFrom<LineItemRecord> for LineItem {
    type Error = anyhow::Error;

    fn try_from(record: LineItemRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            description: record.description,
            line_category: record
                .line_category
                .map(|id| Reference::from(ResourceId::from(id))),
            amount: record
                .amount
                .parse()
                .with_context(|| format!("invalid line item amount: {:?}", record.amount))?,
            account: ResourceId::from(record.account).into(),
            payment_type: record.payment_type.parse()?,
        })
    }
}

#[derive(FromRow)]
pub struct LineContainerRow {
    id: Uuid,
    user_id: String,
    date: DateTime<Utc>,
    shop_id: Uuid,
    total_amount: BigDecimal,
    month: i32,
    year: i32,
    line_items: Json<Vec<LineItemRecord>>,
}

impl PgResource for LineContainer {
    const TABLE: &'static str = "line_container";
    const COLUMNS: &'static [&'static str] = &[
        "\"date\"",
        "shop_id",
        "total_amount",
        "month",
        "year",
        "line_items",
    ];

    type Row = LineContainerRow;

    fn from_row(row: LineContainerRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id.into(),
            owner: Some(UserId::new(row.user_id)),
            date: row.date,
            shop: ResourceId::from(row.shop_id).into(),
            total_amount: row.total_amount,
            month: small_int(row.month, "month")?,
            year: small_int(row.year, "year")?,
            line_items: row
                .line_items
                .0
                .into_iter()
                .map(LineItem::try_from)
                .collect::<anyhow::Result<_>>()?,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        let line_items = self
            .line_items
            .iter()
            .map(LineItemRecord::from)
            .collect::<Vec<_>>();

        vec![
            SqlValue::Timestamp(self.date),
            SqlValue::Id(self.shop.id().as_uuid()),
            SqlValue::Decimal(self.total_amount.clone()),
            SqlValue::Integer(self.month.into()),
            SqlValue::Integer(self.year.into()),
            SqlValue::Json(json!(line_items)),
        ]
    }

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "date" => Some("\"date\""),
            "shop" => Some("shop_id"),
            "totalAmount" => Some("total_amount"),
            "month" => Some("month"),
            "year" => Some("year"),
            _ => None,
        }
    }

    fn push_constraint(builder: &mut QueryBuilder<'_, Postgres>, constraint: &Constraint) {
        match (constraint.field, &constraint.value) {
            ("account", FieldValue::Id(account)) => {
                builder
                    .push("line_items @> ")
                    .push_bind(json!([{ "account": account.to_string() }]));
            }
            _ => match Self::column(constraint.field) {
                Some(column) => {
                    builder.push(column).push(" = ");
                    push_field_value(builder, &constraint.value);
                }
                None => {
                    builder.push("FALSE");
                }
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use crate::bookkeeping::domain::PaymentType;

    use super::*;

    #[test]
    fn line_item_record_keeps_exact_amount() {
        let item = LineItem {
            id: Some("1".to_owned()),
            description: Some("Coffee".to_owned()),
            line_category: None,
            amount: BigDecimal::from_str("19.99").unwrap(),
            account: ResourceId::new().into(),
            payment_type: PaymentType::Expense,
        };

        let record = LineItemRecord::from(&item);
        let stored = serde_json::to_value(&record).unwrap();

        assert_eq!(json!("19.99"), stored["amount"]);
        assert!(stored.get("lineCategory").is_none());

        let restored: LineItemRecord = serde_json::from_value(stored).unwrap();
        assert_eq!(item, LineItem::try_from(restored).unwrap());
    }

    #[test]
    fn filter_sql_is_scoped_to_owner() {
        let filter = ResourceFilter::owned_by(UserId::from("user-a")).with_constraints(vec![
            Constraint::new("month", FieldValue::Integer(3)),
            Constraint::new("account", FieldValue::Id(ResourceId::new())),
        ]);
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM line_container");

        push_where::<LineContainer>(&mut builder, &filter);

        assert_eq!(
            "SELECT * FROM line_container WHERE user_id = $1 AND month = $2 AND line_items @> $3",
            builder.sql()
        );
    }

    #[test]
    fn unknown_field_matches_nothing() {
        let filter = ResourceFilter::owned_by(UserId::from("user-a"))
            .with_constraints(vec![Constraint::new("owner", FieldValue::Bool(true))]);
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM account");

        push_where::<Account>(&mut builder, &filter);

        assert_eq!(
            "SELECT * FROM account WHERE user_id = $1 AND FALSE",
            builder.sql()
        );
    }

    #[test]
    fn missing_values_sort_first_ascending() {
        let sort = SortKey::parse_list("shopType,name:desc", Shop::SORTABLE).unwrap();
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM shop");

        push_order::<Shop>(&mut builder, &sort).unwrap();

        assert_eq!(
            "SELECT * FROM shop ORDER BY shop_type_id ASC NULLS FIRST, name DESC NULLS LAST, seq",
            builder.sql()
        );
    }
}
