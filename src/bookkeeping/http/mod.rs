//! HTTP endpoints for the bookkeeping resources.
//!
//! Every resource exposes the same five operations, implemented once by the
//! generic handlers below.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRef, Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    authentication::TokenClaims,
    http_err::{ApiError, ApiResponse},
    pagination::{PageQuery, PageResult},
    repos::{RepoFor, Repositories},
    server::AppState,
};

use super::{
    domain::{Account, Balance, Goal, LineContainer, LineItemCategory, Shop, ShopType},
    populate::Populate,
    services::ResourceService,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/account", resource_routes::<Account>())
        .nest("/balance", resource_routes::<Balance>())
        .nest("/goal", resource_routes::<Goal>())
        .nest("/shop", resource_routes::<Shop>())
        .nest("/shoptype", resource_routes::<ShopType>())
        .nest("/lineitemcategory", resource_routes::<LineItemCategory>())
        .nest("/linecontainer", resource_routes::<LineContainer>())
}

fn resource_routes<R>() -> Router<AppState>
where
    R: Populate,
    Repositories: RepoFor<R>,
{
    Router::new()
        .route("/", get(list::<R>).post(create::<R>))
        .route(
            "/:id",
            get(get_one::<R>).patch(update::<R>).delete(delete::<R>),
        )
}

impl<R> FromRef<AppState> for ResourceService<R>
where
    R: Populate,
    Repositories: RepoFor<R>,
{
    fn from_ref(state: &AppState) -> Self {
        ResourceService::new(Repositories::from_ref(state))
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResponse<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResponse<T> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

async fn create<R>(
    claims: TokenClaims,
    State(service): State<ResourceService<R>>,
    body: Result<Json<R::New>, JsonRejection>,
) -> ApiResponse<(StatusCode, Json<R>)>
where
    R: Populate,
    Repositories: RepoFor<R>,
{
    let new = json_body(body)?;
    let resource = service.create(new, &claims.user_id()).await?;

    Ok((StatusCode::CREATED, Json(resource)))
}

async fn list<R>(
    claims: TokenClaims,
    State(service): State<ResourceService<R>>,
    filter: Result<Query<R::Filter>, QueryRejection>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResponse<Json<PageResult<R>>>
where
    R: Populate,
    Repositories: RepoFor<R>,
{
    let filter = query_params(filter)?;
    let page = query_params(page)?;

    Ok(Json(service.list(filter, page, &claims.user_id()).await?))
}

async fn get_one<R>(
    claims: TokenClaims,
    State(service): State<ResourceService<R>>,
    Path(id): Path<String>,
) -> ApiResponse<Json<R>>
where
    R: Populate,
    Repositories: RepoFor<R>,
{
    Ok(Json(service.load_authorized(&id, &claims.user_id()).await?))
}

async fn update<R>(
    claims: TokenClaims,
    State(service): State<ResourceService<R>>,
    Path(id): Path<String>,
    body: Result<Json<R::Patch>, JsonRejection>,
) -> ApiResponse<Json<R>>
where
    R: Populate,
    Repositories: RepoFor<R>,
{
    let resource = service.load_authorized(&id, &claims.user_id()).await?;
    let patch = json_body(body)?;

    Ok(Json(service.update(resource, patch).await?))
}

async fn delete<R>(
    claims: TokenClaims,
    State(service): State<ResourceService<R>>,
    Path(id): Path<String>,
) -> ApiResponse<StatusCode>
where
    R: Populate,
    Repositories: RepoFor<R>,
{
    let resource = service.load_authorized(&id, &claims.user_id()).await?;
    service.delete(resource).await?;

    Ok(StatusCode::NO_CONTENT)
}
