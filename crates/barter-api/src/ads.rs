use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use barter_db::{AdFilter, Database};
use barter_types::api::{AdFormContext, AdInput, AdListQuery, Claims, Page};
use barter_types::models::{Ad, Condition};
use barter_types::pagination::{PAGE_SIZE, PageWindow};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::forms;
use crate::with_db;

/// GET / — newest ads first, optionally searched and filtered, 10 per page.
pub async fn list_ads(
    State(state): State<AppState>,
    Query(query): Query<AdListQuery>,
) -> Result<Json<Page<Ad>>, ApiError> {
    let page = with_db(&state, move |db| {
        let filter = AdFilter {
            query: query.q.as_deref(),
            category: query.category.as_deref(),
            condition: query.condition.as_deref(),
        };

        let total = db.count_ads(&filter)?;
        let window = PageWindow::resolve(query.page.as_deref(), total, PAGE_SIZE);
        let ads = db
            .list_ads(&filter, window.limit(), window.offset())?
            .into_iter()
            .map(Ad::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Page::new(ads, window))
    })
    .await?;

    Ok(Json(page))
}

/// GET /ads/{ad_id}/
pub async fn ad_detail(
    State(state): State<AppState>,
    Path(ad_id): Path<Uuid>,
) -> Result<Json<Ad>, ApiError> {
    let ad = with_db(&state, move |db| find_ad(db, ad_id)).await?;
    Ok(Json(ad))
}

/// GET /ads/create/ — choices for the ad form.
pub async fn create_form(Extension(_claims): Extension<Claims>) -> Json<AdFormContext> {
    Json(AdFormContext {
        conditions: Condition::ALL.to_vec(),
    })
}

/// POST /ads/create/ — the owner is always the caller.
pub async fn create_ad(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<AdInput>,
) -> Result<impl IntoResponse, ApiError> {
    let clean = forms::clean_ad(&input)?;

    let ad_id = Uuid::new_v4();
    let owner_id = claims.sub;
    let ad = with_db(&state, move |db| {
        let id = ad_id.to_string();
        db.insert_ad(&id, &owner_id.to_string(), clean.fields(), Utc::now())?;
        find_ad(db, ad_id)
    })
    .await?;

    info!("User {} created ad {} ({:?})", claims.username, ad.id, ad.title);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/ads/{}/", ad.id))],
        Json(ad),
    ))
}

/// GET /ads/{ad_id}/edit/ — current values as initial form data.
pub async fn edit_form(
    State(state): State<AppState>,
    Path(ad_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Ad>, ApiError> {
    let ad = with_db(&state, move |db| owned_ad(db, ad_id, &claims)).await?;
    Ok(Json(ad))
}

/// POST /ads/{ad_id}/edit/ — ownership is checked before the input.
pub async fn edit_ad(
    State(state): State<AppState>,
    Path(ad_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<AdInput>,
) -> Result<Json<Ad>, ApiError> {
    let username = claims.username.clone();
    let ad = with_db(&state, move |db| {
        owned_ad(db, ad_id, &claims)?;
        let clean = forms::clean_ad(&input)?;
        if !db.update_ad(&ad_id.to_string(), clean.fields())? {
            return Err(ApiError::NotFound("ad"));
        }
        find_ad(db, ad_id)
    })
    .await?;

    info!("User {} updated ad {}", username, ad.id);
    Ok(Json(ad))
}

/// GET /ads/{ad_id}/delete/ — the ad about to be deleted.
pub async fn delete_confirm(
    State(state): State<AppState>,
    Path(ad_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Ad>, ApiError> {
    let ad = with_db(&state, move |db| owned_ad(db, ad_id, &claims)).await?;
    Ok(Json(ad))
}

/// POST /ads/{ad_id}/delete/
pub async fn delete_ad(
    State(state): State<AppState>,
    Path(ad_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let username = claims.username.clone();
    with_db(&state, move |db| {
        owned_ad(db, ad_id, &claims)?;
        if !db.delete_ad(&ad_id.to_string())? {
            return Err(ApiError::NotFound("ad"));
        }
        Ok(())
    })
    .await?;

    info!("User {} deleted ad {}", username, ad_id);
    Ok(StatusCode::NO_CONTENT)
}

fn find_ad(db: &Database, ad_id: Uuid) -> Result<Ad, ApiError> {
    let row = db
        .get_ad(&ad_id.to_string())?
        .ok_or(ApiError::NotFound("ad"))?;
    Ok(Ad::try_from(row)?)
}

/// The ad, if it exists and belongs to the caller.
fn owned_ad(db: &Database, ad_id: Uuid, claims: &Claims) -> Result<Ad, ApiError> {
    let ad = find_ad(db, ad_id)?;
    if ad.owner_id != claims.sub {
        warn!("User {} tried to modify ad {} owned by {}", claims.username, ad.id, ad.owner_username);
        return Err(ApiError::Forbidden("You cannot modify this ad.".to_string()));
    }
    Ok(ad)
}
