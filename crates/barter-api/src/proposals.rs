use std::collections::HashSet;

use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use barter_db::{Database, ProposalFilter};
use barter_types::api::{
    Claims, ProposalFormContext, ProposalFormQuery, ProposalInput, ProposalListQuery,
    ProposalListResponse, ProposalResponse, StatusUpdateRequest,
};
use barter_types::models::{Ad, Proposal, ProposalStatus};
use barter_types::rules::{self, TransitionError};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::forms;
use crate::with_db;

/// GET /proposals/create/ — the caller's ads and, when `ad_receiver_id`
/// names an existing ad, that ad as the prefilled receiver.
pub async fn create_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ProposalFormQuery>,
) -> Result<Json<ProposalFormContext>, ApiError> {
    let context = with_db(&state, move |db| {
        let user_ads = ads_of(db, claims.sub)?;

        let ad_receiver = match query.ad_receiver_id.as_deref().map(str::parse::<Uuid>) {
            Some(Ok(id)) => db.get_ad(&id.to_string())?.map(Ad::try_from).transpose()?,
            _ => None,
        };

        Ok(ProposalFormContext {
            user_ads,
            ad_receiver,
        })
    })
    .await?;

    Ok(Json(context))
}

/// POST /proposals/create/ — new proposals always start pending.
pub async fn create_proposal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<ProposalInput>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    let proposal_id = Uuid::new_v4();

    let proposal = with_db(&state, move |db| {
        let clean = forms::clean_proposal(&input, caller, |id| {
            db.get_ad(&id.to_string())?.map(Ad::try_from).transpose()
        })?;

        db.insert_proposal(
            &proposal_id.to_string(),
            &clean.ad_sender.id.to_string(),
            &clean.ad_receiver.id.to_string(),
            &clean.comment,
            Utc::now(),
        )?;
        find_proposal(db, proposal_id)
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::Validation { .. }) {
            info!("User {} submitted an invalid proposal", claims.username);
        }
    })?;

    info!("User {} proposed {}", claims.username, proposal);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, "/proposals/")],
        Json(ProposalResponse {
            message: "Proposal sent successfully.".to_string(),
            proposal,
        }),
    ))
}

/// GET /proposals/ — proposals the caller is a party to.
pub async fn list_proposals(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ProposalListQuery>,
) -> Result<Json<ProposalListResponse>, ApiError> {
    let caller = claims.sub;

    let response = with_db(&state, move |db| {
        let filter = ProposalFilter {
            // An unknown status is ignored rather than matching nothing.
            status: query.status.as_deref().and_then(|s| s.parse().ok()),
            sender: query.sender.as_deref(),
            receiver: query.receiver.as_deref(),
        };

        let proposals = db
            .list_proposals_for_user(&caller.to_string(), &filter)?
            .into_iter()
            .map(Proposal::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let user_ads = ads_of(db, caller)?;
        let other_ads = requested_from_others(&proposals, caller);

        Ok(ProposalListResponse {
            proposals,
            user_ads,
            other_ads,
        })
    })
    .await?;

    Ok(Json(response))
}

/// POST /proposals/{proposal_id}/update/ — only the owner of the receiver ad
/// may accept or reject, and only while the proposal is pending.
pub async fn update_status(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<ProposalResponse>, ApiError> {
    let username = claims.username.clone();

    let (proposal, changed) = with_db(&state, move |db| {
        let proposal = find_proposal(db, proposal_id)?;

        let decision = rules::decide_transition(
            proposal.status,
            proposal.ad_receiver.owner_id,
            claims.sub,
            req.status.trim(),
        );

        match decision {
            Ok(None) => Ok((proposal, false)),
            Ok(Some(target)) => {
                if !db.update_proposal_status(&proposal_id.to_string(), target)? {
                    // Resolved by a concurrent request between the read and the write.
                    return Err(ApiError::Conflict(
                        "This proposal has already been answered.".to_string(),
                    ));
                }
                Ok((find_proposal(db, proposal_id)?, true))
            }
            Err(TransitionError::NotReceiverOwner) => {
                warn!(
                    "User {} tried to answer proposal {} addressed to {}",
                    claims.username, proposal.id, proposal.ad_receiver.owner_username
                );
                Err(ApiError::Forbidden(
                    "Only the owner of the requested ad can answer this proposal.".to_string(),
                ))
            }
            Err(TransitionError::AlreadyResolved(status)) => Err(ApiError::Conflict(format!(
                "This proposal has already been {status}."
            ))),
        }
    })
    .await?;

    let message = if changed {
        info!("User {} marked proposal {} as {}", username, proposal.id, proposal.status);
        match proposal.status {
            ProposalStatus::Accepted => "Proposal accepted.",
            ProposalStatus::Rejected => "Proposal rejected.",
            ProposalStatus::Pending => "Proposal updated.",
        }
    } else {
        "Status unchanged."
    };

    Ok(Json(ProposalResponse {
        message: message.to_string(),
        proposal,
    }))
}

fn find_proposal(db: &Database, proposal_id: Uuid) -> Result<Proposal, ApiError> {
    let row = db
        .get_proposal(&proposal_id.to_string())?
        .ok_or(ApiError::NotFound("proposal"))?;
    Ok(Proposal::try_from(row)?)
}

fn ads_of(db: &Database, owner: Uuid) -> Result<Vec<Ad>, ApiError> {
    let ads = db
        .ads_by_owner(&owner.to_string())?
        .into_iter()
        .map(Ad::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(ads)
}

/// Distinct receiver ads owned by someone other than `caller`, in order of
/// first appearance.
fn requested_from_others(proposals: &[Proposal], caller: Uuid) -> Vec<Ad> {
    let mut seen = HashSet::new();
    proposals
        .iter()
        .map(|p| &p.ad_receiver)
        .filter(|ad| ad.owner_id != caller && seen.insert(ad.id))
        .cloned()
        .collect()
}
