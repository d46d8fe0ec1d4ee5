use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crewplate_core::CoreError;
use crewplate_core::membership::MembershipGraph;
use crewplate_types::api::{
    Claims, CreateCrewRequest, JoinCrewRequest, JoinCrewResponse, KickMemberResponse,
    LeaveCrewResponse,
};
use crewplate_types::models::{CrewSummary, JoinOutcome};

use crate::auth::AppState;
use crate::blocking::{run_blocking, run_mutation};
use crate::error::ApiError;

fn require_member(graph: &MembershipGraph<'_>, crew_id: Uuid, user_id: Uuid) -> crewplate_core::Result<()> {
    if !graph.is_member(crew_id, user_id)? {
        // A missing crew is a 404, not a 403
        graph.get_crew(crew_id)?;
        return Err(CoreError::Forbidden("not a member of this crew"));
    }
    Ok(())
}

pub async fn create_crew(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCrewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let crew = run_mutation(&state, move |db| {
        MembershipGraph::new(db).create_crew(&req.name, req.icon.as_deref(), claims.sub)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(crew)))
}

pub async fn list_crews(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let crews = run_blocking(&state, move |db| {
        MembershipGraph::new(db).list_crews_for_user(claims.sub)
    })
    .await?;
    Ok(Json(crews))
}

pub async fn join_crew(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinCrewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = run_mutation(&state, move |db| {
        MembershipGraph::new(db).join(&req.code, claims.sub)
    })
    .await?;

    let already_member = matches!(outcome, JoinOutcome::AlreadyMember(_));
    let crew = match outcome {
        JoinOutcome::Joined(crew) | JoinOutcome::AlreadyMember(crew) => crew,
    };
    Ok(Json(JoinCrewResponse {
        crew,
        already_member,
    }))
}

pub async fn get_crew(
    State(state): State<AppState>,
    Path(crew_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = run_blocking(&state, move |db| {
        let graph = MembershipGraph::new(db);
        require_member(&graph, crew_id, claims.sub)?;
        let crew = graph.get_crew(crew_id)?;
        Ok(CrewSummary {
            is_creator: crew.is_creator(claims.sub),
            member_count: graph.member_count(crew_id)?,
            crew,
        })
    })
    .await?;
    Ok(Json(summary))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(crew_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let members = run_blocking(&state, move |db| {
        let graph = MembershipGraph::new(db);
        require_member(&graph, crew_id, claims.sub)?;
        graph.list_members(crew_id)
    })
    .await?;
    Ok(Json(members))
}

pub async fn leave_crew(
    State(state): State<AppState>,
    Path(crew_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = run_mutation(&state, move |db| {
        MembershipGraph::new(db).leave(crew_id, claims.sub)
    })
    .await?;
    Ok(Json(LeaveCrewResponse { outcome }))
}

pub async fn kick_member(
    State(state): State<AppState>,
    Path((crew_id, member_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = run_mutation(&state, move |db| {
        MembershipGraph::new(db).kick(crew_id, claims.sub, member_id)
    })
    .await?;
    Ok(Json(KickMemberResponse { outcome }))
}
