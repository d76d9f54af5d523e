use crate::auth::AuthUser;
use crate::database::entities::ProfileRecord;
use crate::error::AppError;
use crate::server::Server;
use crate::usage::UsageStats;
use crate::usage::tier::Tier;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct CreateProfileRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tier: Option<Tier>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub tier: Option<Tier>,
}

pub fn create_profile_routes() -> Router<Server> {
    Router::new()
        .route(
            "/profile",
            get(get_profile).post(create_profile).put(update_profile),
        )
        .route("/profile/usage", get(usage_stats))
}

/// Paid tiers are granted by billing only
fn self_service_tier(tier: Option<Tier>) -> Result<Tier, AppError> {
    match tier.unwrap_or_default() {
        Tier::Free => Ok(Tier::Free),
        other => Err(AppError::Forbidden(format!(
            "tier {} can only be granted through billing",
            other
        ))),
    }
}

/// Report the stored tier in its normalised form
fn normalised(mut profile: ProfileRecord) -> ProfileRecord {
    profile.tier = profile.tier().as_str().to_string();
    profile
}

async fn create_profile(
    State(server): State<Server>,
    user: AuthUser,
    Json(request): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<ProfileRecord>), AppError> {
    let tier = self_service_tier(request.tier)?;
    let email = request
        .email
        .or(user.email)
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("email is required".to_string()))?;

    let profiles = server.database.profiles();
    if profiles.find_by_id(&user.user_id).await?.is_some() {
        return Err(AppError::Conflict("profile already exists".to_string()));
    }

    let profile = profiles
        .create(&ProfileRecord::new(&user.user_id, email, tier))
        .await?;
    info!(user_id = %profile.id, tier = %tier, "Created profile");

    Ok((StatusCode::CREATED, Json(normalised(profile))))
}

async fn get_profile(
    State(server): State<Server>,
    user: AuthUser,
) -> Result<Json<ProfileRecord>, AppError> {
    let profile = server
        .database
        .profiles()
        .find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("profile not found".to_string()))?;

    Ok(Json(normalised(profile)))
}

async fn update_profile(
    State(server): State<Server>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileRecord>, AppError> {
    let profiles = server.database.profiles();

    let profile = match request.tier {
        Some(tier) => {
            let tier = self_service_tier(Some(tier))?;
            let profile = profiles.update_tier(&user.user_id, tier).await?;
            info!(user_id = %user.user_id, tier = %tier, "Updated profile tier");
            profile
        }
        None => profiles
            .find_by_id(&user.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("profile not found".to_string()))?,
    };

    Ok(Json(normalised(profile)))
}

async fn usage_stats(
    State(server): State<Server>,
    user: AuthUser,
) -> Result<Json<UsageStats>, AppError> {
    let stats = server
        .ledger
        .usage_stats(&user.user_id, Utc::now().date_naive())
        .await?;
    Ok(Json(stats))
}
