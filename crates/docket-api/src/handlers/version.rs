use crate::constants::API_VERSION;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub api_version: &'static str,
}

#[utoipa::path(
    get,
    path = "/api/v1/version",
    tag = "meta",
    responses(
        (status = 200, description = "Service and API version", body = VersionInfo)
    )
)]
pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: "docket",
        version: env!("CARGO_PKG_VERSION"),
        api_version: API_VERSION,
    })
}
