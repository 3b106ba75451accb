//! REST API endpoint for analysis jobs

use actix_web::{HttpResponse, post, web};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::health::{DependencyHealth, HealthStatus, ReadinessStatus};
use crate::model::{
    AnalysisContext, AnalysisInput, AnalysisResult, ArticleVerdict, Centrality, Claim,
    ClaimVerdict, ContestationType, ContextBoundary, ContextResearchReport, ContextVerdict,
    DoneReason, EvidenceCategory, EvidenceDirection, EvidenceItem, FetchStatus, RelevanceClass,
    ResearchDepth, ResearchSummary, Source, Specificity, VerdictCorrection,
};
use crate::service::AnalysisService;

/// Analysis job request
///
/// Either supply decomposed `claims` (with their `contexts`), or only
/// `input_text` to have it decomposed first.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub input_text: String,
    /// Language tag of the input (e.g. "en", "de")
    pub language: Option<String>,
    #[serde(default)]
    pub depth: ResearchDepth,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub contexts: Vec<AnalysisContext>,
}

impl AnalysisRequest {
    fn into_input(self) -> Result<AnalysisInput, ApiError> {
        if self.claims.is_empty() && self.input_text.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "either claims or input_text is required".to_string(),
            ));
        }
        if let Some(claim) = self.claims.iter().find(|c| c.text.trim().is_empty()) {
            return Err(ApiError::BadRequest(format!("claim {} has no text", claim.id)));
        }

        Ok(AnalysisInput {
            input_text: self.input_text,
            language: self.language,
            depth: self.depth,
            claims: self.claims,
            contexts: self.contexts,
        })
    }
}

/// Run an analysis job to completion
#[utoipa::path(
    post,
    path = "/v1/analyses",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Analysis completed", body = AnalysisResult),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 422, description = "Nothing to analyze", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 502, description = "Upstream capability failed", body = ErrorResponse)
    ),
    tag = "analyses"
)]
#[post("/v1/analyses")]
pub async fn create_analysis(
    service: web::Data<AnalysisService>,
    request: web::Json<AnalysisRequest>,
) -> Result<HttpResponse, ApiError> {
    let input = request.into_inner().into_input()?;
    let result = service.run_analysis(input).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_analysis,
        crate::api::health::liveness,
        crate::api::health::readiness
    ),
    components(schemas(
        AnalysisRequest,
        AnalysisResult,
        AnalysisContext,
        ContextBoundary,
        Claim,
        Centrality,
        ResearchDepth,
        Source,
        FetchStatus,
        RelevanceClass,
        EvidenceItem,
        EvidenceCategory,
        EvidenceDirection,
        Specificity,
        ClaimVerdict,
        ContestationType,
        VerdictCorrection,
        ArticleVerdict,
        ContextVerdict,
        ResearchSummary,
        ContextResearchReport,
        DoneReason,
        ErrorResponse,
        HealthStatus,
        ReadinessStatus,
        DependencyHealth
    )),
    tags(
        (name = "analyses", description = "Claim verification jobs"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Configure analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_analysis);
}
