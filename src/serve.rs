use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::{GraphError, GraphResult};
use crate::*;

/// Options for `ownerchart serve`
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5252)]
    pub port: u16,

    /// Background color for rendered SVG previews.
    #[arg(long = "background-color", default_value = "white")]
    pub background_color: String,
}

pub struct ServeState {
    source_path: PathBuf,
    background: String,
    config: ChartConfig,
    graph: RwLock<Graph>,
}

type ApiError = (StatusCode, String);

#[derive(Debug, Deserialize, Default)]
struct ChartQuery {
    width: Option<f64>,
    height: Option<f64>,
    #[serde(default)]
    fit: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartPayload {
    chart: ChartLayout,
    viewport: Viewport,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCompanyRequest {
    name: String,
    #[serde(default, rename = "type")]
    type_tag: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateCompanyRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    type_tag: Option<String>,
    #[serde(default)]
    primary_parent_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LinkRequest {
    #[serde(default)]
    ownership: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePersonRequest {
    company_id: String,
    name: String,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Serialize)]
struct CreatedPayload {
    id: String,
}

impl ServeState {
    pub fn new(
        source_path: PathBuf,
        graph: Graph,
        config: ChartConfig,
        background: String,
    ) -> Self {
        Self {
            source_path,
            background,
            config,
            graph: RwLock::new(graph),
        }
    }

    pub async fn snapshot(&self) -> Graph {
        self.graph.read().await.clone()
    }

    /// Applies `edit` to a copy of the graph, persists the copy, then swaps it
    /// in. A refused edit or a failed write leaves the served graph untouched.
    pub async fn mutate<T, F>(&self, edit: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Graph) -> GraphResult<T>,
    {
        let mut current = self.graph.write().await;
        let mut next = current.clone();
        let value = edit(&mut next).map_err(graph_error)?;

        let path = self.source_path.clone();
        let to_save = next.clone();
        tokio::task::spawn_blocking(move || store::save(&path, &to_save))
            .await
            .map_err(|err| internal_error(anyhow!("save task failed: {err}")))?
            .map_err(internal_error)?;

        *current = next;
        Ok(value)
    }
}

pub fn router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/graph", get(get_graph).put(put_graph))
        .route("/api/graph/merge", post(post_merge))
        .route("/api/chart", get(get_chart))
        .route("/api/chart/svg", get(get_svg))
        .route("/api/companies", post(post_company))
        .route(
            "/api/companies/:id",
            axum::routing::patch(patch_company).delete(delete_company),
        )
        .route(
            "/api/companies/:id/parents/:parent",
            put(put_parent).delete(delete_parent),
        )
        .route("/api/people", post(post_person))
        .route("/api/people/:id", axum::routing::delete(delete_person))
        .with_state(state)
}

pub async fn run_serve(source_path: PathBuf, config: ChartConfig, args: ServeArgs) -> Result<()> {
    let graph = store::load_or_default(&source_path)?;
    info!(
        path = %source_path.display(),
        companies = graph.companies.len(),
        people = graph.people.len(),
        "serving graph"
    );

    let state = Arc::new(ServeState::new(
        source_path,
        graph,
        config,
        args.background_color.clone(),
    ));
    let app = router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("ownerchart server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn get_graph(State(state): State<Arc<ServeState>>) -> Json<Graph> {
    Json(state.snapshot().await)
}

async fn put_graph(
    State(state): State<Arc<ServeState>>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let replacement = Graph::from_value(payload).map_err(graph_error)?;
    state.mutate(|graph| graph.replace(replacement)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_merge(
    State(state): State<Arc<ServeState>>,
    Json(payload): Json<Value>,
) -> Result<Json<MergeSummary>, ApiError> {
    let incoming = Graph::decode_value(payload).map_err(graph_error)?;
    let summary = state.mutate(|graph| graph.merge(incoming)).await?;
    Ok(Json(summary))
}

async fn get_chart(
    State(state): State<Arc<ServeState>>,
    Query(query): Query<ChartQuery>,
) -> Json<ChartPayload> {
    let graph = state.snapshot().await;
    let chart = ChartLayout::compute(&graph, &state.config);

    let width = query.width.unwrap_or(1280.0);
    let height = query.height.unwrap_or(800.0);
    let viewport = match (query.fit, chart.bounds) {
        (true, Some(bounds)) => Viewport::fitted(&bounds, width, height, &state.config),
        _ => chart.initial_viewport(width, height, &state.config),
    };

    Json(ChartPayload { chart, viewport })
}

async fn get_svg(State(state): State<Arc<ServeState>>) -> Result<Response, ApiError> {
    let graph = state.snapshot().await;
    let chart = ChartLayout::compute(&graph, &state.config);
    let options = RenderOptions {
        background: state.background.clone(),
        ..RenderOptions::default()
    };
    let svg = render_svg(&chart, &options)
        .map_err(|err| (StatusCode::NOT_FOUND, err.to_string()))?;

    let mut response = svg.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn post_company(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<CreatedPayload>), ApiError> {
    let CreateCompanyRequest {
        name,
        type_tag,
        parent_id,
    } = request;
    let id = state
        .mutate(|graph| match &parent_id {
            Some(parent) => graph.add_child_company(parent, &name, type_tag.as_deref()),
            None => graph.add_company(&name, type_tag.as_deref()),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedPayload { id })))
}

async fn patch_company(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
    Json(request): Json<UpdateCompanyRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|graph| {
            if let Some(name) = &request.name {
                graph.rename_company(&id, name)?;
            }
            if let Some(tag) = &request.type_tag {
                graph.set_type(&id, tag)?;
            }
            if let Some(parent) = &request.primary_parent_id {
                graph.set_primary_parent(&id, parent)?;
            }
            if !graph.contains(&id) {
                return Err(GraphError::UnknownCompany(id.clone()));
            }
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_company(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<DeleteSummary>, ApiError> {
    let summary = state.mutate(|graph| graph.delete_company(&id)).await?;
    Ok(Json(summary))
}

async fn put_parent(
    State(state): State<Arc<ServeState>>,
    AxumPath((id, parent)): AxumPath<(String, String)>,
    Json(request): Json<LinkRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|graph| {
            let linked = graph.company(&id).is_some_and(|c| c.has_parent(&parent));
            if linked {
                graph.set_ownership(&id, &parent, request.ownership)
            } else {
                graph.add_parent(&id, &parent, request.ownership)
            }
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_parent(
    State(state): State<Arc<ServeState>>,
    AxumPath((id, parent)): AxumPath<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.mutate(|graph| graph.remove_parent(&id, &parent)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_person(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<CreatePersonRequest>,
) -> Result<(StatusCode, Json<CreatedPayload>), ApiError> {
    let id = state
        .mutate(|graph| graph.add_person(&request.company_id, &request.name, &request.role))
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedPayload { id })))
}

async fn delete_person(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    state.mutate(|graph| graph.remove_person(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn graph_error(err: GraphError) -> ApiError {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, err.to_string())
    } else {
        (StatusCode::BAD_REQUEST, err.to_string())
    }
}

fn internal_error(err: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}
