//! HTTP routes for the smart cart front end.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::cart::{self, CartLine, CartTotals};
use crate::catalog::{self, Product};
use crate::config::Config;
use crate::detection::Detector;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Service context shared by every handler. Built once before serving.
#[derive(Clone, Debug)]
pub struct AppState {
    pub detector: Arc<Detector>,
}

impl AppState {
    pub fn new(detector: Detector) -> Self {
        Self {
            detector: Arc::new(detector),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<&'static Product>,
}

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub items: Vec<CartLine>,
}

pub fn create_app(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/detect", post(detect_handler))
        .route("/products", get(products_handler))
        .route("/cart/totals", post(cart_totals_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        model_loaded: state.detector.is_ready(),
    })
}

/// POST /detect - products recognised in the uploaded image.
///
/// Anything that goes wrong along the way, from a missing upload to a failed
/// inference, produces an empty product list rather than an error status.
async fn detect_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<ProductsResponse> {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart).await,
        Err(rejection) => {
            debug!("Rejected upload: {rejection}");
            None
        }
    };

    let class_ids = match upload {
        Some(bytes) => {
            let detector = Arc::clone(&state.detector);
            tokio::task::spawn_blocking(move || detector.detect(&bytes))
                .await
                .unwrap_or_else(|e| {
                    error!("Detection task failed: {e}");
                    HashSet::new()
                })
        }
        None => HashSet::new(),
    };

    let products = class_ids
        .into_iter()
        .filter_map(|class_id| {
            let product = catalog::get_product(class_id);
            if product.is_none() {
                debug!(class_id, "detected class has no catalog entry");
            }
            product
        })
        .collect();

    Json(ProductsResponse { products })
}

async fn read_upload(mut multipart: Multipart) -> Option<Bytes> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => {
                return field
                    .bytes()
                    .await
                    .map_err(|e| debug!("Failed to read upload: {e}"))
                    .ok();
            }
            Ok(Some(_)) => continue,
            Ok(None) => {
                debug!("Multipart body has no `{UPLOAD_FIELD}` field");
                return None;
            }
            Err(e) => {
                debug!("Malformed multipart body: {e}");
                return None;
            }
        }
    }
}

async fn products_handler() -> Json<ProductsResponse> {
    Json(ProductsResponse {
        products: catalog::all_products().iter().collect(),
    })
}

async fn cart_totals_handler(Json(request): Json<CartRequest>) -> Json<CartTotals> {
    Json(cart::compute_totals(&request.items))
}
