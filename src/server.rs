use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use anyhow::Context;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::cache::CacheService;
use crate::config::AppConfig;
use crate::handlers::{elevated, protected, public};
use crate::middleware::token_auth_middleware;
use crate::services::{
    ColumnService, InventoryService, ModuleService, PublicService, RowService, TableService, TokenService,
    TransferService, UserService,
};

/// Shared handler state. Services are cheap views over the pool and cache.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub cache: CacheService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Arc<AppConfig>) -> Self {
        let cache = CacheService::in_memory(&config.cache);
        Self { pool, cache, config }
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.pool.clone())
    }

    pub fn tokens(&self) -> TokenService {
        TokenService::new(self.pool.clone(), self.cache.clone(), self.config.security.clone())
    }

    pub fn tables(&self) -> TableService {
        TableService::new(self.pool.clone(), self.cache.clone())
    }

    pub fn columns(&self) -> ColumnService {
        ColumnService::new(self.pool.clone(), self.cache.clone())
    }

    pub fn rows(&self) -> RowService {
        RowService::new(self.pool.clone(), self.cache.clone())
    }

    pub fn modules(&self) -> ModuleService {
        ModuleService::new(self.pool.clone(), self.cache.clone())
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.pool.clone(), self.cache.clone())
    }

    pub fn transfer(&self) -> TransferService {
        TransferService::new(self.pool.clone(), self.cache.clone(), self.config.api.clone())
    }

    pub fn public(&self) -> PublicService {
        PublicService::new(self.pool.clone(), self.cache.clone())
    }
}

pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security.cors_origins);

    let authenticated = Router::new()
        .merge(public_routes())
        .merge(admin_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), token_auth_middleware));

    Router::new()
        // No auth
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/public/health", get(public::health))
        .merge(authenticated)
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/public/tables", get(public::tables_list))
        .route("/api/public/tables/search", get(public::tables_search))
        .route("/api/public/tables/:table_id/items", get(public::items_list))
        .route("/api/public/tables/:table_id/items/:item_id", get(public::item_get))
        .route(
            "/api/public/tables/:table_id/items/:item_id/availability",
            get(public::item_availability),
        )
        .route("/api/public/records", get(public::records_list))
        .route("/api/public/values/:column", get(public::values_list))
        .route("/api/public/buy", post(public::buy))
        .route("/api/public/rent", post(public::rent))
        .route("/api/public/release", post(public::release))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        // Tables
        .route("/api/tables", get(protected::table_list).post(protected::table_create))
        .route(
            "/api/tables/:table_id",
            get(protected::table_get)
                .put(protected::table_update)
                .delete(protected::table_delete),
        )
        // Columns
        .route(
            "/api/tables/:table_id/columns",
            get(protected::column_list).post(protected::column_create),
        )
        .route(
            "/api/tables/:table_id/columns/:column_id",
            put(protected::column_update).delete(protected::column_delete),
        )
        // Rows
        .route(
            "/api/tables/:table_id/rows",
            get(protected::row_list)
                .post(protected::row_create)
                .delete(protected::row_delete_all),
        )
        .route(
            "/api/tables/:table_id/rows/:row_id",
            get(protected::row_get)
                .put(protected::row_update)
                .delete(protected::row_delete),
        )
        // Import / export / generate
        .route("/api/tables/:table_id/import", post(protected::table_import))
        .route("/api/tables/:table_id/export", get(protected::table_export))
        .route("/api/tables/:table_id/generate", post(protected::table_generate))
        .route("/api/column-types", get(protected::column_types))
        // Admin permission
        .route("/api/tokens", get(elevated::token_list).post(elevated::token_create))
        .route(
            "/api/tokens/:token_id",
            get(elevated::token_get)
                .put(elevated::token_update)
                .delete(elevated::token_delete),
        )
        .route("/api/tokens/:token_id/regenerate", post(elevated::token_regenerate))
        .route("/api/modules", get(elevated::module_list).post(elevated::module_install))
        .route("/api/modules/:module_id", delete(elevated::module_uninstall))
        .route("/api/modules/:module_id/enable", post(elevated::module_enable))
        .route("/api/modules/:module_id/disable", post(elevated::module_disable))
        .route("/api/cache/invalidate", post(elevated::cache_invalidate))
}

/// `*` anywhere in the list allows every origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("ignoring CORS origin {:?}: {}", o, e);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Bind `port` on all interfaces and serve until the process stops. Peer
/// addresses are recorded for token IP whitelists.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("dyntables listening on http://{}", bind_addr);
    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
