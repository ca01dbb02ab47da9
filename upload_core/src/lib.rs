//! Core library for the validated file-upload service: rule resolution,
//! upload validation, the postback transaction and its HTTP surface.

pub mod config;
pub mod error;
pub mod handlers;
pub mod rules;
pub mod upload;
pub mod widgets;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use handlers::routes::create_routes;
pub use rules::{Rule, RuleContext, RuleRegistry, RuleResolver, RuleScope, RuleSet, UploadDefaults};
pub use upload::{
    connect, AttachmentRelation, DiskFileStore, FileRepository, FileStore, MemoryFileStore,
    MemoryRelation, ModelRules, OwningRelation, ResponseReporter, StaticModelRules, StoredFile,
    UploadPayload, UploadRequest, UploadTarget, UploadTransaction, UploadValidator, UploadedFile,
    ValidationOutcome, Violation, FILE_PAYLOAD_KEY, SESSION_KEY_FIELD, UPLOAD_WIDGET_HEADER,
};
pub use widgets::{
    FileUploadWidget, ModelDefinition, UploadWidget, WidgetConfig, WidgetDefinition,
    WidgetDescriptor, WidgetManifest, WidgetMode,
};

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub widgets: Arc<Vec<Arc<dyn UploadWidget>>>,
    pub widget_descriptors: Arc<Vec<WidgetDescriptor>>,
    pub store: Arc<dyn FileStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            app_name: "Upload Service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            widgets: Arc::new(Vec::new()),
            widget_descriptors: Arc::new(Vec::new()),
            store,
        }
    }

    pub fn with_widgets(
        mut self,
        widgets: Vec<Arc<dyn UploadWidget>>,
        descriptors: Vec<WidgetDescriptor>,
    ) -> Self {
        self.widgets = Arc::new(widgets);
        self.widget_descriptors = Arc::new(descriptors);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(create_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
