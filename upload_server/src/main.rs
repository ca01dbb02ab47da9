//! Main entry point for the upload service binary

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use upload_core::{
    connect, create_app, run_server, AppConfig, AppState, AttachmentRelation, DiskFileStore,
    FileRepository, FileStore, MemoryFileStore, MemoryRelation, OwningRelation, RuleRegistry,
    RuleResolver, WidgetManifest,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    config
        .create_directories()
        .map_err(|e| anyhow::anyhow!("Failed to create directories: {}", e))?;

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let manifest = load_manifest(&config);
    info!("Widget manifest loaded: {} widget(s)", manifest.widgets.len());

    let registry = Arc::new(RuleRegistry::with_builtin_rules());
    let resolver = RuleResolver::new(config.upload_defaults());

    let state = if !config.database.url.is_empty() {
        match initialize_database(&config).await {
            Ok(repository) => {
                info!("Database initialized successfully");
                let store: Arc<dyn FileStore> = Arc::new(DiskFileStore::new(
                    config.storage.upload_dir.clone(),
                    repository.clone(),
                ));
                build_state(&config, &manifest, &registry, &resolver, store, |definition| {
                    Arc::new(AttachmentRelation::new(
                        repository.clone(),
                        definition.owner.clone(),
                        definition.field.clone(),
                        definition.public,
                    ))
                })
            }
            Err(e) => {
                tracing::warn!("Failed to initialize database, falling back to in-memory store: {}", e);
                memory_state(&config, &manifest, &registry, &resolver)
            }
        }
    } else {
        info!("Using in-memory file store");
        memory_state(&config, &manifest, &registry, &resolver)
    };

    info!("App: {} v{}", state.app_name, state.version);

    let app = create_app(state);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn load_manifest(config: &AppConfig) -> WidgetManifest {
    match WidgetManifest::load(&config.uploads.widget_manifest) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::warn!(
                "Could not load widget manifest {}: {} - starting with no widgets",
                config.uploads.widget_manifest.display(),
                e
            );
            WidgetManifest::default()
        }
    }
}

async fn initialize_database(config: &AppConfig) -> Result<FileRepository> {
    let pool = connect(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;

    let repository = FileRepository::new(pool);
    repository
        .create_tables()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create tables: {}", e))?;

    Ok(repository)
}

fn build_state(
    config: &AppConfig,
    manifest: &WidgetManifest,
    registry: &Arc<RuleRegistry>,
    resolver: &RuleResolver,
    store: Arc<dyn FileStore>,
    relation_for: impl FnMut(&upload_core::WidgetDefinition) -> Arc<dyn OwningRelation>,
) -> AppState {
    let (widgets, descriptors) = manifest.build_widgets(
        registry,
        resolver,
        &store,
        &config.storage.public_base_path,
        relation_for,
    );

    AppState::new(store).with_widgets(widgets, descriptors)
}

fn memory_state(
    config: &AppConfig,
    manifest: &WidgetManifest,
    registry: &Arc<RuleRegistry>,
    resolver: &RuleResolver,
) -> AppState {
    let store: Arc<dyn FileStore> = Arc::new(MemoryFileStore::new());
    build_state(config, manifest, registry, resolver, store, |definition| {
        Arc::new(MemoryRelation::new(definition.public))
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };

        format!(
            "{}={},tower_http=debug,axum=debug",
            env!("CARGO_CRATE_NAME").replace('-', "_"),
            default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
