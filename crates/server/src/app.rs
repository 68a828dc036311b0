use std::sync::Arc;

use anyhow::{Result, anyhow};
use llmserve_pipeline::{
    ModelId, PipelineEvent,
    llmserve_config::{AppConfig, ConfigOverrides},
};
use rocket::{Build, Config, Rocket, data::ToByteUnit, fairing::AdHoc, figment::Figment};
use tracing::info;

use crate::{args::Args, cors::Cors, routes, state::AppState};

pub async fn run(args: Args) -> Result<()> {
    let overrides = ConfigOverrides::from(&args);
    let (app_config, descriptor) = AppConfig::load_with_overrides(&overrides)?;
    let base_inference = app_config.inference.clone();
    info!(
        "Using configuration {} (active model `{}`)",
        descriptor.path.display(),
        app_config.models.active
    );

    let host = app_config.server.host.clone();
    let port = app_config.server.port;
    let active_model = ModelId::try_from(app_config.models.active.as_str())?;
    let state = AppState::bootstrap(Arc::new(app_config), base_inference, overrides.inference);
    state
        .manager()
        .observer()
        .on_event(&PipelineEvent::ConfigLoaded {
            config_path: Some(descriptor.path.display().to_string()),
            active_model,
        });

    let figment = Config::figment()
        .merge(("port", port))
        .merge(("address", host.clone()))
        .merge((
            "limits",
            rocket::data::Limits::default().limit("json", 4.mebibytes()),
        ));

    info!("Server ready on {host}:{port}");

    build_rocket(state, figment)
        .launch()
        .await
        .map_err(|err| anyhow!("rocket failed: {err}"))?;

    Ok(())
}

/// Assemble the server: routes under `/v1`, JSON catchers, CORS, and the
/// fairings that start the queue, warm the configured model once listening
/// and release everything on shutdown.
pub fn build_rocket(state: AppState, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Cors)
        .attach(AdHoc::on_ignite("Inference queue", |rocket| async move {
            if let Some(state) = rocket.state::<AppState>() {
                state.queue().start_worker();
            }
            rocket
        }))
        .attach(AdHoc::on_liftoff("Model warmup", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AppState>() {
                    state.spawn_warmup();
                }
            })
        }))
        .attach(AdHoc::on_shutdown("Model release", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AppState>() {
                    state.shutdown();
                }
            })
        }))
        .manage(state)
        .mount("/v1", routes::v1_routes())
        .register("/", routes::api_catchers())
}
