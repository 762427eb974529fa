use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use recordmap::canvas::GeoJsonCanvas;
use recordmap::config::MapViewConfig;
use recordmap::data_load::{DataLoadCoordinator, JsonRecordSource, MapQuery, source::DEFAULT_LIMIT};
use recordmap::directions::{MapboxDirections, google_maps_url};
use recordmap::placement::MarkerPlacementPipeline;
use recordmap::renderer::{MapRenderer, RendererOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// Renders a JSON record set as map markers and routes in GeoJSON
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Records as a JSON array or a `{"records": [...]}` document
    #[arg(long)]
    records: PathBuf,
    /// Query describing fields, grouping, ordering and routing
    #[arg(long)]
    query: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Group ids to leave off the map, repeatable
    #[arg(long)]
    collapsed: Vec<String>,
    /// Route leg to highlight
    #[arg(long)]
    select_route: Option<usize>,
    /// Where to write the GeoJSON, stdout when absent
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also print a Google Maps directions link
    #[arg(long, default_value_t = false)]
    directions_link: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MapViewConfig::from_path(path)?,
        None => MapViewConfig::default(),
    }
    .with_env_overrides();

    let query: MapQuery = match &args.query {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading query {}", path.display()))?;
            serde_json::from_str(&raw)?
        }
        None => MapQuery {
            res_model: "records".to_string(),
            field_names: vec!["display_name".to_string()],
            limit: DEFAULT_LIMIT,
            ..Default::default()
        },
    };

    let source = JsonRecordSource::from_path(&args.records).map_err(|e| anyhow::anyhow!(e))?;

    let mut coordinator = DataLoadCoordinator::new(Arc::new(source), config.clone());
    if let Some(token) = config.mapbox_token.as_deref().filter(|token| !token.is_empty()) {
        coordinator = coordinator.with_route_provider(Arc::new(MapboxDirections::new(token)));
    }

    let outcome = coordinator.load(&query).await?;
    let Some(state) = outcome.state().cloned() else {
        anyhow::bail!("load was superseded");
    };

    if let Some(error) = state.routes.error() {
        warn!("route unavailable: {}", error);
    }

    if let Some(groups) = &state.groups {
        for group in groups.values() {
            info!("group {}: {} records", group.label, group.len());
        }
    }

    let mut renderer = MapRenderer::new(
        MarkerPlacementPipeline::new(config.placement()?),
        RendererOptions::from_query(&query),
    );
    renderer.sync_grouping(&state);
    for group_id in &args.collapsed {
        renderer.collapse_group(group_id);
    }

    let mut canvas = GeoJsonCanvas::new();
    renderer.update(&state, &mut canvas);

    if let Some(leg) = args.select_route {
        if !renderer.select_route(leg, &mut canvas) {
            warn!("no route leg {}", leg);
        }
    }

    info!(
        "{} markers for {} of {} records, tiles from {}",
        renderer.markers().count(),
        state.located_count(),
        state.count,
        config.tile_source().url_template
    );

    let geojson = canvas.to_geojson_string();
    match &args.output {
        Some(path) => std::fs::write(path, geojson)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", geojson),
    }

    if args.directions_link {
        println!("{}", google_maps_url(&state.records, query.routing));
    }

    coordinator.shutdown().await;

    Ok(())
}
