mod catalog;
mod config;
mod console;
mod locate;

use std::error::Error;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use tokio_util::sync::CancellationToken;
use weather_layer::{
    spawn_sweeper, Basemap, CommandOutcome, GeoPoint, LoadOutcome, OpenWeatherMapClient, OverlaySelection,
    PanelState, SourceResolver, SummaryCache, SummaryResolver, SurfaceCoordinator, SurfaceKind,
    WeatherCache, WeatherFetcher, WeatherPanel, WeatherPayload, SUMMARY_TTL, WEATHER_TTL,
};

use catalog::{AirportCatalog, BoundingBox, Catalog};
use config::AppConfig;
use console::ConsoleSurface;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// current weather, forecast and summary for a location
    Weather(WeatherArgs),
    /// attach overlays to a console surface and print their sources
    Overlays(OverlayArgs),
    /// look up airports by code or position
    Airports(AirportArgs),
    /// show the config file location and key sources
    Config,
}

#[derive(Args)]
struct WeatherArgs {
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// locate via IP address
    #[arg(long, conflicts_with = "lat")]
    here: bool,

    /// retry this many times after a failed fetch
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[derive(Args)]
struct OverlayArgs {
    /// reference date for satellite imagery (default: today, UTC)
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// overlay id, repeatable (default: from config)
    #[arg(long = "layer", value_name = "id")]
    layers: Vec<String>,

    #[arg(long, value_parser = parse_basemap)]
    basemap: Option<Basemap>,

    /// use the 3D globe surface
    #[arg(long)]
    globe: bool,
}

#[derive(Args)]
struct AirportArgs {
    /// ICAO or IATA code
    #[arg(long, conflicts_with = "near")]
    code: Option<String>,

    /// lat,lon
    #[arg(long, num_args = 2, value_delimiter = ',', allow_hyphen_values = true)]
    near: Option<Vec<f64>>,

    /// search radius in degrees
    #[arg(long, default_value_t = 0.5)]
    radius: f64,

    /// maximum number of airports to list
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

fn parse_basemap(value: &str) -> Result<Basemap, String> {
    match value.to_ascii_lowercase().as_str() {
        "dark" => Ok(Basemap::Dark),
        "light" => Ok(Basemap::Light),
        "streets" => Ok(Basemap::Streets),
        other => Err(format!("unknown basemap '{other}' (dark, light, streets)")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Commands::Weather(args) => weather(&config, &args).await,
        Commands::Overlays(args) => overlays(&config, &args),
        Commands::Airports(args) => airports(&config, &args).await,
        Commands::Config => show_config(&config),
    }
}

async fn resolve_point(config: &AppConfig, args: &WeatherArgs) -> Result<GeoPoint, Box<dyn Error>> {
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        return Ok(GeoPoint::new(lat, lon));
    }
    if !args.here {
        if let Some(point) = config.default_location() {
            return Ok(point);
        }
    }
    locate::current_location()
        .await
        .ok_or_else(|| "no location given and IP geolocation failed".into())
}

async fn weather(config: &AppConfig, args: &WeatherArgs) -> Result<(), Box<dyn Error>> {
    let point = resolve_point(config, args).await?;
    let keys = config.service_keys();

    let weather_cache = Arc::new(WeatherCache::new(WEATHER_TTL));
    let summary_cache = Arc::new(SummaryCache::new(SUMMARY_TTL));
    let cancel = CancellationToken::new();
    let sweepers = [
        spawn_sweeper("weather", Arc::clone(&weather_cache), config.sweep_interval(), cancel.clone()),
        spawn_sweeper("summary", Arc::clone(&summary_cache), config.sweep_interval(), cancel.clone()),
    ];

    let client = OpenWeatherMapClient::new(keys.openweathermap.clone())?;
    let fetcher = WeatherFetcher::new(Arc::new(client), weather_cache);
    let summaries = SummaryResolver::with_credentials(&keys, summary_cache);
    info!("Summary providers: {}", summaries.provider_names().join(" -> "));

    let panel = Arc::new(WeatherPanel::new(fetcher, Arc::new(summaries)));
    let resolver = Arc::new(SourceResolver::new(keys.openweathermap.clone()));
    let selection = OverlaySelection::new(chrono::Utc::now().date_naive(), config.default_basemap);
    let mut coordinator = SurfaceCoordinator::new(Arc::clone(&panel), resolver, selection);
    coordinator.mount(Box::new(ConsoleSurface::new(SurfaceKind::TwoD, config.default_location()).quiet()));

    let mut rx = panel.subscribe();
    if coordinator.search_and_show_weather(point) != CommandOutcome::Done {
        return Err("map surface not ready".into());
    }

    let mut outcome = wait_for_panel(&mut rx).await;
    let mut attempts = 0;
    while outcome == LoadOutcome::Failed && attempts < args.retries {
        attempts += 1;
        warn!("Retrying weather fetch ({attempts}/{})", args.retries);
        outcome = panel.retry().await.unwrap_or(LoadOutcome::Failed);
    }

    cancel.cancel();
    for sweeper in sweepers {
        sweeper.await?;
    }

    match panel.state() {
        PanelState::Loaded { payload, summary, .. } => {
            print_report(point, &payload, summary.as_deref());
            Ok(())
        }
        PanelState::Failed { message, .. } => Err(message.into()),
        _ => Err("weather load did not finish".into()),
    }
}

async fn wait_for_panel(rx: &mut tokio::sync::watch::Receiver<PanelState>) -> LoadOutcome {
    let settled = rx
        .wait_for(|state| {
            matches!(
                state,
                PanelState::Loaded { summary: Some(_), .. } | PanelState::Failed { .. }
            )
        })
        .await;

    match settled.as_deref() {
        Ok(PanelState::Loaded { .. }) => LoadOutcome::Shown,
        _ => LoadOutcome::Failed,
    }
}

fn print_report(point: GeoPoint, payload: &WeatherPayload, summary: Option<&str>) {
    let current = &payload.current;
    let place = match payload.location_name() {
        "" => point.to_string(),
        name => format!("{name} ({point})"),
    };

    println!("{place}");
    println!(
        "  {:.1}°C (feels like {:.1}°C), {}",
        current.temperature, current.feels_like, current.condition
    );
    println!(
        "  humidity {}%  pressure {} hPa  wind {:.1} m/s @ {}°",
        current.humidity, current.pressure, current.wind_speed, current.wind_deg
    );

    if !payload.forecast.is_empty() {
        println!("  forecast:");
        for entry in &payload.forecast {
            let when = entry
                .observed_at
                .map_or_else(|| "--".to_string(), |t| t.format("%a %d %b").to_string());
            println!("    {when:<10} {:>5.1}°C  {}", entry.temperature, entry.condition);
        }
    }

    if let Some(aq) = &payload.air_quality {
        println!("  air quality: {} (AQI {}, PM2.5 {:.1} µg/m³)", aq.label(), aq.aqi, aq.pm2_5);
    }

    if let Some(text) = summary {
        println!();
        println!("{text}");
    }
}

fn overlays(config: &AppConfig, args: &OverlayArgs) -> Result<(), Box<dyn Error>> {
    let keys = config.service_keys();
    let date = args.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let basemap = args.basemap.unwrap_or(config.default_basemap);
    let layers = if args.layers.is_empty() {
        config.default_overlays.clone()
    } else {
        args.layers.clone()
    };

    // Summaries are never requested here; the panel only needs to exist.
    let fetcher = WeatherFetcher::new(
        Arc::new(OpenWeatherMapClient::new(keys.openweathermap.clone())?),
        Arc::new(WeatherCache::new(WEATHER_TTL)),
    );
    let summaries = SummaryResolver::new(Vec::new(), Arc::new(SummaryCache::new(SUMMARY_TTL)));
    let panel = Arc::new(WeatherPanel::new(fetcher, Arc::new(summaries)));

    let resolver = Arc::new(SourceResolver::new(keys.openweathermap));
    let selection = OverlaySelection::new(date, basemap).with_active(layers);
    let kind = if args.globe { SurfaceKind::ThreeD } else { SurfaceKind::TwoD };

    let mut coordinator = SurfaceCoordinator::new(panel, resolver, selection);
    coordinator.switch_to(kind);
    coordinator.mount(Box::new(ConsoleSurface::new(kind, None)));

    println!();
    println!("Overlays for {date} on {} ({kind}):", basemap.id());
    for descriptor in coordinator.selection().descriptors() {
        let attached = coordinator
            .attached_overlays(kind)
            .is_some_and(|ids| ids.contains(&descriptor.id));
        let mark = match (descriptor.is_active, attached) {
            (true, true) => "[x]",
            (true, false) => "[!]",
            (false, _) => "[ ]",
        };
        println!("  {mark} {}", descriptor.id);
    }

    let known = SourceResolver::known_ids();
    for id in coordinator.selection().active.iter().filter(|id| !known.contains(&id.as_str())) {
        println!("  [?] {id} (unknown layer)");
    }

    coordinator.unmount(kind);
    Ok(())
}

async fn airports(config: &AppConfig, args: &AirportArgs) -> Result<(), Box<dyn Error>> {
    let catalog = AirportCatalog::load_or_download(&config.airport_dir()).await?;
    if catalog.is_empty() {
        return Err("airport catalog is empty".into());
    }
    info!("Searching {} airports", catalog.len());

    if let Some(code) = &args.code {
        let airport = catalog
            .lookup_by_code(code)
            .ok_or_else(|| format!("no airport with code {code}"))?;
        println!("{} {} ({})", airport.icao, airport.name, airport.airport_type);
        println!("  position  {}", airport.position());
        if let Some(elevation) = airport.elevation {
            println!("  elevation {elevation} ft");
        }
        if let Some(city) = &airport.municipality {
            println!("  serves    {city}");
        }
        return Ok(());
    }

    let Some(near) = &args.near else {
        return Err("give --code or --near lat,lon".into());
    };
    let center = match near.as_slice() {
        [lat, lon] => GeoPoint::new(*lat, *lon),
        _ => return Err("--near takes lat,lon".into()),
    };

    let mut found = catalog.lookup_near(&BoundingBox::around(center, args.radius));
    found.sort_by_key(|a| (!a.is_major(), !a.has_scheduled_service(), a.icao.clone()));

    println!("{} airports within {}° of {center}", found.len(), args.radius);
    for airport in found.iter().take(args.limit) {
        println!("  {:<8} {:<16} {}", airport.icao, airport.airport_type, airport.name);
    }
    Ok(())
}

fn show_config(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    println!("config file: {}", AppConfig::get_config_path()?.display());
    for (var, source) in config.key_sources() {
        let from = source.map_or("not set", |s| s.describe());
        println!("  {var:<24} {from}");
    }
    println!("  basemap          {}", config.default_basemap.id());
    println!("  overlays         {}", config.default_overlays.join(", "));
    println!("  sweep interval   {} min", config.sweep_interval_minutes);
    println!("  ai summaries     {}", config.ai_summaries);
    println!("  airport data     {}", config.airport_dir().display());
    Ok(())
}
