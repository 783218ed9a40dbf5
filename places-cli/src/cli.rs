use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use inquire::{Select, Text};
use places_core::{
    AddressAutocomplete, AutocompleteDriver, Candidate, Config, Event, LocationData,
    LocationService, PlacesClient, Platform, TravelMode, Waypoint,
    autocomplete::{MIN_QUERY_CHARS, Phase, Snapshot},
    config::API_KEY_ENV,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "places", version, about = "Places and geocoding CLI")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure API keys, platform and proxy interactively.
    Configure,

    /// Probe the configured keys and report which one is used.
    Probe,

    /// Address suggestions for a partial query.
    Autocomplete {
        query: String,

        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Bias radius in metres; defaults to the configured radius.
        #[arg(long)]
        radius: Option<u32>,
    },

    /// Resolve a place id to its address and coordinates.
    Details { place_id: String },

    /// Forward geocode an address.
    Geocode { address: String },

    /// Reverse geocode coordinates.
    Reverse {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },

    /// Route between two addresses or "lat,lon" pairs.
    Directions {
        from: String,
        to: String,

        /// driving, walking, bicycling or transit.
        #[arg(long, default_value = "driving")]
        mode: String,
    },

    /// Rank candidates by driving distance.
    Nearby {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(long, default_value_t = 10.0)]
        max_km: f64,

        /// Candidates as `id=lat,lon[:label]`; a bare `id` has no location.
        #[arg(required = true)]
        candidates: Vec<String>,
    },

    /// Print a static map image URL.
    StaticMap {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long, default_value_t = 15)]
        zoom: u8,
        #[arg(long, default_value = "400x300")]
        size: String,
    },

    /// Pick an address interactively with live suggestions.
    Pick {
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Address of the current location, offered as the first choice.
        #[arg(long)]
        here: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let command = match self.command {
            Command::Configure => return configure(),
            command => command,
        };

        let config = Config::load()?;
        let mut client = PlacesClient::from_config(&config)?;
        let selection = client.initialize().await;
        tracing::info!("maps API: {selection}");

        match command {
            Command::Configure => {}
            Command::Probe => {
                if config.platform == Platform::Native && !config.is_configured() {
                    println!("No API key configured.\nHint: run `places configure` or set {API_KEY_ENV}.");
                }
                println!("Platform: {}", client.platform());
                println!("Selected: {selection}");
                if let Some(prefix) = client.active_key_prefix() {
                    println!("Active key: {prefix}");
                }
                println!("Ready: {}", if client.is_configured() { "yes" } else { "no" });
            }
            Command::Autocomplete { query, lat, lon, radius } => {
                let bias = lat.zip(lon).map(|(lat, lon)| LocationData::new(lat, lon));
                let radius = radius.unwrap_or(config.autocomplete_radius_m);

                for suggestion in client.autocomplete(&query, bias.as_ref(), radius).await {
                    println!(
                        "{:<40} {}  [{}]",
                        suggestion.structured_formatting.main_text,
                        suggestion.structured_formatting.secondary_text,
                        suggestion.place_id,
                    );
                }
            }
            Command::Details { place_id } => match client.place_details(&place_id).await {
                Some(details) => print_json(&details)?,
                None => println!("No details found for '{place_id}'."),
            },
            Command::Geocode { address } => match client.geocode_address(&address).await {
                Some(location) => print_json(&location)?,
                None => println!("No location found for \"{address}\"."),
            },
            Command::Reverse { lat, lon } => {
                let service = LocationService::new(Arc::new(client));
                println!("{}", service.address_for(lat, lon).await);
            }
            Command::Directions { from, to, mode } => {
                let mode = TravelMode::try_from(mode.as_str())?;
                let (from, to) = (parse_waypoint(&from), parse_waypoint(&to));

                match client.directions(&from, &to, mode).await {
                    Some(result) => print_json(&result)?,
                    None => println!("No route found."),
                }
            }
            Command::Nearby { lat, lon, max_km, candidates } => {
                let candidates = candidates
                    .iter()
                    .map(|raw| parse_candidate(raw))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let origin = LocationData::new(lat, lon);

                let nearby = client.find_nearby_candidates(&origin, &candidates, max_km).await;
                if nearby.is_empty() {
                    println!("Nobody within {max_km} km.");
                }
                for found in nearby {
                    println!(
                        "{:<12} {:<24} {:>10} {:>10}",
                        found.id, found.label, found.distance_text, found.duration_text
                    );
                }
            }
            Command::StaticMap { lat, lon, zoom, size } => {
                let url = client.static_map_url(&LocationData::new(lat, lon), zoom, &size, &[]);
                if url.is_empty() {
                    println!("No API key available for static maps.");
                } else {
                    println!("{url}");
                }
            }
            Command::Pick { lat, lon, here } => {
                let current = lat.zip(lon).map(|(lat, lon)| {
                    let location = LocationData::new(lat, lon);
                    match here {
                        Some(address) => location.with_address(address),
                        None => location,
                    }
                });
                pick(&config, client, current).await?;
            }
        }

        Ok(())
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Text::new("API key (leave empty to probe candidate keys):")
        .with_initial_value(config.api_key.as_deref().unwrap_or_default())
        .prompt()?;
    config.set_api_key(Some(api_key));

    loop {
        let candidate = Text::new("Add candidate key (empty to finish):").prompt()?;
        if candidate.trim().is_empty() {
            break;
        }
        config.upsert_candidate_key(candidate.trim().to_string());
    }

    let platform = Select::new("Platform:", Platform::all().to_vec()).prompt()?;
    config.platform = platform;

    if platform == Platform::Web {
        let proxy = Text::new("Same-origin proxy base URL:")
            .with_initial_value(config.proxy_base_url.as_deref().unwrap_or_default())
            .prompt()?;
        config.proxy_base_url = Some(proxy.trim().to_string()).filter(|p| !p.is_empty());
    }

    config.validate()?;
    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn pick(
    config: &Config,
    client: PlacesClient,
    current: Option<LocationData>,
) -> anyhow::Result<()> {
    let mut widget = AddressAutocomplete::from_config(config);
    if let Some(current) = current.clone() {
        widget = widget.with_current_location(current);
    }

    let (driver, mut outputs) =
        AutocompleteDriver::new(widget, Arc::new(client), config.autocomplete_radius_m);
    let (inputs, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(driver.run(rx));

    let use_here = current
        .as_ref()
        .and_then(|c| c.address.as_ref())
        .map(|address| format!("Use current location ({address})"));
    inputs.send(Event::Focus).map_err(|_| anyhow!("autocomplete stopped"))?;

    let selection = loop {
        let text = tokio::task::spawn_blocking(|| Text::new("Address:").prompt()).await??;
        let before = outputs.snapshots.borrow().seq;
        inputs.send(Event::TextChanged(text.clone())).map_err(|_| anyhow!("autocomplete stopped"))?;

        let snapshot = settled(&mut outputs.snapshots, before, &text).await?;
        if let Some(error) = &snapshot.error {
            eprintln!("{error}");
            continue;
        }
        if snapshot.suggestions.is_empty() {
            println!("{}", empty_list_hint(&text));
            continue;
        }

        let mut options: Vec<String> =
            snapshot.suggestions.iter().map(|s| s.description.clone()).collect();
        if let Some(here) = &use_here {
            options.insert(0, here.clone());
        }
        options.push(SEARCH_AGAIN.to_string());

        let choice = tokio::task::spawn_blocking(move || {
            Select::new("Pick an address:", options).raw_prompt()
        })
        .await??;

        let event = match (&use_here, choice.index) {
            (Some(_), 0) => Event::UseCurrentLocation,
            (here, index) => {
                let index = if here.is_some() { index - 1 } else { index };
                match snapshot.suggestions.get(index) {
                    Some(suggestion) => Event::Selected(suggestion.clone()),
                    None => continue,
                }
            }
        };

        inputs.send(event).map_err(|_| anyhow!("autocomplete stopped"))?;
        break outputs.selections.recv().await.context("autocomplete stopped before resolving")?;
    };

    drop(inputs);
    task.await?;

    match selection.location {
        Some(location) => print_json(&location.with_address(selection.address)),
        None => {
            println!("{} (no coordinates, entered manually)", selection.address);
            Ok(())
        }
    }
}

const SEARCH_AGAIN: &str = "(search again)";

/// Wait until the widget has processed the text change issued after `before`
/// and is no longer loading.
async fn settled(
    snapshots: &mut watch::Receiver<Snapshot>,
    before: u64,
    text: &str,
) -> anyhow::Result<Snapshot> {
    let snapshot = snapshots
        .wait_for(|s| {
            s.seq > before
                && s.text == text
                && !s.loading
                && matches!(s.phase, Phase::Idle | Phase::ShowingSuggestions)
        })
        .await
        .map_err(|_| anyhow!("autocomplete stopped"))?;

    Ok(snapshot.clone())
}

fn empty_list_hint(text: &str) -> &'static str {
    if text.trim().chars().count() < MIN_QUERY_CHARS {
        "Type at least 3 characters."
    } else {
        "No suggestions found."
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to format output")?);
    Ok(())
}

fn parse_lat_lon(raw: &str) -> Option<LocationData> {
    let (lat, lon) = raw.split_once(',')?;
    Some(LocationData::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

/// `"lat,lon"` becomes coordinates, anything else is an address.
fn parse_waypoint(raw: &str) -> Waypoint {
    match parse_lat_lon(raw) {
        Some(location) => Waypoint::Location(location),
        None => Waypoint::Address(raw.to_string()),
    }
}

/// Parse `id=lat,lon[:label]` or a bare `id`.
fn parse_candidate(raw: &str) -> anyhow::Result<Candidate> {
    let Some((id, rest)) = raw.split_once('=') else {
        return Ok(Candidate { id: raw.to_string(), label: raw.to_string(), location: None });
    };

    let (coords, label) = match rest.split_once(':') {
        Some((coords, label)) => (coords, label.to_string()),
        None => (rest, id.to_string()),
    };

    let location = parse_lat_lon(coords).ok_or_else(|| {
        anyhow!("Invalid candidate '{raw}'. Expected `id=lat,lon[:label]`, e.g. `m1=32.77,-117.16:Suds`.")
    })?;

    Ok(Candidate { id: id.to_string(), label, location: Some(location) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_candidate_with_label() {
        let candidate = parse_candidate("m1=32.77,-117.16:Suds & Co").unwrap();
        assert_eq!(candidate.id, "m1");
        assert_eq!(candidate.label, "Suds & Co");
        assert_eq!(candidate.location, Some(LocationData::new(32.77, -117.16)));
    }

    #[test]
    fn bare_candidate_has_no_location() {
        let candidate = parse_candidate("m2").unwrap();
        assert_eq!(candidate.label, "m2");
        assert!(candidate.location.is_none());
    }

    #[test]
    fn malformed_candidate_is_rejected() {
        let err = parse_candidate("m3=north").unwrap_err();
        assert!(err.to_string().contains("Expected `id=lat,lon[:label]`"));
    }

    #[test]
    fn waypoints_detect_coordinates() {
        assert_eq!(parse_waypoint("40.0, -75.5"), Waypoint::Location(LocationData::new(40.0, -75.5)));
        assert_eq!(parse_waypoint("Boston, MA"), Waypoint::Address("Boston, MA".into()));
    }

    fn snapshot(seq: u64, text: &str, error: Option<&str>) -> Snapshot {
        Snapshot {
            seq,
            phase: Phase::Idle,
            text: text.into(),
            suggestions: Vec::new(),
            suggestions_visible: false,
            loading: false,
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn settled_ignores_snapshots_from_before_the_text_change() {
        let (tx, mut rx) = watch::channel(snapshot(3, "Main", Some("old failure")));

        let waiter = tokio::spawn(async move { settled(&mut rx, 3, "Main").await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tx.send_replace(snapshot(4, "Main", None));
        let settled = waiter.await.unwrap().unwrap();
        assert_eq!(settled.seq, 4);
        assert!(settled.error.is_none());
    }

    #[test]
    fn empty_list_hint_depends_on_query_length() {
        assert_eq!(empty_list_hint(" ab "), "Type at least 3 characters.");
        assert_eq!(empty_list_hint("Zzyzx Rd"), "No suggestions found.");
    }

    #[test]
    fn cli_parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["places", "-vv", "reverse", "40.0", "-75.0"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Reverse { lat, lon } if lat == 40.0 && lon == -75.0));
    }
}
