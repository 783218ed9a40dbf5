//! Address autocomplete driven by discrete input events.
//!
//! [`AddressAutocomplete`] is a synchronous state machine: it consumes
//! [`Event`]s and answers with [`Command`]s. [`AutocompleteDriver`] runs those
//! commands on tokio (timers, network calls) and feeds their outcomes back in
//! as further events.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
    time::{Instant, sleep_until},
};
use tracing::{debug, warn};

use crate::{
    Config, PlacesClient,
    error::PlacesError,
    model::{LocationData, PlaceAutocomplete, PlaceDetails},
};

/// Shorter (trimmed) input never reaches the network.
pub const MIN_QUERY_CHARS: usize = 3;

/// First attempt plus one last-resort retry.
const MAX_FETCH_ATTEMPTS: u8 = 2;

pub const MANUAL_ENTRY_ERROR: &str =
    "Unable to load address suggestions. Please enter address manually.";

#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(
        &self,
        query: &str,
        bias: Option<&LocationData>,
        radius_m: u32,
    ) -> Result<Vec<PlaceAutocomplete>, PlacesError>;

    async fn resolve(&self, place_id: &str) -> Option<PlaceDetails>;
}

#[async_trait]
impl SuggestionSource for PlacesClient {
    async fn suggest(
        &self,
        query: &str,
        bias: Option<&LocationData>,
        radius_m: u32,
    ) -> Result<Vec<PlaceAutocomplete>, PlacesError> {
        Ok(self.autocomplete(query, bias, radius_m).await)
    }

    async fn resolve(&self, place_id: &str) -> Option<PlaceDetails> {
        self.place_details(place_id).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Typing,
    Querying,
    ShowingSuggestions,
}

/// What the widget reports once the user has picked an address.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub address: String,
    pub location: Option<LocationData>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TextChanged(String),
    DebounceFired { seq: u64 },
    SuggestionsLoaded { seq: u64, suggestions: Vec<PlaceAutocomplete> },
    SuggestionsFailed { seq: u64, attempt: u8 },
    Selected(PlaceAutocomplete),
    Resolved { description: String, details: Option<PlaceDetails> },
    Focus,
    Blur,
    BlurElapsed,
    Cleared,
    UseCurrentLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ScheduleDebounce { seq: u64, after: Duration },
    CancelDebounce,
    Fetch { seq: u64, query: String, attempt: u8 },
    Resolve(PlaceAutocomplete),
    ScheduleHide { after: Duration },
    Emit(Selection),
}

/// Observable widget state, published by the driver after every event.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Bumped by every text change, selection and clear.
    pub seq: u64,
    pub phase: Phase,
    pub text: String,
    pub suggestions: Vec<PlaceAutocomplete>,
    pub suggestions_visible: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddressAutocomplete {
    phase: Phase,
    text: String,
    suggestions: Vec<PlaceAutocomplete>,
    suggestions_visible: bool,
    loading: bool,
    error: Option<String>,
    /// Bumped on every edit; fetch results tagged with an older value are dropped.
    seq: u64,
    current_location: Option<LocationData>,
    debounce: Duration,
    blur_hide: Duration,
}

impl AddressAutocomplete {
    pub fn new(debounce: Duration, blur_hide: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            text: String::new(),
            suggestions: Vec::new(),
            suggestions_visible: false,
            loading: false,
            error: None,
            seq: 0,
            current_location: None,
            debounce,
            blur_hide,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.debounce(), config.blur_hide())
    }

    /// Location used to bias queries and offered through [`Event::UseCurrentLocation`].
    pub fn with_current_location(mut self, location: LocationData) -> Self {
        self.current_location = Some(location);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn suggestions(&self) -> &[PlaceAutocomplete] {
        &self.suggestions
    }

    pub fn suggestions_visible(&self) -> bool {
        self.suggestions_visible && !self.suggestions.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn current_location(&self) -> Option<&LocationData> {
        self.current_location.as_ref()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            seq: self.seq,
            phase: self.phase,
            text: self.text.clone(),
            suggestions: self.suggestions.clone(),
            suggestions_visible: self.suggestions_visible(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    fn reset_list(&mut self) {
        self.suggestions.clear();
        self.suggestions_visible = false;
        self.loading = false;
    }

    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::TextChanged(text) => {
                self.text = text;
                self.error = None;
                self.seq += 1;

                if self.text.trim().chars().count() < MIN_QUERY_CHARS {
                    self.reset_list();
                    self.phase = Phase::Idle;
                    return vec![Command::CancelDebounce];
                }

                self.phase = Phase::Typing;
                vec![
                    Command::CancelDebounce,
                    Command::ScheduleDebounce { seq: self.seq, after: self.debounce },
                ]
            }

            Event::DebounceFired { seq } => {
                if seq != self.seq || self.phase != Phase::Typing {
                    return Vec::new();
                }
                self.phase = Phase::Querying;
                self.loading = true;
                vec![Command::Fetch { seq, query: self.text.clone(), attempt: 1 }]
            }

            Event::SuggestionsLoaded { seq, suggestions } => {
                if seq != self.seq {
                    debug!(seq, latest = self.seq, "dropping stale suggestions");
                    return Vec::new();
                }
                self.suggestions = suggestions;
                self.suggestions_visible = true;
                self.loading = false;
                self.phase = Phase::ShowingSuggestions;
                Vec::new()
            }

            Event::SuggestionsFailed { seq, attempt } => {
                if seq != self.seq {
                    return Vec::new();
                }
                if attempt < MAX_FETCH_ATTEMPTS {
                    return vec![Command::Fetch { seq, query: self.text.clone(), attempt: attempt + 1 }];
                }
                self.reset_list();
                self.error = Some(MANUAL_ENTRY_ERROR.to_string());
                self.phase = Phase::Idle;
                Vec::new()
            }

            Event::Selected(suggestion) => {
                self.text = suggestion.description.clone();
                self.seq += 1;
                self.reset_list();
                self.phase = Phase::Idle;

                if suggestion.is_fallback() {
                    let address = suggestion.structured_formatting.main_text;
                    return vec![
                        Command::CancelDebounce,
                        Command::Emit(Selection { address, location: None }),
                    ];
                }
                vec![Command::CancelDebounce, Command::Resolve(suggestion)]
            }

            Event::Resolved { description, details } => {
                let selection = match details {
                    Some(details) => Selection {
                        address: details.formatted_address.clone(),
                        location: Some(details.to_location()),
                    },
                    None => Selection { address: description, location: None },
                };
                vec![Command::Emit(selection)]
            }

            Event::Focus => {
                if self.text.trim().chars().count() >= MIN_QUERY_CHARS && !self.suggestions.is_empty() {
                    self.suggestions_visible = true;
                    // a pending debounce or fetch keeps its phase
                    if self.phase == Phase::Idle {
                        self.phase = Phase::ShowingSuggestions;
                    }
                }
                Vec::new()
            }

            Event::Blur => vec![Command::ScheduleHide { after: self.blur_hide }],

            Event::BlurElapsed => {
                self.suggestions_visible = false;
                if self.phase == Phase::ShowingSuggestions {
                    self.phase = Phase::Idle;
                }
                Vec::new()
            }

            Event::Cleared => {
                self.text.clear();
                self.error = None;
                self.seq += 1;
                self.reset_list();
                self.phase = Phase::Idle;
                vec![Command::CancelDebounce]
            }

            Event::UseCurrentLocation => {
                let Some(location) = self.current_location.clone() else {
                    return Vec::new();
                };
                let Some(address) = location.address.clone() else {
                    return Vec::new();
                };
                self.text = address.clone();
                self.seq += 1;
                self.suggestions_visible = false;
                self.phase = Phase::Idle;
                vec![Command::CancelDebounce, Command::Emit(Selection { address, location: Some(location) })]
            }
        }
    }
}

/// Runs an [`AddressAutocomplete`] against a [`SuggestionSource`].
pub struct AutocompleteDriver {
    widget: AddressAutocomplete,
    source: Arc<dyn SuggestionSource>,
    radius_m: u32,
    debounce: Option<(u64, Instant)>,
    hide_at: Option<Instant>,
    inflight: JoinSet<Event>,
    selections: mpsc::UnboundedSender<Selection>,
    snapshots: watch::Sender<Snapshot>,
}

/// Receiving ends handed out by [`AutocompleteDriver::new`].
#[derive(Debug)]
pub struct DriverOutputs {
    pub selections: mpsc::UnboundedReceiver<Selection>,
    pub snapshots: watch::Receiver<Snapshot>,
}

impl AutocompleteDriver {
    pub fn new(
        widget: AddressAutocomplete,
        source: Arc<dyn SuggestionSource>,
        radius_m: u32,
    ) -> (Self, DriverOutputs) {
        let (selections_tx, selections_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(widget.snapshot());

        let driver = Self {
            widget,
            source,
            radius_m,
            debounce: None,
            hide_at: None,
            inflight: JoinSet::new(),
            selections: selections_tx,
            snapshots: snapshots_tx,
        };

        (driver, DriverOutputs { selections: selections_rx, snapshots: snapshots_rx })
    }

    /// Process `inputs` until the sender side is dropped, then return the final widget.
    ///
    /// Requests still in flight at that point are aborted.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<Event>) -> AddressAutocomplete {
        loop {
            let debounce_at = self.debounce.map(|(_, at)| at);
            let hide_at = self.hide_at;

            tokio::select! {
                input = inputs.recv() => {
                    let Some(event) = input else { break };
                    self.dispatch(event);
                }
                _ = sleep_until(debounce_at.unwrap_or_else(Instant::now)), if debounce_at.is_some() => {
                    if let Some((seq, _)) = self.debounce.take() {
                        self.dispatch(Event::DebounceFired { seq });
                    }
                }
                _ = sleep_until(hide_at.unwrap_or_else(Instant::now)), if hide_at.is_some() => {
                    self.hide_at = None;
                    self.dispatch(Event::BlurElapsed);
                }
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    match joined {
                        Ok(event) => self.dispatch(event),
                        Err(e) => warn!("autocomplete request task failed: {e}"),
                    }
                }
            }
        }

        self.inflight.abort_all();
        self.widget
    }

    fn dispatch(&mut self, event: Event) {
        for command in self.widget.handle(event) {
            self.execute(command);
        }
        self.snapshots.send_replace(self.widget.snapshot());
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::ScheduleDebounce { seq, after } => {
                self.debounce = Some((seq, Instant::now() + after));
            }
            Command::CancelDebounce => self.debounce = None,
            Command::Fetch { seq, query, attempt } => {
                debug!(seq, attempt, %query, "fetching address suggestions");
                let source = self.source.clone();
                let bias = self.widget.current_location().cloned();
                let radius_m = self.radius_m;

                self.inflight.spawn(async move {
                    match source.suggest(&query, bias.as_ref(), radius_m).await {
                        Ok(suggestions) => Event::SuggestionsLoaded { seq, suggestions },
                        Err(e) => {
                            warn!(attempt, error = %e, "address autocomplete failed");
                            Event::SuggestionsFailed { seq, attempt }
                        }
                    }
                });
            }
            Command::Resolve(suggestion) => {
                let source = self.source.clone();
                self.inflight.spawn(async move {
                    let details = source.resolve(&suggestion.place_id).await;
                    Event::Resolved { description: suggestion.description, details }
                });
            }
            Command::ScheduleHide { after } => self.hide_at = Some(Instant::now() + after),
            Command::Emit(selection) => {
                // nobody listening is fine
                let _ = self.selections.send(selection);
            }
        }
    }
}
