//! The consent store
//!
//! One store per page load. Mutations complete before subscribers are
//! notified, notification happens outside the state lock, and the
//! banner check is de-duplicated per instance so concurrent callers
//! share a single network round trip.

use crate::category::{ComplianceRegion, ComplianceSettings, ConsentCategory, ConsentState};
use consent_client::{
    ConsentClient, FetchOptions, JurisdictionInfo, LocationInfo, ResponseContext,
    SetConsentRequest, SetConsentResponse, ShowConsentBannerResponse,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use storage::{ConsentDecision, ConsentInfo, ConsentStorage, StoredConsentRecord};
use tokio::sync::broadcast;

/// Hook that enforces consent in the page, e.g. by gating script tags
pub trait TrackingBlocker: Send + Sync {
    /// Receive the current effective consents after every mutation
    fn update_consents(&self, consents: &ConsentState);
}

/// Hook that forwards consent changes to a tag manager data layer
pub trait TagManagerAdapter: Send + Sync {
    /// Receive the current effective consents after every mutation
    fn push_consent_update(&self, consents: &ConsentState);
}

/// Handle returned by [`ConsentStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Construction-time store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Declared category set, immutable afterwards
    pub categories: Vec<ConsentCategory>,
    /// Host page domain stamped onto consent writes
    pub domain: String,
    /// Honor the browser's Do Not Track preference
    pub honor_do_not_track: bool,
    /// Whether the host detected a Do Not Track signal
    pub do_not_track_signal: bool,
    /// Per-regime compliance toggles
    pub compliance: BTreeMap<ComplianceRegion, ComplianceSettings>,
}

impl StoreConfig {
    /// Config with the stock categories and compliance defaults
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            categories: crate::category::default_categories(),
            domain: domain.into(),
            honor_do_not_track: false,
            do_not_track_signal: false,
            compliance: crate::category::default_compliance(),
        }
    }

    /// Replace the category set
    pub fn with_categories(mut self, categories: Vec<ConsentCategory>) -> Self {
        self.categories = categories;
        self
    }

    /// Honor Do Not Track
    pub fn honor_do_not_track(mut self, honor: bool) -> Self {
        self.honor_do_not_track = honor;
        self
    }

    /// Record the host-detected Do Not Track signal
    pub fn with_do_not_track_signal(mut self, signal: bool) -> Self {
        self.do_not_track_signal = signal;
        self
    }
}

/// Cloned public state handed to subscribers
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Raw consent map
    pub consents: ConsentState,
    /// How and when the current decision was made, if one exists
    pub consent_info: Option<ConsentInfo>,
    /// Whether the banner wants to be visible
    pub show_popup: bool,
    /// Whether the banner check is in flight
    pub is_loading_consent_info: bool,
    /// `show_popup` gated on the check not being in flight
    pub should_show_banner: bool,
    /// Visitor location resolved by the backend, once known
    pub location: Option<LocationInfo>,
    /// Regulatory regime resolved by the backend, once known
    pub jurisdiction: Option<JurisdictionInfo>,
}

/// Banner-check lifecycle, scoped to this store instance
enum FetchState {
    Idle,
    Pending,
    Completed,
}

struct StoreState {
    consents: ConsentState,
    consent_info: Option<ConsentInfo>,
    show_popup: bool,
    is_loading_consent_info: bool,
    location: Option<LocationInfo>,
    jurisdiction: Option<JurisdictionInfo>,
    banner_fetch: FetchState,
    last_banner: Option<ShowConsentBannerResponse>,
}

type Subscriber = Arc<dyn Fn(&StoreSnapshot) + Send + Sync>;

/// Subscribable consent state container
pub struct ConsentStore {
    config: StoreConfig,
    categories: BTreeMap<String, ConsentCategory>,
    client: Arc<dyn ConsentClient>,
    storage: Arc<dyn ConsentStorage>,
    state: Mutex<StoreState>,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_subscription: AtomicU64,
    snapshot_tx: broadcast::Sender<StoreSnapshot>,
    blockers: RwLock<Vec<Arc<dyn TrackingBlocker>>>,
    tag_managers: RwLock<Vec<Arc<dyn TagManagerAdapter>>>,
    // Serializes banner fetches; holders of the state mutex never wait
    // on this, and vice versa while the request is in flight.
    fetch_gate: tokio::sync::Mutex<()>,
}

impl ConsentStore {
    /// Build a store seeded from the persisted record
    ///
    /// Storage failures degrade to declared defaults; disabled
    /// categories keep their declared value regardless of what was
    /// persisted.
    pub fn new(
        config: StoreConfig,
        client: Arc<dyn ConsentClient>,
        storage: Arc<dyn ConsentStorage>,
    ) -> Self {
        let categories: BTreeMap<String, ConsentCategory> = config
            .categories
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();

        let mut consents: ConsentState = categories
            .values()
            .map(|c| (c.name.clone(), c.default_value))
            .collect();
        let mut consent_info = None;

        match storage.load_record() {
            Ok(Some(record)) => {
                for (name, value) in record.consents {
                    match categories.get(&name) {
                        Some(category) if !category.disabled => {
                            consents.insert(name, value);
                        }
                        Some(_) => {}
                        None => {
                            tracing::debug!(category = %name, "ignoring persisted unknown category");
                        }
                    }
                }
                consent_info = record.consent_info;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted consent; using defaults");
            }
        }

        let (snapshot_tx, _) = broadcast::channel(16);

        Self {
            config,
            categories,
            client,
            storage,
            state: Mutex::new(StoreState {
                consents,
                consent_info,
                show_popup: false,
                is_loading_consent_info: false,
                location: None,
                jurisdiction: None,
                banner_fetch: FetchState::Idle,
                last_banner: None,
            }),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(0),
            snapshot_tx,
            blockers: RwLock::new(Vec::new()),
            tag_managers: RwLock::new(Vec::new()),
            fetch_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ---- Queries -------------------------------------------------------

    /// The raw consent map
    pub fn get_consents(&self) -> ConsentState {
        self.state.lock().consents.clone()
    }

    /// Consents after the Do Not Track override
    ///
    /// A detected DNT signal, when honored, forces every
    /// visitor-changeable category to denied; disabled categories keep
    /// their declared value.
    pub fn get_effective_consents(&self) -> ConsentState {
        let consents = self.state.lock().consents.clone();
        if !(self.config.honor_do_not_track && self.config.do_not_track_signal) {
            return consents;
        }
        consents
            .into_iter()
            .map(|(name, value)| {
                let locked = self.categories.get(&name).map(|c| c.disabled).unwrap_or(false);
                (name, value && locked)
            })
            .collect()
    }

    /// Whether the named category is effectively granted
    pub fn has_consent_for(&self, category: &str) -> bool {
        self.get_effective_consents().get(category).copied().unwrap_or(false)
    }

    /// Current public state
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock();
        snapshot_of(&state)
    }

    /// Whether the banner should be rendered right now
    pub fn should_show_banner(&self) -> bool {
        let state = self.state.lock();
        state.show_popup && !state.is_loading_consent_info
    }

    // ---- Subscriptions -------------------------------------------------

    /// Register a synchronous listener, fired after every mutation
    pub fn subscribe(
        &self,
        listener: impl Fn(&StoreSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, Arc::new(listener));
        SubscriptionId(id)
    }

    /// Remove a listener; unknown ids are ignored
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id.0);
    }

    /// An async snapshot stream for task-based observers
    pub fn watch(&self) -> broadcast::Receiver<StoreSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Register a tracking blocker and push the current consents to it
    pub fn register_tracking_blocker(&self, blocker: Arc<dyn TrackingBlocker>) {
        blocker.update_consents(&self.get_effective_consents());
        self.blockers.write().push(blocker);
    }

    /// Register a tag-manager adapter and push the current consents to it
    pub fn register_tag_manager(&self, adapter: Arc<dyn TagManagerAdapter>) {
        adapter.push_consent_update(&self.get_effective_consents());
        self.tag_managers.write().push(adapter);
    }

    // ---- Commands ------------------------------------------------------

    /// Set one category; returns whether the change was applied
    ///
    /// Unknown and disabled categories are rejected. Blockers and tag
    /// managers see the new effective consents before this returns.
    pub fn set_consent(&self, category: &str, value: bool) -> bool {
        match self.categories.get(category) {
            None => {
                tracing::debug!(category, "ignoring consent change for unknown category");
                return false;
            }
            Some(c) if c.disabled => {
                tracing::debug!(category, "ignoring consent change for disabled category");
                return false;
            }
            Some(_) => {}
        }

        {
            let mut state = self.state.lock();
            state.consents.insert(category.to_string(), value);
        }
        self.push_to_hooks();
        self.notify();
        true
    }

    /// Commit the decision: update the map, stamp metadata, persist,
    /// then write to the backend
    ///
    /// `All` grants everything, `Necessary` grants only locked
    /// categories, `Custom` keeps the current map. Local state and
    /// subscribers settle before the network write; a backend failure
    /// is logged and surfaced through error callbacks but never rolls
    /// the decision back.
    pub async fn save_consents(
        &self,
        decision: ConsentDecision,
    ) -> ResponseContext<SetConsentResponse> {
        let preferences = {
            let mut state = self.state.lock();

            match decision {
                ConsentDecision::All => {
                    for value in state.consents.values_mut() {
                        *value = true;
                    }
                }
                ConsentDecision::Necessary => {
                    let consents = std::mem::take(&mut state.consents);
                    state.consents = consents
                        .into_iter()
                        .map(|(name, _)| {
                            let granted = self
                                .categories
                                .get(&name)
                                .map(|c| c.disabled && c.default_value)
                                .unwrap_or(false);
                            (name, granted)
                        })
                        .collect();
                }
                ConsentDecision::Custom => {}
            }

            state.consent_info = Some(ConsentInfo::now(decision));
            state.show_popup = false;

            let record = StoredConsentRecord {
                consents: state.consents.clone(),
                consent_info: state.consent_info,
            };
            if let Err(e) = self.storage.save_record(&record) {
                tracing::warn!(error = %e, "could not persist consent record");
            }
            state.consents.clone()
        };

        self.push_to_hooks();
        self.notify();

        let request = SetConsentRequest {
            decision_type: decision,
            domain: self.config.domain.clone(),
            preferences,
            metadata: None,
        };
        let ctx = self.client.set_consent(request, FetchOptions::default()).await;
        if !ctx.ok {
            tracing::warn!(decision = %decision, "backend rejected consent write; local state kept");
        }
        ctx
    }

    /// Restore declared defaults and forget the stored decision
    pub fn reset_consents(&self) {
        {
            let mut state = self.state.lock();
            state.consents = self
                .categories
                .values()
                .map(|c| (c.name.clone(), c.default_value))
                .collect();
            state.consent_info = None;
        }
        if let Err(e) = self.storage.clear_record() {
            tracing::warn!(error = %e, "could not clear persisted consent record");
        }
        self.push_to_hooks();
        self.notify();
    }

    /// Reset plus drop everything persisted, including queued writes
    pub fn clear_all_data(&self) {
        {
            let mut state = self.state.lock();
            state.consents = self
                .categories
                .values()
                .map(|c| (c.name.clone(), c.default_value))
                .collect();
            state.consent_info = None;
            state.location = None;
            state.jurisdiction = None;
            state.banner_fetch = FetchState::Idle;
            state.last_banner = None;
        }
        if let Err(e) = self.storage.clear_record() {
            tracing::warn!(error = %e, "could not clear persisted consent record");
        }
        if let Err(e) = self.storage.clear_queue() {
            tracing::warn!(error = %e, "could not clear pending consent queue");
        }
        self.push_to_hooks();
        self.notify();
    }

    /// One banner check per instance per session
    ///
    /// A decision on record or a completed check short-circuits to
    /// `None` without I/O. Concurrent callers wait on the in-flight
    /// check and receive its result; exactly one network call happens.
    pub async fn fetch_consent_banner_info(&self) -> Option<ShowConsentBannerResponse> {
        {
            let state = self.state.lock();
            if state.consent_info.is_some() {
                return None;
            }
            if matches!(state.banner_fetch, FetchState::Completed) {
                return None;
            }
        }

        let _gate = self.fetch_gate.lock().await;

        {
            let state = self.state.lock();
            // A concurrent caller finished the check while we waited.
            if matches!(state.banner_fetch, FetchState::Completed) {
                return state.last_banner.clone();
            }
        }

        {
            let mut state = self.state.lock();
            state.banner_fetch = FetchState::Pending;
            state.is_loading_consent_info = true;
        }
        self.notify();

        let ctx = self.client.show_consent_banner(FetchOptions::default()).await;
        let result = if ctx.ok { ctx.data } else { None };

        {
            let mut state = self.state.lock();
            state.banner_fetch = FetchState::Completed;
            state.is_loading_consent_info = false;
            state.last_banner = result.clone();

            match &result {
                Some(banner) => {
                    state.location = Some(banner.location.clone());
                    state.jurisdiction = Some(banner.jurisdiction.clone());
                    if state.consent_info.is_none() {
                        state.show_popup = banner.show_consent_banner;
                    }
                }
                None => {
                    // Over-show rather than under-show.
                    if state.consent_info.is_none() {
                        state.show_popup = true;
                    }
                }
            }
        }
        self.notify();
        result
    }

    // ---- Internals -----------------------------------------------------

    // Hooks and listeners run outside the registry locks, so they may
    // call back into the store (mutate it, register further hooks)
    // without deadlocking.
    fn push_to_hooks(&self) {
        let effective = self.get_effective_consents();
        let blockers: Vec<_> = self.blockers.read().clone();
        for blocker in blockers {
            blocker.update_consents(&effective);
        }
        let tag_managers: Vec<_> = self.tag_managers.read().clone();
        for adapter in tag_managers {
            adapter.push_consent_update(&effective);
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let listeners: Vec<Subscriber> = self.subscribers.lock().values().cloned().collect();
        for listener in listeners {
            listener(&snapshot);
        }
        let _ = self.snapshot_tx.send(snapshot);
    }
}

fn snapshot_of(state: &StoreState) -> StoreSnapshot {
    StoreSnapshot {
        consents: state.consents.clone(),
        consent_info: state.consent_info,
        show_popup: state.show_popup,
        is_loading_consent_info: state.is_loading_consent_info,
        should_show_banner: state.show_popup && !state.is_loading_consent_info,
        location: state.location.clone(),
        jurisdiction: state.jurisdiction.clone(),
    }
}
