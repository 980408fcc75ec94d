//! Client-side core for the harmonized system codes panel.
//!
//! The panel lets an operator browse, search, create, edit, and delete
//! harmonized-system-code records, optionally scoped to a business-partner
//! context supplied by the host application. This crate owns the panel's
//! state machine only; form rendering, the table widget, and the HTTP
//! transport internals belong to the host and are reached through the
//! narrow capability seams on [`HostContext`].

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{CompanyId, FormKind, FormOutcome, RecordId},
    protocol::{CodeListQuery, HsCodeData, HsCodeRecord},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod error;
pub mod presenter;
pub mod query;
pub mod scope;
pub mod transport;

pub use error::PanelError;
use presenter::PanelView;
use query::{QueryCache, QueryKey};

/// Host plugin interface versions this panel knows how to render against.
pub const MIN_HOST_INTERFACE_VERSION: u32 = 1;
pub const MAX_HOST_INTERFACE_VERSION: u32 = 1;

/// Base API path for harmonized system code records.
pub const CODE_URL: &str = "/plugin/harmonized-system-codes/";

pub const CREATE_FORM_TITLE: &str = "Create Harmonized Code";
pub const EDIT_FORM_TITLE: &str = "Edit Harmonized Code";
pub const DELETE_FORM_TITLE: &str = "Delete Harmonized Code";

/// Detail path for a single record.
pub fn detail_url(pk: RecordId) -> String {
    format!("{CODE_URL}{}/", pk.0)
}

#[async_trait]
pub trait RecordTransport: Send + Sync {
    async fn list(&self, query: &CodeListQuery) -> Result<Vec<HsCodeRecord>>;
    async fn create(&self, data: &HsCodeData) -> Result<HsCodeRecord>;
    async fn update(&self, pk: RecordId, data: &HsCodeData) -> Result<HsCodeRecord>;
    async fn delete(&self, pk: RecordId) -> Result<()>;
}

pub struct MissingRecordTransport;

#[async_trait]
impl RecordTransport for MissingRecordTransport {
    async fn list(&self, _query: &CodeListQuery) -> Result<Vec<HsCodeRecord>> {
        Err(anyhow!("record transport is unavailable"))
    }

    async fn create(&self, _data: &HsCodeData) -> Result<HsCodeRecord> {
        Err(anyhow!("record transport is unavailable"))
    }

    async fn update(&self, pk: RecordId, _data: &HsCodeData) -> Result<HsCodeRecord> {
        Err(anyhow!("record transport is unavailable for record {}", pk.0))
    }

    async fn delete(&self, pk: RecordId) -> Result<()> {
        Err(anyhow!("record transport is unavailable for record {}", pk.0))
    }
}

/// Field set forwarded to the create/edit forms. The customer field is
/// pre-filled and locked when the panel is scoped to a business partner,
/// editable otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormFields {
    pub customer_value: Option<CompanyId>,
    pub customer_disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormRequest {
    pub kind: FormKind,
    pub title: &'static str,
    /// Mutation endpoint for the form; the detail URL embeds the record id
    /// captured at open time.
    pub url: String,
    /// Record bound at open time; `None` for the create form.
    pub record: Option<HsCodeRecord>,
    pub fields: FormFields,
}

#[async_trait]
pub trait FormEngine: Send + Sync {
    /// Present a modal form to the operator. The engine owns rendering
    /// only; which form is open is owned by the panel, and the host reports
    /// the eventual outcome back through [`Panel::form_closed`].
    async fn open(&self, request: FormRequest) -> Result<()>;
}

pub struct MissingFormEngine;

#[async_trait]
impl FormEngine for MissingFormEngine {
    async fn open(&self, request: FormRequest) -> Result<()> {
        Err(anyhow!(
            "form engine is unavailable; cannot open {:?} form",
            request.kind
        ))
    }
}

/// Narrow, read-only capability interface supplied by the host at the
/// composition root. The panel never mutates it.
pub struct HostContext {
    /// Entity model name the panel is embedded against.
    pub model: String,
    /// Id of that entity, when present.
    pub id: Option<i64>,
    pub api: Arc<dyn RecordTransport>,
    pub forms: Arc<dyn FormEngine>,
    /// Process-wide query cache, shared with other panel instances.
    pub cache: QueryCache,
    pub locale: String,
    pub interface_version: u32,
}

/// Which modal form, if any, is currently open. At most one form is open at
/// a time; the edit/delete variants carry the record id captured when the
/// row action was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Creating,
    Editing(RecordId),
    Deleting(RecordId),
}

impl FormState {
    pub fn is_open(&self) -> bool {
        !matches!(self, FormState::Idle)
    }

    fn kind(&self) -> Option<FormKind> {
        match self {
            FormState::Idle => None,
            FormState::Creating => Some(FormKind::Create),
            FormState::Editing(_) => Some(FormKind::Edit),
            FormState::Deleting(_) => Some(FormKind::Delete),
        }
    }
}

struct PanelSessionState {
    search_term: String,
    selected: Option<HsCodeRecord>,
    form: FormState,
}

#[derive(Debug, Clone)]
pub enum PanelEvent {
    RecordsUpdated { key: QueryKey },
    FetchFailed { key: QueryKey, message: String },
    FormOpened(FormKind),
    FormClosed { kind: FormKind, outcome: FormOutcome },
}

/// One embedded panel instance. Session state (search term, selection, open
/// form) lives here and dies with the instance; record data always comes
/// from the shared cache, never from a private copy.
pub struct Panel {
    ctx: HostContext,
    scope: Option<CompanyId>,
    inner: Mutex<PanelSessionState>,
    events: broadcast::Sender<PanelEvent>,
}

/// Entry point called by the host to embed the panel. Fails fast with a
/// visible error when the host's plugin interface version is incompatible
/// rather than rendering a broken panel.
pub fn render_panel(ctx: HostContext) -> Result<Arc<Panel>, PanelError> {
    check_host_version(&ctx)?;
    let panel = Panel::new(ctx);
    info!(
        locale = %panel.ctx.locale,
        scoped = panel.scope.is_some(),
        "harmonized system codes panel rendered"
    );
    Ok(panel)
}

pub fn check_host_version(ctx: &HostContext) -> Result<(), PanelError> {
    let found = ctx.interface_version;
    if !(MIN_HOST_INTERFACE_VERSION..=MAX_HOST_INTERFACE_VERSION).contains(&found) {
        return Err(PanelError::IncompatibleHost {
            found,
            min: MIN_HOST_INTERFACE_VERSION,
            max: MAX_HOST_INTERFACE_VERSION,
        });
    }
    Ok(())
}

impl Panel {
    pub fn new(ctx: HostContext) -> Arc<Self> {
        let scope = scope::resolve_scope(&ctx.model, ctx.id);
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            ctx,
            scope,
            inner: Mutex::new(PanelSessionState {
                search_term: String::new(),
                selected: None,
                form: FormState::Idle,
            }),
            events,
        })
    }

    pub fn scope(&self) -> Option<CompanyId> {
        self.scope
    }

    pub fn locale(&self) -> &str {
        &self.ctx.locale
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    /// Cache key for the current (search term, scope) pair.
    pub async fn current_key(&self) -> QueryKey {
        let guard = self.inner.lock().await;
        QueryKey::new(guard.search_term.clone(), self.scope)
    }

    /// Initial fetch for the current key; cached data is reused if fresh.
    pub async fn load(&self) {
        let key = self.current_key().await;
        self.fetch_into_cache(key, false).await;
    }

    /// Manual refresh: always performs a new network read.
    pub async fn refresh(&self) {
        let key = self.current_key().await;
        self.fetch_into_cache(key, true).await;
    }

    /// Replace the search term. Every change is a new query key; the fetch
    /// for the new key starts immediately.
    pub async fn set_search_term(&self, term: impl Into<String>) {
        let key = {
            let mut guard = self.inner.lock().await;
            guard.search_term = term.into();
            QueryKey::new(guard.search_term.clone(), self.scope)
        };
        debug!(search = %key.search, "search term changed");
        self.fetch_into_cache(key, false).await;
    }

    async fn fetch_into_cache(&self, key: QueryKey, force: bool) {
        let result = if force {
            self.ctx.cache.refetch(self.ctx.api.as_ref(), &key).await
        } else {
            self.ctx.cache.fetch(self.ctx.api.as_ref(), &key).await
        };
        match result {
            Ok(_) => {
                let _ = self.events.send(PanelEvent::RecordsUpdated { key });
            }
            Err(err) => {
                // Last-known-good data stays in the cache; no modal error.
                let _ = self.events.send(PanelEvent::FetchFailed {
                    key,
                    message: err.to_string(),
                });
            }
        }
    }

    fn form_fields(&self) -> FormFields {
        FormFields {
            customer_value: self.scope,
            customer_disabled: self.scope.is_some(),
        }
    }

    pub async fn open_create(&self) -> Result<()> {
        let request = FormRequest {
            kind: FormKind::Create,
            title: CREATE_FORM_TITLE,
            url: CODE_URL.to_string(),
            record: None,
            fields: self.form_fields(),
        };
        self.open_form(FormState::Creating, None, request).await
    }

    pub async fn open_edit(&self, record: HsCodeRecord) -> Result<()> {
        let request = FormRequest {
            kind: FormKind::Edit,
            title: EDIT_FORM_TITLE,
            url: detail_url(record.pk),
            record: Some(record.clone()),
            fields: self.form_fields(),
        };
        self.open_form(FormState::Editing(record.pk), Some(record), request)
            .await
    }

    pub async fn open_delete(&self, record: HsCodeRecord) -> Result<()> {
        let request = FormRequest {
            kind: FormKind::Delete,
            title: DELETE_FORM_TITLE,
            url: detail_url(record.pk),
            record: Some(record.clone()),
            fields: self.form_fields(),
        };
        self.open_form(FormState::Deleting(record.pk), Some(record), request)
            .await
    }

    async fn open_form(
        &self,
        next: FormState,
        record: Option<HsCodeRecord>,
        request: FormRequest,
    ) -> Result<()> {
        {
            let mut guard = self.inner.lock().await;
            if guard.form.is_open() {
                // Row actions are unreachable while a modal is open; if an
                // open still arrives, the last-clicked action wins and
                // exactly one form remains open.
                warn!(
                    previous = ?guard.form,
                    next = ?next,
                    "form action while another form is open; replacing"
                );
            }
            guard.form = next;
            guard.selected = record;
        }

        let kind = request.kind;
        if let Err(err) = self.ctx.forms.open(request).await {
            let mut guard = self.inner.lock().await;
            if guard.form == next {
                guard.form = FormState::Idle;
                guard.selected = None;
            }
            return Err(err);
        }
        let _ = self.events.send(PanelEvent::FormOpened(kind));
        Ok(())
    }

    /// Called by the host when the open form closes. On a submitted
    /// outcome the current query key is refetched exactly once so the list
    /// reflects the mutation; a cancelled form returns to idle untouched.
    pub async fn form_closed(&self, outcome: FormOutcome) {
        let closed = {
            let mut guard = self.inner.lock().await;
            let state = guard.form;
            if !state.is_open() {
                warn!("form close reported while no form is open; ignoring");
                return;
            }
            guard.form = FormState::Idle;
            guard.selected = None;
            state
        };

        if let Some(kind) = closed.kind() {
            let _ = self.events.send(PanelEvent::FormClosed { kind, outcome });
        }
        if outcome == FormOutcome::Submitted {
            let key = self.current_key().await;
            self.fetch_into_cache(key, true).await;
        }
    }

    pub async fn form_state(&self) -> FormState {
        self.inner.lock().await.form
    }

    pub async fn selected_record(&self) -> Option<HsCodeRecord> {
        self.inner.lock().await.selected.clone()
    }

    /// Renderable snapshot for the current query key.
    pub async fn view(&self) -> PanelView {
        let key = self.current_key().await;
        let records = self.ctx.cache.records(&key).await;
        let fetching = self.ctx.cache.is_fetching(&key).await;
        presenter::present(&records, fetching, self.scope.is_some())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
