//! Route registry: path groups installed into a single router, with `404 Not found` for every
//! path or method nobody registered.
use std::sync::{Arc, OnceLock};

use axum::{
    handler::Handler,
    response::Response,
    routing::{get, post, MethodRouter},
    Router,
};

use super::{api::ApiRoutes, response::write_not_found, simple::SimpleRoutes};
use crate::FlagClient;

/// State shared by all handlers.
///
/// The client slot is written once during startup and only read afterwards.
#[derive(Clone, Default)]
pub struct AppState {
    client: Arc<OnceLock<Arc<dyn FlagClient>>>,
}

impl AppState {
    /// State with an empty client slot.
    pub fn new() -> AppState {
        AppState::default()
    }

    /// State whose client slot is already filled.
    pub fn with_client(client: Arc<dyn FlagClient>) -> AppState {
        let state = AppState::new();
        state.set_client(client);
        state
    }

    /// The client, if it has been constructed.
    pub fn client(&self) -> Option<&Arc<dyn FlagClient>> {
        self.client.get()
    }

    /// Fill the client slot. Returns `false` if it was already filled.
    pub(crate) fn set_client(&self, client: Arc<dyn FlagClient>) -> bool {
        self.client.set(client).is_ok()
    }
}

/// A group of routes installed together.
pub trait RouteGroup: Send + Sync {
    /// Register the group's paths on `router`.
    fn install(&self, router: Router<AppState>) -> Router<AppState>;
}

/// All route groups served by the wrapper.
pub fn route_groups() -> Vec<Box<dyn RouteGroup>> {
    vec![Box::new(SimpleRoutes), Box::new(ApiRoutes)]
}

/// Build the router for `groups`, answering unknown paths with `404 Not found`.
pub fn build_router(groups: &[Box<dyn RouteGroup>], state: AppState) -> Router {
    groups
        .iter()
        .fold(Router::new(), |router, group| group.install(router))
        .fallback(not_found)
        .with_state(state)
}

pub(crate) async fn not_found() -> Response {
    write_not_found()
}

/// Route accepting only `GET`. `HEAD` and every other method get `404 Not found`.
pub(crate) fn get_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    get(handler).head(not_found).fallback(not_found)
}

/// Route accepting only `POST`. Every other method gets `404 Not found`.
pub(crate) fn post_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    post(handler).fallback(not_found)
}
