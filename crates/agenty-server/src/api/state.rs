//! Shared handler state

use std::sync::Arc;

use agenty_core::{ChatService, ModelService, ProviderService};

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub providers: Arc<ProviderService>,
    pub models: Arc<ModelService>,
}
