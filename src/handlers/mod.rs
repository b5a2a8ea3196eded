// HTTP handlers and application wiring

pub mod authpay;
pub mod health;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::challenge::{ChallengeStore, MemoryChallengeStore};
use crate::config::AppConfig;
use crate::directory::{
    MemoryMerchantDirectory, MemoryUserDirectory, MerchantDirectory, UserDirectory,
};
use crate::dispatch::{build_provider, LogSmsSender, MethodDispatcher, SmsSender};
use crate::error::AppError;
use crate::notify::Notifier;
use crate::purchase::{MemoryPurchaseStorage, PurchaseLog};
use crate::verify::Adjudicator;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ChallengeStore>,
    pub merchants: Arc<dyn MerchantDirectory>,
    pub users: Arc<dyn UserDirectory>,
    pub dispatcher: Arc<MethodDispatcher>,
    pub adjudicator: Arc<Adjudicator>,
    pub purchases: Arc<PurchaseLog>,
    pub notifier: Arc<Notifier>,
}

/// Wire up the in-memory backends and services for a configuration
pub fn build_state(config: Arc<AppConfig>) -> Result<AppState, AppError> {
    let store: Arc<dyn ChallengeStore> =
        Arc::new(MemoryChallengeStore::new(config.challenge.clone()));
    let merchants: Arc<dyn MerchantDirectory> =
        Arc::new(MemoryMerchantDirectory::new(config.merchants.clone()));
    let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new(
        config.directory.users.clone(),
        config.directory.assume_default_profile,
    ));
    let provider = build_provider(&config.provider)?;
    let sms: Arc<dyn SmsSender> = Arc::new(LogSmsSender);
    let notifier = Arc::new(Notifier::from_config(&config.notifications));
    let purchases = Arc::new(PurchaseLog::new(Arc::new(MemoryPurchaseStorage::new())));

    let dispatcher = Arc::new(MethodDispatcher::new(
        store.clone(),
        provider.clone(),
        sms,
        users.clone(),
        config.provider.clone(),
    ));
    let adjudicator = Arc::new(Adjudicator::new(
        store.clone(),
        provider,
        users.clone(),
        purchases.clone(),
        notifier.clone(),
        config.provider.clone(),
    ));

    Ok(AppState {
        config,
        store,
        merchants,
        users,
        dispatcher,
        adjudicator,
        purchases,
        notifier,
    })
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::welcome))
        .route("/authpay/health", get(health::health_check))
        .route("/authpay/init", post(authpay::init_challenge))
        .route("/authpay/send", post(authpay::send_challenge))
        .route("/authpay/verify", post(authpay::verify_challenge))
        .route("/authpay/cancel", post(authpay::cancel_challenge))
        .route("/authpay/webhook", post(authpay::webhook))
        .with_state(state)
}
