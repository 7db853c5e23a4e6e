use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use once_cell::sync::OnceCell;
use salvo::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::db::DatabaseManager;
use crate::sync::SyncEngine;

mod admin;
mod health;
pub mod metrics;
mod webhook;

use admin::{
    create_booking, get_booking, list_bookings, list_errors, push_availability, push_booking,
    trigger_sync,
};
use health::{get_status, health_check};
use metrics::metrics_endpoint;
use webhook::{method_not_allowed, receive_webhook};

#[derive(Clone)]
pub struct WebState {
    pub config: Arc<Config>,
    pub db_manager: Arc<DatabaseManager>,
    pub engine: Arc<SyncEngine>,
    pub started_at: Instant,
}

static WEB_STATE: OnceCell<WebState> = OnceCell::new();

pub fn web_state() -> &'static WebState {
    WEB_STATE
        .get()
        .expect("web state is not initialized before handler execution")
}

#[derive(Clone)]
pub struct WebServer {
    config: Arc<Config>,
}

impl WebServer {
    pub async fn new(
        config: Arc<Config>,
        db_manager: Arc<DatabaseManager>,
        engine: Arc<SyncEngine>,
    ) -> Result<Self> {
        let _ = WEB_STATE.set(WebState {
            config: config.clone(),
            db_manager,
            engine,
            started_at: Instant::now(),
        });

        Ok(Self { config })
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        info!("starting web server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor).serve(root_router()).await;

        Ok(())
    }
}

pub fn root_router() -> Router {
    Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("metrics").get(metrics_endpoint))
        .push(
            Router::with_path("webhooks/channex")
                .post(receive_webhook)
                .push(Router::new().goal(method_not_allowed)),
        )
        .push(
            Router::with_path("admin")
                .push(
                    Router::with_path("bookings")
                        .get(list_bookings)
                        .post(create_booking),
                )
                .push(Router::with_path("bookings/{id}").get(get_booking))
                .push(Router::with_path("bookings/{id}/push").post(push_booking))
                .push(Router::with_path("sync").post(trigger_sync))
                .push(Router::with_path("availability").post(push_availability))
                .push(Router::with_path("errors").get(list_errors)),
        )
}
