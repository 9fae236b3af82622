use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        booking_confirmation::BookingConfirmationUseCase, commissions::CommissionUseCase,
        eligibility::EligibilityUseCase, payment_transfers::{TransferAdminUseCase, TransferScheduler},
        payment_webhook::PaymentWebhookUseCase, plan_rates::PlanRateCache,
        reservations::ReservationUseCase, settlement::SettlementUseCase,
        subscription_plans::SubscriptionPlanUseCase,
    },
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::value_objects::eligibility::EligibilityRule,
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                commission_transactions::CommissionTransactionPostgres,
                eligibility::EligibilityPostgres, events::EventPostgres,
                meetings::MeetingPostgres, payment_transfers::PaymentTransferPostgres,
                plan_rates::PlanRatePostgres, slot_reservations::SlotReservationPostgres,
                subscription_plans::SubscriptionPlanPostgres,
            },
        },
        notifications::dispatcher_from_config,
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let notifier = dispatcher_from_config(config.notifications.webhook_url.as_deref());
    let stripe = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    ));

    let meeting_repo = Arc::new(MeetingPostgres::new(Arc::clone(&db_pool)));
    let plan_repo = Arc::new(SubscriptionPlanPostgres::new(Arc::clone(&db_pool)));
    let commission_repo = Arc::new(CommissionTransactionPostgres::new(Arc::clone(&db_pool)));
    let transfer_repo = Arc::new(PaymentTransferPostgres::new(Arc::clone(&db_pool)));

    let rates = Arc::new(PlanRateCache::new(
        Arc::new(PlanRatePostgres::new(Arc::clone(&db_pool))),
        Duration::from_secs(config.booking.plan_rate_cache_ttl_seconds),
    ));
    let commissions = Arc::new(CommissionUseCase::new(
        Arc::clone(&plan_repo),
        Arc::clone(&rates),
        Arc::clone(&commission_repo),
    ));
    let settlement = Arc::new(SettlementUseCase::new(
        Arc::clone(&commissions),
        Arc::new(TransferScheduler::new(
            Arc::clone(&transfer_repo),
            chrono::Duration::hours(config.booking.payout_delay_hours),
        )),
    ));

    let reservations = Arc::new(ReservationUseCase::new(
        Arc::new(EventPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SlotReservationPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&stripe),
        chrono::Duration::minutes(config.booking.hold_ttl_minutes),
    ));
    let webhook = Arc::new(PaymentWebhookUseCase::new(
        stripe,
        Arc::clone(&meeting_repo),
        Arc::new(BookingConfirmationUseCase::new(
            meeting_repo,
            Arc::clone(&notifier),
        )),
        settlement,
    ));
    let eligibility = Arc::new(EligibilityUseCase::new(
        Arc::new(EligibilityPostgres::new(Arc::clone(&db_pool))),
        notifier,
        EligibilityRule::default(),
    ));
    let plans = Arc::new(SubscriptionPlanUseCase::new(plan_repo, rates));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/reservations", routers::reservations::routes(reservations))
        .nest("/api/v1/payments", routers::payment_webhook::routes(webhook))
        .nest(
            "/api/v1/experts",
            routers::experts::routes(commissions, eligibility, plans),
        )
        .nest(
            "/api/v1/admin/transfers",
            routers::admin_transfers::routes(Arc::new(TransferAdminUseCase::new(transfer_repo))),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PUT])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
