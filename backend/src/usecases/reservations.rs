use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crates::{
    domain::{
        entities::slot_reservations::{InsertSlotReservationEntity, SlotReservationEntity},
        repositories::{events::EventRepository, slot_reservations::SlotReservationRepository},
        value_objects::{
            enums::reservation_statuses::ReservationStatus,
            meetings::booking_metadata,
            reservations::{
                CancelReservationOutcome, GuestContact, PaymentIntentDto, ReservationDto,
                ReserveSlotModel, ReserveSlotOutcome,
            },
            time_windows::TimeWindow,
        },
    },
    payments::gateway::{CreatePaymentIntentRequest, PaymentGateway, PaymentGatewayError},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("the requested window overlaps an existing booking")]
    Conflict,
    #[error("event not found")]
    EventNotFound,
    #[error("event is not bookable")]
    EventInactive,
    #[error("invalid window: {0}")]
    InvalidWindow(String),
    #[error("a guest email is required")]
    MissingGuestEmail,
    #[error("reservation not found")]
    NotFound,
    #[error("reservation belongs to another account")]
    Forbidden,
    #[error("reservation is no longer pending")]
    NotPending,
    #[error(transparent)]
    Gateway(#[from] PaymentGatewayError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ReservationError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ReservationError::Conflict | ReservationError::NotPending => StatusCode::CONFLICT,
            ReservationError::EventNotFound | ReservationError::NotFound => StatusCode::NOT_FOUND,
            ReservationError::EventInactive
            | ReservationError::InvalidWindow(_)
            | ReservationError::MissingGuestEmail => StatusCode::BAD_REQUEST,
            ReservationError::Forbidden => StatusCode::FORBIDDEN,
            ReservationError::Gateway(PaymentGatewayError::Transient(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ReservationError::Gateway(PaymentGatewayError::Permanent(_)) => StatusCode::BAD_GATEWAY,
            ReservationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ReservationError>;

/// The caller as seen by the reservation flow.
#[derive(Debug, Clone)]
pub struct Requester {
    pub account_id: Uuid,
    pub email: Option<String>,
}

pub struct ReservationUseCase<E, S, G>
where
    E: EventRepository + Send + Sync + 'static,
    S: SlotReservationRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    event_repo: Arc<E>,
    reservation_repo: Arc<S>,
    gateway: Arc<G>,
    hold_ttl: Duration,
}

impl<E, S, G> ReservationUseCase<E, S, G>
where
    E: EventRepository + Send + Sync + 'static,
    S: SlotReservationRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(event_repo: Arc<E>, reservation_repo: Arc<S>, gateway: Arc<G>, hold_ttl: Duration) -> Self {
        Self {
            event_repo,
            reservation_repo,
            gateway,
            hold_ttl,
        }
    }

    pub async fn reserve(
        &self,
        requester: &Requester,
        model: ReserveSlotModel,
        now: DateTime<Utc>,
    ) -> UseCaseResult<ReservationDto> {
        let window = TimeWindow::new(model.start_time, model.end_time)
            .map_err(|err| ReservationError::InvalidWindow(err.to_string()))?;
        if window.start() <= now {
            return Err(ReservationError::InvalidWindow(
                "window must start in the future".to_string(),
            ));
        }

        let event = self
            .event_repo
            .find_by_id(model.event_id)
            .await?
            .filter(|event| event.expert_id == model.expert_id)
            .ok_or(ReservationError::EventNotFound)?;
        if !event.is_active {
            return Err(ReservationError::EventInactive);
        }
        if window.duration() != Duration::minutes(i64::from(event.duration_minutes)) {
            return Err(ReservationError::InvalidWindow(format!(
                "window must last {} minutes",
                event.duration_minutes
            )));
        }

        let email = model
            .guest_email
            .or_else(|| requester.email.clone())
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(ReservationError::MissingGuestEmail)?;
        let guest = GuestContact {
            account_id: Some(requester.account_id),
            name: model.guest_name.trim().to_string(),
            email,
        };

        let insert = InsertSlotReservationEntity::pending(
            model.expert_id,
            event.id,
            window,
            guest,
            now + self.hold_ttl,
        );

        match self.reservation_repo.reserve(insert).await? {
            ReserveSlotOutcome::Reserved(reservation) => {
                info!(
                    reservation_id = %reservation.id,
                    expert_id = %reservation.expert_id,
                    expires_at = %reservation.expires_at,
                    "reservations: hold created"
                );
                Ok(ReservationDto::from(reservation))
            }
            ReserveSlotOutcome::Conflict => {
                info!(
                    expert_id = %model.expert_id,
                    start = %window.start(),
                    end = %window.end(),
                    "reservations: window conflicts with an existing booking"
                );
                Err(ReservationError::Conflict)
            }
        }
    }

    /// Cancelling a hold that is no longer pending is a no-op.
    pub async fn cancel(
        &self,
        requester: &Requester,
        reservation_id: Uuid,
    ) -> UseCaseResult<ReservationStatus> {
        self.owned_reservation(requester, reservation_id).await?;

        match self.reservation_repo.cancel(reservation_id).await? {
            CancelReservationOutcome::Cancelled => {
                info!(%reservation_id, "reservations: hold cancelled");
                Ok(ReservationStatus::Cancelled)
            }
            CancelReservationOutcome::Unchanged(status) => {
                info!(%reservation_id, %status, "reservations: cancel ignored");
                Ok(status)
            }
        }
    }

    pub async fn create_payment_intent(
        &self,
        requester: &Requester,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<PaymentIntentDto> {
        let reservation = self.owned_reservation(requester, reservation_id).await?;
        if reservation.status != ReservationStatus::Pending || reservation.expires_at <= now {
            return Err(ReservationError::NotPending);
        }

        let event = self
            .event_repo
            .find_by_id(reservation.event_id)
            .await?
            .ok_or(ReservationError::EventNotFound)?;

        let intent = self
            .gateway
            .create_payment_intent(CreatePaymentIntentRequest {
                amount_minor: event.price_minor,
                currency: event.currency.clone(),
                idempotency_key: format!("reservation_{}", reservation.id),
                metadata: booking_metadata(&reservation),
            })
            .await
            .map_err(|err| {
                warn!(%reservation_id, error = %err, "reservations: payment intent creation failed");
                err
            })?;

        let attached = self
            .reservation_repo
            .attach_payment_intent(reservation.id, intent.id.clone())
            .await?;
        if !attached {
            return Err(ReservationError::NotPending);
        }

        info!(
            %reservation_id,
            payment_intent_id = %intent.id,
            "reservations: payment intent attached"
        );

        Ok(PaymentIntentDto {
            reservation_id: reservation.id,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_minor: event.price_minor,
            currency: event.currency,
        })
    }

    async fn owned_reservation(
        &self,
        requester: &Requester,
        reservation_id: Uuid,
    ) -> UseCaseResult<SlotReservationEntity> {
        let reservation = self
            .reservation_repo
            .find_by_id(reservation_id)
            .await?
            .ok_or(ReservationError::NotFound)?;

        if reservation.guest.account_id != Some(requester.account_id) {
            return Err(ReservationError::Forbidden);
        }

        Ok(reservation)
    }
}
