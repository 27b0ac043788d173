//! Trip planning and log sheet handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::logbook::render_request;
use crate::services::trip_planner::{TripPlanError, TripPlanner};
use crate::types::{ErrorResponse, LogbookRequest, PlanTripRequest, Request, SuccessResponse};

const ROUTE_FAILED_MESSAGE: &str =
    "We couldn't compute a route between those locations. Please try again.";
const PLACE_NOT_FOUND_MESSAGE: &str = "One or more locations could not be found.";

/// Map a planning failure to the error envelope sent to clients
fn plan_error_response(request_id: Uuid, err: &TripPlanError) -> ErrorResponse {
    match err {
        TripPlanError::Plan(e) => ErrorResponse::new(request_id, "INVALID_REQUEST", e.to_string()),
        TripPlanError::PlacesNotFound(_) => {
            let response = ErrorResponse::new(request_id, "PLACE_NOT_FOUND", PLACE_NOT_FOUND_MESSAGE);
            match err.details() {
                Some(details) => response.with_details(details),
                None => response,
            }
        }
        TripPlanError::RouteUnavailable(_) => {
            ErrorResponse::new(request_id, "ROUTE_FAILED", ROUTE_FAILED_MESSAGE)
        }
    }
}

/// Handle hos.trip.plan requests
pub async fn handle_plan(
    client: Client,
    mut subscriber: Subscriber,
    planner: Arc<TripPlanner>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<PlanTripRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse trip plan request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        debug!("Trip plan request {}", request.id);

        match planner.plan(&request.payload).await {
            Ok(plan) => {
                info!(
                    "Trip plan {} ready: {} day(s), {} stop(s)",
                    request.id,
                    plan.days.len(),
                    plan.stops.len()
                );
                let success = SuccessResponse::new(request.id, plan);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                warn!("Trip plan {} failed: {}", request.id, e);
                let error = plan_error_response(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle hos.logbook.render requests
pub async fn handle_logbook(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<LogbookRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse logbook request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match render_request(&request.payload) {
            Ok(sheet) => {
                debug!("Rendered log sheet {} ({} bytes)", request.id, sheet.svg.len());
                let success = SuccessResponse::new(request.id, sheet);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                let error = ErrorResponse::new(request.id, "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;
    use crate::services::trip_planner::PlaceLookupFailure;

    #[test]
    fn test_invalid_input_maps_to_invalid_request() {
        let err = TripPlanError::Plan(PlanError::invalid("cycle hours must be non-negative"));
        let response = plan_error_response(Uuid::nil(), &err);
        assert_eq!(response.error.code, "INVALID_REQUEST");
        assert!(response.error.message.contains("cycle hours"));
        assert!(response.error.details.is_none());
    }

    #[test]
    fn test_missing_places_carry_field_details() {
        let err = TripPlanError::PlacesNotFound(vec![PlaceLookupFailure {
            field: "dropoffLocation",
            message: "We couldn't find the dropoff location. Try 'City, ST' or a full address.",
        }]);
        let response = plan_error_response(Uuid::nil(), &err);
        assert_eq!(response.error.code, "PLACE_NOT_FOUND");

        let details = response.error.details.unwrap();
        assert_eq!(
            details["dropoffLocation"][0],
            "We couldn't find the dropoff location. Try 'City, ST' or a full address."
        );
    }

    #[test]
    fn test_route_failure_hides_engine_error() {
        let err = TripPlanError::RouteUnavailable("Valhalla returned 400: No path".to_string());
        let response = plan_error_response(Uuid::nil(), &err);
        assert_eq!(response.error.code, "ROUTE_FAILED");
        assert_eq!(response.error.message, ROUTE_FAILED_MESSAGE);
    }

    #[test]
    fn test_envelope_parses_trip_request() {
        let json = r#"{
            "id": "6f1c1b1e-8a52-4a57-9f1e-3c1d2b7a9e10",
            "timestamp": "2026-03-02T14:00:00Z",
            "payload": {
                "currentLocation": "Dallas, TX",
                "pickupLocation": "Oklahoma City, OK",
                "dropoffLocation": "Denver, CO",
                "currentCycleUsedHours": 0
            }
        }"#;
        let request: Request<PlanTripRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(request.payload.pickup_location, "Oklahoma City, OK");
    }
}
