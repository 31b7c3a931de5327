use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth;
use crate::error::AppError;
use crate::models::account::GeoPoint;
use crate::models::booking::BookingStatus;
use crate::models::realtime::{RoomEvent, RoomMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum ClientEvent {
    JoinRoom {
        booking_id: Uuid,
        token: String,
    },
    LocationUpdate {
        booking_id: Uuid,
        coordinates: GeoPoint,
    },
    StatusUpdate {
        booking_id: Uuid,
        status: BookingStatus,
    },
}

#[derive(Serialize)]
struct ErrorEvent<'a> {
    event: &'a str,
    message: &'a str,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One connected client. Joined rooms are broadcast subscriptions keyed
/// by booking id; relayed messages from this client's own sends are
/// filtered out by connection id.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut rooms: StreamMap<Uuid, BroadcastStream<RoomMessage>> = StreamMap::new();

    info!(conn_id = %conn_id, "websocket client connected");

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                let Some(Ok(message)) = inbound else { break };
                if let Message::Text(text) = message {
                    handle_client_event(&state, conn_id, &text, &mut rooms, &mut sender).await;
                }
            }
            Some((_room, Ok(message))) = rooms.next(), if !rooms.is_empty() => {
                if message.sender == conn_id {
                    continue;
                }
                let Ok(json) = serde_json::to_string(&message.event) else {
                    continue;
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // membership dies with the socket; reap rooms nobody listens to
    let joined: Vec<Uuid> = rooms.keys().copied().collect();
    drop(rooms);
    for booking_id in joined {
        state.drop_room_if_empty(booking_id);
    }

    info!(conn_id = %conn_id, "websocket client disconnected");
}

async fn handle_client_event(
    state: &Arc<AppState>,
    conn_id: Uuid,
    text: &str,
    rooms: &mut StreamMap<Uuid, BroadcastStream<RoomMessage>>,
    sender: &mut SplitSink<WebSocket, Message>,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            warn!(conn_id = %conn_id, error = %err, "unparseable websocket event");
            send_error(sender, "unrecognized event").await;
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom { booking_id, token } => {
            match authorize_join(state, &token, booking_id) {
                Ok(()) => {
                    let tx = state.room(booking_id);
                    rooms.insert(booking_id, BroadcastStream::new(tx.subscribe()));
                    info!(conn_id = %conn_id, booking_id = %booking_id, "joined booking room");
                }
                Err(err) => {
                    warn!(
                        conn_id = %conn_id,
                        booking_id = %booking_id,
                        error = %err,
                        "room join refused"
                    );
                    send_error(sender, &err.to_string()).await;
                }
            }
        }
        ClientEvent::LocationUpdate {
            booking_id,
            coordinates,
        } => {
            relay(
                state,
                conn_id,
                booking_id,
                RoomEvent::DriverLocation {
                    booking_id,
                    coordinates,
                },
            );
        }
        ClientEvent::StatusUpdate { booking_id, status } => {
            relay(
                state,
                conn_id,
                booking_id,
                RoomEvent::BookingStatus { booking_id, status },
            );
        }
    }
}

/// Admission requires a token naming the booking's rider or assigned
/// driver.
fn authorize_join(state: &AppState, token: &str, booking_id: Uuid) -> Result<(), AppError> {
    let account = auth::account_for_token(state, token)?;

    let booking = state
        .bookings
        .get(&booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

    if booking.rider == account.id || booking.driver == Some(account.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "not a participant of this booking".to_string(),
        ))
    }
}

/// Pure fan-out. A room that was never joined has no members and
/// nothing to deliver to; send failures mean the same thing.
fn relay(state: &AppState, conn_id: Uuid, booking_id: Uuid, event: RoomEvent) {
    if let Some(tx) = state.rooms.get(&booking_id) {
        let _ = tx.send(RoomMessage {
            sender: conn_id,
            event,
        });
    }
}

async fn send_error(sender: &mut SplitSink<WebSocket, Message>, message: &str) {
    let payload = ErrorEvent {
        event: "error",
        message,
    };
    if let Ok(json) = serde_json::to_string(&payload) {
        let _ = sender.send(Message::Text(json.into())).await;
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{relay, ClientEvent};
    use crate::auth::AuthKeys;
    use crate::models::account::GeoPoint;
    use crate::models::booking::BookingStatus;
    use crate::models::realtime::RoomEvent;
    use crate::state::AppState;

    #[test]
    fn client_events_parse_from_wire_names() {
        let booking_id = Uuid::new_v4();
        let json = format!(
            r#"{{"event":"location-update","booking_id":"{booking_id}","coordinates":{{"lat":19.07,"lng":72.87}}}}"#
        );

        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            event,
            ClientEvent::LocationUpdate { booking_id: id, .. } if id == booking_id
        ));
    }

    #[test]
    fn room_events_serialize_to_wire_names() {
        let event = RoomEvent::DriverLocation {
            booking_id: Uuid::new_v4(),
            coordinates: GeoPoint {
                lat: 19.07,
                lng: 72.87,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"driver-location""#));

        let event = RoomEvent::BookingStatus {
            booking_id: Uuid::new_v4(),
            status: BookingStatus::PickedUp,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"booking-status""#));
        assert!(json.contains(r#""status":"picked_up""#));
    }

    #[tokio::test]
    async fn relay_reaches_room_members_but_not_the_sender() {
        let state = AppState::new(AuthKeys::new("test-secret", 1), 16);
        let booking_id = Uuid::new_v4();
        let sender_conn = Uuid::new_v4();

        let mut member_rx = state.room(booking_id).subscribe();

        relay(
            &state,
            sender_conn,
            booking_id,
            RoomEvent::BookingStatus {
                booking_id,
                status: BookingStatus::OnTheWay,
            },
        );

        let message = member_rx.recv().await.unwrap();
        // receivers drop their own echoes by comparing sender ids
        assert_eq!(message.sender, sender_conn);
        assert!(matches!(
            message.event,
            RoomEvent::BookingStatus {
                status: BookingStatus::OnTheWay,
                ..
            }
        ));
    }

    #[test]
    fn relay_to_an_unjoined_room_is_a_no_op() {
        let state = AppState::new(AuthKeys::new("test-secret", 1), 16);

        relay(
            &state,
            Uuid::new_v4(),
            Uuid::new_v4(),
            RoomEvent::BookingStatus {
                booking_id: Uuid::new_v4(),
                status: BookingStatus::Cancelled,
            },
        );

        assert!(state.rooms.is_empty());
    }
}
