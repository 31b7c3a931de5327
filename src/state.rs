use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::AuthKeys;
use crate::models::account::{Account, Role};
use crate::models::booking::{Booking, BookingStatus};
use crate::models::realtime::RoomMessage;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub accounts: DashMap<Uuid, Account>,
    pub bookings: DashMap<Uuid, Booking>,
    pub rooms: DashMap<Uuid, broadcast::Sender<RoomMessage>>,
    pub event_buffer_size: usize,
    pub auth: AuthKeys,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(auth: AuthKeys, event_buffer_size: usize) -> Self {
        Self {
            accounts: DashMap::new(),
            bookings: DashMap::new(),
            rooms: DashMap::new(),
            event_buffer_size,
            auth,
            metrics: Metrics::new(),
        }
    }

    pub fn find_account_by_email(&self, email: &str) -> Option<Account> {
        self.accounts
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.value().clone())
    }

    pub fn email_in_use(&self, email: &str) -> bool {
        self.accounts.iter().any(|entry| entry.email == email)
    }

    pub fn phone_in_use(&self, phone: &str) -> bool {
        self.accounts.iter().any(|entry| entry.phone_number == phone)
    }

    pub fn plate_in_use(&self, plate: &str) -> bool {
        self.accounts.iter().any(|entry| {
            entry
                .vehicle
                .as_ref()
                .is_some_and(|vehicle| vehicle.plate == plate)
        })
    }

    pub fn riders(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .filter(|entry| entry.role == Role::Rider)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn all_drivers(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .filter(|entry| entry.role == Role::Driver)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn available_drivers(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .filter(|entry| entry.role == Role::Driver && entry.is_available)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn bookings_for_rider(&self, rider: Uuid) -> Vec<Booking> {
        let mut list: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| entry.rider == rider)
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn bookings_for_driver(&self, driver: Uuid) -> Vec<Booking> {
        let mut list: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| entry.driver == Some(driver))
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// Unassigned ride requests, newest first, for the driver request
    /// feed.
    pub fn pending_requests(&self) -> Vec<Booking> {
        let mut list: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| entry.status == BookingStatus::Pending && entry.driver.is_none())
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn active_booking_for_driver(&self, driver: Uuid) -> Option<Booking> {
        self.bookings
            .iter()
            .find(|entry| entry.driver == Some(driver) && !entry.status.is_terminal())
            .map(|entry| entry.value().clone())
    }

    /// Broadcast channel for one booking's room, created on first use.
    pub fn room(&self, booking_id: Uuid) -> broadcast::Sender<RoomMessage> {
        self.rooms
            .entry(booking_id)
            .or_insert_with(|| broadcast::channel(self.event_buffer_size).0)
            .clone()
    }

    pub fn drop_room_if_empty(&self, booking_id: Uuid) {
        self.rooms
            .remove_if(&booking_id, |_, tx| tx.receiver_count() == 0);
    }

    pub fn recount_available_drivers(&self) {
        let available = self
            .accounts
            .iter()
            .filter(|entry| entry.role == Role::Driver && entry.is_available)
            .count();
        self.metrics.drivers_available.set(available as i64);
    }
}
