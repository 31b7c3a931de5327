use rand::seq::SliceRandom;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::account::Account;
use crate::state::AppState;

/// Picks a driver for dispatch. Available drivers are tried first; if
/// none are available the pool widens to every registered driver.
/// Selection within the pool is uniform random, with no proximity
/// weighting.
pub fn select_driver(state: &AppState) -> Result<Account, AppError> {
    let mut pool = state.available_drivers();
    if pool.is_empty() {
        warn!("no available drivers, widening to the full driver pool");
        pool = state.all_drivers();
    }

    pool.choose(&mut rand::thread_rng())
        .cloned()
        .ok_or(AppError::NoDriversRegistered)
}

/// Selects a driver for a new booking and claims them. A pick from the
/// available pool is claimed only if the entry is still available when
/// the write lands, retrying selection on contention, so two concurrent
/// bookings cannot claim one driver. When nobody is available the claim
/// falls through to any registered driver unconditionally.
pub fn select_and_claim(state: &AppState, booking_id: Uuid) -> Result<Account, AppError> {
    loop {
        let pool = state.available_drivers();
        let Some(pick) = pool.choose(&mut rand::thread_rng()) else {
            break;
        };
        if let Some(claimed) = claim(state, pick.id, booking_id, true) {
            info!(driver_id = %claimed.id, booking_id = %booking_id, "driver claimed");
            return Ok(claimed);
        }
        // lost the entry to a concurrent booking, take a fresh snapshot
    }

    let pool = state.all_drivers();
    let pick = pool
        .choose(&mut rand::thread_rng())
        .ok_or(AppError::NoDriversRegistered)?;
    let claimed = claim(state, pick.id, booking_id, false)
        .ok_or_else(|| AppError::Internal("selected driver disappeared".to_string()))?;

    info!(driver_id = %claimed.id, booking_id = %booking_id, "busy driver claimed via fallback");
    Ok(claimed)
}

/// Explicit driver discovery for the find-driver endpoint. A busy pick
/// is flipped back to available and persisted; `current_booking` is
/// left untouched. Observed behavior of the system this reproduces,
/// kept as-is rather than fixed.
pub fn discover_driver(state: &AppState) -> Result<Account, AppError> {
    let mut pick = select_driver(state)?;

    if !pick.is_available {
        if let Some(mut entry) = state.accounts.get_mut(&pick.id) {
            entry.is_available = true;
            pick = entry.clone();
        }
        state.recount_available_drivers();
        info!(driver_id = %pick.id, "force-freed busy driver during discovery");
    }

    Ok(pick)
}

fn claim(
    state: &AppState,
    driver_id: Uuid,
    booking_id: Uuid,
    require_available: bool,
) -> Option<Account> {
    let claimed = {
        let mut entry = state.accounts.get_mut(&driver_id)?;
        if require_available && !entry.is_available {
            return None;
        }
        entry.is_available = false;
        entry.current_booking = Some(booking_id);
        entry.clone()
    };

    state.recount_available_drivers();
    Some(claimed)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{discover_driver, select_and_claim, select_driver};
    use crate::auth::AuthKeys;
    use crate::error::AppError;
    use crate::models::account::{Account, GeoPoint, Role, Vehicle};
    use crate::state::AppState;

    fn test_state() -> AppState {
        AppState::new(AuthKeys::new("test-secret", 1), 16)
    }

    fn driver(id_seed: u128, available: bool) -> Account {
        Account {
            id: Uuid::from_u128(id_seed),
            name: "Test Driver".to_string(),
            email: format!("driver{id_seed}@example.com"),
            phone_number: format!("{id_seed:010}"),
            password_hash: "hash".to_string(),
            role: Role::Driver,
            vehicle: Some(Vehicle {
                model: "Swift".to_string(),
                plate: format!("MH01-{id_seed:04}"),
                color: "white".to_string(),
            }),
            location: GeoPoint::FALLBACK,
            is_available: available,
            rating: 4.0,
            current_booking: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_pool_fails_with_no_drivers_registered() {
        let state = test_state();
        assert!(matches!(
            select_driver(&state),
            Err(AppError::NoDriversRegistered)
        ));
    }

    #[test]
    fn unavailable_driver_is_selected_when_nobody_is_free() {
        let state = test_state();
        let busy = driver(1, false);
        state.accounts.insert(busy.id, busy.clone());

        let picked = select_driver(&state).unwrap();
        assert_eq!(picked.id, busy.id);
    }

    #[test]
    fn claim_marks_the_driver_busy_with_the_booking_reference() {
        let state = test_state();
        let free = driver(2, true);
        state.accounts.insert(free.id, free.clone());

        let booking_id = Uuid::new_v4();
        let claimed = select_and_claim(&state, booking_id).unwrap();

        assert_eq!(claimed.id, free.id);
        assert!(!claimed.is_available);
        assert_eq!(claimed.current_booking, Some(booking_id));

        let stored = state.accounts.get(&free.id).unwrap();
        assert!(!stored.is_available);
        assert_eq!(stored.current_booking, Some(booking_id));
    }

    #[test]
    fn fallback_claim_reassigns_a_busy_driver() {
        let state = test_state();
        let mut busy = driver(3, false);
        busy.current_booking = Some(Uuid::new_v4());
        state.accounts.insert(busy.id, busy.clone());

        let booking_id = Uuid::new_v4();
        let claimed = select_and_claim(&state, booking_id).unwrap();

        assert_eq!(claimed.id, busy.id);
        assert_eq!(claimed.current_booking, Some(booking_id));
    }

    #[test]
    fn discovery_force_frees_a_busy_pick_without_clearing_the_booking() {
        let state = test_state();
        let booking_id = Uuid::new_v4();
        let mut busy = driver(4, false);
        busy.current_booking = Some(booking_id);
        state.accounts.insert(busy.id, busy.clone());

        let found = discover_driver(&state).unwrap();

        assert!(found.is_available);
        let stored = state.accounts.get(&busy.id).unwrap();
        assert!(stored.is_available);
        assert_eq!(stored.current_booking, Some(booking_id));
    }
}
