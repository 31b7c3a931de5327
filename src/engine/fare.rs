use crate::models::booking::CabType;

pub fn rate_per_km(cab_type: CabType) -> f64 {
    match cab_type {
        CabType::Economy => 15.0,
        CabType::Basic => 20.0,
        CabType::Premium => 25.0,
    }
}

/// Fare is fixed once at booking creation: distance times the per-km
/// rate for the tier, rounded to the nearest whole currency unit.
pub fn compute_fare(distance_km: f64, cab_type: CabType) -> f64 {
    (distance_km * rate_per_km(cab_type)).round()
}

#[cfg(test)]
mod tests {
    use super::{compute_fare, rate_per_km};
    use crate::models::booking::CabType;

    #[test]
    fn ten_km_economy_costs_150() {
        assert_eq!(compute_fare(10.0, CabType::Economy), 150.0);
    }

    #[test]
    fn each_tier_has_a_distinct_rate() {
        assert_eq!(rate_per_km(CabType::Economy), 15.0);
        assert_eq!(rate_per_km(CabType::Basic), 20.0);
        assert_eq!(rate_per_km(CabType::Premium), 25.0);
    }

    #[test]
    fn fractional_distances_round_to_the_nearest_unit() {
        // 2.5 km * 15 = 37.5, rounds away from zero
        assert_eq!(compute_fare(2.5, CabType::Economy), 38.0);
        assert_eq!(compute_fare(1.2, CabType::Premium), 30.0);
    }
}
