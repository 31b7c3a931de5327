use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_created_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub drivers_available: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_created_total = IntCounterVec::new(
            Opts::new("bookings_created_total", "Bookings created by cab type"),
            &["cab_type"],
        )
        .expect("valid bookings_created_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Driver assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Booking status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let drivers_available = IntGauge::new(
            "drivers_available",
            "Registered drivers currently marked available",
        )
        .expect("valid drivers_available metric");

        registry
            .register(Box::new(bookings_created_total.clone()))
            .expect("register bookings_created_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(drivers_available.clone()))
            .expect("register drivers_available");

        Self {
            registry,
            bookings_created_total,
            assignments_total,
            status_transitions_total,
            drivers_available,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
