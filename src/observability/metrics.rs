use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub offers_posted_total: IntCounter,
    pub trip_responses_total: IntCounterVec,
    pub trips_cancelled_total: IntCounter,
    pub offers_seeking: IntGauge,
    pub drivers_online: IntGauge,
    pub match_wait_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let offers_posted_total =
            IntCounter::new("offers_posted_total", "Total ride requests posted")
                .expect("valid offers_posted_total metric");

        let trip_responses_total = IntCounterVec::new(
            Opts::new("trip_responses_total", "Driver responses by outcome"),
            &["outcome"],
        )
        .expect("valid trip_responses_total metric");

        let trips_cancelled_total =
            IntCounter::new("trips_cancelled_total", "Total trips cancelled")
                .expect("valid trips_cancelled_total metric");

        let offers_seeking = IntGauge::new(
            "offers_seeking",
            "Ride requests currently open for matching",
        )
        .expect("valid offers_seeking metric");

        let drivers_online = IntGauge::new("drivers_online", "Drivers currently online")
            .expect("valid drivers_online metric");

        let match_wait_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "match_wait_seconds",
            "Seconds between posting a request and a driver accepting it",
        ))
        .expect("valid match_wait_seconds metric");

        registry
            .register(Box::new(offers_posted_total.clone()))
            .expect("register offers_posted_total");
        registry
            .register(Box::new(trip_responses_total.clone()))
            .expect("register trip_responses_total");
        registry
            .register(Box::new(trips_cancelled_total.clone()))
            .expect("register trips_cancelled_total");
        registry
            .register(Box::new(offers_seeking.clone()))
            .expect("register offers_seeking");
        registry
            .register(Box::new(drivers_online.clone()))
            .expect("register drivers_online");
        registry
            .register(Box::new(match_wait_seconds.clone()))
            .expect("register match_wait_seconds");

        Self {
            registry,
            offers_posted_total,
            trip_responses_total,
            trips_cancelled_total,
            offers_seeking,
            drivers_online,
            match_wait_seconds,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
