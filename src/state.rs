use tokio::sync::broadcast;

use crate::config::Config;
use crate::engine::board::RideRequestBoard;
use crate::engine::presence::DriverPresenceRegistry;
use crate::live::LiveLocationFeed;
use crate::models::trip::RideOffer;
use crate::notify::Inbox;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub presence: DriverPresenceRegistry,
    pub board: RideRequestBoard,
    pub feed: LiveLocationFeed,
    pub inbox: Inbox,
    pub trip_events_tx: broadcast::Sender<RideOffer>,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (trip_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            presence: DriverPresenceRegistry::new(),
            board: RideRequestBoard::new(),
            feed: LiveLocationFeed::new(),
            inbox: Inbox::new(),
            trip_events_tx,
            metrics: Metrics::new(),
            config,
        }
    }
}
