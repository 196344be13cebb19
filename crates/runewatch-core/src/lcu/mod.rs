// Local client control API: transport seam, WAMP/HTTPS implementation,
// status state machine, and the connection driver.

pub mod connector;
pub mod tracker;
pub mod transport;
pub mod wamp;

pub use connector::{ConnectorSettings, LcuConnector};
pub use tracker::{ConnectorEvent, StatusTracker};
pub use transport::{LcuApi, LcuSession, LcuTransport, SocketEvent};
pub use wamp::{HttpLcuApi, WampTransport};

/// Control-API resource paths used by the connector.
pub mod endpoints {
    pub const CURRENT_SUMMONER: &str = "/lol-summoner/v1/current-summoner";
    pub const GAMEFLOW_PHASE: &str = "/lol-gameflow/v1/gameflow-phase";
    pub const GAMEFLOW_SESSION: &str = "/lol-gameflow/v1/session";
    pub const CURRENT_CHAMPION: &str = "/lol-champ-select/v1/current-champion";
    pub const CHAMP_SELECT_SESSION: &str = "/lol-champ-select/v1/session";

    /// Resources whose change events the connector subscribes to.
    pub const SUBSCRIBED: &[&str] = &[
        GAMEFLOW_PHASE,
        GAMEFLOW_SESSION,
        CURRENT_CHAMPION,
        CHAMP_SELECT_SESSION,
    ];

    pub fn summoner_by_puuid(puuid: &str) -> String {
        format!("/lol-summoner/v2/summoners/puuid/{puuid}")
    }

    pub fn match_history(puuid: &str, count: usize) -> String {
        let end = count.saturating_sub(1);
        format!("/lol-match-history/v1/products/lol/{puuid}/matches?begIndex=0&endIndex={end}")
    }
}
