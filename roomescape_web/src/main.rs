mod error;
mod routes;

use std::{error::Error, net::SocketAddr};

use eventstore::ClientSettings;
use roomescape::{
    application::{ReservationService, ReservationTimeService},
    domain::SystemClock,
    infrastructure::{EventStoreReservationRepository, EventStoreReservationTimeRepository},
    RoomEscapeConfig,
};
use tracing::{error, info, Level};

use crate::routes::{router, AppState};

#[tokio::main]
async fn main() {
    match RoomEscapeConfig::load() {
        Ok(config) => {
            tracing_subscriber::fmt()
                .with_max_level(Level::from(&config.logger.level))
                .init();
            if let Err(error) = serve(&config).await {
                error!("アプリケーションエラー: {}", error);
            }
        }
        Err(error) => {
            tracing_subscriber::fmt::init();
            error!("アプリケーションエラー: {}", error)
        }
    }
}

async fn serve(config: &RoomEscapeConfig) -> Result<(), Box<dyn Error>> {
    let settings = config.eventstore.url.parse::<ClientSettings>()?;
    let client = eventstore::Client::new(settings)?;
    let reservations = EventStoreReservationRepository::new(client.clone());
    let times = EventStoreReservationTimeRepository::new(client);
    let state = AppState::new(
        ReservationService::new(reservations.clone(), times.clone(), SystemClock),
        ReservationTimeService::new(times, reservations),
    );

    let addr = config.server.addr.parse::<SocketAddr>()?;
    info!("HTTPサーバーを起動: {}", addr);
    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await?;
    Ok(())
}
