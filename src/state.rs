use std::{convert::Infallible, sync::Arc};

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};
use warp::Filter;

use crate::{config::Config, error::Error, jwt::TokenSigner, media::MediaStorage};

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub cache: Option<MultiplexedConnection>,
    pub signer: TokenSigner,
    pub media: MediaStorage,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        pool: Pool<Postgres>,
        cache: Option<MultiplexedConnection>,
        config: Config,
    ) -> Result<Self, Error> {
        Ok(Self {
            pool,
            cache,
            signer: TokenSigner::new(&config.jwt_secret, config.token_lifetime_hours)?,
            media: MediaStorage::new(&config.media_root, &config.media_url),
            config: Arc::new(config),
        })
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
