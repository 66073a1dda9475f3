use crate::errors::*;
pub use reqwest::blocking::Client;
use std::time::Duration;

pub fn client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(60))
        .build()
        .map_err(Error::from)
}
