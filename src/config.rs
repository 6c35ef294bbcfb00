//! Configuration
//!
//! Everything comes from the environment, a `.env` file is picked up as well

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use anyhow::bail;

use crate::utils::env_var_or_else;
use crate::utils::parse_env_var_or;

const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";
const DEFAULT_DATA_FILE: &str = "reminders.json";
const DEFAULT_UPLOAD_FOLDER: &str = "uploaded_audio";
const DEFAULT_AUDIO_FOLDER: &str = "default_audio";
const DEFAULT_STATIC_FOLDER: &str = "static";
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Runtime configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Address to listen on
    pub address: SocketAddr,

    /// JSON document with all pending reminders
    pub data_file: PathBuf,

    /// Directory for uploaded sounds
    pub upload_folder: PathBuf,

    /// Directory with built-in sounds
    pub default_audio_folder: PathBuf,

    /// Directory with the web client
    pub static_folder: PathBuf,

    /// Time between two due checks
    pub tick_interval: Duration,
}

impl Config {
    /// Read the configuration from the environment
    ///
    /// Known variables:
    /// - `ADDRESS`, with `PORT` to override just the port
    /// - `DATA_FILE`
    /// - `UPLOAD_FOLDER`
    /// - `DEFAULT_AUDIO_FOLDER`
    /// - `STATIC_FOLDER`
    /// - `TICK_INTERVAL_MS`
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            address: address()?,
            data_file: env_var_or_else("DATA_FILE", || DEFAULT_DATA_FILE.into()).into(),
            upload_folder: env_var_or_else("UPLOAD_FOLDER", || DEFAULT_UPLOAD_FOLDER.into()).into(),
            default_audio_folder: env_var_or_else("DEFAULT_AUDIO_FOLDER", || {
                DEFAULT_AUDIO_FOLDER.into()
            })
            .into(),
            static_folder: env_var_or_else("STATIC_FOLDER", || DEFAULT_STATIC_FOLDER.into()).into(),
            tick_interval: tick_interval()?,
        })
    }
}

fn address() -> Result<SocketAddr> {
    let mut address =
        env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS)).parse::<SocketAddr>()?;

    // optional override of just the port
    if let Ok(port) = std::env::var("PORT") {
        // only check non-empty strings
        if !port.is_empty() {
            let port = port.parse::<u16>()?;

            address.set_port(port);
        }
    }

    Ok(address)
}

fn tick_interval() -> Result<Duration> {
    let milliseconds = parse_env_var_or("TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?;

    if milliseconds == 0 {
        bail!("`TICK_INTERVAL_MS` must be larger than zero");
    }

    Ok(Duration::from_millis(milliseconds))
}
