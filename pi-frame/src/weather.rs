use crate::{FrameError, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// San Francisco.
impl Default for Location {
    fn default() -> Self {
        Self {
            latitude: 37.790812,
            longitude: -122.418431,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weather {
    /// Degrees Fahrenheit.
    pub temperature: f32,
    pub description: Option<String>,
}

/// WMO weather interpretation codes.
pub fn describe(code: u64) -> Option<&'static str> {
    Some(match code {
        0 => "Clear",
        1 => "Mostly Clear",
        2 => "Partly Cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Icy Fog",
        51 => "Light Drizzle",
        53 => "Drizzle",
        55 => "Heavy Drizzle",
        56 => "Light Freezing Drizzle",
        57 => "Freezing Drizzle",
        61 => "Light Rain",
        63 => "Rain",
        65 => "Heavy Rain",
        66 => "Light Freezing Rain",
        67 => "Freezing Rain",
        71 => "Light Snow",
        73 => "Snow",
        75 => "Heavy Snow",
        77 => "Snow Grains",
        80 => "Light Showers",
        81 => "Showers",
        82 => "Heavy Showers",
        85 => "Light Snow Showers",
        86 => "Snow Showers",
        95 => "Thunderstorm",
        96 => "Light Thunderstorm w/ Hail",
        99 => "Thunderstorm w/ Hail",
        _ => return None,
    })
}

/// Current conditions, if they can be had.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current_weather(&self) -> Option<Weather>;
}

pub struct OpenMeteo {
    http: reqwest::Client,
    location: Location,
}

impl OpenMeteo {
    pub fn new(location: Location) -> Self {
        Self {
            http: reqwest::Client::new(),
            location,
        }
    }

    pub async fn fetch(&self) -> Result<Weather> {
        let response: Value = self
            .http
            .get(API_URL)
            .query(&[
                ("latitude", self.location.latitude.to_string()),
                ("longitude", self.location.longitude.to_string()),
                ("current_weather", "true".to_owned()),
                ("temperature_unit", "fahrenheit".to_owned()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse(&response)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteo {
    async fn current_weather(&self) -> Option<Weather> {
        match self.fetch().await {
            Ok(weather) => {
                info!("Weather: {:?}", weather);
                Some(weather)
            }
            Err(e) => {
                warn!("No weather: {}", e);
                None
            }
        }
    }
}

fn parse(response: &Value) -> Result<Weather> {
    let current = &response["current_weather"];
    let temperature = current["temperature"]
        .as_f64()
        .ok_or_else(|| FrameError::Decode("missing `current_weather.temperature`".into()))?;
    Ok(Weather {
        temperature: temperature as f32,
        description: current["weathercode"]
            .as_u64()
            .and_then(describe)
            .map(String::from),
    })
}
