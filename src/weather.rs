//! Weather forecast demo data

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;

const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

const FORECAST_DAYS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub temperature_f: i32,
    pub summary: Option<String>,
}

impl WeatherForecast {
    pub fn new(date: NaiveDate, temperature_c: i32, summary: Option<String>) -> Self {
        Self {
            date,
            temperature_c,
            temperature_f: 32 + (temperature_c as f64 / 0.5556) as i32,
            summary,
        }
    }
}

/// Source of forecasts served by the protected endpoint
#[async_trait]
pub trait WeatherForecaster: Send + Sync {
    async fn forecast(&self) -> Vec<WeatherForecast>;
}

/// Generates random forecasts for the next five days
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomForecaster;

#[async_trait]
impl WeatherForecaster for RandomForecaster {
    async fn forecast(&self) -> Vec<WeatherForecast> {
        let today = Utc::now().date_naive();
        let mut rng = rand::thread_rng();

        (1..=FORECAST_DAYS)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .map(|date| {
                let summary = SUMMARIES[rng.gen_range(0..SUMMARIES.len())];
                WeatherForecast::new(date, rng.gen_range(-20..55), Some(summary.to_string()))
            })
            .collect()
    }
}
