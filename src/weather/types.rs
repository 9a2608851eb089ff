use serde::Deserialize;

use crate::library::Weather;

/// Condition reported by wttr.in, grouped the way its weather symbols are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherKind {
    Sunny,
    PartlyCloudy,
    Cloudy,
    VeryCloudy,
    Fog,
    LightShowers,
    LightSleetShowers,
    LightSleet,
    ThunderyShowers,
    LightSnow,
    HeavySnow,
    LightRain,
    HeavyShowers,
    HeavyRain,
    LightSnowShowers,
    HeavySnowShowers,
    ThunderyHeavyRain,
    ThunderySnowShowers,
}

impl WeatherKind {
    /// Map a WWO weather code to its kind
    pub fn from_code(code: u16) -> Option<Self> {
        use WeatherKind::*;
        Some(match code {
            113 => Sunny,
            116 => PartlyCloudy,
            119 => Cloudy,
            122 => VeryCloudy,
            143 | 248 | 260 => Fog,
            176 | 263 | 353 => LightShowers,
            179 | 362 | 365 | 374 => LightSleetShowers,
            182 | 185 | 281 | 284 | 311 | 314 | 317 | 350 | 377 => LightSleet,
            200 | 386 => ThunderyShowers,
            227 | 320 => LightSnow,
            230 | 329 | 332 | 338 => HeavySnow,
            266 | 293 | 296 => LightRain,
            299 | 305 | 356 => HeavyShowers,
            302 | 308 | 359 => HeavyRain,
            323 | 326 | 368 => LightSnowShowers,
            335 | 371 | 395 => HeavySnowShowers,
            389 => ThunderyHeavyRain,
            392 => ThunderySnowShowers,
            _ => return None,
        })
    }

    /// Collapse to the weather categories the games have music for
    pub fn category(&self) -> Weather {
        use WeatherKind::*;
        match self {
            HeavyRain | HeavyShowers | LightRain | LightShowers | LightSleet
            | LightSleetShowers | ThunderyHeavyRain | ThunderyShowers => Weather::Raining,
            HeavySnow | HeavySnowShowers | LightSnow | LightSnowShowers
            | ThunderySnowShowers => Weather::Snowing,
            Sunny | PartlyCloudy | Cloudy | VeryCloudy | Fog => Weather::Sunny,
        }
    }
}

/// Single `{"value": ...}` wrapper used throughout the j1 format
#[derive(Debug, Deserialize)]
pub struct Value {
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentCondition {
    pub weather_code: String,
    #[serde(default)]
    pub weather_desc: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestArea {
    #[serde(default)]
    pub area_name: Vec<Value>,
    #[serde(default)]
    pub region: Vec<Value>,
}

/// wttr.in `?format=j1` response (only the fields used)
#[derive(Debug, Deserialize)]
pub struct WttrReport {
    #[serde(default)]
    pub current_condition: Vec<CurrentCondition>,
    #[serde(default)]
    pub nearest_area: Vec<NearestArea>,
}

impl WttrReport {
    pub fn kind(&self) -> Option<WeatherKind> {
        let code = self.current_condition.first()?.weather_code.trim().parse().ok()?;
        WeatherKind::from_code(code)
    }

    /// Human-readable condition, e.g. "Light snow"
    pub fn description(&self) -> Option<&str> {
        let desc = self.current_condition.first()?.weather_desc.first()?;
        Some(desc.value.trim())
    }

    /// "Area, Region" of the reporting station
    pub fn area(&self) -> Option<String> {
        let area = self.nearest_area.first()?;
        let name = &area.area_name.first()?.value;
        Some(match area.region.first() {
            Some(region) => format!("{}, {}", name, region.value),
            None => name.clone(),
        })
    }
}
