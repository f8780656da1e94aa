//! Pollutants tracked by the air-quality core.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit every supported provider reports concentrations in.
pub const MICROGRAMS_PER_CUBIC_METRE: &str = "µg/m³";

/// An air pollutant with a known interpolation model.
///
/// Providers report more substances than these four (CO, SO2, NH3, ...);
/// anything else is dropped during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "PM25")]
    Pm25,
    #[serde(rename = "PM10")]
    Pm10,
    #[serde(rename = "O3")]
    O3,
}

impl Pollutant {
    /// Every supported pollutant, in reporting order.
    pub const ALL: [Pollutant; 4] = [
        Pollutant::No2,
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::O3,
    ];

    /// Parse a provider pollutant code.
    ///
    /// Case-insensitive, and `PM2.5` is accepted as well as `PM25`.
    /// Returns `None` for codes outside the supported set.
    ///
    /// ```
    /// use cleanair_server::domain::Pollutant;
    ///
    /// assert_eq!(Pollutant::from_code("no2"), Some(Pollutant::No2));
    /// assert_eq!(Pollutant::from_code("PM2.5"), Some(Pollutant::Pm25));
    /// assert_eq!(Pollutant::from_code("SO2"), None);
    /// ```
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized: String = code
            .trim()
            .chars()
            .filter(|c| *c != '.')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "NO2" => Some(Pollutant::No2),
            "PM25" => Some(Pollutant::Pm25),
            "PM10" => Some(Pollutant::Pm10),
            "O3" => Some(Pollutant::O3),
            _ => None,
        }
    }

    /// Canonical wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Pollutant::No2 => "NO2",
            Pollutant::Pm25 => "PM25",
            Pollutant::Pm10 => "PM10",
            Pollutant::O3 => "O3",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pollutant::No2 => "NO2",
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::O3 => "O3",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for p in Pollutant::ALL {
            assert_eq!(Pollutant::from_code(p.code()), Some(p));
        }
    }

    #[test]
    fn unknown_codes_are_none() {
        assert_eq!(Pollutant::from_code("CO"), None);
        assert_eq!(Pollutant::from_code(""), None);
        assert_eq!(Pollutant::from_code("PM1"), None);
    }

    #[test]
    fn accepts_whitespace_and_case() {
        assert_eq!(Pollutant::from_code(" o3 "), Some(Pollutant::O3));
        assert_eq!(Pollutant::from_code("pm2.5"), Some(Pollutant::Pm25));
    }

    #[test]
    fn display_uses_conventional_names() {
        assert_eq!(Pollutant::Pm25.to_string(), "PM2.5");
        assert_eq!(Pollutant::No2.to_string(), "NO2");
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&Pollutant::Pm25).unwrap();
        assert_eq!(json, "\"PM25\"");
    }
}
