//! Fetch-size and search-radius tiers, and the persisted location option.
//!
//! The low-power override is unconditional: whenever the host reports a
//! low-power condition both tiers collapse to `Small`, whatever the user
//! chose.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// How many events a feed query may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl FetchSize {
    /// The `limit` query parameter sent to the provider.
    #[must_use]
    pub const fn limit(self) -> u32 {
        match self {
            FetchSize::Small => 100,
            FetchSize::Medium => 225,
            FetchSize::Large => 400,
            FetchSize::ExtraLarge => 1000,
        }
    }
}

impl FromStr for FetchSize {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "100" => Ok(FetchSize::Small),
            "medium" | "225" => Ok(FetchSize::Medium),
            "large" | "400" => Ok(FetchSize::Large),
            "extra-large" | "extralarge" | "1000" => Ok(FetchSize::ExtraLarge),
            other => Err(CoreError::InvalidValue {
                kind: "fetch size",
                value: other.to_owned(),
            }),
        }
    }
}

/// Radius of a location query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchRadius {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl SearchRadius {
    /// Radius in kilometers.
    #[must_use]
    pub const fn km(self) -> u32 {
        match self {
            SearchRadius::Small => 50,
            SearchRadius::Medium => 150,
            SearchRadius::Large => 275,
            SearchRadius::ExtraLarge => 750,
        }
    }
}

impl FromStr for SearchRadius {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "50" => Ok(SearchRadius::Small),
            "medium" | "150" => Ok(SearchRadius::Medium),
            "large" | "275" => Ok(SearchRadius::Large),
            "extra-large" | "extralarge" | "750" => Ok(SearchRadius::ExtraLarge),
            other => Err(CoreError::InvalidValue {
                kind: "search radius",
                value: other.to_owned(),
            }),
        }
    }
}

/// The fetch-size tier actually used for a request.
#[must_use]
pub const fn effective_fetch_size(low_power: bool, persisted: FetchSize) -> FetchSize {
    if low_power {
        FetchSize::Small
    } else {
        persisted
    }
}

/// The search-radius tier actually used for a request.
#[must_use]
pub const fn effective_search_radius(low_power: bool, persisted: SearchRadius) -> SearchRadius {
    if low_power {
        SearchRadius::Small
    } else {
        persisted
    }
}

/// The list the user last looked at, replayed by the background fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LastOption {
    Nearby,
    World,
    Major,
}

impl FromStr for LastOption {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearby" => Ok(LastOption::Nearby),
            "world" => Ok(LastOption::World),
            "major" => Ok(LastOption::Major),
            other => Err(CoreError::InvalidValue {
                kind: "location option",
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_size_limits_match_tiers() {
        assert_eq!(FetchSize::Small.limit(), 100);
        assert_eq!(FetchSize::Medium.limit(), 225);
        assert_eq!(FetchSize::Large.limit(), 400);
        assert_eq!(FetchSize::ExtraLarge.limit(), 1000);
    }

    #[test]
    fn search_radius_km_match_tiers() {
        assert_eq!(SearchRadius::Small.km(), 50);
        assert_eq!(SearchRadius::Medium.km(), 150);
        assert_eq!(SearchRadius::Large.km(), 275);
        assert_eq!(SearchRadius::ExtraLarge.km(), 750);
    }

    #[test]
    fn low_power_forces_smallest_fetch_size() {
        for persisted in [
            FetchSize::Small,
            FetchSize::Medium,
            FetchSize::Large,
            FetchSize::ExtraLarge,
        ] {
            assert_eq!(effective_fetch_size(true, persisted), FetchSize::Small);
        }
        assert_eq!(effective_fetch_size(false, FetchSize::Large), FetchSize::Large);
    }

    #[test]
    fn low_power_forces_smallest_radius() {
        assert_eq!(
            effective_search_radius(true, SearchRadius::ExtraLarge),
            SearchRadius::Small
        );
        assert_eq!(
            effective_search_radius(false, SearchRadius::Large),
            SearchRadius::Large
        );
    }

    #[test]
    fn tiers_parse_from_names_and_raw_values() {
        assert_eq!("extra-large".parse::<FetchSize>().unwrap(), FetchSize::ExtraLarge);
        assert_eq!("400".parse::<FetchSize>().unwrap(), FetchSize::Large);
        assert_eq!("Small".parse::<SearchRadius>().unwrap(), SearchRadius::Small);
        assert!("huge".parse::<SearchRadius>().is_err());
    }

    #[test]
    fn tiers_serialize_as_kebab_case() {
        let json = serde_json::to_string(&FetchSize::ExtraLarge).unwrap();
        assert_eq!(json, "\"extra-large\"");
        let option: LastOption = serde_json::from_str("\"major\"").unwrap();
        assert_eq!(option, LastOption::Major);
    }
}
