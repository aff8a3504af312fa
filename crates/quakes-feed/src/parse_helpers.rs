//! Shared pieces of the provider parsers.

use crate::error::FeedError;
use crate::types::FeatureCollection;

/// Decodes the top-level envelope. A body that is not JSON or has no
/// `features` array is a decode error for the whole payload.
pub(crate) fn feature_collection(
    body: &[u8],
    context: &str,
) -> Result<Vec<serde_json::Value>, FeedError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|source| FeedError::Deserialize {
            context: context.to_owned(),
            source,
        })?;
    if value.get("features").is_none() {
        return Err(FeedError::MissingField {
            context: context.to_owned(),
            field: "features",
        });
    }
    let collection: FeatureCollection =
        serde_json::from_value(value).map_err(|source| FeedError::Deserialize {
            context: context.to_owned(),
            source,
        })?;
    Ok(collection.features)
}

pub(crate) fn valid_latitude(value: f64) -> bool {
    value.is_finite() && (-90.0..=90.0).contains(&value)
}

pub(crate) fn valid_longitude(value: f64) -> bool {
    value.is_finite() && (-180.0..=180.0).contains(&value)
}

/// Trims and drops empty strings.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// `"SOUTHERN GREECE"` becomes `"Southern Greece"`.
pub(crate) fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
