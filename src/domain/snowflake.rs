//! Serde helpers for snowflake ids, which the API sends as decimal strings.

use std::fmt;

use serde::Deserializer;
use serde::de::{self, Visitor};

struct SnowflakeVisitor;

impl Visitor<'_> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a snowflake id as a string or integer")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(value)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        u64::try_from(value).map_err(de::Error::custom)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(de::Error::custom)
    }
}

/// Deserializes a snowflake from a string or number.
///
/// # Errors
///
/// Returns an error if the value is neither a decimal string nor a non-negative integer.
pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(SnowflakeVisitor)
}

/// Optional snowflake, where `null` and a missing field both read as `None`.
pub mod option {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(transparent)]
    struct Id(#[serde(deserialize_with = "super::deserialize")] u64);

    /// Deserializes an optional snowflake.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value is not a valid snowflake.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Id>::deserialize(deserializer)?.map(|Id(id)| id))
    }
}

/// Sequence of snowflakes.
pub mod vec {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(transparent)]
    struct Id(#[serde(deserialize_with = "super::deserialize")] u64);

    /// Deserializes a list of snowflakes.
    ///
    /// # Errors
    ///
    /// Returns an error if any element is not a valid snowflake.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Vec::<Id>::deserialize(deserializer)?
            .into_iter()
            .map(|Id(id)| id)
            .collect())
    }
}
