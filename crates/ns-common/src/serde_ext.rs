//! Serde helpers for record fields JSON cannot represent directly.
//!
//! - `log_value`: log quantities, which are routinely `-inf`. Non-finite
//!   values are written as the strings `"-inf"`, `"inf"` and `"nan"`; on input
//!   a number, any string `f64::from_str` accepts, or `null` (read as `-inf`).
//! - `base64_bytes` / `opt_base64_bytes`: opaque parameter payloads.

/// Non-finite-safe `f64` for log-domain quantities.
pub mod log_value {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_negative() {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_str("inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(f64::NEG_INFINITY),
            Some(Repr::Number(v)) => Ok(v),
            Some(Repr::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("not a log value: {:?}", s))),
        }
    }
}

/// Like [`log_value`] for optional fields; `None` round-trips as `null`.
pub mod opt_log_value {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct Wrap(#[serde(with = "super::log_value")] f64);

    #[derive(Deserialize)]
    struct Own(#[serde(with = "super::log_value")] f64);

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&Wrap(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        Ok(Option::<Own>::deserialize(deserializer)?.map(|Own(v)| v))
    }
}

/// Standard base64 for `Vec<u8>`.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Standard base64 for `Option<Vec<u8>>`; absent payloads are `null`.
pub mod opt_base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => STANDARD
                .decode(text.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
