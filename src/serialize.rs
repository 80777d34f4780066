//! Serde adapters for big integers. Group elements and exponents are written as decimal strings
//! so that records stay readable by implementations without native big integers.
pub mod biguint {
    use crate::BigInt;
    use num_traits::Num;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_str_radix(10).serialize(serializer)
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrUint {
        String(String),
        Uint(u64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigInt, D::Error>
    where
        D: Deserializer<'de>,
    {
        let su: StringOrUint = Deserialize::deserialize(deserializer)?;
        match su {
            StringOrUint::String(s) => BigInt::from_str_radix(&s, 10).map_err(de::Error::custom),
            StringOrUint::Uint(u) => Ok(BigInt::from(u)),
        }
    }
}

/// Same as [biguint], for vectors
pub mod biguint_vec {
    use crate::BigInt;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct Wrapped(#[serde(with = "super::biguint")] BigInt);

    pub fn serialize<S>(values: &[BigInt], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        values
            .iter()
            .map(|v| Wrapped(v.clone()))
            .collect::<Vec<Wrapped>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<BigInt>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wrapped: Vec<Wrapped> = Deserialize::deserialize(deserializer)?;
        Ok(wrapped.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::BigInt;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Holder {
        #[serde(with = "super::biguint")]
        value: BigInt,
    }

    #[test]
    fn test_decimal_string() {
        let holder = Holder {
            value: BigInt::from(12345678901234567890u64) * BigInt::from(1000u32),
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"value":"12345678901234567890000"}"#);
        assert_eq!(serde_json::from_str::<Holder>(&json).unwrap(), holder);
    }

    #[test]
    fn test_accepts_integers() {
        let holder: Holder = serde_json::from_str(r#"{"value":42}"#).unwrap();
        assert_eq!(holder.value, BigInt::from(42u8));
        assert!(serde_json::from_str::<Holder>(r#"{"value":"4x2"}"#).is_err());
    }
}
