//! Election keys. The public half is the group together with h = g ** x; it is fixed once an
//! election is published.
use crate::{
    arithmetics::Group,
    cipher::Ciphertext,
    error::{Error, Result},
    hash, BigInt,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The wire form of [GroupParams]; deserialization goes through [GroupParams::try_from] so
/// parameters read from a record are always revalidated
#[derive(Serialize, Deserialize)]
struct GroupParamsRecord {
    #[serde(with = "crate::serialize::biguint")]
    p: BigInt,
    #[serde(with = "crate::serialize::biguint")]
    q: BigInt,
    #[serde(with = "crate::serialize::biguint")]
    g: BigInt,
    #[serde(with = "crate::serialize::biguint")]
    h: BigInt,
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
#[serde(try_from = "GroupParamsRecord", into = "GroupParamsRecord")]
pub struct GroupParams {
    group: Group,
    h: BigInt,
}

impl TryFrom<GroupParamsRecord> for GroupParams {
    type Error = Error;

    fn try_from(record: GroupParamsRecord) -> Result<Self> {
        let group = Group::new(record.p, record.q, record.g)?;
        return Self::new(&group, record.h);
    }
}

impl From<GroupParams> for GroupParamsRecord {
    fn from(params: GroupParams) -> Self {
        let GroupParams { group, h } = params;
        return Self {
            p: group.get_p().clone(),
            q: group.get_q().clone(),
            g: group.get_g().clone(),
            h,
        };
    }
}

impl GroupParams {
    /// Bind a public key to its group. h must be a subgroup element.
    pub fn new(group: &Group, h: BigInt) -> Result<Self> {
        group.check_element(&h)?;
        return Ok(Self {
            group: group.clone(),
            h,
        });
    }

    pub fn get_group(&self) -> &Group {
        &self.group
    }

    pub fn get_h(&self) -> &BigInt {
        &self.h
    }

    /// A digest of the public key, one of the public inputs of the validity proof
    pub fn fingerprint(&self) -> String {
        let group = &self.group;
        let parts = [group.get_p(), group.get_q(), group.get_g(), &self.h]
            .iter()
            .map(|x| x.to_str_radix(10))
            .collect::<Vec<String>>();
        let parts = parts.iter().map(|s| s.as_bytes()).collect::<Vec<&[u8]>>();
        return hash::digest_parts(&parts);
    }
}

/// The private exponent x. In a threshold election nobody holds this value; it only exists
/// implicitly as the constant term of the dealer's polynomial.
#[derive(Eq, PartialEq, Clone)]
pub struct SecretKey {
    x: BigInt,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl SecretKey {
    pub fn new(x: BigInt) -> Self {
        Self { x }
    }

    pub fn get_x(&self) -> &BigInt {
        &self.x
    }

    /// Recover m from (g ** r, h ** r * g ** m) by removing the mask c1 ** x and solving the
    /// discrete log of what is left. Only feasible for m <= bound.
    pub fn decrypt(&self, ciphertext: &Ciphertext, params: &GroupParams, bound: u64) -> Result<u64> {
        let group = params.get_group();
        let mask = group.pow(ciphertext.get_c1(), &self.x);
        let g_m = group.div(ciphertext.get_c2(), &mask);
        return group
            .discrete_log(&g_m, bound)
            .ok_or_else(|| Error::DecryptionFailed(format!("plaintext exceeds {bound}")));
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct KeyPair {
    pk: GroupParams,
    sk: SecretKey,
}

impl KeyPair {
    pub fn new(pk: GroupParams, sk: SecretKey) -> Self {
        Self { pk, sk }
    }

    pub fn get_pk(&self) -> &GroupParams {
        &self.pk
    }

    pub fn get_sk(&self) -> &SecretKey {
        &self.sk
    }

    /// Sample x from [2, q - 2] and publish h = g ** x
    pub fn keygen(group: &Group) -> Result<Self> {
        let x = group.random_exponent();
        let h = group.g_pow(&x);
        return Ok(Self::new(GroupParams::new(group, h)?, SecretKey::new(x)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keygen() {
        let group = Group::generate(64).unwrap();
        let keypair = KeyPair::keygen(&group).unwrap();
        assert_eq!(
            &group.g_pow(keypair.get_sk().get_x()),
            keypair.get_pk().get_h()
        );
        assert_eq!(keypair.get_pk().get_group(), &group);
        assert_eq!(format!("{:?}", keypair.get_sk()), "SecretKey(..)");
    }

    #[test]
    fn test_params_json() {
        let group = Group::generate(64).unwrap();
        let keypair = KeyPair::keygen(&group).unwrap();
        let json = serde_json::to_value(keypair.get_pk()).unwrap();
        assert_eq!(json["g"], group.get_g().to_str_radix(10));
        let parsed: GroupParams = serde_json::from_value(json).unwrap();
        assert_eq!(&parsed, keypair.get_pk());
        assert_eq!(parsed.fingerprint(), keypair.get_pk().fingerprint());
    }

    #[test]
    fn test_rejects_foreign_h() {
        let group = Group::generate(64).unwrap();
        let foreign = group.get_p() - 1u32;
        assert!(matches!(
            GroupParams::new(&group, foreign.clone()),
            Err(Error::InvalidGroupElement(_))
        ));

        let keypair = KeyPair::keygen(&group).unwrap();
        let mut json = serde_json::to_value(keypair.get_pk()).unwrap();
        json["h"] = serde_json::Value::String(foreign.to_str_radix(10));
        assert!(serde_json::from_value::<GroupParams>(json).is_err());
    }
}
