//! Arithmetic in the prime-order subgroup of a safe-prime group. Every group element and
//! exponent is an arbitrary-precision integer; operations are always reduced by an explicit
//! modulus, so nothing is ever truncated to a machine word.
use crate::{
    error::{Error, Result},
    BigInt,
};
use crypto_bigint::Uint;
use num_bigint::RandBigInt;
use num_traits::{Num, One, Zero};
use rand::rngs::OsRng;
use std::collections::HashMap;

/// The 1536-bit MODP prime of RFC 3526. Its generator 2 is a quadratic residue (p = 7 mod 8),
/// so it generates the subgroup of order q = (p - 1) / 2.
const RFC3526_1536: [u8; 192] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe4, 0x5b, 0x3d,
    0xc2, 0x00, 0x7c, 0xb8, 0xa1, 0x63, 0xbf, 0x05, 0x98, 0xda, 0x48, 0x36,
    0x1c, 0x55, 0xd3, 0x9a, 0x69, 0x16, 0x3f, 0xa8, 0xfd, 0x24, 0xcf, 0x5f,
    0x83, 0x65, 0x5d, 0x23, 0xdc, 0xa3, 0xad, 0x96, 0x1c, 0x62, 0xf3, 0x56,
    0x20, 0x85, 0x52, 0xbb, 0x9e, 0xd5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6d,
    0x67, 0x0c, 0x35, 0x4e, 0x4a, 0xbc, 0x98, 0x04, 0xf1, 0x74, 0x6c, 0x08,
    0xca, 0x23, 0x73, 0x27, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// A safe-prime group: p = 2q + 1 with p, q prime, and g a generator of the order-q subgroup
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Group {
    p: BigInt,
    q: BigInt,
    g: BigInt,
}

impl Group {
    /// Instantiate with structural checks. Primality is not checked here because it is
    /// expensive at production sizes; see [Group::verify_primality]
    pub fn new(p: BigInt, q: BigInt, g: BigInt) -> Result<Self> {
        if p != &q * 2u32 + 1u32 {
            return Err(Error::InvalidGroupElement("p is not 2q + 1".into()));
        }
        // exponents are sampled from [2, q - 2]
        if q < BigInt::from(5u8) {
            return Err(Error::InvalidGroupElement("q is too small".into()));
        }
        if g <= BigInt::one() || g >= p {
            return Err(Error::InvalidGroupElement("generator out of range".into()));
        }
        if !g.modpow(&q, &p).is_one() {
            return Err(Error::InvalidGroupElement(
                "generator does not have order q".into(),
            ));
        }
        return Ok(Self { p, q, g });
    }

    /// The default election group
    pub fn rfc3526_1536() -> Self {
        let p = BigInt::from_bytes_be(&RFC3526_1536);
        let q = (&p - 1u32) >> 1;
        return Self {
            p,
            q,
            g: BigInt::from(2u8),
        };
    }

    /// Generate a fresh group with a safe prime of the given bit length. The generator is a
    /// random square other than 1, which always has order q.
    pub fn generate(bits: usize) -> Result<Self> {
        let p = match bits {
            8..=256 => safe_prime::<4>(bits),
            257..=1024 => safe_prime::<16>(bits),
            1025..=2048 => safe_prime::<32>(bits),
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "cannot generate a {bits}-bit group"
                )))
            }
        };
        let q = (&p - 1u32) >> 1;
        let two = BigInt::from(2u8);
        let upper = &p - 1u32;
        let g = loop {
            let candidate = OsRng.gen_biguint_range(&two, &upper).modpow(&two, &p);
            if !candidate.is_one() {
                break candidate;
            }
        };
        return Ok(Self { p, q, g });
    }

    /// Check that p is a safe prime. Only groups of up to 2048 bits can be checked.
    pub fn verify_primality(&self) -> Result<bool> {
        let p = lower::<32>(&self.p).ok_or_else(|| {
            Error::InvalidGroupElement("modulus too large to verify".into())
        })?;
        return Ok(crypto_primes::is_safe_prime(&p));
    }

    pub fn get_p(&self) -> &BigInt {
        &self.p
    }

    pub fn get_q(&self) -> &BigInt {
        &self.q
    }

    pub fn get_g(&self) -> &BigInt {
        &self.g
    }

    /// base ** exp (mod p)
    pub fn pow(&self, base: &BigInt, exp: &BigInt) -> BigInt {
        return base.modpow(exp, &self.p);
    }

    /// g ** exp (mod p)
    pub fn g_pow(&self, exp: &BigInt) -> BigInt {
        return self.g.modpow(exp, &self.p);
    }

    /// a * b (mod p)
    pub fn mul(&self, a: &BigInt, b: &BigInt) -> BigInt {
        return (a * b) % &self.p;
    }

    /// Multiplicative inverse (mod p). Since p is prime, a ** -1 = a ** (p - 2)
    pub fn inv(&self, a: &BigInt) -> BigInt {
        return a.modpow(&(&self.p - 2u32), &self.p);
    }

    /// a / b (mod p)
    pub fn div(&self, a: &BigInt, b: &BigInt) -> BigInt {
        return self.mul(a, &self.inv(b));
    }

    /// a + b (mod q)
    pub fn add_exp(&self, a: &BigInt, b: &BigInt) -> BigInt {
        return (a + b) % &self.q;
    }

    /// a - b (mod q)
    pub fn sub_exp(&self, a: &BigInt, b: &BigInt) -> BigInt {
        return (a % &self.q + &self.q - b % &self.q) % &self.q;
    }

    /// a * b (mod q)
    pub fn mul_exp(&self, a: &BigInt, b: &BigInt) -> BigInt {
        return (a * b) % &self.q;
    }

    /// Multiplicative inverse (mod q), or None for zero
    pub fn inv_exp(&self, a: &BigInt) -> Option<BigInt> {
        let a = a % &self.q;
        if a.is_zero() {
            return None;
        }
        return Some(a.modpow(&(&self.q - 2u32), &self.q));
    }

    /// Sample a uniformly random exponent from [2, q - 2]
    pub fn random_exponent(&self) -> BigInt {
        let low = BigInt::from(2u8);
        let high = &self.q - 1u32;
        return OsRng.gen_biguint_range(&low, &high);
    }

    /// Reject anything that is not a member of the order-q subgroup
    pub fn check_element(&self, x: &BigInt) -> Result<()> {
        if x.is_zero() || x >= &self.p {
            return Err(Error::InvalidGroupElement(format!(
                "{x} is out of range"
            )));
        }
        if !x.modpow(&self.q, &self.p).is_one() {
            return Err(Error::InvalidGroupElement(format!(
                "{x} is not in the subgroup"
            )));
        }
        return Ok(());
    }

    /// Parse a decimal string into a checked group element
    pub fn parse_element(&self, s: &str) -> Result<BigInt> {
        let x = BigInt::from_str_radix(s, 10)
            .map_err(|_| Error::InvalidGroupElement(format!("{s:?} is not numeric")))?;
        self.check_element(&x)?;
        return Ok(x);
    }

    /// Baby-step giant-step search for m in [0, bound] such that g ** m = target.
    /// Return None if no such m exists.
    pub fn discrete_log(&self, target: &BigInt, bound: u64) -> Option<u64> {
        let step = (bound as f64).sqrt().ceil() as u64 + 1;

        let mut baby_steps: HashMap<BigInt, u64> = HashMap::new();
        let mut g_j = BigInt::one();
        for j in 0..step {
            baby_steps.entry(g_j.clone()).or_insert(j);
            g_j = self.mul(&g_j, &self.g);
        }

        // g_j is now g ** step
        let giant = self.inv(&g_j);
        let mut gamma = target % &self.p;
        for i in 0..step {
            if let Some(j) = baby_steps.get(&gamma) {
                let m = i * step + j;
                if m <= bound {
                    return Some(m);
                }
                return None;
            }
            gamma = self.mul(&gamma, &giant);
        }
        return None;
    }
}

fn safe_prime<const L: usize>(bits: usize) -> BigInt {
    let prime: Uint<L> = crypto_primes::generate_safe_prime(Some(bits));
    return lift(&prime);
}

/// Convert a fixed-width integer into an arbitrary-precision one
fn lift<const L: usize>(value: &Uint<L>) -> BigInt {
    let bytes = value
        .as_words()
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect::<Vec<u8>>();
    return BigInt::from_bytes_le(&bytes);
}

/// Convert an arbitrary-precision integer into a fixed-width one, if it fits
fn lower<const L: usize>(value: &BigInt) -> Option<Uint<L>> {
    if value.bits() as usize > Uint::<L>::BITS {
        return None;
    }
    let bytes = value.to_bytes_be();
    let mut padded = vec![0u8; Uint::<L>::BYTES - bytes.len()];
    padded.extend_from_slice(&bytes);
    return Some(Uint::<L>::from_be_slice(&padded));
}
