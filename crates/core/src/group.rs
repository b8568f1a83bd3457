//! Prime-order group arithmetic and ElGamal ciphertexts over Ristretto255.
//!
//! The wire format throughout the rest of the crate represents a group
//! element as a pair of hex strings (`[hi, lo]`) rather than the single
//! compressed-point encoding curve25519-dalek gives us natively, so that
//! mapping files and proof payloads keep the two-element shape shielded
//! accounts are addressed by elsewhere in this crate. `PublicKeyHex`
//! is the boundary between the two.
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// `g`, the group generator.
pub fn generator() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

/// A point serialised as two `0x`-prefixed, 64-hex-digit strings, matching
/// the `^0x[0-9a-f]{64}$` shielded-address coordinate format. Each string
/// holds one 16-byte half of the compressed point, left-padded with zero
/// bytes to the declared 32-byte coordinate width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyHex(pub [String; 2]);

impl PublicKeyHex {
    pub fn from_point(p: &RistrettoPoint) -> Self {
        let bytes = p.compress().to_bytes();
        let (hi, lo) = bytes.split_at(16);
        Self([encode_coordinate(hi), encode_coordinate(lo)])
    }

    pub fn to_point(&self) -> Result<RistrettoPoint, String> {
        let hi = decode_coordinate(&self.0[0])?;
        let lo = decode_coordinate(&self.0[1])?;
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&hi);
        bytes[16..].copy_from_slice(&lo);
        CompressedRistretto(bytes)
            .decompress()
            .ok_or_else(|| "point is not a valid Ristretto encoding".to_string())
    }
}

fn encode_coordinate(half: &[u8]) -> String {
    let mut padded = [0u8; 32];
    padded[16..].copy_from_slice(half);
    format!("0x{}", hex::encode(padded))
}

fn decode_coordinate(s: &str) -> Result<[u8; 16], String> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("expected a 32-byte coordinate, got {}", bytes.len()));
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&bytes[16..]);
    Ok(out)
}

/// An ElGamal ciphertext `(C_L, C_R)` over the shielded group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBalance {
    pub c_l: PublicKeyHex,
    pub c_r: PublicKeyHex,
}

impl EncryptedBalance {
    /// Encrypt `amount` under public key `y` with randomness `r`.
    pub fn encrypt(y: &RistrettoPoint, amount: u64, r: &Scalar) -> Self {
        let c_l = generator() * Scalar::from(amount) + y * r;
        let c_r = generator() * r;
        Self {
            c_l: PublicKeyHex::from_point(&c_l),
            c_r: PublicKeyHex::from_point(&c_r),
        }
    }

    /// Encrypt a signed `amount` (used when building per-slot transfer
    /// ciphertexts, where all but two anonymity-set slots carry zero and
    /// the sender's slot carries a negative amount).
    pub fn encrypt_signed(y: &RistrettoPoint, amount: i64, r: &Scalar) -> Self {
        let amount_scalar = if amount >= 0 {
            Scalar::from(amount as u64)
        } else {
            -Scalar::from((-amount) as u64)
        };
        let c_l = generator() * amount_scalar + y * r;
        let c_r = generator() * r;
        Self {
            c_l: PublicKeyHex::from_point(&c_l),
            c_r: PublicKeyHex::from_point(&c_r),
        }
    }

    /// Subtract a plaintext `amount` from the left component only,
    /// leaving `C_R` untouched (used by the burn/withdraw statement,
    /// which does not re-randomise).
    pub fn sub_plain(&self, amount: u64) -> Result<EncryptedBalance, String> {
        let c_l = self.c_l.to_point()? - generator() * Scalar::from(amount);
        Ok(EncryptedBalance {
            c_l: PublicKeyHex::from_point(&c_l),
            c_r: self.c_r.clone(),
        })
    }

    /// Homomorphic addition: component-wise point addition.
    pub fn add(&self, other: &EncryptedBalance) -> Result<EncryptedBalance, String> {
        let c_l = self.c_l.to_point()? + other.c_l.to_point()?;
        let c_r = self.c_r.to_point()? + other.c_r.to_point()?;
        Ok(EncryptedBalance {
            c_l: PublicKeyHex::from_point(&c_l),
            c_r: PublicKeyHex::from_point(&c_r),
        })
    }

    /// Decrypt with secret key `x`, returning `g^b` (the caller still needs
    /// to recover `b` via the balance-recovery cache).
    pub fn decrypt(&self, x: &Scalar) -> Result<RistrettoPoint, String> {
        let c_l = self.c_l.to_point()?;
        let c_r = self.c_r.to_point()?;
        Ok(c_l - c_r * x)
    }
}

/// A loaded shielded keypair. `x` never leaves this type except through
/// the keystore encryption path.
#[derive(Clone)]
pub struct ShieldedAccount {
    x: Scalar,
    y: RistrettoPoint,
}

impl ShieldedAccount {
    pub fn generate() -> Self {
        let x = Scalar::random(&mut OsRng);
        let y = generator() * x;
        Self { x, y }
    }

    pub fn from_secret(x: Scalar) -> Self {
        let y = generator() * x;
        Self { x, y }
    }

    pub fn secret(&self) -> &Scalar {
        &self.x
    }

    pub fn public(&self) -> &RistrettoPoint {
        &self.y
    }

    pub fn public_hex(&self) -> PublicKeyHex {
        PublicKeyHex::from_point(&self.y)
    }

    /// Schnorr proof of knowledge of `x` bound to `context` (typically the
    /// registering contract's address), used by `register`.
    pub fn prove_knowledge(&self, context: &[u8]) -> (Scalar, Scalar) {
        let k = Scalar::random(&mut OsRng);
        let r = generator() * k;

        let mut hasher = Keccak256::new();
        hasher.update(r.compress().to_bytes());
        hasher.update(self.y.compress().to_bytes());
        hasher.update(context);
        let digest = hasher.finalize();
        let mut wide = [0u8; 64];
        wide[..32].copy_from_slice(&digest);
        let c = Scalar::from_bytes_mod_order_wide(&wide);

        let s = k + c * self.x;
        (c, s)
    }

    /// `H(epoch)·x`, the per-epoch uniqueness tag bound to this key.
    pub fn epoch_tag(&self, epoch: u64) -> RistrettoPoint {
        let mut hasher = Keccak256::new();
        hasher.update(epoch.to_be_bytes());
        let digest = hasher.finalize();
        let mut wide = [0u8; 64];
        wide[..32].copy_from_slice(&digest);
        let h = Scalar::from_bytes_mod_order_wide(&wide);
        generator() * h * self.x
    }
}
