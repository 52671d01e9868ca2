use std::{fs, path::Path};

use anyhow::{Context as _, anyhow, ensure};
use md5::{Digest as _, Md5};
use rsa::{
    BigUint, RsaPublicKey,
    pkcs1::DecodeRsaPublicKey as _,
    pkcs8::DecodePublicKey as _,
    pss::Pss,
    traits::PublicKeyParts as _,
};
use tracing::{debug, trace};

/// Public half of the key the license issuer signs license fields with.
const EMBEDDED_PUBLIC_KEY_PEM: &str = include_str!("license_public_key.pem");

const MD5_OUTPUT_LEN: usize = 16;

/// The RSA public key every license field signature is checked against.
///
/// Built once at startup and handed to the verifier; it is never mutated.
#[derive(Debug, Clone)]
pub(crate) struct TrustAnchor {
    key: RsaPublicKey,
}

impl TrustAnchor {
    pub(crate) fn embedded() -> anyhow::Result<Self> {
        Self::from_pem(EMBEDDED_PUBLIC_KEY_PEM)
            .context("Failed to parse embedded license public key")
    }

    /// Load an operator supplied public key, falling back to the embedded one.
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Self::embedded();
        };

        debug!(path = %path.display(), "Loading license public key from file");

        let pem = fs::read_to_string(path).with_context(|| {
            format!("Failed to read license public key from '{}'", path.display())
        })?;

        Self::from_pem(&pem)
            .with_context(|| format!("Failed to parse license public key '{}'", path.display()))
    }

    /// Accepts SPKI (`BEGIN PUBLIC KEY`) and PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM.
    pub(crate) fn from_pem(pem: &str) -> anyhow::Result<Self> {
        let key = match RsaPublicKey::from_public_key_pem(pem) {
            Ok(key) => key,
            Err(spki_err) => RsaPublicKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                anyhow!("not an RSA public key (SPKI: {spki_err}, PKCS#1: {pkcs1_err})")
            })?,
        };

        Ok(Self { key })
    }

    /// Verify an RSA-PSS signature over the MD5 digest of `message`.
    ///
    /// The salt length is recovered from the signature itself, so signatures
    /// produced with any salt length the key admits are accepted.
    pub(crate) fn verify_pss_md5(&self, message: &[u8], signature: &[u8]) -> anyhow::Result<()> {
        ensure!(
            signature.len() == self.key.size(),
            "signature is {} bytes, expected {}",
            signature.len(),
            self.key.size()
        );

        let salt_len = self.recover_salt_len(signature)?;
        trace!(salt_len, "Recovered PSS salt length");

        let hashed = Md5::digest(message);

        self.key
            .verify(Pss::new_with_salt::<Md5>(salt_len), &hashed, signature)
            .map_err(|err| anyhow!("signature does not match value: {err}"))
    }

    /// Open the PSS encoded message far enough to read how long its salt is.
    fn recover_salt_len(&self, signature: &[u8]) -> anyhow::Result<usize> {
        let modulus = self.key.n();
        let representative = BigUint::from_bytes_be(signature);
        ensure!(
            &representative < modulus,
            "signature representative out of range"
        );

        let encoded = representative.modpow(self.key.e(), modulus).to_bytes_be();

        let em_bits = modulus.bits() - 1;
        let em_len = em_bits.div_ceil(8);
        ensure!(
            encoded.len() <= em_len && em_len >= MD5_OUTPUT_LEN + 2,
            "inconsistent encoded message"
        );

        let mut em = vec![0u8; em_len];
        em[em_len - encoded.len()..].copy_from_slice(&encoded);

        ensure!(em[em_len - 1] == 0xbc, "inconsistent encoded message trailer");

        let (masked_db, rest) = em.split_at_mut(em_len - MD5_OUTPUT_LEN - 1);
        let digest = &rest[..MD5_OUTPUT_LEN];

        mgf1_md5_xor(masked_db, digest);
        masked_db[0] &= 0xff >> (8 * em_len - em_bits);

        let separator = masked_db
            .iter()
            .position(|&byte| byte != 0)
            .context("inconsistent encoded message padding")?;
        ensure!(
            masked_db[separator] == 0x01,
            "inconsistent encoded message padding"
        );

        Ok(masked_db.len() - separator - 1)
    }
}

fn mgf1_md5_xor(out: &mut [u8], seed: &[u8]) {
    for (counter, chunk) in (0u32..).zip(out.chunks_mut(MD5_OUTPUT_LEN)) {
        let mask = Md5::new()
            .chain_update(seed)
            .chain_update(counter.to_be_bytes())
            .finalize();

        for (byte, mask_byte) in chunk.iter_mut().zip(mask.iter()) {
            *byte ^= mask_byte;
        }
    }
}
