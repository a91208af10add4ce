use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::error::Error;
use crate::value::{Dict, Value};

/// Caller identity plus the method-specific recipe for answering a router
/// `CHALLENGE`. Grounded on the auth_id/auth_data/auth_method/auth_extra
/// shape every authenticator in the source carries.
pub trait Authenticator: Send + Sync {
    fn auth_id(&self) -> &str;
    fn auth_method(&self) -> &str;
    fn auth_extra(&self) -> Dict;

    /// Computes the `AUTHENTICATE` signature for a `CHALLENGE` whose
    /// `extra` is passed in. Anonymous never receives one.
    fn compute_response(&self, extra: &Dict) -> Result<String, Error>;
}

pub struct Anonymous {
    auth_id: String,
}

impl Anonymous {
    pub fn new(auth_id: impl Into<String>) -> Anonymous {
        Anonymous {
            auth_id: auth_id.into(),
        }
    }
}

impl Authenticator for Anonymous {
    fn auth_id(&self) -> &str {
        &self.auth_id
    }

    fn auth_method(&self) -> &str {
        "anonymous"
    }

    fn auth_extra(&self) -> Dict {
        Dict::new()
    }

    fn compute_response(&self, _extra: &Dict) -> Result<String, Error> {
        Ok(String::new())
    }
}

pub struct Ticket {
    auth_id: String,
    ticket: String,
}

impl Ticket {
    pub fn new(auth_id: impl Into<String>, ticket: impl Into<String>) -> Ticket {
        Ticket {
            auth_id: auth_id.into(),
            ticket: ticket.into(),
        }
    }
}

impl Authenticator for Ticket {
    fn auth_id(&self) -> &str {
        &self.auth_id
    }

    fn auth_method(&self) -> &str {
        "ticket"
    }

    fn auth_extra(&self) -> Dict {
        Dict::new()
    }

    fn compute_response(&self, _extra: &Dict) -> Result<String, Error> {
        Ok(self.ticket.clone())
    }
}

type HmacSha256 = Hmac<Sha256>;

pub struct WampCra {
    auth_id: String,
    secret: String,
}

impl WampCra {
    pub fn new(auth_id: impl Into<String>, secret: impl Into<String>) -> WampCra {
        WampCra {
            auth_id: auth_id.into(),
            secret: secret.into(),
        }
    }
}

impl Authenticator for WampCra {
    fn auth_id(&self) -> &str {
        &self.auth_id
    }

    fn auth_method(&self) -> &str {
        "wampcra"
    }

    fn auth_extra(&self) -> Dict {
        Dict::new()
    }

    fn compute_response(&self, extra: &Dict) -> Result<String, Error> {
        let challenge = extra
            .get("challenge")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("wampcra challenge missing from extra"))?;

        let key = match (extra.get("salt").and_then(Value::as_str), extra.get("iterations")) {
            (Some(salt), Some(iterations)) => {
                let iterations = iterations
                    .as_u64()
                    .ok_or_else(|| Error::protocol("wampcra iterations is not a number"))?
                    as u32;
                let keylen = extra
                    .get("keylen")
                    .and_then(Value::as_u64)
                    .unwrap_or(32) as usize;
                let mut derived = vec![0u8; keylen];
                pbkdf2_hmac::<Sha256>(self.secret.as_bytes(), salt.as_bytes(), iterations, &mut derived);
                derived
            }
            _ => self.secret.as_bytes().to_vec(),
        };

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|_| Error::protocol("invalid wampcra key length"))?;
        mac.update(challenge.as_bytes());
        let signature = mac.finalize().into_bytes();
        Ok(hex::encode(signature))
    }
}

pub struct Cryptosign {
    auth_id: String,
    signing_key: ed25519_dalek::SigningKey,
}

impl Cryptosign {
    /// `private_key_hex` is the 32-byte Ed25519 seed, hex-encoded.
    pub fn new(auth_id: impl Into<String>, private_key_hex: &str) -> Result<Cryptosign, Error> {
        let seed =
            hex::decode(private_key_hex).map_err(|_| Error::protocol("invalid cryptosign key hex"))?;
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Error::protocol("cryptosign key must be 32 bytes"))?;
        Ok(Cryptosign {
            auth_id: auth_id.into(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }
}

impl Authenticator for Cryptosign {
    fn auth_id(&self) -> &str {
        &self.auth_id
    }

    fn auth_method(&self) -> &str {
        "cryptosign"
    }

    fn auth_extra(&self) -> Dict {
        let mut extra = Dict::new();
        extra.insert("pubkey".to_string(), self.public_key_hex().into());
        extra
    }

    fn compute_response(&self, extra: &Dict) -> Result<String, Error> {
        use ed25519_dalek::Signer;

        let challenge_hex = extra
            .get("challenge")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("cryptosign challenge missing from extra"))?;
        let challenge =
            hex::decode(challenge_hex).map_err(|_| Error::protocol("cryptosign challenge is not hex"))?;
        let signature = self.signing_key.sign(&challenge);
        Ok(format!("{}{}", hex::encode(signature.to_bytes()), challenge_hex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wampcra_signs_challenge_with_plain_secret() {
        let auth = WampCra::new("alice", "secret");
        let mut extra = Dict::new();
        extra.insert("challenge".to_string(), "hello".into());
        let sig = auth.compute_response(&extra).unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn wampcra_salted_secret_changes_signature() {
        let auth = WampCra::new("alice", "secret");
        let mut plain = Dict::new();
        plain.insert("challenge".to_string(), "hello".into());
        let plain_sig = auth.compute_response(&plain).unwrap();

        let mut salted = Dict::new();
        salted.insert("challenge".to_string(), "hello".into());
        salted.insert("salt".to_string(), "saltvalue".into());
        salted.insert("iterations".to_string(), 10u64.into());
        let salted_sig = auth.compute_response(&salted).unwrap();

        assert_ne!(plain_sig, salted_sig);
    }

    #[test]
    fn cryptosign_signature_is_verifiable() {
        let seed = hex::encode([7u8; 32]);
        let auth = Cryptosign::new("alice", &seed).unwrap();
        let mut extra = Dict::new();
        extra.insert("challenge".to_string(), hex::encode([1u8; 32]).into());
        let response = auth.compute_response(&extra).unwrap();
        assert_eq!(response.len(), 128 + 64);
    }

    #[test]
    fn ticket_echoes_stored_ticket() {
        let auth = Ticket::new("alice", "s3cr3t");
        assert_eq!(auth.compute_response(&Dict::new()).unwrap(), "s3cr3t");
    }
}
