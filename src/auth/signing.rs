use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs session tokens so the cookie value cannot be forged or altered.
/// Cookie values look like `<token>.<hex hmac>`.
#[derive(Clone)]
pub struct SessionSigner {
    key: Vec<u8>,
}

impl SessionSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// A signer with a random key. Cookies it issues die with the process.
    pub fn ephemeral() -> Self {
        let mut rng = rand::thread_rng();
        let key: [u8; 32] = rng.gen();
        Self::new(key.to_vec())
    }

    pub fn sign(&self, token: &str) -> String {
        format!("{}.{}", token, hex::encode(self.mac(token).finalize().into_bytes()))
    }

    /// Returns the token if the signature is valid.
    pub fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (token, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac(token).verify_slice(&signature).ok()?;
        Some(token)
    }

    fn mac(&self, token: &str) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .expect("HMAC can take key of any size");
        mac.update(token.as_bytes());
        mac
    }
}
