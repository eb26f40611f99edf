use modwire::{ContainerError, Injectable, MetadataRegistry, ModuleDescriptor, Resolver};
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Salted SHA-256 hashing. Stored form is `<salt hex>$<digest hex>`.
#[derive(Debug, Default)]
pub struct HashService;

impl Injectable for HashService {
    fn construct(_: &mut Resolver<'_>) -> Result<Self, ContainerError> {
        Ok(HashService)
    }
}

impl HashService {
    pub fn hash(&self, plain: &str) -> String {
        let salt: [u8; SALT_LEN] = rand::random();
        let salt = hex::encode(salt);
        let digest = digest(&salt, plain);
        format!("{salt}${digest}")
    }

    /// `false` for malformed stored values.
    pub fn verify(&self, plain: &str, stored: &str) -> bool {
        let Some((salt, expected)) = stored.split_once('$') else {
            return false;
        };
        if salt.len() != SALT_LEN * 2 || hex::decode(salt).is_err() {
            return false;
        }
        let actual = digest(salt, plain);
        actual.len() == expected.len()
            && actual
                .bytes()
                .zip(expected.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

fn digest(salt: &str, plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plain.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct HashModule;

pub fn declare(reg: &mut MetadataRegistry) {
    reg.module::<HashModule>(
        ModuleDescriptor::new()
            .provider::<HashService>()
            .export::<HashService>(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let svc = HashService;
        let stored = svc.hash("s3cret");
        assert!(svc.verify("s3cret", &stored));
        assert!(!svc.verify("S3cret", &stored));
    }

    #[test]
    fn same_input_gets_different_salts() {
        let svc = HashService;
        let a = svc.hash("pw");
        let b = svc.hash("pw");
        assert_ne!(a, b);
        assert!(svc.verify("pw", &a) && svc.verify("pw", &b));
    }

    #[test]
    fn malformed_stored_values_never_verify() {
        let svc = HashService;
        assert!(!svc.verify("pw", "no-separator"));
        assert!(!svc.verify("pw", "zz$abcd"));
        assert!(!svc.verify("pw", ""));
    }
}
