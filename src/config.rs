//! SSH algorithm preferences and connection manager settings.
//!
//! RouterOS ships a fairly small SSH server. RouterOS 7 speaks curve25519 and
//! the SHA-2 RSA signatures, RouterOS 6 frequently only offers the
//! diffie-hellman group14/group1 exchanges with SHA-1. The lists below are
//! ordered newest/strongest first and keep the legacy names at the tail so
//! older firmware still negotiates.

use std::time::Duration;

use log::warn;
use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{cipher, compression, kex, mac};
use serde::{Deserialize, Serialize};

/// Environment variable holding the SSH timeout in milliseconds.
pub const SSH_TIMEOUT_ENV: &str = "SSH_TIMEOUT";

/// Default port for the SSH transport.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Key exchange order for RouterOS devices.
pub const ROUTEROS_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_G14_SHA256,
    kex::DH_G14_SHA1,
    kex::DH_G1_SHA1,
];

/// Cipher order for RouterOS devices.
pub const ROUTEROS_CIPHERS: &[cipher::Name] = &[
    cipher::AES_128_CTR,
    cipher::AES_192_CTR,
    cipher::AES_256_CTR,
    cipher::AES_256_GCM,
];

/// Host key algorithms accepted from RouterOS devices.
pub const ROUTEROS_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
];

/// MAC order for RouterOS devices.
pub const ROUTEROS_MAC_ALGORITHMS: &[mac::Name] =
    &[mac::HMAC_SHA256, mac::HMAC_SHA512, mac::HMAC_SHA1];

/// Strict modern key exchange algorithms.
pub const SECURE_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_G16_SHA512,
    kex::DH_G14_SHA256,
];

/// Strict modern ciphers.
pub const SECURE_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_128_CTR,
];

/// Strict modern host key algorithms.
pub const SECURE_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
];

/// Strict modern MAC algorithms.
pub const SECURE_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
];

/// Key exchange algorithms for very old firmware.
pub const LEGACY_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::DH_G14_SHA256,
    kex::DH_G14_SHA1,
    kex::DH_GEX_SHA256,
    kex::DH_GEX_SHA1,
    kex::DH_G1_SHA1,
];

/// Ciphers for very old firmware, CBC modes included.
pub const LEGACY_CIPHERS: &[cipher::Name] = &[
    cipher::AES_128_CTR,
    cipher::AES_192_CTR,
    cipher::AES_256_CTR,
    cipher::AES_256_GCM,
    cipher::AES_128_CBC,
    cipher::AES_192_CBC,
    cipher::AES_256_CBC,
];

/// Host key algorithms for very old firmware, DSA included.
pub const LEGACY_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Dsa,
];

/// MAC algorithms for very old firmware.
pub const LEGACY_MAC_ALGORITHMS: &[mac::Name] =
    &[mac::HMAC_SHA256, mac::HMAC_SHA1, mac::HMAC_SHA1_ETM];

/// Compression is never negotiated; RouterOS output is small.
pub const DEFAULT_COMPRESSION_ALGORITHMS: &[compression::Name] = &[compression::NONE];

/// Settings for the session pool and the SSH transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Bounded wait for a single command.
    pub command_timeout: Duration,
    /// Bounded wait for TCP connect plus SSH negotiation and authentication.
    pub connect_timeout: Duration,
    /// Maximum number of pooled sessions.
    pub max_capacity: u64,
    /// Pooled sessions are dropped after this long without use.
    pub time_to_idle: Duration,
    /// Release the session after every dispatcher operation.
    pub release_after_request: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            max_capacity: 100,
            time_to_idle: Duration::from_secs(5 * 60),
            release_after_request: true,
        }
    }
}

impl ManagerConfig {
    /// Default settings with timeouts taken from `SSH_TIMEOUT` when present.
    pub fn from_env() -> Self {
        Self::default().with_timeout_ms(std::env::var(SSH_TIMEOUT_ENV).ok().as_deref())
    }

    fn with_timeout_ms(mut self, raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return self;
        };
        match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => {
                self.command_timeout = Duration::from_millis(ms);
                self.connect_timeout = Duration::from_millis(ms);
            }
            _ => warn!("Ignoring invalid {SSH_TIMEOUT_ENV} value {raw:?}"),
        }
        self
    }
}
