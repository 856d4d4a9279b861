use super::*;

/// Which firmware generation the algorithm lists are tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SecurityLevel {
    /// RouterOS 7.x only: curve25519, group16 and ETM MACs. A 6.x device
    /// with `strong-crypto=no` fails to negotiate.
    Secure,
    /// Any RouterOS 6.4x or 7.x device. Modern names first, then the
    /// group14/group1 SHA-1 exchanges and `hmac-sha1` that 6.x offers.
    RouterOs,
    /// Pre-6.40 firmware and RouterBOOT-era boards that still require
    /// CBC ciphers, group-exchange kex or DSA host keys.
    Legacy,
}

/// Algorithm profile plus host key policy for one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSecurityOptions {
    pub level: SecurityLevel,
    /// Host key policy.
    pub server_check: ServerCheckMethod,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self::routeros()
    }
}

impl ConnectionSecurityOptions {
    /// RouterOS 7 fleets whose host keys are already in `known_hosts`.
    pub fn secure() -> Self {
        Self {
            level: SecurityLevel::Secure,
            server_check: ServerCheckMethod::DefaultKnownHostsFile,
        }
    }

    /// Mixed 6.x/7.x fleets. Host keys are not checked; a router's key
    /// changes on every netinstall.
    pub fn routeros() -> Self {
        Self {
            level: SecurityLevel::RouterOs,
            server_check: ServerCheckMethod::NoCheck,
        }
    }

    /// Old 6.x and earlier boards left on factory SSH settings.
    pub fn legacy() -> Self {
        Self {
            level: SecurityLevel::Legacy,
            server_check: ServerCheckMethod::NoCheck,
        }
    }

    pub(super) fn preferred(&self) -> Preferred {
        match self.level {
            SecurityLevel::Secure => Preferred {
                kex: Cow::Borrowed(config::SECURE_KEX_ORDER),
                key: Cow::Borrowed(config::SECURE_KEY_TYPES),
                cipher: Cow::Borrowed(config::SECURE_CIPHERS),
                mac: Cow::Borrowed(config::SECURE_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SecurityLevel::RouterOs => Preferred {
                kex: Cow::Borrowed(config::ROUTEROS_KEX_ORDER),
                key: Cow::Borrowed(config::ROUTEROS_KEY_TYPES),
                cipher: Cow::Borrowed(config::ROUTEROS_CIPHERS),
                mac: Cow::Borrowed(config::ROUTEROS_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SecurityLevel::Legacy => Preferred {
                kex: Cow::Borrowed(config::LEGACY_KEX_ORDER),
                key: Cow::Borrowed(config::LEGACY_KEY_TYPES),
                cipher: Cow::Borrowed(config::LEGACY_CIPHERS),
                mac: Cow::Borrowed(config::LEGACY_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
        }
    }
}
