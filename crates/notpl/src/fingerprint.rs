/*
 * fingerprint.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::fmt;

use serde::Serialize;
use sha1::{Digest, Sha1};

/// Content hash identifying a template. Equal sources share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// SHA-1 hex digest of `content`.
    pub fn of(content: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content.as_bytes());
        let result = hasher.finalize();
        Fingerprint(result.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last seven hex digits, used in output filenames.
    pub fn short(&self) -> &str {
        self.tail(7)
    }

    /// Last five hex digits, used in log lines.
    pub fn alias(&self) -> &str {
        self.tail(5)
    }

    fn tail(&self, n: usize) -> &str {
        &self.0[self.0.len().saturating_sub(n)..]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
