use crate::{errors::Error, Result};

/// Ordered bandwidth caps handed to the downloader's `--limit-rate`.
///
/// Caps never increase from one tier to the next, and stepping past the last tier
/// stays on the last tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateTiers {
    caps: Vec<String>,
}

impl Default for RateTiers {
    fn default() -> Self {
        Self {
            caps: ["8M", "4M", "2M", "1M"].map(String::from).to_vec(),
        }
    }
}

impl RateTiers {
    /// Parse a comma separated list like `8M,4M,2M,1M`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut caps = Vec::new();
        let mut last_bytes = u64::MAX;
        for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let bytes = rate_to_bytes(part).ok_or_else(|| {
                Error::Config(format!("invalid rate limit tier {part:?} (expected e.g. 4M, 500K)"))
            })?;
            if bytes > last_bytes {
                return Err(Error::Config(format!(
                    "rate limit tiers must not increase: {part} follows a smaller cap"
                )));
            }
            last_bytes = bytes;
            caps.push(part.to_string());
        }
        if caps.is_empty() {
            return Err(Error::Config(
                "RATE_LIMIT_TIERS must contain at least one tier".to_string(),
            ));
        }
        Ok(Self { caps })
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.caps.len().saturating_sub(1)
    }

    /// Next tier index after `index`, clamped to the last tier.
    pub fn step_down(&self, index: usize) -> usize {
        (index + 1).min(self.last_index())
    }

    /// Cap for `index`, clamped to the last tier.
    pub fn cap(&self, index: usize) -> &str {
        &self.caps[index.min(self.last_index())]
    }
}

/// `8M` -> 8 * 1024 * 1024. Accepts an optional `K`/`M`/`G` suffix and decimals.
fn rate_to_bytes(s: &str) -> Option<u64> {
    let upper = s.to_ascii_uppercase();
    let (num, mult) = match upper.chars().last()? {
        'K' => (&upper[..upper.len() - 1], 1024.0),
        'M' => (&upper[..upper.len() - 1], 1024.0 * 1024.0),
        'G' => (&upper[..upper.len() - 1], 1024.0 * 1024.0 * 1024.0),
        _ => (upper.as_str(), 1.0),
    };
    let value: f64 = num.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some((value * mult) as u64)
}
