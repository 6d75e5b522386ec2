//! Media inspection port. Dimensions are a nice-to-have for the video reply, so
//! every failure collapses into `None`.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::Dimensions;

#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Option<Dimensions>;
}

/// Parse the `WIDTHxHEIGHT` line printed by `ffprobe -of csv=s=x:p=0`.
///
/// Only the first non-empty line is considered; zero dimensions are rejected.
pub fn parse_dimensions(output: &str) -> Option<Dimensions> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (w, h) = line.split_once('x')?;
    let width = w.trim().parse::<u32>().ok()?;
    // Some containers append a trailing separator (`1080x1920x`).
    let height = h.trim().trim_end_matches('x').parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Dimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_dimensions() {
        assert_eq!(
            parse_dimensions("1080x1920\n"),
            Some(Dimensions {
                width: 1080,
                height: 1920
            })
        );
        assert_eq!(
            parse_dimensions("\n 720x1280x\n"),
            Some(Dimensions {
                width: 720,
                height: 1280
            })
        );
    }

    #[test]
    fn rejects_malformed_output() {
        for out in ["", "N/A", "1080", "x1920", "1080x", "0x1920", "axb", "-1x10"] {
            assert_eq!(parse_dimensions(out), None, "for {out:?}");
        }
    }
}
