//! Media metadata probing
//!
//! Reads width/height from image headers without decoding the pixels.
//! Video duration comes from an external prober and is not handled here.

use std::path::Path;
use tracing::debug;

/// Probed size (and duration, for videos) of a media file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaDimensions {
    pub width: u32,
    pub height: u32,
    pub duration: Option<f64>,
}

/// Metadata probe: path -> width, height, duration
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Option<MediaDimensions>;
}

/// Probe backed by the `image` crate's header readers
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageProbe;

impl MediaProbe for ImageProbe {
    fn probe(&self, path: &Path) -> Option<MediaDimensions> {
        match image::image_dimensions(path) {
            Ok((width, height)) => Some(MediaDimensions {
                width,
                height,
                duration: None,
            }),
            Err(e) => {
                debug!("Could not probe {}: {}", path.display(), e);
                None
            }
        }
    }
}
