use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;

use crate::error::IdsError;

/// Abstracts over where captured frames come from. Real camera hardware is
/// out of scope (1), matching the same non-goal that excludes detector
/// internals; the only implementation shipped here plays back JPEG files
/// from a directory, which is enough to exercise the rest of the pipeline.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<RgbImage, IdsError>;
}

pub struct FileFrameSource {
    paths: Vec<PathBuf>,
    next_index: usize,
    period: Duration,
}

impl FileFrameSource {
    pub fn new(dir: &Path, fps: f32) -> Result<Self, IdsError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
                    Some("jpg") | Some("jpeg")
                )
            })
            .collect();
        paths.sort();
        let period = Duration::from_secs_f32(1.0 / fps.max(0.001));
        Ok(FileFrameSource { paths, next_index: 0, period })
    }
}

#[async_trait::async_trait]
impl FrameSource for FileFrameSource {
    async fn next_frame(&mut self) -> Result<RgbImage, IdsError> {
        if self.paths.is_empty() {
            return Err(IdsError::SourceExhausted);
        }
        tokio::time::sleep(self.period).await;
        let path = &self.paths[self.next_index];
        self.next_index = (self.next_index + 1) % self.paths.len();
        let bytes = tokio::fs::read(path).await?;
        let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg)
            .map_err(falcon_frame::FrameCodecError::from)?
            .into_rgb8();
        Ok(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_directory_errors_instead_of_looping_forever() {
        let dir = tempfile::tempdir().unwrap();
        let mut src = FileFrameSource::new(dir.path(), 30.0).unwrap();
        assert!(src.next_frame().await.is_err());
    }

    #[tokio::test]
    async fn plays_back_frames_in_sorted_order_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        for (name, px) in [("a.jpg", 10u8), ("b.jpg", 200u8)] {
            let img = RgbImage::from_pixel(2, 2, image::Rgb([px, px, px]));
            img.save(dir.path().join(name)).unwrap();
        }
        let mut src = FileFrameSource::new(dir.path(), 1000.0).unwrap();
        let f1 = src.next_frame().await.unwrap();
        let f2 = src.next_frame().await.unwrap();
        let f3 = src.next_frame().await.unwrap();
        assert_eq!(f1.get_pixel(0, 0)[0], 10);
        assert_eq!(f2.get_pixel(0, 0)[0], 200);
        assert_eq!(f3.get_pixel(0, 0)[0], 10); // loops back to the first
    }
}
