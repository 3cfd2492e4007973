use std::fs;
use std::path::{Path, PathBuf};

use feedscout_types::{FrameError, LumaFrame, Rect};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read capture source {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode screenshot {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("input injection failed: {message}")]
    Failed { message: String },
}

/// Supplier of client-area screenshots. `Ok(None)` means the target window
/// is gone.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Option<LumaFrame>, CaptureError>;

    /// Ratio of capture pixels to injection coordinates.
    fn scale(&self) -> f32 {
        1.0
    }
}

/// Pointer and key injection into the target window. Coordinates share the
/// capture coordinate space.
pub trait InputInjector: Send {
    fn click(&mut self, x: i32, y: i32) -> Result<(), InjectError>;
    fn scroll(&mut self, region: &Rect) -> Result<(), InjectError>;
    fn back(&mut self) -> Result<(), InjectError>;
}

/// Replays a directory of PNG or JPEG screenshots in file-name order.
#[derive(Debug)]
pub struct ReplaySource {
    files: Vec<PathBuf>,
    next: usize,
}

impl ReplaySource {
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        let entries = fs::read_dir(dir).map_err(|source| CaptureError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CaptureError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && is_screenshot(&path) {
                files.push(path);
            }
        }
        files.sort();
        log::info!("replaying {} screenshots from {}", files.len(), dir.display());
        Ok(Self { files, next: 0 })
    }

    pub fn remaining(&self) -> usize {
        self.files.len() - self.next
    }
}

fn is_screenshot(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

impl FrameSource for ReplaySource {
    fn capture(&mut self) -> Result<Option<LumaFrame>, CaptureError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let index = self.next as u64;
        self.next += 1;
        let decoded = image::open(path).map_err(|source| CaptureError::Decode {
            path: path.clone(),
            source,
        })?;
        let luma = decoded.to_luma8();
        let (width, height) = luma.dimensions();
        let frame = LumaFrame::from_owned(width, height, width as usize, luma.into_raw())?;
        Ok(Some(frame.with_frame_index(Some(index))))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedAction {
    Click { x: i32, y: i32 },
    Scroll { region: Rect },
    Back,
}

/// Dry-run injector: logs and records actions instead of sending them.
#[derive(Debug, Default)]
pub struct LoggingInjector {
    actions: Vec<InjectedAction>,
}

impl LoggingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[InjectedAction] {
        &self.actions
    }
}

impl InputInjector for LoggingInjector {
    fn click(&mut self, x: i32, y: i32) -> Result<(), InjectError> {
        log::info!("click at ({x}, {y})");
        self.actions.push(InjectedAction::Click { x, y });
        Ok(())
    }

    fn scroll(&mut self, region: &Rect) -> Result<(), InjectError> {
        log::info!("scroll within {region}");
        self.actions.push(InjectedAction::Scroll { region: *region });
        Ok(())
    }

    fn back(&mut self) -> Result<(), InjectError> {
        log::info!("navigate back");
        self.actions.push(InjectedAction::Back);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_decodes_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let dark = image::GrayImage::from_pixel(4, 3, image::Luma([10]));
        let light = image::GrayImage::from_pixel(4, 3, image::Luma([240]));
        light.save(dir.path().join("b.png")).unwrap();
        dark.save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ReplaySource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);
        let first = source.capture().unwrap().unwrap();
        assert_eq!((first.width(), first.height()), (4, 3));
        assert_eq!(first.row(0)[0], 10);
        assert_eq!(first.frame_index(), Some(0));
        let second = source.capture().unwrap().unwrap();
        assert_eq!(second.row(2)[3], 240);
        assert!(source.capture().unwrap().is_none());
    }

    #[test]
    fn logging_injector_records_actions() {
        let mut injector = LoggingInjector::new();
        injector.click(3, 4).unwrap();
        injector.scroll(&Rect::new(0, 0, 10, 10)).unwrap();
        injector.back().unwrap();
        assert_eq!(
            injector.actions(),
            &[
                InjectedAction::Click { x: 3, y: 4 },
                InjectedAction::Scroll {
                    region: Rect::new(0, 0, 10, 10)
                },
                InjectedAction::Back,
            ]
        );
    }
}
