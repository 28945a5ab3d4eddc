use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::{Rgb, RgbImage};
use taboo::Verdict;
use tracing::{info, warn};

use crate::{GameError, OverlayFont};

pub const RESULT_FILE_NAME: &str = "result.png";

const TEXT_PX: f32 = 60.0;
/// Distance between the bottom of the verdict text and the bottom of the image.
const TEXT_BOTTOM_MARGIN: i32 = 50;
const CORRECT_COLOR: Rgb<u8> = Rgb([0, 128, 0]);
const WRONG_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Shows a verdict to the player.
pub trait Presenter {
    fn present(&mut self, verdict: &Verdict) -> Result<(), GameError>;
}

pub fn verdict_text(found: bool) -> &'static str {
    if found {
        "CORRECT!"
    } else {
        "WRONG!"
    }
}

/// Draws the verdict text, horizontally centered near the bottom, onto a copy of the annotated image.
pub fn compose_result(verdict: &Verdict, font: &OverlayFont) -> RgbImage {
    let mut image = verdict.annotated_image.clone();
    let text = verdict_text(verdict.found);
    let color = if verdict.found {
        CORRECT_COLOR
    } else {
        WRONG_COLOR
    };

    let (text_width, text_height) = font.text_size(text, TEXT_PX);
    let x = (image.width() as i32 - text_width as i32).div_euclid(2);
    let y = image.height() as i32 - text_height as i32 - TEXT_BOTTOM_MARGIN;

    // White outline by drawing the text at the eight neighboring offsets first
    for dx in -1..=1 {
        for dy in -1..=1 {
            if dx != 0 || dy != 0 {
                font.draw_text(&mut image, OUTLINE_COLOR, x + dx, y + dy, TEXT_PX, text);
            }
        }
    }
    font.draw_text(&mut image, color, x, y, TEXT_PX, text);
    image
}

/// Saves the composed result image to a fixed path and opens it in the system viewer.
pub struct ResultPresenter {
    font: OverlayFont,
    result_path: PathBuf,
    show: bool,
}

impl ResultPresenter {
    pub fn new(font: OverlayFont, result_path: PathBuf, show: bool) -> Self {
        Self {
            font,
            result_path,
            show,
        }
    }
}

impl Presenter for ResultPresenter {
    fn present(&mut self, verdict: &Verdict) -> Result<(), GameError> {
        let image = compose_result(verdict, &self.font);
        image
            .save(&self.result_path)
            .map_err(|source| GameError::SaveImage {
                path: self.result_path.clone(),
                source,
            })?;
        info!(path = %self.result_path.display(), found = verdict.found, "Saved result");
        if self.show {
            open_in_viewer(&self.result_path);
        }
        Ok(())
    }
}

/// Failing to open a viewer only costs the player the preview.
fn open_in_viewer(path: &Path) {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };
    let result = command
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(err) = result {
        warn!(path = %path.display(), %err, "Could not open the result image");
    }
}
