mod config;
mod detector;
mod error;
mod font;
mod generator;
mod presenter;
mod prompt;
mod recording;
mod round;
mod session;
pub use config::*;
pub use detector::*;
pub use error::*;
pub use font::*;
pub use generator::*;
pub use presenter::*;
pub use prompt::*;
pub use recording::*;
pub use round::*;
pub use session::*;

use std::path::PathBuf;

pub struct SessionConfig {
    pub rng: rand::rngs::StdRng,
    /// How many rounds to play.
    pub rounds: usize,
    /// Where the per-round generated images are written.
    pub output_dir: PathBuf,
    pub recorder: Option<recording::Recorder>,
}
