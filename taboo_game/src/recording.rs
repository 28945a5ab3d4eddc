use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use taboo::DetectionResult;

use crate::{ConfigError, GameError};

/// Writes one JSON file per played round into a directory.
pub struct Recorder {
    directory: PathBuf,
}

impl Recorder {
    pub fn new(directory: PathBuf) -> Result<Self, ConfigError> {
        if !directory.is_dir() {
            return Err(ConfigError::NotADirectory { path: directory });
        }
        Ok(Self { directory })
    }

    pub fn write_round_recording(&mut self, recording: &RoundRecording) -> Result<PathBuf, GameError> {
        let filepath = self
            .directory
            .join(format!("round_{:0>6}.json", recording.round_index));
        let write = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&filepath)?);
            serde_json::to_writer_pretty(&mut writer, recording)?;
            writeln!(writer)?;
            writer.flush()
        };
        write().map_err(|source| GameError::Recording {
            path: filepath.clone(),
            source,
        })?;
        Ok(filepath)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecording {
    pub round_index: usize,
    pub answer: String,
    pub taboo_words: Vec<String>,
    pub rejected_descriptions: Vec<String>,
    pub description: String,
    pub generated_image: PathBuf,
    pub detections: Vec<DetectionResult>,
    pub found: bool,
}

#[cfg(test)]
mod tests {
    use taboo::BoundingBox;

    use super::*;

    #[test]
    fn writes_numbered_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path().to_path_buf()).unwrap();
        let recording = RoundRecording {
            round_index: 3,
            answer: String::from("pizza"),
            taboo_words: vec![String::from("italian")],
            rejected_descriptions: vec![String::from("This italian dish is great")],
            description: String::from("A round dish with cheese"),
            generated_image: PathBuf::from("generated_003.png"),
            detections: vec![DetectionResult::new("pizza", BoundingBox::new(10, 10, 50, 50))],
            found: true,
        };
        let path = recorder.write_round_recording(&recording).unwrap();
        assert_eq!(path, dir.path().join("round_000003.json"));

        let written: RoundRecording =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, recording);
    }

    #[test]
    fn directory_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Recorder::new(dir.path().join("missing")),
            Err(ConfigError::NotADirectory { .. })
        ));
    }
}
