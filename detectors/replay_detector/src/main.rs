use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use taboo::{DetectionResult, COCO_LABELS};
use taboo_detector_utils::Detector;
use tracing::{debug, warn};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// A detector that answers from a script instead of looking at the images.
#[derive(Parser)]
struct Args {
    /// JSON fixture with the detections to report, one list per Detect request
    fixture: PathBuf,

    /// A log level among "off", "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "warn")]
    log_level: LevelFilter,
}

#[derive(Deserialize)]
struct Fixture {
    /// Defaults to the COCO vocabulary
    #[serde(default)]
    labels: Option<Vec<String>>,
    rounds: Vec<Vec<DetectionResult>>,
}

struct ReplayDetector {
    labels: Vec<String>,
    rounds: VecDeque<Vec<DetectionResult>>,
}

impl ReplayDetector {
    fn from_fixture(fixture: Fixture) -> Self {
        let labels = fixture
            .labels
            .unwrap_or_else(|| COCO_LABELS.iter().map(|&label| String::from(label)).collect());
        Self {
            labels,
            rounds: VecDeque::from(fixture.rounds),
        }
    }
}

impl Detector for ReplayDetector {
    fn labels(&mut self) -> Vec<String> {
        self.labels.clone()
    }

    fn detect(&mut self, image_path: &Path) -> anyhow::Result<Vec<DetectionResult>> {
        if !image_path.is_file() {
            warn!(image_path = %image_path.display(), "Image does not exist, replaying anyway");
        }
        let detections = self.rounds.pop_front().unwrap_or_default();
        debug!(image_path = %image_path.display(), num_detections = detections.len());
        Ok(detections)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    initialize_logging(args.log_level);

    let fixture: Fixture = serde_json::from_str(&std::fs::read_to_string(&args.fixture)?)?;
    ReplayDetector::from_fixture(fixture).run()
}

fn initialize_logging(level: LevelFilter) {
    let format = tracing_subscriber::fmt::format()
        .with_target(false)
        .compact();

    let filter = Targets::new().with_default(level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use taboo::BoundingBox;

    use super::*;

    const FIXTURE: &str = include_str!("../fixtures/pizza_then_plate.json");

    #[test]
    fn replays_rounds_in_order_then_nothing() {
        let fixture: Fixture = serde_json::from_str(FIXTURE).unwrap();
        let mut detector = ReplayDetector::from_fixture(fixture);
        let path = Path::new("generated_001.png");

        let first = detector.detect(path).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].label, "pizza");
        assert_eq!(first[0].bounding_box, BoundingBox::new(10, 10, 50, 50));
        assert_eq!(detector.detect(path).unwrap()[0].label, "plate");
        assert!(detector.detect(path).unwrap().is_empty());
    }

    #[test]
    fn labels_default_to_coco() {
        let fixture: Fixture = serde_json::from_str(r#"{"rounds": []}"#).unwrap();
        let mut detector = ReplayDetector::from_fixture(fixture);
        assert_eq!(detector.labels().len(), 80);

        let fixture: Fixture =
            serde_json::from_str(r#"{"labels": ["unicorn"], "rounds": []}"#).unwrap();
        assert_eq!(ReplayDetector::from_fixture(fixture).labels(), vec!["unicorn"]);
    }

    #[test]
    fn speaks_the_protocol() {
        let fixture: Fixture = serde_json::from_str(FIXTURE).unwrap();
        let input = Cursor::new("{\"type\":\"Detect\",\"image_path\":\"x.png\"}\n{\"type\":\"Bye\"}\n");
        let mut output = Vec::new();
        ReplayDetector::from_fixture(fixture)
            .serve(input, &mut output)
            .unwrap();
        let response: Vec<DetectionResult> =
            serde_json::from_slice(&output).unwrap();
        assert_eq!(response.len(), 2);
    }
}
