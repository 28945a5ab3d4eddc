use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use taboo::{build_verdict, TargetTable, Verdict};
use tracing::{debug, info};

use crate::recording::{Recorder, RoundRecording};
use crate::{get_valid_description, CollaboratorError, GameError, ImageGenerator, ObjectDetector, Presenter};

/// Everything outside the game logic that a round talks to.
pub struct Collaborators {
    pub input: Box<dyn BufRead>,
    pub output: Box<dyn Write>,
    pub generator: Box<dyn ImageGenerator>,
    pub detector: Box<dyn ObjectDetector>,
    pub presenter: Box<dyn Presenter>,
}

pub struct RoundOutcome {
    pub round_index: usize,
    pub answer: String,
    pub verdict: Verdict,
}

/// The round-scoped path of the generated image.
pub fn generated_image_path(output_dir: &Path, round_index: usize) -> std::path::PathBuf {
    output_dir.join(format!("generated_{:0>3}.png", round_index))
}

/// Plays one round against a random target from `available`.
///
/// The chosen answer is removed from `available` before anything else can
/// fail, so it is never offered again in this session. Collaborator failures
/// are not retried.
pub fn play_round(
    rng: &mut StdRng,
    round_index: usize,
    available: &mut BTreeSet<String>,
    table: &TargetTable,
    output_dir: &Path,
    collaborators: &mut Collaborators,
    recorder: &mut Option<Recorder>,
) -> Result<RoundOutcome, GameError> {
    let answer = available
        .iter()
        .choose(rng)
        .cloned()
        .ok_or(GameError::EmptyPool { round_index })?;
    available.remove(&answer);
    debug!(round_index, answer, "Starting round");

    let entry = table
        .get(&answer)
        .ok_or_else(|| GameError::UnknownTarget {
            answer: answer.clone(),
        })?;

    let description = get_valid_description(
        round_index,
        entry,
        &mut *collaborators.input,
        &mut *collaborators.output,
    )?;

    let image_path = generated_image_path(output_dir, round_index);
    collaborators
        .generator
        .generate(&description.text, &image_path)
        .map_err(GameError::generator)?;

    let detections = collaborators
        .detector
        .detect(&image_path)
        .map_err(GameError::detector)?;
    debug!(round_index, num_detections = detections.len(), "Received detections");

    let image = image::open(&image_path)
        .map_err(|err| GameError::generator(CollaboratorError::Image(err)))?
        .to_rgb8();
    let verdict = build_verdict(&answer, &detections, &image);
    info!(round_index, answer, found = verdict.found, "Verdict");

    if let Some(recorder) = recorder {
        recorder.write_round_recording(&RoundRecording {
            round_index,
            answer: answer.clone(),
            taboo_words: entry.taboo_words.clone(),
            rejected_descriptions: description.rejected,
            description: description.text,
            generated_image: image_path,
            detections,
            found: verdict.found,
        })?;
    }

    Ok(RoundOutcome {
        round_index,
        answer,
        verdict,
    })
}
