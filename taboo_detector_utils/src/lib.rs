use std::io::{BufRead, Write};
use std::path::Path;

use taboo::{DetectionResult, DetectorRequest, LabelsResponse};
use tracing::trace;

/// A trait to simplify writing detector programs.
pub trait Detector {
    /// The closed label vocabulary, i.e. every label `detect()` may ever report.
    fn labels(&mut self) -> Vec<String>;
    fn detect(&mut self, image_path: &Path) -> anyhow::Result<Vec<DetectionResult>>;

    fn run(&mut self) -> anyhow::Result<()> {
        // Communication happens through stdin/stdout.
        // Stderr can be used for logging.
        let stdin = std::io::stdin().lock();
        let stdout = std::io::stdout().lock();
        self.serve(stdin, stdout)
    }

    /// Answers requests from `input` until a `Bye` request or EOF.
    fn serve(&mut self, mut input: impl BufRead, mut output: impl Write) -> anyhow::Result<()> {
        let mut buf = String::new();
        loop {
            buf.clear(); // because read_line() appends to the buffer
            let num_bytes_read = input.read_line(&mut buf)?;
            if num_bytes_read == 0 {
                // 0 bytes read means EOF - the game has exited.
                break Ok(());
            }

            let req = serde_json::from_str::<DetectorRequest>(buf.trim_end())?;
            trace!(request = ?req, "Received request");

            match req {
                DetectorRequest::Labels => serde_json::to_writer(
                    &mut output,
                    &LabelsResponse {
                        labels: self.labels(),
                    },
                )?,
                DetectorRequest::Detect { image_path } => {
                    serde_json::to_writer(&mut output, &self.detect(&image_path)?)?
                }
                DetectorRequest::Bye => break Ok(()),
            }
            writeln!(output)?;
            output.flush()?;
        }
    }
}
