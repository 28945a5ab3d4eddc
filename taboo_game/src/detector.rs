use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::de::DeserializeOwned;
use taboo::{DetectionResult, DetectorRequest, LabelsResponse};
use tracing::{debug, trace};

use crate::{CollaboratorError, DetectorConfig};

pub trait ObjectDetector {
    /// The closed vocabulary of labels this detector can report.
    fn labels(&mut self) -> Result<Vec<String>, CollaboratorError>;
    fn detect(&mut self, image_path: &Path) -> Result<Vec<DetectionResult>, CollaboratorError>;
}

/// One line-delimited JSON conversation with a detector.
pub struct DetectorConnection<W, R> {
    pub nick: String,
    writer: W,
    reader: R,
    // A re-usable buffer for IO.
    // Should always be empty before and after perform_request().
    buf: String,
}

impl<W: Write, R: BufRead> DetectorConnection<W, R> {
    pub fn new(nick: &str, writer: W, reader: R) -> Self {
        Self {
            nick: String::from(nick),
            writer,
            reader,
            buf: String::new(),
        }
    }

    fn send(&mut self, req: &DetectorRequest) -> Result<(), CollaboratorError> {
        let mut req_json = serde_json::to_string(req)?;
        trace!(name: "Sending request", detector = &self.nick, request = %req_json);
        req_json.push('\n');
        self.writer.write_all(req_json.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn perform_request<T: DeserializeOwned>(
        &mut self,
        req: &DetectorRequest,
    ) -> Result<T, CollaboratorError> {
        self.send(req)?;
        self.buf.clear();
        let num_bytes_read = self.reader.read_line(&mut self.buf)?;
        if num_bytes_read == 0 {
            return Err(CollaboratorError::ProcessExited);
        }
        let serialized_response = self.buf.trim_end();
        trace!(name: "Received response", detector = &self.nick, response = %serialized_response);
        let response = serde_json::from_str::<T>(serialized_response);
        self.buf.clear();
        Ok(response?)
    }
}

impl<W: Write, R: BufRead> ObjectDetector for DetectorConnection<W, R> {
    fn labels(&mut self) -> Result<Vec<String>, CollaboratorError> {
        let response: LabelsResponse = self.perform_request(&DetectorRequest::Labels)?;
        Ok(response.labels)
    }

    fn detect(&mut self, image_path: &Path) -> Result<Vec<DetectionResult>, CollaboratorError> {
        self.perform_request(&DetectorRequest::Detect {
            image_path: image_path.to_path_buf(),
        })
    }
}

/// A detector program running as a child process.
///
/// Dropping it sends `Bye` and waits for the process to exit.
pub struct DetectorProcess {
    connection: DetectorConnection<ChildStdin, BufReader<ChildStdout>>,
    child: Child,
}

impl DetectorProcess {
    pub fn spawn(config: &DetectorConfig) -> Result<Self, CollaboratorError> {
        let (program, args) = config.cmd.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty detector command")
        })?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take().ok_or(CollaboratorError::ProcessExited)?;
        let stdout = child.stdout.take().ok_or(CollaboratorError::ProcessExited)?;
        debug!(detector = &config.nick, pid = child.id(), "Spawned detector");

        Ok(Self {
            connection: DetectorConnection::new(&config.nick, stdin, BufReader::new(stdout)),
            child,
        })
    }
}

impl ObjectDetector for DetectorProcess {
    fn labels(&mut self) -> Result<Vec<String>, CollaboratorError> {
        self.connection.labels()
    }

    fn detect(&mut self, image_path: &Path) -> Result<Vec<DetectionResult>, CollaboratorError> {
        self.connection.detect(image_path)
    }
}

impl Drop for DetectorProcess {
    fn drop(&mut self) {
        if let Err(err) = self.connection.send(&DetectorRequest::Bye) {
            debug!(detector = &self.connection.nick, %err, "Could not say bye to detector");
        }
        match self.child.wait() {
            Ok(status) => debug!(detector = &self.connection.nick, %status, "Detector exited"),
            Err(err) => debug!(detector = &self.connection.nick, %err, "Could not wait for detector"),
        }
    }
}
