use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Request for a detector program to do something.
///
/// Requests and responses are exchanged as one JSON document per line over
/// the detector's stdin/stdout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectorRequest {
    /// Asks for the closed label vocabulary.
    ///
    /// The response should be a [`LabelsResponse`].
    Labels,
    /// Asks for every object instance found in an image.
    ///
    /// The response should be a list of [`DetectionResult`](crate::DetectionResult)s,
    /// possibly empty.
    Detect { image_path: PathBuf },
    /// The detector should shut down. There is no response.
    Bye,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelsResponse {
    pub labels: Vec<String>,
}
