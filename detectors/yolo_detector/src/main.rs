mod model;
mod postprocess;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use clap::{Parser, ValueEnum};
use image::imageops::FilterType;
use taboo::{DetectionResult, COCO_LABELS};
use taboo_detector_utils::Detector;
use tracing::{debug, info};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use model::{Multiples, YoloV8};
use postprocess::{candidates, inference_size, non_maximum_suppression, to_detection, MAX_STRIDE};

/// A detector that runs a YOLOv8 model on the CPU.
#[derive(Parser)]
struct Args {
    /// Model weights in safetensors format, e.g. yolov8n.safetensors
    #[arg(short, long)]
    weights: PathBuf,

    /// Which model size the weights are for
    #[arg(long, value_enum, default_value_t = Variant::N)]
    variant: Variant,

    /// Longer image edge at inference time, a multiple of 32
    #[arg(long, default_value_t = 640)]
    image_size: u32,

    /// Minimum class score for a detection to be reported
    #[arg(long, default_value_t = 0.25)]
    confidence_threshold: f32,

    /// Boxes of the same class overlapping more than this are merged
    #[arg(long, default_value_t = 0.7)]
    iou_threshold: f32,

    /// A log level among "off", "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "warn")]
    log_level: LevelFilter,
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    N,
    S,
    M,
}

impl Variant {
    fn multiples(self) -> Multiples {
        match self {
            Variant::N => Multiples::n(),
            Variant::S => Multiples::s(),
            Variant::M => Multiples::m(),
        }
    }
}

struct YoloDetector {
    model: YoloV8,
    device: Device,
    image_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    fn load(args: &Args) -> anyhow::Result<Self> {
        if args.image_size == 0 || args.image_size % MAX_STRIDE != 0 {
            bail!("Image size {} is not a multiple of {}", args.image_size, MAX_STRIDE);
        }
        let device = Device::Cpu;
        let weights = std::fs::read(&args.weights)
            .with_context(|| format!("Could not read weights '{}'", args.weights.display()))?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, &device)?;
        let model = YoloV8::load(vb, args.variant.multiples(), COCO_LABELS.len())?;
        info!(weights = %args.weights.display(), "Loaded model");
        Ok(Self {
            model,
            device,
            image_size: args.image_size,
            confidence_threshold: args.confidence_threshold,
            iou_threshold: args.iou_threshold,
        })
    }
}

impl Detector for YoloDetector {
    fn labels(&mut self) -> Vec<String> {
        COCO_LABELS.iter().map(|&label| String::from(label)).collect()
    }

    fn detect(&mut self, image_path: &Path) -> anyhow::Result<Vec<DetectionResult>> {
        let original = image::open(image_path)
            .with_context(|| format!("Could not open '{}'", image_path.display()))?;
        let (width, height) = (original.width(), original.height());
        if width == 0 || height == 0 {
            bail!("'{}' is empty", image_path.display());
        }
        let (input_width, input_height) = inference_size(width, height, self.image_size);
        let resized = original
            .resize_exact(input_width, input_height, FilterType::CatmullRom)
            .to_rgb8();

        let input = Tensor::from_vec(
            resized.into_raw(),
            (input_height as usize, input_width as usize, 3),
            &self.device,
        )?
        .permute((2, 0, 1))?;
        let input = (input.unsqueeze(0)?.to_dtype(DType::F32)? * (1. / 255.))?;
        // One row per anchor: box, then class scores
        let rows = self.model.forward(&input)?.squeeze(0)?.t()?.to_vec2::<f32>()?;

        let kept = non_maximum_suppression(
            candidates(&rows, self.confidence_threshold),
            self.iou_threshold,
        );
        let scale_x = width as f32 / input_width as f32;
        let scale_y = height as f32 / input_height as f32;
        let detections: Vec<DetectionResult> = kept
            .iter()
            .filter_map(|candidate| to_detection(candidate, &COCO_LABELS, scale_x, scale_y))
            .collect();
        debug!(
            image_path = %image_path.display(),
            num_candidates = kept.len(),
            labels = ?detections.iter().map(|d| d.label.as_str()).collect::<Vec<_>>(),
        );
        Ok(detections)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    initialize_logging(args.log_level);

    YoloDetector::load(&args)?.run()
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
    use image::{Rgb, RgbImage};

    use super::*;

    fn untrained_detector() -> YoloDetector {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        YoloDetector {
            model: YoloV8::load(vb, Multiples::n(), COCO_LABELS.len()).unwrap(),
            device,
            image_size: 64,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        }
    }

    #[test]
    fn reports_the_coco_vocabulary() {
        let labels = untrained_detector().labels();
        assert_eq!(labels.len(), 80);
        assert_eq!(labels[53], "pizza");
    }

    #[test]
    fn boxes_are_in_original_image_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("generated_001.png");
        RgbImage::from_pixel(128, 64, Rgb([120, 60, 30]))
            .save(&image_path)
            .unwrap();

        // An all-zero network scores every class at 0.5 with empty boxes
        let mut detector = untrained_detector();
        let detections = detector.detect(&image_path).unwrap();
        assert!(!detections.is_empty());
        assert!(detections.iter().all(|d| {
            let b = d.bounding_box;
            (0..=128).contains(&b.x1) && (0..=128).contains(&b.x2)
                && (0..=64).contains(&b.y1) && (0..=64).contains(&b.y2)
        }));

        detector.confidence_threshold = 0.5;
        assert!(detector.detect(&image_path).unwrap().is_empty());
    }

    #[test]
    fn unreadable_images_are_errors() {
        let mut detector = untrained_detector();
        assert!(detector.detect(Path::new("/nonexistent/generated_001.png")).is_err());
    }
}
