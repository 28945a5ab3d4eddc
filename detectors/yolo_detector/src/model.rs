//! The YOLOv8 detection network, laid out so that its variable names match
//! the `yolov8*.safetensors` conversions of the ultralytics checkpoints.

use candle_core::{DType, IndexOp, Result, Tensor, D};
use candle_nn::{batch_norm, conv2d, conv2d_no_bias, Conv2d, Conv2dConfig, Module, VarBuilder};

/// Size multipliers of a model variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Multiples {
    depth: f64,
    width: f64,
    ratio: f64,
}

impl Multiples {
    pub fn n() -> Self {
        Self {
            depth: 0.33,
            width: 0.25,
            ratio: 2.0,
        }
    }

    pub fn s() -> Self {
        Self {
            depth: 0.33,
            width: 0.50,
            ratio: 2.0,
        }
    }

    pub fn m() -> Self {
        Self {
            depth: 0.67,
            width: 0.75,
            ratio: 1.5,
        }
    }

    /// Channel counts of the three feature maps fed to the head.
    fn filters(&self) -> (usize, usize, usize) {
        let f1 = (256. * self.width) as usize;
        let f2 = (512. * self.width) as usize;
        let f3 = (512. * self.width * self.ratio) as usize;
        (f1, f2, f3)
    }

    fn channels(&self, base: f64) -> usize {
        (base * self.width) as usize
    }

    fn repeats(&self, base: f64) -> usize {
        (base * self.depth).round() as usize
    }
}

struct Upsample {
    scale_factor: usize,
}

impl Module for Upsample {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (_, _, h, w) = xs.dims4()?;
        xs.upsample_nearest2d(self.scale_factor * h, self.scale_factor * w)
    }
}

/// Convolution with its batch norm folded in, followed by SiLU.
struct ConvBlock {
    conv: Conv2d,
}

impl ConvBlock {
    fn load(
        vb: VarBuilder,
        c1: usize,
        c2: usize,
        k: usize,
        stride: usize,
        padding: Option<usize>,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: padding.unwrap_or(k / 2),
            stride,
            ..Default::default()
        };
        let bn = batch_norm(c2, 1e-3, vb.pp("bn"))?;
        let conv = conv2d_no_bias(c1, c2, k, cfg, vb.pp("conv"))?.absorb_bn(&bn)?;
        Ok(Self { conv })
    }
}

impl Module for ConvBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        candle_nn::ops::silu(&self.conv.forward(xs)?)
    }
}

struct Bottleneck {
    cv1: ConvBlock,
    cv2: ConvBlock,
    residual: bool,
}

impl Bottleneck {
    fn load(vb: VarBuilder, c1: usize, c2: usize, shortcut: bool) -> Result<Self> {
        let cv1 = ConvBlock::load(vb.pp("cv1"), c1, c2, 3, 1, None)?;
        let cv2 = ConvBlock::load(vb.pp("cv2"), c2, c2, 3, 1, None)?;
        Ok(Self {
            cv1,
            cv2,
            residual: c1 == c2 && shortcut,
        })
    }
}

impl Module for Bottleneck {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = self.cv2.forward(&self.cv1.forward(xs)?)?;
        if self.residual {
            xs + ys
        } else {
            Ok(ys)
        }
    }
}

/// Cross-stage partial block with two convolutions.
struct C2f {
    cv1: ConvBlock,
    cv2: ConvBlock,
    bottleneck: Vec<Bottleneck>,
}

impl C2f {
    fn load(vb: VarBuilder, c1: usize, c2: usize, n: usize, shortcut: bool) -> Result<Self> {
        let c = c2 / 2;
        let cv1 = ConvBlock::load(vb.pp("cv1"), c1, 2 * c, 1, 1, None)?;
        let cv2 = ConvBlock::load(vb.pp("cv2"), (2 + n) * c, c2, 1, 1, None)?;
        let bottleneck = (0..n)
            .map(|idx| Bottleneck::load(vb.pp(format!("bottleneck.{idx}")), c, c, shortcut))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cv1,
            cv2,
            bottleneck,
        })
    }
}

impl Module for C2f {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut ys = self.cv1.forward(xs)?.chunk(2, 1)?;
        for m in &self.bottleneck {
            let last = &ys[ys.len() - 1];
            let next = m.forward(last)?;
            ys.push(next);
        }
        self.cv2.forward(&Tensor::cat(ys.as_slice(), 1)?)
    }
}

/// Spatial pyramid pooling with three chained max pools.
struct Sppf {
    cv1: ConvBlock,
    cv2: ConvBlock,
    k: usize,
}

impl Sppf {
    fn load(vb: VarBuilder, c1: usize, c2: usize, k: usize) -> Result<Self> {
        let c = c1 / 2;
        let cv1 = ConvBlock::load(vb.pp("cv1"), c1, c, 1, 1, None)?;
        let cv2 = ConvBlock::load(vb.pp("cv2"), c * 4, c2, 1, 1, None)?;
        Ok(Self { cv1, cv2, k })
    }

    fn pool(&self, xs: &Tensor) -> Result<Tensor> {
        let pad = self.k / 2;
        xs.pad_with_zeros(2, pad, pad)?
            .pad_with_zeros(3, pad, pad)?
            .max_pool2d_with_stride(self.k, 1)
    }
}

impl Module for Sppf {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.cv1.forward(xs)?;
        let xs2 = self.pool(&xs)?;
        let xs3 = self.pool(&xs2)?;
        let xs4 = self.pool(&xs3)?;
        self.cv2.forward(&Tensor::cat(&[&xs, &xs2, &xs3, &xs4], 1)?)
    }
}

/// Distribution focal loss decoding: an expectation over `num_bins` offsets.
struct Dfl {
    conv: Conv2d,
    num_bins: usize,
}

impl Dfl {
    fn load(vb: VarBuilder, num_bins: usize) -> Result<Self> {
        let conv = conv2d_no_bias(num_bins, 1, 1, Default::default(), vb.pp("conv"))?;
        Ok(Self { conv, num_bins })
    }
}

impl Module for Dfl {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (b_size, _, anchors) = xs.dims3()?;
        let xs = xs
            .reshape((b_size, 4, self.num_bins, anchors))?
            .transpose(2, 1)?;
        let xs = candle_nn::ops::softmax(&xs, 1)?;
        self.conv.forward(&xs)?.reshape((b_size, 4, anchors))
    }
}

struct DarkNet {
    b1_0: ConvBlock,
    b1_1: ConvBlock,
    b2_0: C2f,
    b2_1: ConvBlock,
    b2_2: C2f,
    b3_0: ConvBlock,
    b3_1: C2f,
    b4_0: ConvBlock,
    b4_1: C2f,
    b5: Sppf,
}

impl DarkNet {
    fn load(vb: VarBuilder, m: Multiples) -> Result<Self> {
        let top = (512. * m.width * m.ratio) as usize;
        Ok(Self {
            b1_0: ConvBlock::load(vb.pp("b1.0"), 3, m.channels(64.), 3, 2, Some(1))?,
            b1_1: ConvBlock::load(vb.pp("b1.1"), m.channels(64.), m.channels(128.), 3, 2, Some(1))?,
            b2_0: C2f::load(vb.pp("b2.0"), m.channels(128.), m.channels(128.), m.repeats(3.), true)?,
            b2_1: ConvBlock::load(vb.pp("b2.1"), m.channels(128.), m.channels(256.), 3, 2, Some(1))?,
            b2_2: C2f::load(vb.pp("b2.2"), m.channels(256.), m.channels(256.), m.repeats(6.), true)?,
            b3_0: ConvBlock::load(vb.pp("b3.0"), m.channels(256.), m.channels(512.), 3, 2, Some(1))?,
            b3_1: C2f::load(vb.pp("b3.1"), m.channels(512.), m.channels(512.), m.repeats(6.), true)?,
            b4_0: ConvBlock::load(vb.pp("b4.0"), m.channels(512.), top, 3, 2, Some(1))?,
            b4_1: C2f::load(vb.pp("b4.1"), top, top, m.repeats(3.), true)?,
            b5: Sppf::load(vb.pp("b5.0"), top, top, 5)?,
        })
    }

    /// The feature maps at strides 8, 16 and 32.
    fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let x1 = self.b1_1.forward(&self.b1_0.forward(xs)?)?;
        let x2 = self
            .b2_2
            .forward(&self.b2_1.forward(&self.b2_0.forward(&x1)?)?)?;
        let x3 = self.b3_1.forward(&self.b3_0.forward(&x2)?)?;
        let x4 = self.b4_1.forward(&self.b4_0.forward(&x3)?)?;
        let x5 = self.b5.forward(&x4)?;
        Ok((x2, x3, x5))
    }
}

struct Neck {
    up: Upsample,
    n1: C2f,
    n2: C2f,
    n3: ConvBlock,
    n4: C2f,
    n5: ConvBlock,
    n6: C2f,
}

impl Neck {
    fn load(vb: VarBuilder, m: Multiples) -> Result<Self> {
        let n = m.repeats(3.);
        let (w, r) = (m.width, m.ratio);
        Ok(Self {
            up: Upsample { scale_factor: 2 },
            n1: C2f::load(vb.pp("n1"), (512. * w * (1. + r)) as usize, m.channels(512.), n, false)?,
            n2: C2f::load(vb.pp("n2"), m.channels(768.), m.channels(256.), n, false)?,
            n3: ConvBlock::load(vb.pp("n3"), m.channels(256.), m.channels(256.), 3, 2, Some(1))?,
            n4: C2f::load(vb.pp("n4"), m.channels(768.), m.channels(512.), n, false)?,
            n5: ConvBlock::load(vb.pp("n5"), m.channels(512.), m.channels(512.), 3, 2, Some(1))?,
            n6: C2f::load(
                vb.pp("n6"),
                (512. * w * (1. + r)) as usize,
                (512. * w * r) as usize,
                n,
                false,
            )?,
        })
    }

    fn forward(&self, p3: &Tensor, p4: &Tensor, p5: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let x = self
            .n1
            .forward(&Tensor::cat(&[&self.up.forward(p5)?, p4], 1)?)?;
        let head_1 = self
            .n2
            .forward(&Tensor::cat(&[&self.up.forward(&x)?, p3], 1)?)?;
        let head_2 = self
            .n4
            .forward(&Tensor::cat(&[&self.n3.forward(&head_1)?, &x], 1)?)?;
        let head_3 = self
            .n6
            .forward(&Tensor::cat(&[&self.n5.forward(&head_2)?, p5], 1)?)?;
        Ok((head_1, head_2, head_3))
    }
}

/// Two convolution blocks and a final plain convolution.
struct HeadBranch {
    block0: ConvBlock,
    block1: ConvBlock,
    conv: Conv2d,
}

impl HeadBranch {
    fn load(vb: VarBuilder, filter: usize, hidden: usize, outputs: usize) -> Result<Self> {
        Ok(Self {
            block0: ConvBlock::load(vb.pp("0"), filter, hidden, 3, 1, None)?,
            block1: ConvBlock::load(vb.pp("1"), hidden, hidden, 3, 1, None)?,
            conv: conv2d(hidden, outputs, 1, Default::default(), vb.pp("2"))?,
        })
    }
}

impl Module for HeadBranch {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.block1.forward(&self.block0.forward(xs)?)?;
        self.conv.forward(&xs)
    }
}

const DFL_BINS: usize = 16;
const STRIDES: [usize; 3] = [8, 16, 32];

struct DetectionHead {
    dfl: Dfl,
    /// Box regression, one branch per stride.
    cv2: Vec<HeadBranch>,
    /// Class scores, one branch per stride.
    cv3: Vec<HeadBranch>,
    num_outputs: usize,
}

impl DetectionHead {
    fn load(vb: VarBuilder, num_classes: usize, filters: (usize, usize, usize)) -> Result<Self> {
        let filters = [filters.0, filters.1, filters.2];
        let c_cls = usize::max(filters[0], num_classes);
        let c_box = usize::max(filters[0] / 4, DFL_BINS * 4);
        let mut cv2 = Vec::with_capacity(3);
        let mut cv3 = Vec::with_capacity(3);
        for (idx, &filter) in filters.iter().enumerate() {
            cv2.push(HeadBranch::load(vb.pp(format!("cv2.{idx}")), filter, c_box, 4 * DFL_BINS)?);
            cv3.push(HeadBranch::load(vb.pp(format!("cv3.{idx}")), filter, c_cls, num_classes)?);
        }
        Ok(Self {
            dfl: Dfl::load(vb.pp("dfl"), DFL_BINS)?,
            cv2,
            cv3,
            num_outputs: num_classes + DFL_BINS * 4,
        })
    }

    /// Returns `(batch, 4 + num_classes, anchors)`: center x, center y,
    /// width and height in input pixels, then per-class probabilities.
    fn forward(&self, features: [&Tensor; 3]) -> Result<Tensor> {
        let mut outputs = Vec::with_capacity(3);
        for (idx, xs) in features.iter().enumerate() {
            let boxes = self.cv2[idx].forward(xs)?;
            let classes = self.cv3[idx].forward(xs)?;
            outputs.push(Tensor::cat(&[&boxes, &classes], 1)?);
        }
        let (anchors, strides) = make_anchors(&outputs, 0.5)?;
        let anchors = anchors.transpose(0, 1)?.unsqueeze(0)?;
        let strides = strides.transpose(0, 1)?;

        let flattened = outputs
            .iter()
            .map(|xs| {
                let b_size = xs.dim(0)?;
                xs.reshape((b_size, self.num_outputs, ()))
            })
            .collect::<Result<Vec<_>>>()?;
        let x_cat = Tensor::cat(flattened.as_slice(), 2)?;
        let box_ = x_cat.i((.., ..DFL_BINS * 4))?;
        let cls = x_cat.i((.., DFL_BINS * 4..))?;
        let dbox = dist2bbox(&self.dfl.forward(&box_)?, &anchors)?;
        let dbox = dbox.broadcast_mul(&strides)?;
        Tensor::cat(&[&dbox, &candle_nn::ops::sigmoid(&cls)?], 1)
    }
}

/// Cell centers in grid units and the stride of each cell, over all levels.
fn make_anchors(levels: &[Tensor], grid_cell_offset: f64) -> Result<(Tensor, Tensor)> {
    let mut anchor_points = Vec::with_capacity(levels.len());
    let mut stride_tensor = Vec::with_capacity(levels.len());
    for (xs, stride) in levels.iter().zip(STRIDES) {
        let dev = xs.device();
        let (_, _, h, w) = xs.dims4()?;
        let sx = (Tensor::arange(0, w as u32, dev)?.to_dtype(DType::F32)? + grid_cell_offset)?;
        let sy = (Tensor::arange(0, h as u32, dev)?.to_dtype(DType::F32)? + grid_cell_offset)?;
        let sx = sx.reshape((1, w))?.repeat((h, 1))?.flatten_all()?;
        let sy = sy.reshape((h, 1))?.repeat((1, w))?.flatten_all()?;
        anchor_points.push(Tensor::stack(&[&sx, &sy], D::Minus1)?);
        stride_tensor.push((Tensor::ones(h * w, DType::F32, dev)? * stride as f64)?);
    }
    let anchor_points = Tensor::cat(anchor_points.as_slice(), 0)?;
    let stride_tensor = Tensor::cat(stride_tensor.as_slice(), 0)?.unsqueeze(1)?;
    Ok((anchor_points, stride_tensor))
}

/// Turns left/top/right/bottom distances into center and size.
fn dist2bbox(distance: &Tensor, anchor_points: &Tensor) -> Result<Tensor> {
    let chunks = distance.chunk(2, 1)?;
    let x1y1 = anchor_points.broadcast_sub(&chunks[0])?;
    let x2y2 = anchor_points.broadcast_add(&chunks[1])?;
    let c_xy = ((&x1y1 + &x2y2)? * 0.5)?;
    let wh = (&x2y2 - &x1y1)?;
    Tensor::cat(&[&c_xy, &wh], 1)
}

pub struct YoloV8 {
    net: DarkNet,
    fpn: Neck,
    head: DetectionHead,
}

impl YoloV8 {
    pub fn load(vb: VarBuilder, m: Multiples, num_classes: usize) -> Result<Self> {
        Ok(Self {
            net: DarkNet::load(vb.pp("net"), m)?,
            fpn: Neck::load(vb.pp("fpn"), m)?,
            head: DetectionHead::load(vb.pp("head"), num_classes, m.filters())?,
        })
    }
}

impl Module for YoloV8 {
    /// Takes `(batch, 3, h, w)` RGB in `[0, 1]` with `h` and `w` multiples of 32.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (xs1, xs2, xs3) = self.net.forward(xs)?;
        let (xs1, xs2, xs3) = self.fpn.forward(&xs1, &xs2, &xs3)?;
        self.head.forward([&xs1, &xs2, &xs3])
    }
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    #[test]
    fn output_has_one_column_per_anchor() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = YoloV8::load(vb, Multiples::n(), 80).unwrap();
        let input = Tensor::zeros((1, 3, 64, 96), DType::F32, &Device::Cpu).unwrap();
        let output = model.forward(&input).unwrap();
        // 8x12 + 4x6 + 2x3 cells
        assert_eq!(output.dims(), &[1, 84, 96 + 24 + 6]);
    }

    #[test]
    fn anchors_are_cell_centers() {
        let level = Tensor::zeros((1, 1, 2, 3), DType::F32, &Device::Cpu).unwrap();
        let (anchors, strides) = make_anchors(&[level], 0.5).unwrap();
        assert_eq!(
            anchors.to_vec2::<f32>().unwrap(),
            vec![
                vec![0.5, 0.5],
                vec![1.5, 0.5],
                vec![2.5, 0.5],
                vec![0.5, 1.5],
                vec![1.5, 1.5],
                vec![2.5, 1.5],
            ]
        );
        assert_eq!(strides.dims(), &[6, 1]);
        assert_eq!(strides.flatten_all().unwrap().to_vec1::<f32>().unwrap(), vec![8.0; 6]);
    }

    #[test]
    fn distances_become_center_and_size() {
        let dev = Device::Cpu;
        // One anchor at (4, 4), distances left 1, top 2, right 3, bottom 4
        let distance = Tensor::new(&[[[1f32], [2.], [3.], [4.]]], &dev).unwrap();
        let anchors = Tensor::new(&[[[4f32], [4.]]], &dev).unwrap();
        let decoded = dist2bbox(&distance, &anchors).unwrap();
        assert_eq!(
            decoded.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![5.0, 5.0, 4.0, 6.0]
        );
    }
}
