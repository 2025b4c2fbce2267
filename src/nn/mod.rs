//! Neural Network inference.

pub mod tensor;

use crate::image::{Color, Image, Resolution};
use tensor::Tensor;
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads and optimizes a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension. Returns an error if the file cannot be read, if the
    /// network data is malformed, or if the network uses unimplemented operations.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model = tract_onnx::onnx()
            .model_for_path(path)?
            .into_optimized()?
            .into_runnable()?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the tensor shape of the input node `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.0.model().input_fact(index)?;
        let shape = fact
            .shape
            .as_concrete()
            .ok_or_else(|| anyhow::anyhow!("symbolic network input shape"))?;
        Ok(shape.to_vec())
    }

    /// Runs the network on a single input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: &Tensor) -> anyhow::Result<Outputs> {
        let outputs = self
            .0
            .run(tvec!(TValue::from_const(Arc::new(input.to_tract()))))?;
        let outputs = outputs
            .into_iter()
            .map(|tract| Tensor::from_tract(&tract))
            .collect();
        Ok(Outputs { inner: outputs })
    }
}

/// The result of a neural network inference pass.
///
/// The contained output tensors can be accessed by indexing.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Returns the number of output tensors.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input whose shape is `[1, 3, H, W]` (NCHW image data).
    pub fn new(nn: NeuralNetwork, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn)?;

        Ok(Self {
            nn,
            input_res,
            color_mapper,
        })
    }

    fn get_input_res(nn: &NeuralNetwork) -> anyhow::Result<Resolution> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let shape = nn.input_shape(0)?;
        let (w, h) = match *shape {
            [1, 3, h, w] => (w, h),
            _ => anyhow::bail!("invalid model input shape for NCHW CNN: {:?}", shape),
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Returns the resolution of the letterboxed source region that [`Cnn::estimate`] samples from
    /// `image`.
    ///
    /// Landmark coordinates in the network's input coordinate system map back to image pixels by
    /// scaling with `source_resolution(image).width() / input_resolution().width()`.
    pub fn source_resolution(&self, image: &Image) -> Resolution {
        match self.input_res.aspect_ratio() {
            Some(ratio) => image.resolution().grow_to_fit_aspect(ratio),
            None => image.resolution(),
        }
    }

    /// Runs the network on an input image, returning the estimated outputs.
    ///
    /// If the image's aspect ratio does not match the network's input aspect ratio, the sampled
    /// region is extended to the right or bottom and padded with black, so the image content is
    /// never stretched.
    pub fn estimate(&self, image: &Image) -> anyhow::Result<Outputs> {
        let src = self.source_resolution(image);
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );

        let sample = |u: f32, v: f32| -> Color {
            let x = (u * src.width() as f32).round() as u32;
            let y = (v * src.height() as f32).round() as u32;
            if x < image.width() && y < image.height() {
                image.get(x, y)
            } else {
                Color::BLACK
            }
        };

        let tensor = Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| {
            self.color_mapper
                .map(sample(x as f32 / w as f32, y as f32 / h as f32))[c]
        });

        self.nn.estimate(&tensor)
    }
}

enum ColorMapperKind {
    Linear { target_range: RangeInclusive<f32> },
}

/// Maps sRGB color values to the value range a network expects.
pub struct ColorMapper {
    kind: ColorMapperKind,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range. The assumption is that sRGB is the color space most CNNs expect their inputs to be
    /// in, but in practice none of them document this.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            kind: ColorMapperKind::Linear { target_range },
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        match &self.kind {
            ColorMapperKind::Linear { target_range } => {
                let start = *target_range.start();
                let end = *target_range.end();

                let adjust_range = (end - start) / 255.0;
                let rgb = [color.r(), color.g(), color.b()];
                rgb.map(|col| col as f32 * adjust_range + start)
            }
        }
    }
}

impl Clone for ColorMapper {
    fn clone(&self) -> Self {
        match &self.kind {
            ColorMapperKind::Linear { target_range } => Self::linear(target_range.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper_linear() {
        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);
    }
}
