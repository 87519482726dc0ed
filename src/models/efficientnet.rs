// EfficientNet-B0 classifier with a fine-tuned head
use std::path::Path;

use candle::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::efficientnet::{EfficientNet, MBConvConfig};

use crate::error::StartupError;

/// A loaded image classifier. Weights are immutable after construction and
/// `infer` only takes `&self`, so one instance is shared by every request.
pub struct ClassifierModel {
    model: Box<dyn Module + Send + Sync>,
    num_classes: usize,
}

impl ClassifierModel {
    /// Loads torchvision-style EfficientNet-B0 weights (`features.*`,
    /// `classifier.1.*`) from a safetensors file or a PyTorch state dict.
    pub fn load(
        weights_path: impl AsRef<Path>,
        num_classes: usize,
        device: Device,
    ) -> Result<Self, StartupError> {
        let weights_path = weights_path.as_ref();
        if !weights_path.is_file() {
            return Err(StartupError::WeightsNotFound {
                path: weights_path.to_path_buf(),
            });
        }
        let to_startup_error = |source| StartupError::Weights {
            path: weights_path.to_path_buf(),
            source,
        };

        let variable_builder = match weights_path.extension().and_then(|ext| ext.to_str()) {
            Some("safetensors") => unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                    .map_err(to_startup_error)?
            },
            _ => VarBuilder::from_pth(weights_path, DType::F32, &device).map_err(to_startup_error)?,
        };
        let model =
            Self::from_var_builder(variable_builder, num_classes).map_err(to_startup_error)?;

        log::info!("Model weights loaded from {:?}", weights_path);
        Ok(model)
    }

    pub fn from_var_builder(variable_builder: VarBuilder, num_classes: usize) -> candle::Result<Self> {
        let network = EfficientNet::new(variable_builder, MBConvConfig::b0(), num_classes)?;
        Ok(Self::from_module(network, num_classes))
    }

    /// Wraps any network producing `[batch, num_classes]` scores.
    pub fn from_module(module: impl Module + Send + Sync + 'static, num_classes: usize) -> Self {
        Self {
            model: Box::new(module),
            num_classes,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Forward pass returning unnormalized class scores.
    pub fn infer(&self, input: &Tensor) -> candle::Result<Tensor> {
        self.model.forward(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;
    use std::io::Write;

    fn small_input(device: &Device) -> Tensor {
        Tensor::zeros((1, 3, 32, 32), DType::F32, device).unwrap()
    }

    #[test]
    fn missing_weights_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("house_plant_classifier_v1.pth");

        let err = ClassifierModel::load(&path, 47, Device::Cpu).err().unwrap();
        assert!(matches!(err, StartupError::WeightsNotFound { path: p } if p == path));
    }

    #[test]
    fn malformed_safetensors_file_is_reported() {
        let mut file = tempfile::Builder::new()
            .suffix(".safetensors")
            .tempfile()
            .unwrap();
        file.write_all(b"not a safetensors file").unwrap();

        let err = ClassifierModel::load(file.path(), 47, Device::Cpu).err().unwrap();
        assert!(matches!(err, StartupError::Weights { .. }));
    }

    #[test]
    fn malformed_pytorch_file_is_reported() {
        let mut file = tempfile::Builder::new().suffix(".pth").tempfile().unwrap();
        file.write_all(b"not a zip archive of pickled tensors").unwrap();

        let err = ClassifierModel::load(file.path(), 47, Device::Cpu).err().unwrap();
        assert!(matches!(err, StartupError::Weights { .. }));
    }

    #[test]
    fn saved_weights_load_back_with_matching_head() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let trained = ClassifierModel::from_var_builder(
            VarBuilder::from_varmap(&varmap, DType::F32, &device),
            6,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("house_plant_classifier_v1.safetensors");
        varmap.save(&path).unwrap();

        let loaded = ClassifierModel::load(&path, 6, device.clone()).unwrap();
        assert_eq!(loaded.num_classes(), 6);

        let input = small_input(&device);
        let expected: Vec<Vec<f32>> = trained.infer(&input).unwrap().to_vec2().unwrap();
        let scores = loaded.infer(&input).unwrap();
        assert_eq!(scores.dims(), &[1, 6]);
        assert_eq!(scores.to_vec2::<f32>().unwrap(), expected);
    }

    #[test]
    fn saved_weights_reject_a_different_class_count() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        ClassifierModel::from_var_builder(VarBuilder::from_varmap(&varmap, DType::F32, &device), 6)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        varmap.save(&path).unwrap();

        let err = ClassifierModel::load(&path, 47, device).err().unwrap();
        assert!(matches!(err, StartupError::Weights { .. }));
    }

    #[test]
    fn efficientnet_head_matches_class_count() {
        let device = Device::Cpu;
        let model =
            ClassifierModel::from_var_builder(VarBuilder::zeros(DType::F32, &device), 5).unwrap();

        let scores = model.infer(&small_input(&device)).unwrap();
        assert_eq!(scores.dims(), &[1, 5]);
        assert_eq!(model.num_classes(), 5);
    }
}
