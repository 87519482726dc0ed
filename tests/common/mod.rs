#![allow(dead_code)]

use std::io::Cursor;

use actix_web::{http::header, test::TestRequest};
use candle::{Device, Module, Tensor};
use candle_nn::Linear;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use species_classifier::labels::ClassLabels;
use species_classifier::models::ClassifierModel;
use species_classifier::prediction::PredictionService;
use species_classifier::preprocess::ImagePreprocessor;
use species_classifier::state::AppState;

pub const LABELS: [&str; 4] = ["Aloe Vera", "Monstera Deliciosa", "Snake plant", "ZZ Plant"];

pub const BOUNDARY: &str = "species-test-boundary";

/// Averages each channel and feeds the three means through a linear head.
struct ChannelMeans(Linear);

impl Module for ChannelMeans {
    fn forward(&self, xs: &Tensor) -> candle::Result<Tensor> {
        xs.mean((2, 3))?.apply(&self.0)
    }
}

pub fn prediction_service() -> PredictionService {
    let device = Device::Cpu;
    let weight = Tensor::new(
        &[
            [1.0f32, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.3, 0.3, 0.3],
        ],
        &device,
    )
    .unwrap();
    let model = ClassifierModel::from_module(
        ChannelMeans(Linear::new(weight, None)),
        LABELS.len(),
    );
    let labels: ClassLabels = LABELS.into_iter().collect();
    PredictionService::new(ImagePreprocessor::new(device), model, labels).unwrap()
}

pub fn ready_state() -> AppState {
    AppState::ready(prediction_service())
}

pub fn encode(color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(320, 240, |x, y| {
        Rgb([
            color[0].saturating_sub((x % 16) as u8),
            color[1].saturating_sub((y % 16) as u8),
            color[2],
        ])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

/// A single-part multipart/form-data body. `filename: None` produces a plain
/// form field rather than a file part.
pub fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let mut body = format!("--{BOUNDARY}\r\n").into_bytes();
    let disposition = match filename {
        Some(filename) => format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        ),
        None => format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n"),
    };
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn predict_request(body: Vec<u8>) -> TestRequest {
    TestRequest::post()
        .uri("/predict")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

pub fn upload(filename: &str, content: &[u8]) -> TestRequest {
    predict_request(multipart_body("file", Some(filename), content))
}
