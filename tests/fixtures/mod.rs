//! Status payloads and images shared by the integration tests

#![allow(dead_code)]

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};

pub const JOB_ID: &str = "abc123";

pub fn queued() -> Value {
    json!({ "job_id": JOB_ID, "status": "queued" })
}

pub fn processing(progress: &str) -> Value {
    json!({ "job_id": JOB_ID, "status": "processing", "progress": progress })
}

/// Successful terminal payload using the given success spelling.
pub fn finished(spelling: &str) -> Value {
    json!({
        "job_id": JOB_ID,
        "status": spelling,
        "results": {
            "num_changes": 2,
            "changes": [
                { "id": 1, "bbox": [12, 40, 96, 120], "part": "front_wing", "confidence": 0.93 },
                { "id": 2, "bbox": [200.5, 18.0, 260.0, 75.25], "part": "mirror", "confidence": 0.61 }
            ]
        },
        "image_urls": {
            "baseline": format!("/images/{}/baseline", JOB_ID),
            "current": format!("/images/{}/current", JOB_ID),
            "combined": format!("/images/{}/combined", JOB_ID)
        }
    })
}

pub fn failed(error: Option<&str>) -> Value {
    match error {
        Some(error) => json!({ "job_id": JOB_ID, "status": "failed", "error": error }),
        None => json!({ "job_id": JOB_ID, "status": "failed" }),
    }
}

fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .expect("Failed to encode fixture image");
    out.into_inner()
}

/// Small PNG standing in for the baseline photo.
pub fn baseline_png() -> Vec<u8> {
    encode(RgbImage::from_pixel(4, 3, Rgb([30, 30, 30])), ImageFormat::Png)
}

/// Small JPEG standing in for the current photo.
pub fn current_jpeg() -> Vec<u8> {
    encode(RgbImage::from_pixel(4, 3, Rgb([200, 40, 40])), ImageFormat::Jpeg)
}
