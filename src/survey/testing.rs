//! Test doubles shared by the cascade and runner tests.

use image::DynamicImage;
use std::sync::Mutex;

use crate::ocr::{PageSegMode, TextRecognizer};

/// Recognizer backed by a closure. Remembers the size and mode of every call.
pub struct FakeRecognizer<F> {
    respond: F,
    calls: Mutex<Vec<(u32, u32, PageSegMode)>>,
}

impl<F> FakeRecognizer<F>
where
    F: Fn(&DynamicImage, PageSegMode) -> String + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(u32, u32, PageSegMode)> {
        self.calls.lock().unwrap().clone()
    }
}

impl<F> TextRecognizer for FakeRecognizer<F>
where
    F: Fn(&DynamicImage, PageSegMode) -> String + Send + Sync,
{
    fn recognize(&self, image: &DynamicImage, mode: PageSegMode) -> String {
        self.calls
            .lock()
            .unwrap()
            .push((image.width(), image.height(), mode));
        (self.respond)(image, mode)
    }
}
