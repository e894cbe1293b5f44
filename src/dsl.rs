// src/dsl.rs
//
// The Image handle: a fluent DSL over one encoded image buffer.
//
// Every transformation builds an Options record and hands it to the
// processor. A successful call replaces the buffer wholesale; a failed call
// leaves it exactly as it was.

use crate::engine::{NativeEngine, Processor};
use crate::error::Result;
use crate::options::{
    Angle, Gravity, ImageMetadata, ImageSize, ImageType, Interpretation, Options,
};
use crate::pool::BufferPool;
use std::sync::Arc;
use tracing::{debug, trace};

/// An encoded image plus the processor that transforms it.
///
/// Between calls the buffer is always a complete encoded image. Mutation
/// takes `&mut self`, so a handle cannot be processed concurrently; share
/// the processor instead (see [`Processor`] impls for `&P` and `Arc<P>`).
#[derive(Debug)]
pub struct Image<P: Processor = NativeEngine> {
    buffer: Vec<u8>,
    processor: P,
    pool: Option<Arc<BufferPool>>,
}

impl Image<NativeEngine> {
    /// Wrap `buffer` with a default [`NativeEngine`]. The bytes are not
    /// validated until the first call that needs them.
    pub fn new(buffer: Vec<u8>) -> Self {
        Self::with_processor(buffer, NativeEngine::default())
    }
}

impl<P: Processor> Image<P> {
    pub fn with_processor(buffer: Vec<u8>, processor: P) -> Self {
        Self {
            buffer,
            processor,
            pool: None,
        }
    }

    /// Return replaced buffers to `pool` instead of dropping them.
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Fit inside `width x height` and pad to exactly that box.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<&[u8]> {
        self.process(&Options::resize(width, height))
    }

    /// Resample to exactly `width x height`.
    pub fn force_resize(&mut self, width: u32, height: u32) -> Result<&[u8]> {
        self.process(&Options::force_resize(width, height))
    }

    pub fn resize_and_crop(&mut self, width: u32, height: u32) -> Result<&[u8]> {
        self.process(&Options::resize_and_crop(width, height))
    }

    pub fn smart_crop(&mut self, width: u32, height: u32) -> Result<&[u8]> {
        self.process(&Options::smart_crop(width, height))
    }

    /// Cut `width x height` at (`left`, `top`). See [`Options::extract`] for
    /// how an origin offset is dispatched.
    pub fn extract(&mut self, top: i32, left: i32, width: u32, height: u32) -> Result<&[u8]> {
        self.process(&Options::extract(top, left, width, height))
    }

    pub fn enlarge(&mut self, width: u32, height: u32) -> Result<&[u8]> {
        self.process(&Options::enlarge(width, height))
    }

    pub fn enlarge_and_crop(&mut self, width: u32, height: u32) -> Result<&[u8]> {
        self.process(&Options::enlarge_and_crop(width, height))
    }

    pub fn crop(&mut self, width: u32, height: u32, gravity: Gravity) -> Result<&[u8]> {
        self.process(&Options::crop(width, height, gravity))
    }

    pub fn crop_by_width(&mut self, width: u32) -> Result<&[u8]> {
        self.process(&Options::crop_by_width(width))
    }

    pub fn crop_by_height(&mut self, height: u32) -> Result<&[u8]> {
        self.process(&Options::crop_by_height(height))
    }

    /// Square `pixels x pixels` crop at thumbnail quality.
    pub fn thumbnail(&mut self, pixels: u32) -> Result<&[u8]> {
        self.process(&Options::thumbnail(pixels))
    }

    pub fn auto_rotate(&mut self) -> Result<&[u8]> {
        self.process(&Options::auto_rotate())
    }

    pub fn rotate(&mut self, angle: Angle) -> Result<&[u8]> {
        self.process(&Options::rotate(angle))
    }

    pub fn flip(&mut self) -> Result<&[u8]> {
        self.process(&Options::flip())
    }

    pub fn flop(&mut self) -> Result<&[u8]> {
        self.process(&Options::flop())
    }

    pub fn convert(&mut self, image_type: ImageType) -> Result<&[u8]> {
        self.process(&Options::convert(image_type))
    }

    /// Run `options` through the processor. The processor's error is
    /// returned as is and the buffer is left untouched.
    pub fn process(&mut self, options: &Options) -> Result<&[u8]> {
        let output = self.processor.resize(&self.buffer, options)?;
        self.commit(output);
        Ok(&self.buffer)
    }

    /// Queue several transformations and apply them all-or-nothing.
    pub fn pipeline(&mut self) -> Pipeline<'_, P> {
        Pipeline {
            image: self,
            steps: Vec::new(),
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.buffer
    }

    pub fn length(&self) -> usize {
        self.buffer.len()
    }

    pub fn metadata(&self) -> Result<ImageMetadata> {
        self.processor.metadata(&self.buffer)
    }

    pub fn interpretation(&self) -> Result<Interpretation> {
        self.processor.interpretation(&self.buffer)
    }

    pub fn colourspace_is_supported(&self) -> Result<bool> {
        self.processor.colourspace_is_supported(&self.buffer)
    }

    pub fn image_type(&self) -> ImageType {
        self.processor.image_type(&self.buffer)
    }

    /// Lower-case type name, `"unknown"` when unrecognised.
    pub fn type_name(&self) -> &'static str {
        self.image_type().name()
    }

    pub fn size(&self) -> Result<ImageSize> {
        self.processor.size(&self.buffer)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    fn commit(&mut self, output: Vec<u8>) {
        trace!(
            target: "image_dsl::dsl",
            old_len = self.buffer.len(),
            new_len = output.len(),
            "buffer replaced"
        );
        let previous = std::mem::replace(&mut self.buffer, output);
        self.recycle(previous);
    }

    fn recycle(&self, buf: Vec<u8>) {
        if let Some(pool) = &self.pool {
            pool.release(buf);
        }
    }
}

/// Deferred, all-or-nothing sequence of transformations on one handle.
///
/// Steps run in the order they were queued, each on the previous step's
/// output. The handle only changes if every step succeeds.
#[must_use = "a pipeline does nothing until run() is called"]
pub struct Pipeline<'a, P: Processor> {
    image: &'a mut Image<P>,
    steps: Vec<Options>,
}

impl<'a, P: Processor> Pipeline<'a, P> {
    /// Queue an arbitrary Options record.
    pub fn then(mut self, options: Options) -> Self {
        self.steps.push(options);
        self
    }

    pub fn resize(self, width: u32, height: u32) -> Self {
        self.then(Options::resize(width, height))
    }

    pub fn force_resize(self, width: u32, height: u32) -> Self {
        self.then(Options::force_resize(width, height))
    }

    pub fn resize_and_crop(self, width: u32, height: u32) -> Self {
        self.then(Options::resize_and_crop(width, height))
    }

    pub fn smart_crop(self, width: u32, height: u32) -> Self {
        self.then(Options::smart_crop(width, height))
    }

    pub fn extract(self, top: i32, left: i32, width: u32, height: u32) -> Self {
        self.then(Options::extract(top, left, width, height))
    }

    pub fn enlarge(self, width: u32, height: u32) -> Self {
        self.then(Options::enlarge(width, height))
    }

    pub fn enlarge_and_crop(self, width: u32, height: u32) -> Self {
        self.then(Options::enlarge_and_crop(width, height))
    }

    pub fn crop(self, width: u32, height: u32, gravity: Gravity) -> Self {
        self.then(Options::crop(width, height, gravity))
    }

    pub fn crop_by_width(self, width: u32) -> Self {
        self.then(Options::crop_by_width(width))
    }

    pub fn crop_by_height(self, height: u32) -> Self {
        self.then(Options::crop_by_height(height))
    }

    pub fn thumbnail(self, pixels: u32) -> Self {
        self.then(Options::thumbnail(pixels))
    }

    pub fn auto_rotate(self) -> Self {
        self.then(Options::auto_rotate())
    }

    pub fn rotate(self, angle: Angle) -> Self {
        self.then(Options::rotate(angle))
    }

    pub fn flip(self) -> Self {
        self.then(Options::flip())
    }

    pub fn flop(self) -> Self {
        self.then(Options::flop())
    }

    pub fn convert(self, image_type: ImageType) -> Self {
        self.then(Options::convert(image_type))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Options] {
        &self.steps
    }

    /// Apply every queued step. On the first failure the error is returned
    /// and the handle keeps its pre-pipeline buffer.
    pub fn run(self) -> Result<&'a [u8]> {
        let Pipeline { image, steps } = self;
        let mut working: Option<Vec<u8>> = None;

        for (index, options) in steps.iter().enumerate() {
            let input = working.as_deref().unwrap_or(&image.buffer);
            match image.processor.resize(input, options) {
                Ok(next) => {
                    if let Some(previous) = working.replace(next) {
                        image.recycle(previous);
                    }
                }
                Err(err) => {
                    debug!(
                        target: "image_dsl::dsl",
                        step = index,
                        steps = steps.len(),
                        error = %err,
                        "pipeline aborted"
                    );
                    if let Some(partial) = working.take() {
                        image.recycle(partial);
                    }
                    return Err(err);
                }
            }
        }

        if let Some(result) = working {
            image.commit(result);
        }
        Ok(&image.buffer)
    }
}
