//! Pipeline orchestration - drives one job from source image to stitched result.

use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};

use crate::config::{Config, TilingConfig};
use crate::detect::{DetectionService, HttpDetector, TileRequest};
use crate::error::{PipelineError, PipelineResult};
use crate::tiling::{encode_png, extract_tile, EncodedTile, TileGrid};
use crate::types::{Anchor, JobReport, JobResult, ProcessedTile, TileRecord};

use super::composite::composite;
use super::decode::ImageDecoder;
use super::state::{JobState, JobStatus, StatusTracker};
use super::validate::Validator;

/// Per-job switches.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Binarize each tile before it is sent
    pub apply_threshold: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            apply_threshold: true,
        }
    }
}

impl From<&TilingConfig> for JobOptions {
    fn from(config: &TilingConfig) -> Self {
        Self {
            apply_threshold: config.apply_threshold,
        }
    }
}

/// Where the source came from, carried into the report.
#[derive(Default)]
struct Origin {
    source: Option<PathBuf>,
    content_hash: Option<String>,
}

/// Internal steps; each maps onto a published [`JobState`].
enum Step {
    Extract(usize),
    Await(usize, EncodedTile),
    Composite,
}

/// Runs tiling jobs against a detection service, one tile at a time.
pub struct TilePipeline {
    tile_size: u32,
    detector: Box<dyn DetectionService>,
    decoder: ImageDecoder,
    validator: Validator,
    status: StatusTracker,
    job_lock: Mutex<()>,
}

impl TilePipeline {
    /// Create a pipeline around any detection service.
    pub fn new(config: &Config, detector: Box<dyn DetectionService>) -> Self {
        Self {
            tile_size: config.tiling.tile_size,
            detector,
            decoder: ImageDecoder::new(config.limits.clone()),
            validator: Validator::new(config.limits.clone()),
            status: StatusTracker::new(),
            job_lock: Mutex::new(()),
        }
    }

    /// Create a pipeline talking to the configured HTTP detection server.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Box::new(HttpDetector::new(&config.detector)))
    }

    /// Override the tile edge length.
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn detector(&self) -> &dyn DetectionService {
        self.detector.as_ref()
    }

    /// Watch job status; the receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Latest job status.
    pub fn status(&self) -> JobStatus {
        self.status.current()
    }

    /// Plan the tile grid for an image of the given size.
    pub fn plan(&self, width: u32, height: u32) -> PipelineResult<TileGrid> {
        TileGrid::plan(width, height, self.tile_size)
    }

    /// Validate, decode and process an image file.
    pub async fn process_path(
        &self,
        path: &Path,
        options: &JobOptions,
    ) -> PipelineResult<JobResult> {
        let _job = self.job_lock.lock().await;
        let _active = self.status.begin();

        let outcome = async {
            self.validator.validate(path)?;
            let decoded = self.decoder.decode(path).await?;
            tracing::debug!(
                "Decoded {:?} ({}x{}, {} bytes)",
                path,
                decoded.width,
                decoded.height,
                decoded.file_size
            );
            let origin = Origin {
                source: Some(path.to_path_buf()),
                content_hash: Some(decoded.content_hash),
            };
            self.execute(decoded.image.to_rgba8(), origin, options)
                .await
        }
        .await;

        self.finish(outcome)
    }

    /// Process an already decoded image.
    pub async fn process_image(
        &self,
        image: &DynamicImage,
        options: &JobOptions,
    ) -> PipelineResult<JobResult> {
        let _job = self.job_lock.lock().await;
        let _active = self.status.begin();
        let outcome = self
            .execute(image.to_rgba8(), Origin::default(), options)
            .await;
        self.finish(outcome)
    }

    fn finish(&self, outcome: PipelineResult<JobResult>) -> PipelineResult<JobResult> {
        match &outcome {
            Ok(result) => {
                self.status.transition(JobState::Done);
                tracing::info!(
                    "Job finished: {} tiles in {}ms",
                    result.report.tile_count(),
                    result.report.elapsed_ms
                );
            }
            Err(e) => {
                self.status.transition(JobState::Failed {
                    reason: e.to_string(),
                });
                tracing::debug!("Job failed: {e}");
            }
        }
        outcome
    }

    /// Plan, then step through extract/await per tile, then composite.
    async fn execute(
        &self,
        source: RgbaImage,
        origin: Origin,
        options: &JobOptions,
    ) -> PipelineResult<JobResult> {
        let start = Instant::now();
        let (width, height) = source.dimensions();
        let source = Arc::new(source);
        let grid = self.plan(width, height)?;
        let anchors: Vec<Anchor> = grid.anchors().collect();
        let total = anchors.len();
        self.status.set_total(total);

        tracing::debug!(
            "Planned {} tiles of {}px for {}x{} ({} columns x {} rows)",
            total,
            self.tile_size,
            width,
            height,
            grid.columns().len(),
            grid.rows().len()
        );

        let mut processed: Vec<ProcessedTile> = Vec::with_capacity(total);
        let mut records: Vec<TileRecord> = Vec::with_capacity(total);
        let mut step = Step::Extract(0);

        let (image, png) = loop {
            step = match step {
                Step::Extract(index) => {
                    self.status.transition(JobState::Extracting { index });
                    let source = Arc::clone(&source);
                    let anchor = anchors[index];
                    let (tile_size, apply_threshold) = (self.tile_size, options.apply_threshold);
                    let tile = tokio::task::spawn_blocking(move || {
                        extract_tile(&source, anchor, tile_size, apply_threshold)
                    })
                    .await
                    .map_err(join_error)??;
                    Step::Await(index, tile)
                }
                Step::Await(index, tile) => {
                    self.status.transition(JobState::Awaiting { index });
                    let (done, record) = self.submit(index, tile).await?;
                    processed.push(done);
                    records.push(record);
                    self.status.complete_tile();

                    if index + 1 < total {
                        Step::Extract(index + 1)
                    } else {
                        Step::Composite
                    }
                }
                Step::Composite => {
                    self.status.transition(JobState::Compositing);
                    let stitched = tokio::task::spawn_blocking(move || {
                        let canvas = composite(width, height, &processed);
                        encode_png(&canvas).map(|png| (canvas, png))
                    })
                    .await
                    .map_err(join_error)??;
                    break stitched;
                }
            };
        };

        Ok(JobResult {
            image,
            png,
            report: JobReport {
                source: origin.source,
                content_hash: origin.content_hash,
                width,
                height,
                tile_size: self.tile_size,
                apply_threshold: options.apply_threshold,
                columns: grid.columns().len(),
                rows: grid.rows().len(),
                tiles: records,
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Send one tile and turn the response into a [`ProcessedTile`].
    async fn submit(
        &self,
        index: usize,
        tile: EncodedTile,
    ) -> PipelineResult<(ProcessedTile, TileRecord)> {
        let started = Instant::now();
        let payload_bytes = tile.png.len();
        let request = TileRequest {
            index,
            anchor: tile.anchor,
            png: tile.png,
        };

        let body = self.detector.detect(&request).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let image = image::load_from_memory(&body)
            .map_err(|e| PipelineError::Detection {
                tile_index: index,
                message: format!("Response is not a readable image: {e}"),
                status_code: None,
            })?
            .to_rgba8();

        let (actual_width, actual_height) = image.dimensions();
        if (actual_width, actual_height) != (self.tile_size, self.tile_size) {
            return Err(PipelineError::DimensionMismatch {
                tile_index: index,
                expected: self.tile_size,
                actual_width,
                actual_height,
            });
        }

        tracing::trace!(
            "Tile {} at {} done in {}ms (threshold {:?})",
            index,
            tile.anchor,
            latency_ms,
            tile.threshold
        );

        Ok((
            ProcessedTile {
                index,
                anchor: tile.anchor,
                image,
            },
            TileRecord {
                index,
                anchor: tile.anchor,
                threshold: tile.threshold,
                payload_bytes,
                latency_ms,
            },
        ))
    }
}

fn join_error(e: tokio::task::JoinError) -> PipelineError {
    PipelineError::Encode(format!("Task join error: {e}"))
}
