//! Asynchronous decode of delivered image payloads.
//!
//! Each delivery starts a new batch tagged with a generation number. Decodes
//! run on a thread pool and report back over a channel; [`ImageLoader::pump`]
//! drains the channel on the caller's thread. Results from a superseded
//! generation are dropped, and a failed decode still counts toward batch
//! completion so the batch always finishes.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbaImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use threadpool::ThreadPool;

use crate::error::{CompareError, Result};

pub type SharedImage = Arc<RgbaImage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn label(&self) -> char {
        match self {
            Slot::A => 'A',
            Slot::B => 'B',
        }
    }
}

/// Inbound image-delivery event for one panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDelivery {
    pub node_id: String,
    /// Base64 encoded PNG, absent to clear the slot.
    #[serde(default)]
    pub image_a_data: Option<String>,
    #[serde(default)]
    pub image_b_data: Option<String>,
    /// Human readable resolution, e.g. "512 × 512".
    #[serde(default)]
    pub image_a_res: Option<String>,
    #[serde(default)]
    pub image_b_res: Option<String>,
}

impl ImageDelivery {
    /// Build a delivery from encoded image files.
    pub fn from_encoded(node_id: impl Into<String>, a: Option<&[u8]>, b: Option<&[u8]>) -> Self {
        Self {
            node_id: node_id.into(),
            image_a_data: a.map(|bytes| STANDARD.encode(bytes)),
            image_b_data: b.map(|bytes| STANDARD.encode(bytes)),
            image_a_res: None,
            image_b_res: None,
        }
    }

    pub fn payload(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::A => self.image_a_data.as_deref(),
            Slot::B => self.image_b_data.as_deref(),
        }
    }

    /// Number of images this delivery will decode (0, 1 or 2).
    pub fn expected(&self) -> usize {
        [Slot::A, Slot::B]
            .iter()
            .filter(|slot| self.payload(**slot).is_some())
            .count()
    }
}

/// Decode one base64 PNG (or any format `image` recognises) payload.
pub fn decode_payload(slot: Slot, data: &str) -> Result<RgbaImage> {
    let bytes = STANDARD.decode(data.trim()).map_err(|source| CompareError::Base64 {
        slot: slot.label(),
        source,
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| CompareError::Decode {
        slot: slot.label(),
        source,
    })?;
    Ok(decoded.to_rgba8())
}

#[derive(Debug)]
struct LoadOutcome {
    generation: u64,
    slot: Slot,
    result: Result<RgbaImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Pending {
        generation: u64,
        expected: usize,
        completed: usize,
    },
    Ready {
        generation: u64,
    },
}

/// What the panel has to apply after a pump.
#[derive(Debug)]
pub enum LoaderEvent {
    Loaded(Slot, SharedImage),
    Failed(Slot, CompareError),
    /// Every image of the current batch has finished, successfully or not.
    BatchComplete,
}

pub struct ImageLoader {
    pool: ThreadPool,
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
    generation: u64,
    batch: BatchState,
}

impl ImageLoader {
    pub fn new(num_threads: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            pool: ThreadPool::new(num_threads.max(1)),
            tx,
            rx,
            generation: 0,
            batch: BatchState::Idle,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn batch(&self) -> BatchState {
        self.batch
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.batch, BatchState::Pending { .. })
    }

    /// Supersede any running batch and start decoding `delivery`.
    ///
    /// Returns the new generation. Deliveries without payloads leave the
    /// loader idle.
    pub fn submit(&mut self, delivery: &ImageDelivery) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let expected = delivery.expected();

        if expected == 0 {
            self.batch = BatchState::Idle;
            return generation;
        }

        self.batch = BatchState::Pending {
            generation,
            expected,
            completed: 0,
        };
        info!(
            "node {}: decoding {} image(s), generation {}",
            delivery.node_id, expected, generation
        );

        for slot in [Slot::A, Slot::B] {
            let Some(data) = delivery.payload(slot) else {
                continue;
            };
            let data = data.to_string();
            let tx = self.tx.clone();
            self.pool.execute(move || {
                let result = decode_payload(slot, &data);
                // Receiver only goes away with the loader itself.
                let _ = tx.send(LoadOutcome {
                    generation,
                    slot,
                    result,
                });
            });
        }
        generation
    }

    /// Drain finished decodes without blocking.
    pub fn pump(&mut self) -> Vec<LoaderEvent> {
        let mut events = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            self.apply(outcome, &mut events);
        }
        events
    }

    /// Block until the current batch completes or `timeout` elapses.
    pub fn pump_blocking(&mut self, timeout: Duration) -> Vec<LoaderEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.pump();

        while self.is_pending() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) => self.apply(outcome, &mut events),
                Err(RecvTimeoutError::Timeout) => {
                    warn!("image batch {} still pending after {:?}", self.generation, timeout);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        events
    }

    fn apply(&mut self, outcome: LoadOutcome, events: &mut Vec<LoaderEvent>) {
        let BatchState::Pending {
            generation,
            expected,
            completed,
        } = self.batch
        else {
            debug!("dropping image {} from finished batch", outcome.slot.label());
            return;
        };
        if outcome.generation != generation {
            warn!(
                "dropping stale image {} from generation {} (current {})",
                outcome.slot.label(),
                outcome.generation,
                generation
            );
            return;
        }

        match outcome.result {
            Ok(image) => {
                debug!(
                    "image {} decoded: {}x{}",
                    outcome.slot.label(),
                    image.width(),
                    image.height()
                );
                events.push(LoaderEvent::Loaded(outcome.slot, Arc::new(image)));
            }
            Err(err) => {
                warn!("{}", err);
                events.push(LoaderEvent::Failed(outcome.slot, err));
            }
        }

        let completed = completed + 1;
        if completed >= expected {
            self.batch = BatchState::Ready { generation };
            events.push(LoaderEvent::BatchComplete);
        } else {
            self.batch = BatchState::Pending {
                generation,
                expected,
                completed,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::encode_png;

    fn png(w: u32, h: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(w, h, image::Rgba([1, 2, 3, 255]))).unwrap()
    }

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn test_expected_counts_payloads() {
        let bytes = png(2, 2);
        assert_eq!(ImageDelivery::from_encoded("1", None, None).expected(), 0);
        assert_eq!(ImageDelivery::from_encoded("1", Some(&bytes), None).expected(), 1);
        assert_eq!(ImageDelivery::from_encoded("1", Some(&bytes), Some(&bytes)).expected(), 2);
    }

    #[test]
    fn test_delivery_wire_format() {
        let delivery: ImageDelivery = serde_json::from_str(
            r#"{"node_id": "12", "image_a_data": null, "image_b_res": "4 × 4"}"#,
        )
        .unwrap();
        assert_eq!(delivery.node_id, "12");
        assert_eq!(delivery.expected(), 0);
        assert_eq!(delivery.image_b_res.as_deref(), Some("4 × 4"));
    }

    #[test]
    fn test_batch_completes_after_all_images() {
        let mut loader = ImageLoader::new(2);
        let delivery = ImageDelivery::from_encoded("1", Some(&png(4, 2)), Some(&png(4, 2)));
        let generation = loader.submit(&delivery);

        let events = loader.pump_blocking(WAIT);
        let loaded = events
            .iter()
            .filter(|e| matches!(e, LoaderEvent::Loaded(..)))
            .count();
        assert_eq!(loaded, 2);
        assert!(matches!(events.last(), Some(LoaderEvent::BatchComplete)));
        assert_eq!(loader.batch(), BatchState::Ready { generation });
    }

    #[test]
    fn test_decode_failure_still_completes_batch() {
        let mut loader = ImageLoader::new(2);
        let delivery = ImageDelivery {
            node_id: "1".into(),
            image_a_data: Some("not base64!".into()),
            image_b_data: Some(STANDARD.encode(b"not an image")),
            ..Default::default()
        };
        loader.submit(&delivery);

        let events = loader.pump_blocking(WAIT);
        let failed = events
            .iter()
            .filter(|e| matches!(e, LoaderEvent::Failed(..)))
            .count();
        assert_eq!(failed, 2);
        assert!(matches!(events.last(), Some(LoaderEvent::BatchComplete)));
        assert!(!loader.is_pending());
    }

    #[test]
    fn test_superseded_batch_is_dropped() {
        let mut loader = ImageLoader::new(1);
        let first = ImageDelivery::from_encoded("1", Some(&png(8, 8)), Some(&png(8, 8)));
        let second = ImageDelivery::from_encoded("1", Some(&png(3, 5)), None);
        loader.submit(&first);
        let generation = loader.submit(&second);

        let events = loader.pump_blocking(WAIT);
        let loaded: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                LoaderEvent::Loaded(slot, image) => Some((*slot, image.dimensions())),
                _ => None,
            })
            .collect();
        assert_eq!(loaded, vec![(Slot::A, (3, 5))]);
        assert_eq!(loader.batch(), BatchState::Ready { generation });

        // Single worker finished the stale decodes before the current one;
        // nothing from the first batch shows up afterwards either.
        assert!(loader.pump().is_empty());
    }

    #[test]
    fn test_empty_delivery_leaves_loader_idle() {
        let mut loader = ImageLoader::new(1);
        loader.submit(&ImageDelivery::from_encoded("1", None, None));
        assert_eq!(loader.batch(), BatchState::Idle);
        assert!(loader.pump().is_empty());
    }
}
