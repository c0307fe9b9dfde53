// Video thumbnails: a persistent lookup table in front of a single extraction worker

mod cache;
mod worker;

pub use cache::ThumbnailCache;

use crate::error::Result;
use crossbeam_channel::{bounded, Receiver};
use ghosten_core::ThumbnailConfig;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use worker::{FrameSize, Task, ThumbnailWorker};

/// Resolves to the thumbnail path, or `None` when no frame could be produced
pub type ThumbnailReply = Receiver<Option<PathBuf>>;

/// Decodes still frames from one source
pub trait FrameExtractor: Send {
    /// JPEG-encoded frame closest to `position_ms`, scaled to fit `width` x `height`
    fn frame_at(&mut self, position_ms: u64, width: u32, height: u32) -> io::Result<Option<Vec<u8>>>;
}

/// Opens a [`FrameExtractor`] for a source url
pub trait ExtractorFactory: Send + Sync {
    fn open(&self, url: &str) -> io::Result<Box<dyn FrameExtractor>>;
}

pub struct Thumbnails {
    cache: Arc<Mutex<ThumbnailCache>>,
    worker: ThumbnailWorker,
}

impl Thumbnails {
    pub fn open(config: &ThumbnailConfig, extractors: Arc<dyn ExtractorFactory>) -> Result<Self> {
        fs::create_dir_all(&config.cache_dir)?;
        let cache = ThumbnailCache::open(&config.database_path(), &config.cache_dir)?;
        Self::with_cache(cache, config, extractors)
    }

    pub fn with_cache(
        cache: ThumbnailCache,
        config: &ThumbnailConfig,
        extractors: Arc<dyn ExtractorFactory>,
    ) -> Result<Self> {
        let cache = Arc::new(Mutex::new(cache));
        let size = FrameSize {
            width: config.width,
            height: config.height,
        };
        let worker = ThumbnailWorker::start(cache.clone(), extractors, size, config.max_pending)?;
        Ok(Self { cache, worker })
    }

    /// Cached file if present on disk, otherwise queue an extraction
    pub fn request(&self, url: &str, position_ms: u64) -> Result<ThumbnailReply> {
        let (reply, rx) = bounded(1);
        self.request_with(url, position_ms, move |path| {
            let _ = reply.send(path);
        })?;
        Ok(rx)
    }

    /// Like [`Thumbnails::request`], handing the answer to `reply` instead.
    ///
    /// A cache hit calls `reply` before returning; otherwise the worker calls
    /// it once the frame is written or the request is dropped.
    pub fn request_with<F>(&self, url: &str, position_ms: u64, reply: F) -> Result<()>
    where
        F: FnOnce(Option<PathBuf>) + Send + 'static,
    {
        let cached = self.cache.lock().lookup(url, position_ms)?;
        match cached {
            Some(path) => reply(Some(path)),
            None => self.worker.submit(Task {
                url: url.to_string(),
                position_ms,
                reply: Box::new(reply),
            }),
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.worker.pending()
    }

    /// Forget queued requests, e.g. when playback moves to another item
    pub fn clear_pending(&self) {
        self.worker.clear();
    }

    pub fn cancel(&mut self) {
        self.worker.cancel();
    }
}
