// Single background thread extracting thumbnails one request at a time
//
// The queue holds at most `max_pending` requests. New requests go to the front
// and run first; when full, the oldest request is dropped and answered with
// `None`.

use super::cache::ThumbnailCache;
use super::{ExtractorFactory, FrameExtractor};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

/// Receives the thumbnail path, or `None`; called exactly once per task
pub(crate) type Reply = Box<dyn FnOnce(Option<PathBuf>) + Send>;

pub(crate) struct Task {
    pub url: String,
    pub position_ms: u64,
    pub reply: Reply,
}

impl Task {
    fn abandon(self) {
        (self.reply)(None);
    }
}

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

#[derive(Clone, Copy)]
pub(crate) struct FrameSize {
    pub width: u32,
    pub height: u32,
}

pub(crate) struct ThumbnailWorker {
    shared: Arc<Shared>,
    max_pending: usize,
    thread: Option<JoinHandle<()>>,
}

impl ThumbnailWorker {
    pub fn start(
        cache: Arc<Mutex<ThumbnailCache>>,
        extractors: Arc<dyn ExtractorFactory>,
        size: FrameSize,
        max_pending: usize,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            ready: Condvar::new(),
        });
        let thread = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("thumbnail".into())
                .spawn(move || run(shared, cache, extractors, size))?
        };
        Ok(Self {
            shared,
            max_pending: max_pending.max(1),
            thread: Some(thread),
        })
    }

    pub fn submit(&self, task: Task) {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            drop(queue);
            task.abandon();
            return;
        }
        while queue.tasks.len() >= self.max_pending {
            if let Some(dropped) = queue.tasks.pop_back() {
                log::debug!("Dropping thumbnail request at {} ms", dropped.position_ms);
                dropped.abandon();
            }
        }
        queue.tasks.push_front(task);
        log::debug!("Thumbnail tasks pending: {}", queue.tasks.len());
        self.shared.ready.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Drop every queued request (the one being extracted still completes)
    pub fn clear(&self) {
        let drained: Vec<Task> = self.shared.queue.lock().tasks.drain(..).collect();
        for task in drained {
            task.abandon();
        }
    }

    /// Stop the thread after the current request and wait for it
    pub fn cancel(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            for task in queue.tasks.drain(..) {
                task.abandon();
            }
        }
        self.shared.ready.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ThumbnailWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run(
    shared: Arc<Shared>,
    cache: Arc<Mutex<ThumbnailCache>>,
    extractors: Arc<dyn ExtractorFactory>,
    size: FrameSize,
) {
    let mut current_url: Option<String> = None;
    let mut extractor: Option<Box<dyn FrameExtractor>> = None;

    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.shutdown {
                    return;
                }
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                shared.ready.wait(&mut queue);
            }
        };

        if current_url.as_deref() != Some(task.url.as_str()) {
            // Release the previous source before opening the next one
            drop(extractor.take());
            extractor = match extractors.open(&task.url) {
                Ok(opened) => Some(opened),
                Err(e) => {
                    log::error!("Frame extractor failed to open {}: {}", task.url, e);
                    None
                }
            };
            current_url = Some(task.url.clone());
        }

        let path = match extractor.as_mut() {
            Some(extractor) => extract(extractor.as_mut(), &cache, &task, size),
            None => None,
        };
        (task.reply)(path);
    }
}

fn extract(
    extractor: &mut dyn FrameExtractor,
    cache: &Mutex<ThumbnailCache>,
    task: &Task,
    size: FrameSize,
) -> Option<PathBuf> {
    let jpeg = match extractor.frame_at(task.position_ms, size.width, size.height) {
        Ok(Some(jpeg)) => jpeg,
        Ok(None) => return None,
        Err(e) => {
            log::error!("Thumbnail extraction at {} ms failed: {}", task.position_ms, e);
            return None;
        }
    };

    let filename = format!("{}.jpg", Uuid::new_v4());
    let cache = cache.lock();
    let path = cache.dir().join(&filename);
    if let Err(e) = fs::write(&path, &jpeg) {
        log::error!("Failed to write thumbnail {}: {}", path.display(), e);
        return None;
    }
    if let Err(e) = cache.insert(&task.url, task.position_ms, &filename) {
        log::error!("Failed to record thumbnail {}: {}", filename, e);
    }
    Some(path)
}
