//! Random-access readers over block objects
//!
//! Parquet reads are small and scattered (footer, column chunk pages). The
//! [`BufferedReaderAt`] serves them from a fixed number of fixed-size
//! windows so a block scan keeps at most `buffer_count * buffer_size` bytes
//! in memory regardless of block size.

use crate::error::{Result, StorageError};
use bytes::{Bytes, BytesMut};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use parquet::errors::ParquetError;
use parquet::file::reader::{ChunkReader, Length};
use lru::LruCache;
use std::io::Read;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tracing::debug;

/// Positional reads over an immutable object
pub trait ReaderAt: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes>;

    /// Total size of the object in bytes
    fn size(&self) -> u64;
}

impl ReaderAt for Bytes {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes> {
        let end = offset as usize + len;
        if end > self.len() {
            return Err(StorageError::OutOfBounds {
                offset,
                len,
                size: self.len() as u64,
            });
        }
        Ok(self.slice(offset as usize..end))
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Ranged reads against an object store.
///
/// Reads block on the runtime handle, so they must be issued from a
/// blocking thread (e.g. inside `spawn_blocking`), never from an async task.
pub struct ObjectReaderAt {
    store: Arc<dyn ObjectStore>,
    path: ObjectPath,
    size: u64,
    handle: Handle,
}

impl ObjectReaderAt {
    pub fn new(store: Arc<dyn ObjectStore>, path: ObjectPath, size: u64, handle: Handle) -> Self {
        Self {
            store,
            path,
            size,
            handle,
        }
    }
}

impl ReaderAt for ObjectReaderAt {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes> {
        let end = offset + len as u64;
        if end > self.size {
            return Err(StorageError::OutOfBounds {
                offset,
                len,
                size: self.size,
            });
        }
        let bytes = self
            .handle
            .block_on(self.store.get_range(&self.path, offset..end))?;
        Ok(bytes)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

struct Shared<R> {
    inner: R,
    buffer_size: u64,
    /// Window start offset to window bytes
    windows: Mutex<LruCache<u64, Bytes>>,
}

/// Window-cached reader with bounded memory.
///
/// Cloning is cheap and clones share the same windows.
pub struct BufferedReaderAt<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for BufferedReaderAt<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: ReaderAt> BufferedReaderAt<R> {
    pub fn new(inner: R, buffer_size: u64, buffer_count: usize) -> Self {
        let capacity = NonZeroUsize::new(buffer_count).unwrap_or(NonZeroUsize::MIN);
        Self {
            shared: Arc::new(Shared {
                inner,
                buffer_size: buffer_size.max(1),
                windows: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    pub fn size(&self) -> u64 {
        self.shared.inner.size()
    }

    fn windows(&self) -> Result<MutexGuard<'_, LruCache<u64, Bytes>>> {
        self.shared
            .windows
            .lock()
            .map_err(|_| StorageError::CachePoisoned)
    }

    /// Number of windows currently held
    pub fn buffered_windows(&self) -> Result<usize> {
        Ok(self.windows()?.len())
    }

    /// Returns the window starting at `start`, reading it on a miss
    fn window(&self, start: u64) -> Result<Bytes> {
        if let Some(bytes) = self.windows()?.get(&start) {
            return Ok(bytes.clone());
        }

        let shared = &self.shared;
        let len = shared.buffer_size.min(shared.inner.size() - start) as usize;
        let bytes = shared.inner.read_at(start, len)?;

        if let Some((evicted, _)) = self.windows()?.push(start, bytes.clone()) {
            if evicted != start {
                debug!(window = evicted, "Evicted read window");
            }
        }
        Ok(bytes)
    }

    /// Reads `len` bytes at `offset` through the window cache.
    /// Reads at least one window long bypass the cache.
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        let size = self.size();
        let end = offset + len as u64;
        if end > size {
            return Err(StorageError::OutOfBounds { offset, len, size });
        }
        if len == 0 {
            return Ok(Bytes::new());
        }

        let buffer_size = self.shared.buffer_size;
        if len as u64 >= buffer_size {
            return self.shared.inner.read_at(offset, len);
        }

        let first = offset / buffer_size * buffer_size;
        let last = (end - 1) / buffer_size * buffer_size;
        if first == last {
            let window = self.window(first)?;
            let from = (offset - first) as usize;
            return Ok(window.slice(from..from + len));
        }

        let mut out = BytesMut::with_capacity(len);
        let mut start = first;
        while start <= last {
            let window = self.window(start)?;
            let from = offset.max(start) - start;
            let to = end.min(start + window.len() as u64) - start;
            out.extend_from_slice(&window[from as usize..to as usize]);
            start += buffer_size;
        }
        Ok(out.freeze())
    }
}

impl<R: ReaderAt> Length for BufferedReaderAt<R> {
    fn len(&self) -> u64 {
        self.size()
    }
}

impl<R: ReaderAt + 'static> ChunkReader for BufferedReaderAt<R> {
    type T = BufferedRead<R>;

    fn get_read(&self, start: u64) -> parquet::errors::Result<Self::T> {
        Ok(BufferedRead {
            reader: self.clone(),
            position: start,
        })
    }

    fn get_bytes(&self, start: u64, length: usize) -> parquet::errors::Result<Bytes> {
        self.read_range(start, length)
            .map_err(|e| ParquetError::External(Box::new(e)))
    }
}

/// Sequential reader handed out by [`BufferedReaderAt::get_read`]
pub struct BufferedRead<R> {
    reader: BufferedReaderAt<R>,
    position: u64,
}

impl<R: ReaderAt> Read for BufferedRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.reader.size().saturating_sub(self.position);
        // stay within one window per call
        let window_left = self.reader.shared.buffer_size - self.position % self.reader.shared.buffer_size;
        let len = (buf.len() as u64).min(remaining).min(window_left) as usize;
        if len == 0 {
            return Ok(0);
        }

        let bytes = self
            .reader
            .read_range(self.position, len)
            .map_err(std::io::Error::other)?;
        buf[..len].copy_from_slice(&bytes);
        self.position += len as u64;
        Ok(len)
    }
}
