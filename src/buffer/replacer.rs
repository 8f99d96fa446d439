use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::page::FrameId;

///  Replacer tracks page usage for replacement in case of buffer pool is full.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    fn record_access(&self, frame_id: FrameId);

    /// Find the frame to evict with replace policy(e.g. backward k-distance). Only frames that
    /// are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame should decrement the size of replacer and remove the frame's
    /// access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. this function also control replacer
    /// size. Note that size is equal to number of evictable entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable, then size should
    /// decrement. If a frame was previously non-evictable and is to be set evictable, then size
    /// should increment.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. if the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove a frame from replacer, along with its access history. This function
    /// should also decrement the replacer size if removal is successful.
    ///
    /// Note that this is different from evicting a frame without check replacer policy.
    ///
    /// Removing a non-evictable frame is a programming error and panics. If the
    /// specified frame is not found, do nothing.
    fn remove(&self, frame_id: FrameId);

    /// replacer size.
    fn size(&self) -> usize;
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts a frame whose backward k-distance is maximum of
/// all frames. Backward k-distance is computed as the difference in time between
/// the current timestamp and the timestamp of k-th previous access.
///
/// A frame with less than k history references is given +inf as its backward
/// k-distance and lives on the history list, ordered by first access; classical
/// LRU picks the victim among them. Frames with k or more references live on the
/// cache list, ordered by most recent access, which stands in for the k-th most
/// recent as an approximation.
pub struct LRUKReplacer {
    k: usize,
    /// Upper bound on valid frame ids, i.e. the buffer pool size.
    replacer_size: usize,
    current_size: usize,
    access_count: HashMap<FrameId, usize>,
    evictable: HashMap<FrameId, bool>,
    /// Frames seen fewer than k times. Front is the most recently inserted;
    /// a frame keeps its position until it graduates to the cache list.
    history: VecDeque<FrameId>,
    /// Frames seen at least k times. Front is the most recently accessed.
    cache: VecDeque<FrameId>,
}

impl LRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        LRUKReplacer {
            k,
            replacer_size: size,
            current_size: 0,
            access_count: HashMap::new(),
            evictable: HashMap::new(),
            history: VecDeque::new(),
            cache: VecDeque::new(),
        }
    }

    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    ///
    /// The first access puts the frame on the history list; the k-th access
    /// graduates it to the cache list; later accesses move it back to the
    /// cache front.
    fn record_access(&mut self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} out of range [0, {})",
            frame_id,
            self.replacer_size
        );
        let count = self.access_count.entry(frame_id).or_insert(0);
        *count += 1;
        let count = *count;
        if count == 1 {
            self.evictable.insert(frame_id, false);
            if self.k == 1 {
                self.cache.push_front(frame_id);
            } else {
                self.history.push_front(frame_id);
            }
            return;
        }
        if count == self.k {
            Self::unlink(&mut self.history, frame_id);
            self.cache.push_front(frame_id);
        } else if count > self.k {
            Self::unlink(&mut self.cache, frame_id);
            self.cache.push_front(frame_id);
        }
        // 1 < count < k: the frame stays put on the history list.
    }

    /// Find the frame with the largest backward k-distance and evict that frame. Only frames
    /// that are marked as evictable are candidates for eviction.
    ///
    /// Scan the history list from the back (oldest first access) since every
    /// frame on it has +inf backward k-distance; only when it yields nothing
    /// scan the cache list from the back likewise.
    ///
    /// Successful eviction of a frame should decrement the size of replacer and remove the frame's
    /// access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames can be evicted.
    fn evict(&mut self) -> Option<FrameId> {
        if self.current_size == 0 {
            return None;
        }
        let pick = |list: &VecDeque<FrameId>, evictable: &HashMap<FrameId, bool>| {
            list.iter().rposition(|f| evictable.get(f) == Some(&true))
        };
        if let Some(i) = pick(&self.history, &self.evictable) {
            let frame_id = self.history.remove(i)?;
            self.drop_state(frame_id);
            return Some(frame_id);
        }
        if let Some(i) = pick(&self.cache, &self.evictable) {
            let frame_id = self.cache.remove(i)?;
            self.drop_state(frame_id);
            return Some(frame_id);
        }
        None
    }

    /// Toggle whether a frame is evictable or non-evictable. this function also control replacer
    /// size. Note that size is equal to number of evictable entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable, then size should
    /// decrement. If a frame was previously non-evictable and is to be set evictable, then size
    /// should increment.
    ///
    /// For a frame the replacer has never seen, this function is a no-op.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} out of range [0, {})",
            frame_id,
            self.replacer_size
        );
        let flag = match self.evictable.get_mut(&frame_id) {
            Some(flag) => flag,
            None => return,
        };
        if *flag == evictable {
            return;
        }
        *flag = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
    }

    /// Check if a frame is evictable. if the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool {
        match self.evictable.get(&frame_id) {
            Some(&flag) => flag,
            None => true,
        }
    }

    /// Remove a frame from replacer, along with its access history. This function
    /// should also decrement the replacer size if removal is successful.
    ///
    /// Note that this is different from evicting a frame, which always remove the frame with the
    /// largest backward k-distance. This function removes specified frame id, no matter what its
    /// backward k-distance is.
    ///
    /// Removing a non-evictable frame is a programming error and panics. If the
    /// specified frame is not found, do nothing.
    fn remove(&mut self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} out of range [0, {})",
            frame_id,
            self.replacer_size
        );
        let count = match self.access_count.get(&frame_id) {
            Some(&count) => count,
            None => return,
        };
        assert!(
            self.evictable.get(&frame_id) == Some(&true),
            "remove called on non-evictable frame {}",
            frame_id
        );
        if count >= self.k {
            Self::unlink(&mut self.cache, frame_id);
        } else {
            Self::unlink(&mut self.history, frame_id);
        }
        self.drop_state(frame_id);
    }

    fn size(&self) -> usize {
        self.current_size
    }

    /// Forget a frame that has already been taken off its list.
    fn drop_state(&mut self, frame_id: FrameId) {
        self.access_count.remove(&frame_id);
        self.evictable.remove(&frame_id);
        self.current_size -= 1;
    }

    fn unlink(list: &mut VecDeque<FrameId>, frame_id: FrameId) {
        if let Some(i) = list.iter().position(|&f| f == frame_id) {
            list.remove(i);
        }
    }
}

/// SyncLRUKReplacer implements the thread-safe version of LRU-k replacement policy,
/// basically all the heavy lifting are happens in the LRUKReplacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        let inner = Mutex::new(LRUKReplacer::new(k, size));
        SyncLRUKReplacer { inner }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}
