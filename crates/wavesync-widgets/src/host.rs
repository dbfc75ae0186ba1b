//! Host environment capability
//!
//! The synchronizer needs three things from whatever embeds it: a mount
//! point for the engine, a way to resolve media selectors to handles, and
//! window-resize notifications. [`HeadlessHost`] provides all three in
//! memory for tests and scenario replay.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use flume::Sender;
use wavesync_core::engine::ListenerId;
use wavesync_core::{MediaHandle, MountPoint};

use crate::bridge::{EventOrigin, QueuedEvent};

/// What the embedding environment provides
pub trait HostEnvironment {
    /// Where the engine should draw
    fn mount_point(&self) -> MountPoint;

    /// Resolve a media selector to a live media handle
    fn resolve_media(&self, selector: &str) -> Option<MediaHandle>;

    /// Subscribe to window-resize notifications
    fn add_resize_listener(&mut self, notifier: ResizeNotifier) -> ListenerId;

    fn remove_resize_listener(&mut self, id: ListenerId);
}

/// Sending half handed to the host for resize notifications
#[derive(Clone)]
pub struct ResizeNotifier {
    sink: Sender<QueuedEvent>,
}

impl ResizeNotifier {
    pub(crate) fn new(sink: Sender<QueuedEvent>) -> Self {
        Self { sink }
    }

    /// Report a resize; returns false once the synchronizer is gone
    pub fn notify(&self) -> bool {
        self.sink
            .send(QueuedEvent {
                origin: EventOrigin::Resize,
                args: Vec::new(),
            })
            .is_ok()
    }
}

struct HostState {
    mount: MountPoint,
    media: HashMap<String, MediaHandle>,
    resize: Vec<(ListenerId, ResizeNotifier)>,
    next_listener: u64,
}

/// In-memory host
///
/// Clones share state, so a test can keep one clone as a handle while the
/// synchronizer owns the other.
#[derive(Clone)]
pub struct HeadlessHost {
    state: Rc<RefCell<HostState>>,
}

impl HeadlessHost {
    pub fn new(mount: impl Into<String>) -> Self {
        Self {
            state: Rc::new(RefCell::new(HostState {
                mount: MountPoint(mount.into()),
                media: HashMap::new(),
                resize: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// Make `selector` resolve to `handle`
    pub fn with_media(self, selector: impl Into<String>, handle: MediaHandle) -> Self {
        self.state.borrow_mut().media.insert(selector.into(), handle);
        self
    }

    /// Fire a window resize to every subscribed listener
    pub fn resize(&self) -> usize {
        let notifiers: Vec<ResizeNotifier> = self.state.borrow().resize.iter().map(|(_, n)| n.clone()).collect();
        notifiers.iter().filter(|n| n.notify()).count()
    }

    pub fn resize_listener_count(&self) -> usize {
        self.state.borrow().resize.len()
    }
}

impl HostEnvironment for HeadlessHost {
    fn mount_point(&self) -> MountPoint {
        self.state.borrow().mount.clone()
    }

    fn resolve_media(&self, selector: &str) -> Option<MediaHandle> {
        self.state.borrow().media.get(selector).copied()
    }

    fn add_resize_listener(&mut self, notifier: ResizeNotifier) -> ListenerId {
        let mut state = self.state.borrow_mut();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.resize.push((id, notifier));
        id
    }

    fn remove_resize_listener(&mut self, id: ListenerId) {
        self.state.borrow_mut().resize.retain(|(listener, _)| *listener != id);
    }
}
