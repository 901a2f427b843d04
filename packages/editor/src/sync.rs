//! # Live Preview Synchronization
//!
//! One `watch` channel per page holds the newest [`PreviewFrame`].
//!
//! ## Ordering
//!
//! A frame carries two counters: the draft `version` and the business's
//! `theme_epoch`. Publishing merges into the current frame and only ever
//! moves each counter forward, so a slow publisher can never roll an
//! observer back to older content. Observers may skip intermediate
//! versions but never see them out of order.
//!
//! ## Delivery
//!
//! Publishing never waits on observers. A disconnected observer simply
//! stops receiving; when it reconnects it is handed the current frame,
//! not the history it missed. A page's channel lives only while someone
//! watches it: the last session to go releases it.
//!
//! ```text
//! Connecting ──first frame──► Synced(v) ──newer frame──► Stale(v → v')
//!     │                          ▲                          │
//!     │                          └──────── next_update ─────┘
//!     └──────────────── close / hub dropped ────────────────► Closed
//! ```

use futures::stream::{self, Stream};
use serde::Serialize;
use sitekit_common::PageId;
use sitekit_content::PageModel;
use sitekit_theme::{CachedTheme, FontDeclaration};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::watch;

/// Theme part of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTheme {
    pub style_block: String,
    pub font_declarations: Vec<FontDeclaration>,
}

impl From<&CachedTheme> for PreviewTheme {
    fn from(cached: &CachedTheme) -> Self {
        Self {
            style_block: cached.style_block.clone(),
            font_declarations: cached.theme.font_declarations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewFrame {
    pub page_id: PageId,
    pub version: u64,
    pub theme_epoch: u64,
    pub page: Arc<PageModel>,
    pub theme: Arc<PreviewTheme>,
}

impl PreviewFrame {
    pub fn new(page: PageModel, theme_epoch: u64, theme: PreviewTheme) -> Self {
        Self {
            page_id: page.page_id.clone(),
            version: page.version,
            theme_epoch,
            page: Arc::new(page),
            theme: Arc::new(theme),
        }
    }

    /// Merge `incoming` into `self`, keeping the newer half of each.
    /// Returns whether anything changed.
    fn merge(&mut self, incoming: &PreviewFrame) -> bool {
        let mut changed = false;
        if incoming.version > self.version {
            self.version = incoming.version;
            self.page = incoming.page.clone();
            changed = true;
        }
        if incoming.theme_epoch > self.theme_epoch {
            self.theme_epoch = incoming.theme_epoch;
            self.theme = incoming.theme.clone();
            changed = true;
        }
        changed
    }
}

type FrameSender = watch::Sender<Arc<PreviewFrame>>;
type Channels = RwLock<HashMap<PageId, FrameSender>>;

#[derive(Default)]
pub struct PreviewHub {
    channels: Arc<Channels>,
}

impl PreviewHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a page, seeding its channel with `current` if the
    /// channel is new or behind.
    pub fn subscribe(&self, current: PreviewFrame) -> PreviewSession {
        let page_id = current.page_id.clone();

        let existing = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&page_id)
            .map(|sender| sender.subscribe());

        let receiver = match existing {
            Some(receiver) => {
                self.publish(current);
                receiver
            }
            None => {
                let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
                // Double-check: another subscriber may have created it
                match channels.get(&page_id) {
                    Some(sender) => {
                        sender.send_if_modified(|frame| Arc::make_mut(frame).merge(&current));
                        sender.subscribe()
                    }
                    None => {
                        let (sender, receiver) = watch::channel(Arc::new(current));
                        channels.insert(page_id.clone(), sender);
                        receiver
                    }
                }
            }
        };

        tracing::info!(page_id = %page_id, "preview connected");
        PreviewSession {
            page_id,
            receiver,
            state: PreviewState::Connecting,
            hub: Arc::downgrade(&self.channels),
        }
    }

    /// Push a frame to a page's observers. Frames that bring nothing newer
    /// are ignored. Returns whether observers were notified.
    pub fn publish(&self, frame: PreviewFrame) -> bool {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(&frame.page_id) else {
            return false;
        };

        let changed = sender.send_if_modified(|current| Arc::make_mut(current).merge(&frame));
        if changed {
            tracing::debug!(
                page_id = %frame.page_id,
                version = frame.version,
                theme_epoch = frame.theme_epoch,
                "preview frame published"
            );
        } else {
            tracing::debug!(page_id = %frame.page_id, version = frame.version, "stale preview frame ignored");
        }
        changed
    }

    /// Replace only the theme of a page's current frame.
    pub fn publish_theme(&self, page_id: &PageId, theme_epoch: u64, theme: Arc<PreviewTheme>) -> bool {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(page_id) else {
            return false;
        };

        sender.send_if_modified(|current| {
            if theme_epoch <= current.theme_epoch {
                return false;
            }
            let frame = Arc::make_mut(current);
            frame.theme_epoch = theme_epoch;
            frame.theme = theme.clone();
            true
        })
    }

    /// The newest frame for a page, if anyone is watching it.
    pub fn current(&self, page_id: &PageId) -> Option<Arc<PreviewFrame>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(page_id)
            .map(|sender| sender.borrow().clone())
    }

    pub fn observer_count(&self, page_id: &PageId) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(page_id)
            .map_or(0, |sender| sender.receiver_count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PreviewState {
    Connecting,
    Synced { version: u64, theme_epoch: u64 },
    /// A newer frame is waiting to be taken with `next_update`
    Stale { synced: u64, pending: u64 },
    Closed,
}

/// One observer of one page.
pub struct PreviewSession {
    page_id: PageId,
    receiver: watch::Receiver<Arc<PreviewFrame>>,
    state: PreviewState,
    hub: Weak<Channels>,
}

impl PreviewSession {
    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    /// Current state, noticing frames published since the last update.
    pub fn state(&mut self) -> PreviewState {
        if let PreviewState::Synced { version, .. } = self.state {
            match self.receiver.has_changed() {
                Ok(true) => {
                    self.state = PreviewState::Stale {
                        synced: version,
                        pending: self.receiver.borrow().version,
                    };
                }
                Ok(false) => {}
                Err(_) => self.state = PreviewState::Closed,
            }
        }
        self.state
    }

    fn synced(&mut self, frame: Arc<PreviewFrame>) -> Arc<PreviewFrame> {
        self.state = PreviewState::Synced {
            version: frame.version,
            theme_epoch: frame.theme_epoch,
        };
        frame
    }

    /// Wait for the next frame to show.
    ///
    /// The first call returns the current frame immediately. Later calls
    /// wait for something newer and return the newest frame, skipping any
    /// that were superseded in between. `None` once closed.
    pub async fn next_update(&mut self) -> Option<Arc<PreviewFrame>> {
        match self.state {
            PreviewState::Closed => return None,
            PreviewState::Connecting => {
                let frame = self.receiver.borrow_and_update().clone();
                return Some(self.synced(frame));
            }
            PreviewState::Synced { .. } | PreviewState::Stale { .. } => {}
        }

        if self.receiver.changed().await.is_err() {
            tracing::debug!(page_id = %self.page_id, "preview channel gone");
            self.state = PreviewState::Closed;
            return None;
        }
        let frame = self.receiver.borrow_and_update().clone();
        Some(self.synced(frame))
    }

    /// End the session. Draft content is not touched.
    pub fn close(&mut self) {
        if self.state != PreviewState::Closed {
            tracing::info!(page_id = %self.page_id, "preview disconnected");
            self.state = PreviewState::Closed;
        }
    }

    /// Frames as a stream, ending when the session closes.
    pub fn into_stream(self) -> impl Stream<Item = Arc<PreviewFrame>> + Send {
        stream::unfold(self, |mut session| async move {
            let frame = session.next_update().await?;
            Some((frame, session))
        })
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.close();
        let Some(channels) = self.hub.upgrade() else {
            return;
        };

        // Subscribing needs at least the read lock, so no receiver can
        // appear while the write lock is held. Our own receiver still counts.
        let mut channels = channels.write().unwrap_or_else(PoisonError::into_inner);
        let last = channels
            .get(&self.page_id)
            .is_some_and(|sender| sender.receiver_count() <= 1);
        if last {
            channels.remove(&self.page_id);
            tracing::debug!(page_id = %self.page_id, "preview channel released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use sitekit_content::SnapshotKind;

    fn frame(version: u64, theme_epoch: u64) -> PreviewFrame {
        let mut page = PageModel::empty("p".into(), SnapshotKind::Draft);
        page.version = version;
        PreviewFrame::new(
            page,
            theme_epoch,
            PreviewTheme {
                style_block: format!("/* epoch {theme_epoch} */"),
                font_declarations: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_first_update_is_current_frame() {
        let hub = PreviewHub::new();
        let mut session = hub.subscribe(frame(3, 0));
        assert_eq!(session.state(), PreviewState::Connecting);

        let first = session.next_update().await.unwrap();
        assert_eq!(first.version, 3);
        assert_eq!(session.state(), PreviewState::Synced { version: 3, theme_epoch: 0 });
    }

    #[tokio::test]
    async fn test_older_frames_are_ignored() {
        let hub = PreviewHub::new();
        let mut session = hub.subscribe(frame(5, 0));
        session.next_update().await.unwrap();

        assert!(!hub.publish(frame(4, 0)));
        assert!(!hub.publish(frame(5, 0)));
        assert_eq!(session.state(), PreviewState::Synced { version: 5, theme_epoch: 0 });
        assert_eq!(hub.current(&"p".into()).unwrap().version, 5);
    }

    #[tokio::test]
    async fn test_stale_then_resynced_to_newest() {
        let hub = PreviewHub::new();
        let mut session = hub.subscribe(frame(1, 0));
        session.next_update().await.unwrap();

        hub.publish(frame(2, 0));
        hub.publish(frame(3, 0));
        assert_eq!(session.state(), PreviewState::Stale { synced: 1, pending: 3 });

        // Version 2 is skipped, never delivered after 3
        let next = session.next_update().await.unwrap();
        assert_eq!(next.version, 3);
        assert_eq!(session.state(), PreviewState::Synced { version: 3, theme_epoch: 0 });
    }

    #[tokio::test]
    async fn test_theme_and_content_merge_independently() {
        let hub = PreviewHub::new();
        let mut session = hub.subscribe(frame(2, 1));
        session.next_update().await.unwrap();

        // Content from a publisher that still had the old theme
        hub.publish(frame(3, 0));
        hub.publish_theme(
            &"p".into(),
            2,
            Arc::new(PreviewTheme {
                style_block: "/* epoch 2 */".to_string(),
                font_declarations: Vec::new(),
            }),
        );

        let next = session.next_update().await.unwrap();
        assert_eq!((next.version, next.theme_epoch), (3, 2));
        assert_eq!(next.theme.style_block, "/* epoch 2 */");
    }

    #[tokio::test]
    async fn test_reconnect_gets_latest_not_replay() {
        let hub = PreviewHub::new();
        let _other_tab = hub.subscribe(frame(1, 0));
        let mut first = hub.subscribe(frame(1, 0));
        first.next_update().await.unwrap();
        drop(first);

        hub.publish(frame(2, 0));
        hub.publish(frame(3, 0));

        // Reconnecting with an older view of the page still yields the newest
        let mut again = hub.subscribe(frame(1, 0));
        assert_eq!(again.next_update().await.unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_dropping_hub_ends_sessions() {
        let hub = PreviewHub::new();
        let mut session = hub.subscribe(frame(1, 0));
        session.next_update().await.unwrap();

        drop(hub);
        assert_eq!(session.next_update().await, None);
        assert_eq!(session.state(), PreviewState::Closed);
    }

    #[tokio::test]
    async fn test_last_session_releases_channel() {
        let hub = PreviewHub::new();
        let page: PageId = "p".into();
        let first = hub.subscribe(frame(1, 0));
        let second = hub.subscribe(frame(1, 0));
        assert_eq!(hub.observer_count(&page), 2);

        drop(first);
        assert_eq!(hub.observer_count(&page), 1);
        assert!(hub.publish(frame(2, 0)));
        assert_eq!(hub.current(&page).unwrap().version, 2);

        drop(second);
        assert_eq!(hub.observer_count(&page), 0);
        assert!(hub.current(&page).is_none());
        assert!(!hub.publish(frame(3, 0)));
    }

    #[tokio::test]
    async fn test_streamed_session_releases_channel_when_dropped() {
        let hub = PreviewHub::new();
        let mut frames = Box::pin(hub.subscribe(frame(4, 0)).into_stream());
        assert_eq!(frames.next().await.unwrap().version, 4);

        drop(frames);
        assert!(hub.current(&"p".into()).is_none());
    }

    #[tokio::test]
    async fn test_resubscribe_after_release_starts_fresh() {
        let hub = PreviewHub::new();
        drop(hub.subscribe(frame(7, 0)));

        let mut session = hub.subscribe(frame(2, 0));
        assert_eq!(session.next_update().await.unwrap().version, 2);
    }
}
