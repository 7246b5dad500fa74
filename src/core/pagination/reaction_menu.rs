// Reaction menus - paginated replies driven by reactions on one message.
//
// A menu posts its first page, opens a reaction subscription for that
// message, adds its control glyphs and then runs as its own task until the
// owner presses stop or the timeout runs out. Either way the session removes
// every reaction from the message and drops the subscription.
//
// Only the owning user navigates. Reactions from anyone else are read and
// dropped, and taken back off the message unless they are the stop glyph.
//
// There are two kinds of content:
// - windowed: a sequence of `len` items shown `window` at a time, rendered
//   by a callback from the current cursor
// - custom: a glyph -> page function map, for menus that aren't lists

use crate::core::gateway::{
    Gateway, GatewayError, MessageHandle, ReactionEvent, ReactionSubscription, Reply,
};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

pub const FIRST: &str = "⏪";
pub const PREVIOUS: &str = "◀️";
pub const NEXT: &str = "▶️";
pub const LAST: &str = "⏩";
pub const STOP: &str = "⏹️";

pub const DEFAULT_WINDOW: usize = 10;
pub const DEFAULT_MENU_TIMEOUT: Duration = Duration::from_secs(120);

// ============================================================================
// WINDOW CURSOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    First,
    Previous,
    Next,
    Last,
}

/// Window start over a sequence of `len` items. The cursor is always a
/// multiple of `window` and below `len` (or 0 for an empty sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCursor {
    len: usize,
    window: usize,
    cursor: usize,
}

impl WindowCursor {
    pub fn new(len: usize, window: usize) -> Self {
        Self {
            len,
            window: window.max(1),
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Items visible at the current cursor.
    pub fn range(&self) -> Range<usize> {
        self.cursor..(self.cursor + self.window).min(self.len)
    }

    // Start of the trailing partial window, or `len` when the windows divide evenly
    fn cap(&self) -> usize {
        self.len - (self.len % self.window)
    }

    /// Start of the final non-empty window.
    pub fn last_start(&self) -> usize {
        let cap = self.cap();
        if cap == self.len && self.len > 0 {
            cap - self.window
        } else {
            cap
        }
    }

    /// Move the cursor. Returns false for a no-op.
    pub fn apply(&mut self, navigation: Navigation) -> bool {
        let target = match navigation {
            Navigation::First => 0,
            Navigation::Previous => self.cursor.saturating_sub(self.window),
            Navigation::Next => {
                let cap = self.cap();
                if self.cursor == cap || self.cursor + self.window >= self.len {
                    return false;
                }
                let next = self.cursor + self.window;
                if next > self.len {
                    cap
                } else {
                    next
                }
            }
            Navigation::Last => self.last_start(),
        };

        if target == self.cursor {
            return false;
        }
        self.cursor = target;
        true
    }

    /// `[first - last]` in 1-based positions, or `[n]` for single item windows.
    pub fn range_label(&self) -> String {
        if self.len == 0 {
            return "[0]".to_string();
        }
        let range = self.range();
        let first = range.start + 1;
        if range.len() == 1 {
            format!("[{}]", first)
        } else {
            format!("[{} - {}]", first, range.end)
        }
    }
}

// ============================================================================
// MENU CONTENT
// ============================================================================

/// Control glyphs for windowed menus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuGlyphs {
    pub first: String,
    pub previous: String,
    pub next: String,
    pub last: String,
    pub stop: String,
}

impl Default for MenuGlyphs {
    fn default() -> Self {
        Self {
            first: FIRST.to_string(),
            previous: PREVIOUS.to_string(),
            next: NEXT.to_string(),
            last: LAST.to_string(),
            stop: STOP.to_string(),
        }
    }
}

impl MenuGlyphs {
    fn in_order(&self) -> Vec<String> {
        vec![
            self.first.clone(),
            self.previous.clone(),
            self.next.clone(),
            self.last.clone(),
            self.stop.clone(),
        ]
    }

    fn navigation(&self, glyph: &str) -> Option<Navigation> {
        if glyph == self.first {
            Some(Navigation::First)
        } else if glyph == self.previous {
            Some(Navigation::Previous)
        } else if glyph == self.next {
            Some(Navigation::Next)
        } else if glyph == self.last {
            Some(Navigation::Last)
        } else {
            None
        }
    }
}

pub type PageFn = Box<dyn FnMut() -> Option<Reply> + Send>;
pub type RenderFn = Box<dyn Fn(&WindowCursor) -> Reply + Send>;

/// What a custom menu glyph does.
pub enum MenuAction {
    /// Produce the next page, or `None` to leave the message as it is.
    Page(PageFn),
    Stop,
}

enum MenuContent {
    Windowed {
        cursor: WindowCursor,
        glyphs: MenuGlyphs,
        render: RenderFn,
    },
    Custom {
        initial: Reply,
        actions: Vec<(String, MenuAction)>,
    },
}

/// What a glyph did to the content.
enum Pressed {
    NotAControl,
    Stop,
    Unchanged,
    Changed(Reply),
}

impl MenuContent {
    fn initial_page(&self) -> Reply {
        match self {
            MenuContent::Windowed { cursor, render, .. } => render(cursor),
            MenuContent::Custom { initial, .. } => initial.clone(),
        }
    }

    fn glyphs(&self) -> Vec<String> {
        match self {
            MenuContent::Windowed { glyphs, .. } => glyphs.in_order(),
            MenuContent::Custom { actions, .. } => {
                actions.iter().map(|(glyph, _)| glyph.clone()).collect()
            }
        }
    }

    fn is_stop(&self, glyph: &str) -> bool {
        match self {
            MenuContent::Windowed { glyphs, .. } => glyph == glyphs.stop,
            MenuContent::Custom { actions, .. } => actions
                .iter()
                .any(|(g, action)| g == glyph && matches!(action, MenuAction::Stop)),
        }
    }

    fn press(&mut self, glyph: &str) -> Pressed {
        if self.is_stop(glyph) {
            return Pressed::Stop;
        }
        match self {
            MenuContent::Windowed {
                cursor,
                glyphs,
                render,
            } => match glyphs.navigation(glyph) {
                None => Pressed::NotAControl,
                Some(navigation) => {
                    if cursor.apply(navigation) {
                        Pressed::Changed(render(cursor))
                    } else {
                        Pressed::Unchanged
                    }
                }
            },
            MenuContent::Custom { actions, .. } => {
                match actions.iter_mut().find(|(g, _)| g == glyph) {
                    Some((_, MenuAction::Page(page))) => match page() {
                        Some(reply) => Pressed::Changed(reply),
                        None => Pressed::Unchanged,
                    },
                    Some((_, MenuAction::Stop)) => Pressed::Stop,
                    None => Pressed::NotAControl,
                }
            }
        }
    }
}

// ============================================================================
// MENU BUILDER
// ============================================================================

pub struct ReactionMenu {
    content: MenuContent,
    timeout: Duration,
}

impl ReactionMenu {
    /// A windowed menu over `len` items. `render` builds the page for the
    /// current cursor.
    pub fn windowed(
        len: usize,
        window: usize,
        render: impl Fn(&WindowCursor) -> Reply + Send + 'static,
    ) -> Self {
        Self {
            content: MenuContent::Windowed {
                cursor: WindowCursor::new(len, window),
                glyphs: MenuGlyphs::default(),
                render: Box::new(render),
            },
            timeout: DEFAULT_MENU_TIMEOUT,
        }
    }

    /// A windowed menu over lines of text: the visible lines become the
    /// description and the range is appended to the template's title.
    pub fn list(template: Reply, lines: Vec<String>, window: usize) -> Self {
        Self::windowed(lines.len(), window, move |cursor| {
            template
                .clone()
                .with_title_suffix(&format!(" {}", cursor.range_label()))
                .description(lines[cursor.range()].join("\n"))
        })
    }

    /// A menu with its own glyph -> action map.
    pub fn custom(initial: Reply, actions: Vec<(String, MenuAction)>) -> Self {
        Self {
            content: MenuContent::Custom { initial, actions },
            timeout: DEFAULT_MENU_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the control glyphs of a windowed menu.
    pub fn glyphs(mut self, new_glyphs: MenuGlyphs) -> Self {
        if let MenuContent::Windowed { glyphs, .. } = &mut self.content {
            *glyphs = new_glyphs;
        }
        self
    }

    /// Post the first page and start the session. The returned handle can
    /// stop it early or wait for it to finish; dropping the handle leaves the
    /// session running until it stops or times out.
    pub async fn start(
        self,
        gateway: Arc<dyn Gateway>,
        channel_id: u64,
        owner_id: u64,
    ) -> Result<MenuHandle, GatewayError> {
        let message = gateway.send(channel_id, self.content.initial_page()).await?;
        let subscription = gateway.subscribe_reactions(message);

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);

        let session = MenuSession {
            gateway,
            message,
            owner_id,
            content: self.content,
        };
        let task = tokio::spawn(session.run(subscription, self.timeout, Arc::clone(&stop_tx), stop_rx));

        Ok(MenuHandle {
            message,
            stop_tx,
            task,
        })
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEnd {
    Stopped,
    Expired,
    /// The gateway closed the subscription.
    Disconnected,
}

enum Flow {
    Continue,
    Stop,
}

struct MenuSession {
    gateway: Arc<dyn Gateway>,
    message: MessageHandle,
    owner_id: u64,
    content: MenuContent,
}

impl MenuSession {
    async fn run(
        mut self,
        mut subscription: ReactionSubscription,
        timeout: Duration,
        // Held so the stop channel stays open when the caller drops its handle
        _stop_tx: Arc<watch::Sender<bool>>,
        mut stop_rx: watch::Receiver<bool>,
    ) -> MenuEnd {
        let deadline = sleep(timeout);
        tokio::pin!(deadline);

        for glyph in self.content.glyphs() {
            if *stop_rx.borrow() {
                break;
            }
            if let Err(e) = self.gateway.add_reaction(self.message, &glyph).await {
                tracing::warn!(message_id = self.message.message_id, "Failed to add menu reaction {}: {}", glyph, e);
            }
        }

        let end = loop {
            if *stop_rx.borrow() {
                break MenuEnd::Stopped;
            }

            tokio::select! {
                _ = &mut deadline => break MenuEnd::Expired,
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break MenuEnd::Stopped;
                    }
                }
                event = subscription.recv() => match event {
                    None => break MenuEnd::Disconnected,
                    Some(event) => {
                        if let Flow::Stop = self.on_reaction(event).await {
                            break MenuEnd::Stopped;
                        }
                    }
                },
            }
        };

        drop(subscription);
        if let Err(e) = self.gateway.clear_reactions(self.message).await {
            tracing::warn!(message_id = self.message.message_id, "Failed to clear menu reactions: {}", e);
        }
        tracing::debug!(message_id = self.message.message_id, end = ?end, "Reaction menu ended");
        end
    }

    async fn on_reaction(&mut self, event: ReactionEvent) -> Flow {
        let gateway = Arc::clone(&self.gateway);
        let message = self.message;

        if event.user_id == gateway.bot_user_id() {
            return Flow::Continue;
        }

        if event.user_id != self.owner_id {
            if !self.content.is_stop(&event.glyph) {
                remove_reaction(gateway.as_ref(), message, &event).await;
            }
            return Flow::Continue;
        }

        match self.content.press(&event.glyph) {
            Pressed::NotAControl => Flow::Continue,
            Pressed::Stop => Flow::Stop,
            Pressed::Unchanged => {
                remove_reaction(gateway.as_ref(), message, &event).await;
                Flow::Continue
            }
            Pressed::Changed(page) => {
                if let Err(e) = gateway.edit(message, page).await {
                    tracing::warn!(message_id = message.message_id, "Failed to edit menu page: {}", e);
                }
                remove_reaction(gateway.as_ref(), message, &event).await;
                Flow::Continue
            }
        }
    }
}

async fn remove_reaction(gateway: &dyn Gateway, message: MessageHandle, event: &ReactionEvent) {
    if let Err(e) = gateway
        .remove_reaction(message, &event.glyph, event.user_id)
        .await
    {
        tracing::debug!(message_id = message.message_id, "Failed to remove reaction: {}", e);
    }
}

/// Handle to a running menu.
pub struct MenuHandle {
    message: MessageHandle,
    stop_tx: Arc<watch::Sender<bool>>,
    task: JoinHandle<MenuEnd>,
}

impl MenuHandle {
    pub fn message(&self) -> MessageHandle {
        self.message
    }

    /// Ask the session to stop. Safe to call any number of times, also after
    /// the session already ended.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end. `None` if the session task died.
    pub async fn wait(self) -> Option<MenuEnd> {
        self.task.await.ok()
    }
}
