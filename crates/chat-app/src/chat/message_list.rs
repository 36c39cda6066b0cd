use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, label::Label, v_flex};
use parley_storage::MessageRecord;

use crate::chat::timeline::{BubbleSide, chronological};

const BUBBLE_MAX_WIDTH: Pixels = px(540.);
const BUBBLE_PADDING_X: Pixels = px(14.);
const BUBBLE_PADDING_Y: Pixels = px(10.);
const LIST_PADDING: Pixels = px(16.);

pub const EMPTY_TRANSCRIPT: &str = "No messages yet. Say hello!";

/// Scrollable transcript of the latest messages, oldest at the top.
pub struct MessageList {
    messages: Vec<MessageRecord>,
    scroll_handle: ScrollHandle,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            messages: Vec::new(),
            scroll_handle: ScrollHandle::new(),
        }
    }

    /// Replaces the transcript with a newest-first snapshot and follows the tail.
    pub fn set_snapshot(&mut self, snapshot: Vec<MessageRecord>, cx: &mut Context<Self>) {
        self.messages = chronological(snapshot);
        if let Some(last) = self.messages.len().checked_sub(1) {
            self.scroll_handle.scroll_to_item(last);
        }
        cx.notify();
    }

    fn render_message(&self, message: &MessageRecord, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let side = BubbleSide::for_message(message);
        let (background, foreground) = match side {
            BubbleSide::Left => (theme.secondary, theme.secondary_foreground),
            BubbleSide::Right => (theme.accent, theme.accent_foreground),
        };

        h_flex()
            .id(SharedString::from(message.id.to_string()))
            .w_full()
            .map(|row| match side {
                BubbleSide::Left => row.justify_start(),
                BubbleSide::Right => row.justify_end(),
            })
            .child(
                div()
                    .max_w(BUBBLE_MAX_WIDTH)
                    .px(BUBBLE_PADDING_X)
                    .py(BUBBLE_PADDING_Y)
                    .rounded_lg()
                    .bg(background)
                    .text_color(foreground)
                    .child(Label::new(message.text.clone()).text_sm()),
            )
            .into_any_element()
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        if self.messages.is_empty() {
            return v_flex()
                .size_full()
                .items_center()
                .justify_center()
                .text_color(theme.muted_foreground)
                .child(Label::new(EMPTY_TRANSCRIPT).text_sm())
                .into_any_element();
        }

        let rows: Vec<AnyElement> = self
            .messages
            .iter()
            .map(|message| self.render_message(message, cx))
            .collect();

        // Rows are direct children so `scroll_to_item` indexes them.
        v_flex()
            .id("message-list")
            .size_full()
            .gap_3()
            .p(LIST_PADDING)
            .overflow_y_scroll()
            .track_scroll(&self.scroll_handle)
            .children(rows)
            .into_any_element()
    }
}
