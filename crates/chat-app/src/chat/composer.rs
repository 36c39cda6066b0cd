use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
};

use crate::chat::events::{InputChanged, Submit, ToggleVoice};

pub const INPUT_PLACEHOLDER: &str = "Type your message...";

/// Compose box: text input, voice toggle and send button.
pub struct Composer {
    input_state: Entity<InputState>,
    can_send: bool,
    busy: bool,
    listening: bool,
}

impl EventEmitter<Submit> for Composer {}
impl EventEmitter<InputChanged> for Composer {}
impl EventEmitter<ToggleVoice> for Composer {}

impl Composer {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| InputState::new(window, cx).placeholder(INPUT_PLACEHOLDER));

        cx.subscribe_in(
            &input_state,
            window,
            |this, state, event: &InputEvent, _window, cx| match event {
                InputEvent::PressEnter { secondary: false } => this.handle_submit(cx),
                InputEvent::PressEnter { .. } => {}
                _ => {
                    let text = state.read(cx).value().to_string();
                    cx.emit(InputChanged { text });
                }
            },
        )
        .detach();

        Self {
            input_state,
            can_send: false,
            busy: false,
            listening: false,
        }
    }

    /// Mirrors the chat view's gating: a send is possible and none is running.
    pub fn set_state(&mut self, can_send: bool, busy: bool, listening: bool, cx: &mut Context<Self>) {
        if self.can_send == can_send && self.busy == busy && self.listening == listening {
            return;
        }
        self.can_send = can_send;
        self.busy = busy;
        self.listening = listening;
        cx.notify();
    }

    pub fn set_text(&mut self, text: impl Into<SharedString>, window: &mut Window, cx: &mut Context<Self>) {
        let text = text.into();
        self.input_state.update(cx, |state, cx| {
            state.set_value(text.clone(), window, cx);
        });
        cx.emit(InputChanged {
            text: text.to_string(),
        });
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.set_text("", window, cx);
    }

    fn handle_submit(&mut self, cx: &mut Context<Self>) {
        if !self.can_send || self.busy {
            return;
        }
        cx.emit(Submit);
    }
}

impl Render for Composer {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let voice_label = if self.listening { "Listening..." } else { "Voice" };

        h_flex()
            .w_full()
            .gap_2()
            .p_3()
            .items_center()
            .border_t_1()
            .border_color(theme.border)
            .bg(theme.background)
            .child(
                div()
                    .flex_1()
                    .min_w_0()
                    .child(Input::new(&self.input_state).w_full().disabled(self.busy)),
            )
            .child(
                Button::new("composer-voice")
                    .small()
                    .ghost()
                    .when(self.listening, |button| button.danger())
                    .child(voice_label)
                    .disabled(self.listening)
                    .on_click(cx.listener(|_, _, _window, cx| {
                        cx.emit(ToggleVoice);
                    })),
            )
            .child(
                Button::new("composer-send")
                    .small()
                    .primary()
                    .icon(IconName::ArrowUp)
                    .child("Send")
                    .loading(self.busy)
                    .disabled(!self.can_send || self.busy)
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.handle_submit(cx);
                    })),
            )
    }
}
