mod chat;
mod config;
mod gemini;
mod markdown;
mod sources;
mod watermark;

use iced::widget::text::Span;
use iced::widget::{
    button, column, container, rich_text, row, scrollable, span, text, text_input, Space,
};
use iced::{
    alignment, time, window, Color, Element, Font, Length, Subscription, Task, Theme,
};
use std::sync::Arc;
use std::time::Duration;

use chat::{ActiveTask, ChatController, ChatMessage, MessageKind, ResearchPhase, Role, TaskKind};
use markdown::{Block, Inline};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const RESEARCH_STATUS_LINES: [&str; 7] = [
    "Starting research...",
    "Reading reuters.com...",
    "Analyzing market data...",
    "Checking sources for accuracy...",
    "Searching for historical trends...",
    "Compiling information...",
    "Reading bloomberg.com...",
];

const BIO_LINKS: [(&str, &str); 3] = [
    ("Instagram", "https://www.instagram.com/rare_tips69/"),
    ("Facebook", "https://www.facebook.com/share/1FCqAG7GnK/"),
    ("WhatsApp", "https://wa.me/923409796147"),
];

const USER_BUBBLE: Color = Color::from_rgb(0.15, 0.39, 0.92);
const ASSISTANT_BUBBLE: Color = Color::from_rgb(0.23, 0.23, 0.26);
const CODE_BACKGROUND: Color = Color::from_rgb(0.10, 0.10, 0.12);
const SIDEBAR_BACKGROUND: Color = Color::from_rgb(0.06, 0.06, 0.07);
const LINK_COLOR: Color = Color::from_rgb(0.38, 0.65, 0.98);
const DIM_TEXT: Color = Color::from_rgb(0.62, 0.62, 0.66);

fn main() -> iced::Result {
    let config = config::Config::load();

    iced::application("Rare AI", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: iced::Size::new(config.window.width as f32, config.window.height as f32),
            position: window::Position::Centered,
            ..Default::default()
        })
        .run_with(App::new)
}

#[derive(Debug, Clone)]
enum Message {
    InputChanged(String),
    Submit,
    TurnFinished,
    Tick,
    ToggleSidebar,
    ToggleTaskMenu,
    SelectTask(chat::Task),
    CancelTask,
    NewChat,
    OpenLink(String),
}

/// Transcript entry plus its decoded raster, so image payloads aren't
/// re-decoded on every frame.
struct DisplayMessage {
    message: ChatMessage,
    image: Option<iced::widget::image::Handle>,
}

impl From<ChatMessage> for DisplayMessage {
    fn from(message: ChatMessage) -> Self {
        let image = (message.kind == MessageKind::Image)
            .then(|| watermark::data_uri_bytes(&message.text).ok())
            .flatten()
            .map(iced::widget::image::Handle::from_bytes);
        DisplayMessage { message, image }
    }
}

struct App {
    controller: Arc<ChatController>,
    input_text: String,
    sidebar_open: bool,
    show_task_menu: bool,
    transcript: Vec<DisplayMessage>,
    active: ActiveTask,
    busy: bool,
    loading_frame: usize,
    input_id: text_input::Id,
    scroll_id: scrollable::Id,
}

impl App {
    fn new() -> (Self, Task<Message>) {
        let config = config::Config::load();

        if config.api.key.is_empty() {
            eprintln!(
                "Warning: no API key configured. Set GEMINI_API_KEY or add it to {}",
                config::Config::get_config_path().display()
            );
        }

        let client = Arc::new(gemini::GeminiClient::with_config(config.api));
        let controller = Arc::new(ChatController::new(client));

        let input_id = text_input::Id::unique();

        let app = App {
            controller,
            input_text: String::new(),
            sidebar_open: false,
            show_task_menu: false,
            transcript: Vec::new(),
            active: ActiveTask::Idle,
            busy: false,
            loading_frame: 0,
            input_id: input_id.clone(),
            scroll_id: scrollable::Id::unique(),
        };

        (app, text_input::focus(input_id))
    }

    // `busy` mirrors the turn the view dispatched, not the controller flag:
    // it flips on Submit and clears on TurnFinished, so the tick
    // subscription can't die between dispatching the turn and the
    // controller picking it up.
    fn refresh_snapshot(&mut self) {
        self.transcript = self
            .controller
            .transcript()
            .into_iter()
            .map(DisplayMessage::from)
            .collect();
        self.active = self.controller.active_task();
    }

    fn snap_to_end(&self) -> Task<Message> {
        scrollable::snap_to(self.scroll_id.clone(), scrollable::RelativeOffset::END)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.input_text = value;
                Task::none()
            }
            Message::Submit => {
                if self.input_text.trim().is_empty() || self.busy {
                    return Task::none();
                }

                let prompt = std::mem::take(&mut self.input_text);
                self.show_task_menu = false;
                self.busy = true;
                self.loading_frame = 0;

                let controller = self.controller.clone();
                Task::future(async move {
                    controller.submit(&prompt).await;
                    Message::TurnFinished
                })
            }
            Message::TurnFinished => {
                self.busy = false;
                self.refresh_snapshot();
                self.snap_to_end()
            }
            Message::Tick => {
                if self.busy {
                    self.loading_frame += 1;
                    self.refresh_snapshot();
                }
                self.snap_to_end()
            }
            Message::ToggleSidebar => {
                self.sidebar_open = !self.sidebar_open;
                Task::none()
            }
            Message::ToggleTaskMenu => {
                self.show_task_menu = !self.show_task_menu;
                Task::none()
            }
            Message::SelectTask(task) => {
                self.controller.select_task(task);
                self.show_task_menu = false;
                self.refresh_snapshot();
                text_input::focus(self.input_id.clone())
            }
            Message::CancelTask => {
                self.controller.cancel_active_task();
                self.refresh_snapshot();
                Task::none()
            }
            Message::NewChat => {
                self.controller.new_conversation();
                self.show_task_menu = false;
                self.sidebar_open = false;
                self.refresh_snapshot();
                text_input::focus(self.input_id.clone())
            }
            Message::OpenLink(url) => {
                // Links always open in an external browser context.
                if let Err(e) = open::that(&url) {
                    eprintln!("Warning: could not open {}: {}", url, e);
                }
                Task::none()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.busy {
            time::every(Duration::from_millis(100)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn view(&self) -> Element<Message> {
        let panel = self.chat_panel();

        if self.sidebar_open {
            row![self.sidebar(), panel].into()
        } else {
            panel
        }
    }

    fn sidebar(&self) -> Element<Message> {
        let nav = column![
            button(text("New chat").size(15))
                .on_press(Message::NewChat)
                .style(button::text),
            text("Chats").size(15).color(DIM_TEXT),
            text("Library").size(15).color(DIM_TEXT),
            text("Rare AI").size(15).color(DIM_TEXT),
        ]
        .spacing(14);

        container(
            column![
                nav,
                Space::with_height(Length::Fill),
                text("Sign in").size(15).color(DIM_TEXT)
            ]
            .padding(16),
        )
        .width(240)
        .height(Length::Fill)
        .style(|_theme| container::Style {
            background: Some(SIDEBAR_BACKGROUND.into()),
            ..container::Style::default()
        })
        .into()
    }

    fn chat_panel(&self) -> Element<Message> {
        let header = row![
            button(text("☰").size(18))
                .on_press(Message::ToggleSidebar)
                .style(button::text),
            Space::with_width(Length::Fill),
            text("Rare AI").size(18),
            Space::with_width(Length::Fill),
        ]
        .padding(12)
        .align_y(alignment::Vertical::Center);

        let body: Element<Message> = if self.transcript.is_empty() && !self.busy {
            self.home_screen()
        } else {
            self.message_list()
        };

        column![header, body, self.footer()].into()
    }

    fn home_screen(&self) -> Element<Message> {
        let mut suggestions = row![].spacing(12);
        for task in chat::HOME_TASKS {
            suggestions = suggestions.push(
                button(text(task.name).size(16))
                    .on_press(Message::SelectTask(task))
                    .padding(16)
                    .style(button::secondary),
            );
        }

        container(
            column![text("What can I help with?").size(40), suggestions]
                .spacing(32)
                .align_x(alignment::Horizontal::Center),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .align_x(alignment::Horizontal::Center)
        .align_y(alignment::Vertical::Center)
        .into()
    }

    fn message_list(&self) -> Element<Message> {
        let mut messages = column![].spacing(16).padding(20);
        for entry in &self.transcript {
            messages = messages.push(self.message_bubble(entry));
        }
        if self.busy {
            messages = messages.push(self.loading_bubble());
        }

        scrollable(container(messages).width(Length::Fill))
            .id(self.scroll_id.clone())
            .height(Length::Fill)
            .into()
    }

    fn message_bubble<'a>(&self, entry: &'a DisplayMessage) -> Element<'a, Message> {
        let message = &entry.message;

        if message.kind == MessageKind::Notice {
            return container(
                text(format!("--- {} ---", message.text))
                    .size(13)
                    .color(DIM_TEXT),
            )
            .width(Length::Fill)
            .align_x(alignment::Horizontal::Center)
            .into();
        }

        if message.role == Role::User {
            let content = render_markdown(&message.text);
            return row![
                Space::with_width(Length::Fill),
                bubble(content, USER_BUBBLE)
            ]
            .into();
        }

        let inner: Element<Message> = match message.kind {
            MessageKind::Thought => column![
                text("Thought").size(13).color(DIM_TEXT),
                render_markdown(&message.text)
            ]
            .spacing(8)
            .into(),
            MessageKind::Bio => {
                let mut links = row![].spacing(10);
                for (name, url) in BIO_LINKS {
                    links = links.push(
                        button(text(name).size(13))
                            .on_press(Message::OpenLink(url.to_string()))
                            .style(button::text),
                    );
                }
                column![render_markdown(&message.text), links]
                    .spacing(10)
                    .into()
            }
            MessageKind::Image => {
                let picture: Element<Message> = match &entry.image {
                    Some(handle) => iced::widget::image(handle.clone()).width(400).into(),
                    None => text("[image unavailable]").color(DIM_TEXT).into(),
                };
                with_model_label(picture, message)
            }
            _ => {
                let mut parts = column![render_markdown(&message.text)].spacing(10);
                if !message.sources.is_empty() {
                    let mut chips = row![text("Sources:").size(13).color(DIM_TEXT)]
                        .spacing(8)
                        .align_y(alignment::Vertical::Center);
                    for source in &message.sources {
                        chips = chips.push(
                            button(text(source.name.clone()).size(13))
                                .on_press(Message::OpenLink(source.url.clone()))
                                .style(button::secondary),
                        );
                    }
                    parts = parts.push(chips);
                }
                with_model_label(parts.into(), message)
            }
        };

        row![
            bubble(inner, ASSISTANT_BUBBLE),
            Space::with_width(Length::Fill)
        ]
        .into()
    }

    fn loading_bubble(&self) -> Element<Message> {
        let label = match (self.active.research_phase(), self.active.task()) {
            (Some(ResearchPhase::Researching { .. }), _) => {
                RESEARCH_STATUS_LINES[(self.loading_frame / 15) % RESEARCH_STATUS_LINES.len()]
                    .to_string()
            }
            (_, Some(task)) if task.kind == TaskKind::WebSearch => "Searching the web".to_string(),
            _ => format!(
                "{} Thinking...",
                SPINNER_FRAMES[self.loading_frame % SPINNER_FRAMES.len()]
            ),
        };

        row![
            bubble(
                text(label).size(15).color(DIM_TEXT).into(),
                ASSISTANT_BUBBLE
            ),
            Space::with_width(Length::Fill)
        ]
        .into()
    }

    fn task_menu(&self) -> Element<Message> {
        let mut attachments = row![].spacing(12);
        for task in chat::ATTACHMENT_TASKS {
            attachments = attachments.push(
                button(text(task.name).size(14))
                    .on_press(Message::SelectTask(task))
                    .padding(12)
                    .style(button::secondary),
            );
        }

        let mut actions = column![].spacing(6);
        for task in chat::ACTION_TASKS {
            actions = actions.push(
                button(text(task.name).size(14))
                    .on_press(Message::SelectTask(task))
                    .width(Length::Fill)
                    .style(button::text),
            );
        }

        container(column![attachments, actions].spacing(14).padding(14))
            .width(Length::Fill)
            .style(|_theme| container::Style {
                background: Some(CODE_BACKGROUND.into()),
                border: iced::border::rounded(12),
                ..container::Style::default()
            })
            .into()
    }

    fn footer(&self) -> Element<Message> {
        let mut footer = column![].spacing(10).padding(16);

        if self.show_task_menu {
            footer = footer.push(self.task_menu());
        }

        if let Some(task) = self.active.task() {
            let pill = row![
                text(task.name).size(13),
                button(text("✕").size(12))
                    .on_press(Message::CancelTask)
                    .style(button::text),
            ]
            .spacing(6)
            .align_y(alignment::Vertical::Center);

            footer = footer.push(
                container(pill)
                    .padding([4, 10])
                    .style(|_theme| container::Style {
                        background: Some(USER_BUBBLE.into()),
                        border: iced::border::rounded(12),
                        ..container::Style::default()
                    }),
            );
        }

        let placeholder = match self.active.task() {
            Some(task) => format!("Describe what to {}...", task.id.replace('_', " ")),
            None => "Ask anything...".to_string(),
        };

        let mut input = text_input(&placeholder, &self.input_text)
            .id(self.input_id.clone())
            .padding(12)
            .size(16)
            .on_submit(Message::Submit);
        if !self.busy {
            input = input.on_input(Message::InputChanged);
        }

        let can_send = !self.busy && !self.input_text.trim().is_empty();
        let send = button(text("Send").size(15))
            .on_press_maybe(can_send.then_some(Message::Submit))
            .padding(12)
            .style(button::primary);

        let menu_toggle = button(text("+").size(18))
            .on_press(Message::ToggleTaskMenu)
            .style(button::text);

        footer
            .push(
                row![menu_toggle, input, send]
                    .spacing(8)
                    .align_y(alignment::Vertical::Center),
            )
            .into()
    }
}

fn with_model_label<'a>(
    content: Element<'a, Message>,
    message: &ChatMessage,
) -> Element<'a, Message> {
    match &message.model {
        Some(model) => column![content, text(model.clone()).size(12).color(DIM_TEXT)]
            .spacing(6)
            .into(),
        None => content,
    }
}

fn bubble(content: Element<'_, Message>, background: Color) -> Element<'_, Message> {
    container(content)
        .padding(12)
        .max_width(620)
        .style(move |_theme| container::Style {
            background: Some(background.into()),
            border: iced::border::rounded(12),
            ..container::Style::default()
        })
        .into()
}

fn render_markdown(source: &str) -> Element<'static, Message> {
    let mut out = column![].spacing(8);

    for block in markdown::format(source) {
        let element: Element<Message> = match block {
            Block::Paragraph(inlines) => {
                let rich: Element<'static, String> = rich_text(spans_for(inlines)).size(15).into();
                rich.map(Message::OpenLink)
            }
            Block::List(items) => {
                let mut list = column![].spacing(4);
                for item in items {
                    let rich: Element<'static, String> =
                        rich_text(spans_for(item)).size(15).into();
                    list = list.push(
                        row![text("•").size(15), rich.map(Message::OpenLink)].spacing(8),
                    );
                }
                list.into()
            }
            Block::Code(code) => container(
                text(code.trim_matches('\n').to_string())
                    .font(Font::MONOSPACE)
                    .size(13),
            )
            .padding(10)
            .width(Length::Fill)
            .style(|_theme| container::Style {
                background: Some(CODE_BACKGROUND.into()),
                border: iced::border::rounded(8),
                ..container::Style::default()
            })
            .into(),
        };
        out = out.push(element);
    }

    out.into()
}

fn spans_for(inlines: Vec<Inline>) -> Vec<Span<'static, String>> {
    let mut spans = Vec::new();

    for inline in inlines {
        spans.push(match inline {
            Inline::Text(s) => span(s),
            Inline::Strong(s) => span(s).font(bold_font()),
            Inline::Em(s) => span(s).font(italic_font()),
            Inline::Code(s) => span(s).font(Font::MONOSPACE),
            Inline::Link { label, url } => span(label).color(LINK_COLOR).underline(true).link(url),
            Inline::Break => span("\n"),
        });
    }

    spans
}

fn bold_font() -> Font {
    Font {
        weight: iced::font::Weight::Bold,
        ..Font::DEFAULT
    }
}

fn italic_font() -> Font {
    Font {
        style: iced::font::Style::Italic,
        ..Font::DEFAULT
    }
}
