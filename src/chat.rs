use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::gemini::GenerationClient;
use crate::sources::{split_sources, Source};
use crate::watermark;

pub const ASSISTANT_MODEL: &str = "Rare AI";
pub const IMAGE_MODEL: &str = "Rare AI (Imagen 3)";
pub const ERROR_MODEL: &str = "System";

pub const BIO_TEXT: &str = "I am Rare AI, an advanced language model created by Nisar Khan. At 20 years old, Nisar, from Pakistan, developed me with the vision of creating a helpful and accessible AI for everyone. His goal is to empower users with a powerful tool for research, creativity, and learning.";

const BIO_TRIGGERS: [&str; 4] = ["who are you", "who made you", "ceo of rare ai", "nisar khan"];

const RESEARCH_NOTICE: &str = "Got it. This is a complex topic, so I will take a few minutes to conduct a thorough search and compile the results for you.";
const IMAGE_NOTICE: &str = "Okay, I'm starting the image generation process. This can take a few moments to create a high-quality result.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Rendering variant of a transcript entry. `Image` messages carry a PNG
/// data URI in `text` instead of prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Plain,
    Image,
    Thought,
    Bio,
    Notice,
}

/// One entry of the append-only transcript. Never mutated or reordered
/// after append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub kind: MessageKind,
    pub text: String,
    pub sources: Vec<Source>,
    pub model: Option<String>,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        ChatMessage {
            role: Role::User,
            kind: MessageKind::Plain,
            text: text.to_string(),
            sources: Vec::new(),
            model: None,
        }
    }

    pub fn assistant(text: String, sources: Vec<Source>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            kind: MessageKind::Plain,
            text,
            sources,
            model: Some(ASSISTANT_MODEL.to_string()),
        }
    }

    pub fn notice(text: &str) -> Self {
        ChatMessage {
            role: Role::System,
            kind: MessageKind::Notice,
            text: text.to_string(),
            sources: Vec::new(),
            model: None,
        }
    }

    pub fn thought(text: String) -> Self {
        ChatMessage {
            role: Role::Assistant,
            kind: MessageKind::Thought,
            text,
            sources: Vec::new(),
            model: None,
        }
    }

    pub fn bio() -> Self {
        ChatMessage {
            role: Role::Assistant,
            kind: MessageKind::Bio,
            text: BIO_TEXT.to_string(),
            sources: Vec::new(),
            model: None,
        }
    }

    pub fn image(data_uri: String) -> Self {
        ChatMessage {
            role: Role::Assistant,
            kind: MessageKind::Image,
            text: data_uri,
            sources: Vec::new(),
            model: Some(IMAGE_MODEL.to_string()),
        }
    }

    fn failure(message: &str) -> Self {
        ChatMessage {
            role: Role::Assistant,
            kind: MessageKind::Plain,
            text: format!("An error occurred: {}", message),
            sources: Vec::new(),
            model: Some(ERROR_MODEL.to_string()),
        }
    }
}

/// How a selected task routes the next submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Prefix the prompt and send once.
    Prefix,
    CreateImage,
    WebSearch,
    ThinkLonger,
    DeepResearch,
}

/// A selectable shortcut. At most one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub id: &'static str,
    pub name: &'static str,
    pub prompt_prefix: &'static str,
    pub kind: TaskKind,
}

pub const ATTACHMENT_TASKS: [Task; 3] = [
    Task {
        id: "camera",
        name: "Camera",
        prompt_prefix: "Analyze the image from the camera",
        kind: TaskKind::Prefix,
    },
    Task {
        id: "photos",
        name: "Photos",
        prompt_prefix: "Analyze the photo",
        kind: TaskKind::Prefix,
    },
    Task {
        id: "files",
        name: "Files",
        prompt_prefix: "Analyze the file",
        kind: TaskKind::Prefix,
    },
];

pub const ACTION_TASKS: [Task; 5] = [
    Task {
        id: "think_longer",
        name: "Think longer",
        prompt_prefix: "Think longer about",
        kind: TaskKind::ThinkLonger,
    },
    Task {
        id: "deep_research",
        name: "Deep research",
        prompt_prefix: "Do deep research on",
        kind: TaskKind::DeepResearch,
    },
    Task {
        id: "study_learn",
        name: "Study and learn",
        prompt_prefix: "Help me study and learn about",
        kind: TaskKind::Prefix,
    },
    Task {
        id: "create_image",
        name: "Create image",
        prompt_prefix: "Create an image of",
        kind: TaskKind::CreateImage,
    },
    Task {
        id: "web_search",
        name: "Web search",
        prompt_prefix: "Do a web search for",
        kind: TaskKind::WebSearch,
    },
];

/// Suggestions shown on the empty-transcript home screen.
pub const HOME_TASKS: [Task; 3] = [
    Task {
        id: "create_image",
        name: "Create image",
        prompt_prefix: "Create an image of",
        kind: TaskKind::CreateImage,
    },
    Task {
        id: "write",
        name: "Help me write",
        prompt_prefix: "Help me write",
        kind: TaskKind::Prefix,
    },
    Task {
        id: "summarize",
        name: "Summarize text",
        prompt_prefix: "Summarize the following text",
        kind: TaskKind::Prefix,
    },
];

/// Where the scripted deep-research flow stands. The topic lives inside the
/// phase, so a phase can't outlive its task and a research call can't run
/// without a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchPhase {
    AwaitingTopic,
    Clarifying { topic: String },
    Researching { topic: String },
}

/// The one tagged task state. Selecting a task replaces whatever was active
/// before, research phase included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveTask {
    Idle,
    OneShot(Task),
    ThinkLonger(Task),
    DeepResearch(Task, ResearchPhase),
}

impl ActiveTask {
    pub fn task(&self) -> Option<&Task> {
        match self {
            ActiveTask::Idle => None,
            ActiveTask::OneShot(task)
            | ActiveTask::ThinkLonger(task)
            | ActiveTask::DeepResearch(task, _) => Some(task),
        }
    }

    pub fn research_phase(&self) -> Option<&ResearchPhase> {
        match self {
            ActiveTask::DeepResearch(_, phase) => Some(phase),
            _ => None,
        }
    }

    #[allow(dead_code)]
    pub fn is_idle(&self) -> bool {
        matches!(self, ActiveTask::Idle)
    }
}

/// Artificial pacing for the scripted flows.
#[derive(Debug, Clone, Copy)]
pub struct Delays {
    pub research: Duration,
    pub image: Duration,
    pub search: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Delays {
            research: Duration::from_secs(5),
            image: Duration::from_secs(3),
            search: Duration::from_secs(2),
        }
    }
}

struct TurnState {
    active: ActiveTask,
    busy: bool,
}

/// Owns the transcript and the task state machine, and drives one turn per
/// user submission. The busy flag keeps turns single-flight; the view polls
/// `transcript()` / `active_task()` snapshots while a turn runs.
pub struct ChatController {
    client: Arc<dyn GenerationClient>,
    delays: Delays,
    transcript: Mutex<Vec<ChatMessage>>,
    state: Mutex<TurnState>,
}

impl ChatController {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self::with_delays(client, Delays::default())
    }

    pub fn with_delays(client: Arc<dyn GenerationClient>, delays: Delays) -> Self {
        ChatController {
            client,
            delays,
            transcript: Mutex::new(Vec::new()),
            state: Mutex::new(TurnState {
                active: ActiveTask::Idle,
                busy: false,
            }),
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn active_task(&self) -> ActiveTask {
        self.state
            .lock()
            .map(|s| s.active.clone())
            .unwrap_or(ActiveTask::Idle)
    }

    #[allow(dead_code)]
    pub fn is_busy(&self) -> bool {
        self.state.lock().map(|s| s.busy).unwrap_or(false)
    }

    /// Activate a shortcut. Always replaces the previous task and resets
    /// any research phase.
    pub fn select_task(&self, task: Task) {
        let active = match task.kind {
            TaskKind::DeepResearch => ActiveTask::DeepResearch(task, ResearchPhase::AwaitingTopic),
            TaskKind::ThinkLonger => ActiveTask::ThinkLonger(task),
            _ => ActiveTask::OneShot(task),
        };
        self.set_active(active);
        self.push(ChatMessage::notice(&format!("{} mode activated.", task.name)));
    }

    pub fn cancel_active_task(&self) {
        self.set_active(ActiveTask::Idle);
    }

    pub fn new_conversation(&self) {
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.clear();
        }
        self.set_active(ActiveTask::Idle);
    }

    /// Run one turn for a user submission. Ignored while a turn is already
    /// in flight or when the prompt is blank. Any failure inside the turn
    /// becomes a single error message and fully resets the task state, so
    /// the conversation is never left stuck mid-flow.
    pub async fn submit(&self, prompt: &str) {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return;
        }
        {
            let Ok(mut state) = self.state.lock() else { return };
            if state.busy {
                return;
            }
            state.busy = true;
        }

        self.push(ChatMessage::user(prompt));

        if let Err(e) = self.run_turn(prompt).await {
            self.push(ChatMessage::failure(&e.to_string()));
            self.set_active(ActiveTask::Idle);
        }

        if let Ok(mut state) = self.state.lock() {
            state.busy = false;
        }
    }

    async fn run_turn(&self, prompt: &str) -> anyhow::Result<()> {
        // Identity questions are answered locally, whatever else is active.
        if is_bio_query(prompt) {
            self.push(ChatMessage::bio());
            return Ok(());
        }

        match self.active_task() {
            ActiveTask::DeepResearch(task, ResearchPhase::AwaitingTopic) => {
                let reply = self.client.generate_text(&clarifying_prompt(prompt)).await?;
                self.push(ChatMessage::assistant(reply, Vec::new()));
                self.set_active(ActiveTask::DeepResearch(
                    task,
                    ResearchPhase::Clarifying {
                        topic: prompt.to_string(),
                    },
                ));
            }
            ActiveTask::DeepResearch(task, ResearchPhase::Clarifying { topic }) => {
                self.push(ChatMessage::notice(RESEARCH_NOTICE));
                self.set_active(ActiveTask::DeepResearch(
                    task,
                    ResearchPhase::Researching {
                        topic: topic.clone(),
                    },
                ));
                tokio::time::sleep(self.delays.research).await;

                let raw = self
                    .client
                    .generate_text(&research_prompt(&topic, prompt))
                    .await?;
                let (main_text, sources) = split_sources(&raw);
                self.push(ChatMessage::assistant(main_text, sources));
                self.set_active(ActiveTask::Idle);
            }
            ActiveTask::DeepResearch(_, ResearchPhase::Researching { .. }) => {
                // The input is disabled for the whole researching step; a
                // submission that slips through is dropped.
            }
            ActiveTask::ThinkLonger(_) => {
                let thought = self.client.generate_text(&think_prompt(prompt)).await?;
                self.push(ChatMessage::thought(thought.clone()));

                let answer = self
                    .client
                    .generate_text(&answer_prompt(&thought, prompt))
                    .await?;
                self.push(ChatMessage::assistant(answer, Vec::new()));
                self.set_active(ActiveTask::Idle);
            }
            ActiveTask::OneShot(task) => {
                let prefixed = format!("{}: \"{}\"", task.prompt_prefix, prompt);
                match task.kind {
                    TaskKind::CreateImage => {
                        self.push(ChatMessage::notice(IMAGE_NOTICE));
                        tokio::time::sleep(self.delays.image).await;

                        let image = self.client.generate_image(&prefixed).await?;
                        let stamped = watermark::apply(&image);
                        self.push(ChatMessage::image(watermark::to_data_uri(&stamped)?));
                    }
                    TaskKind::WebSearch => {
                        tokio::time::sleep(self.delays.search).await;

                        let raw = self.client.generate_text(&search_prompt(&prefixed)).await?;
                        let (main_text, sources) = split_sources(&raw);
                        self.push(ChatMessage::assistant(main_text, sources));
                    }
                    _ => {
                        let raw = self.client.generate_text(&prefixed).await?;
                        let (main_text, sources) = split_sources(&raw);
                        self.push(ChatMessage::assistant(main_text, sources));
                    }
                }
                self.set_active(ActiveTask::Idle);
            }
            ActiveTask::Idle => {
                let raw = self.client.generate_text(prompt).await?;
                let (main_text, sources) = split_sources(&raw);
                self.push(ChatMessage::assistant(main_text, sources));
            }
        }

        Ok(())
    }

    fn push(&self, message: ChatMessage) {
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.push(message);
        }
    }

    fn set_active(&self, active: ActiveTask) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
        }
    }
}

fn is_bio_query(prompt: &str) -> bool {
    let lowered = prompt.to_lowercase();
    BIO_TRIGGERS.iter().any(|k| lowered.contains(k))
}

fn clarifying_prompt(topic: &str) -> String {
    format!(
        "A user wants to do deep research on: \"{}\". Ask 4-5 short, clarifying, bullet-point questions to understand their needs. For example: \"Are you interested in historical trends or forecasts?\"",
        topic
    )
}

fn research_prompt(topic: &str, clarifications: &str) -> String {
    format!(
        "Gather the latest information from all over the world for a detailed report. The original topic was \"{}\". The user provided these clarifications: \"{}\". At the end of your answer, please list the direct URLs of the top 3-4 websites you used as sources under a \"Sources:\" heading in the format: - [Website Name](URL)",
        topic, clarifications
    )
}

fn think_prompt(request: &str) -> String {
    format!(
        "Think step-by-step about the user's request: \"{}\". Write down your internal monologue.",
        request
    )
}

fn answer_prompt(thought: &str, request: &str) -> String {
    format!(
        "Based on the following thought process:\n\n{}\n\nNow, provide a final, concise answer to the user's original request: \"{}\"",
        thought, request
    )
}

fn search_prompt(question: &str) -> String {
    format!(
        "Gather the latest information from all over the world to answer this: {}. At the end of your answer, please list the direct URLs of the top 3-4 websites you used as sources under a \"Sources:\" heading in the format: - [Website Name](URL)",
        question
    )
}
