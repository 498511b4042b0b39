//! backboard: terminal client for the Backboard assistant API.
//!
//! Lists assistants and threads, and runs a single chat turn with live
//! streamed output, document-indexing progress, and best-effort thread
//! titles.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use backboard_client::{
    derive_title, BackboardClient, BackboardConfig, ChatSession, FileTitleStore, FileUpload,
    IndexingPoller, SendMessageRequest, TitleCache, POLL_INTERVAL,
};
use backboard_common::{MemoryMode, ModelConfig, Notification, NotificationLevel};

#[derive(Parser)]
#[command(name = "backboard", about = "Terminal client for the Backboard assistant API")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List assistants.
    Assistants,
    /// List threads for an assistant.
    Threads { assistant_id: String },
    /// Send one message to a thread and stream the reply.
    Chat {
        thread_id: String,
        message: String,

        /// Request a complete (non-streaming) reply.
        #[arg(long)]
        no_stream: bool,

        /// Memory mode: off, readonly, or auto.
        #[arg(long, default_value = "auto")]
        memory: String,

        /// LLM provider to route the turn to.
        #[arg(long, default_value = "openai")]
        provider: String,

        /// Model name within the provider.
        #[arg(long, default_value = "gpt-4o")]
        model: String,

        /// Files to attach (repeatable).
        #[arg(long, value_name = "PATH")]
        attach: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backboard=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = BackboardConfig::from_env()
        .expect("BACKBOARD_API_KEY must be set (from your Backboard account settings)");
    let client = Arc::new(BackboardClient::new(config));

    match args.command {
        Command::Assistants => list_assistants(&client).await,
        Command::Threads { assistant_id } => list_threads(&client, &assistant_id).await,
        Command::Chat {
            thread_id,
            message,
            no_stream,
            memory,
            provider,
            model,
            attach,
        } => {
            let memory = parse_memory_mode(&memory);
            let model = ModelConfig {
                llm_provider: provider,
                model_name: model,
            };
            chat(client, thread_id, message, !no_stream, memory, model, attach).await;
        }
    }
}

async fn list_assistants(client: &BackboardClient) {
    match client.list_assistants().await {
        Ok(assistants) => {
            for a in assistants {
                println!("{}  {}", a.assistant_id, a.name);
            }
        }
        Err(e) => eprintln!("failed to list assistants: {e}"),
    }
}

async fn list_threads(client: &BackboardClient, assistant_id: &str) {
    let mut titles = TitleCache::new(Box::new(
        FileTitleStore::default_location().expect("no data directory available"),
    ));

    match client.list_threads(assistant_id).await {
        Ok(threads) => {
            for t in threads {
                let title = t
                    .title
                    .clone()
                    .or_else(|| titles.get(&t.thread_id).map(String::from))
                    .unwrap_or_else(|| "New chat".to_string());
                println!("{}  {}", t.thread_id, title);
            }
        }
        Err(e) => eprintln!("failed to list threads: {e}"),
    }
}

#[allow(clippy::too_many_arguments)]
async fn chat(
    client: Arc<BackboardClient>,
    thread_id: String,
    message: String,
    stream: bool,
    memory: MemoryMode,
    model: ModelConfig,
    attach: Vec<PathBuf>,
) {
    let mut request = SendMessageRequest::new(&message)
        .with_stream(stream)
        .with_memory(memory)
        .with_model(model);

    for path in attach {
        let bytes = std::fs::read(&path)
            .unwrap_or_else(|e| panic!("cannot read attachment {}: {e}", path.display()));
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        request = request.with_file(FileUpload { filename, bytes });
    }

    let session = ChatSession::new(Arc::clone(&client), &thread_id);

    // Print only the content that grew since the last snapshot.
    let mut printed = 0usize;
    let outcome = session
        .send(request, |snapshot| {
            let content = snapshot.content.as_str();
            if content.len() > printed {
                print!("{}", &content[printed..]);
                let _ = std::io::stdout().flush();
                printed = content.len();
            }
        })
        .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            show(&Notification::error("Failed to send message", e.to_string()));
            return;
        }
    };
    println!();

    if outcome.discarded {
        return;
    }

    if !outcome.completed {
        show(&Notification::error(
            "Stream interrupted",
            "The reply may be incomplete",
        ));
    }

    // First assistant turn on an untitled thread: derive and persist a title.
    let mut titles = TitleCache::new(Box::new(
        FileTitleStore::default_location().expect("no data directory available"),
    ));
    if titles.get(&thread_id).is_none() {
        titles.set(&thread_id, &derive_title(&message));
    }

    for cited in &outcome.assistant_message.retrieved_memories {
        tracing::info!(memory_id = %cited.memory_id, "memory cited");
    }

    if !outcome.pending_attachments.is_empty() {
        wait_for_indexing(client, outcome.pending_attachments).await;
    }
}

/// Poll attached documents to a terminal status, printing each transition.
async fn wait_for_indexing(
    client: Arc<BackboardClient>,
    pending: Vec<backboard_common::Attachment>,
) {
    let (mut poller, mut events) = IndexingPoller::new(client, POLL_INTERVAL);

    let mut awaiting = 0usize;
    for doc in pending {
        println!("indexing \"{}\"...", doc.filename);
        awaiting += 1;
        poller.track(doc).await;
    }

    let mut terminal = 0usize;
    while terminal < awaiting {
        let Some(event) = events.recv().await else {
            break;
        };
        if let Some(notification) = event.to_notification() {
            show(&notification);
            terminal += 1;
        }
    }

    poller.stop().await;
}

fn show(notification: &Notification) {
    let tag = match notification.level {
        NotificationLevel::Info => "info",
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "error",
    };
    eprintln!("[{tag}] {}: {}", notification.title, notification.body);
}

fn parse_memory_mode(s: &str) -> MemoryMode {
    match s.to_ascii_lowercase().as_str() {
        "off" => MemoryMode::Off,
        "readonly" => MemoryMode::Readonly,
        _ => MemoryMode::Auto,
    }
}
