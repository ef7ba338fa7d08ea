mod callback;
mod config;
mod error;
mod prompt;
mod quiz;
mod storage;
mod timer;

use std::sync::Arc;

use callback::CallbackAction;
use config::Config;
use dotenv::dotenv;
use error::MatchError;
use log::{debug, info, warn};
use prompt::Prompt;
use quiz::{
    catalog::JsonCatalog,
    matcher::{Matcher, Recommendation},
    sequencer::{self, Question},
    store::{QuizStore, QUIZ_STATE_KEY},
    Answer, QuizState,
};
use rand::{rngs::StdRng, SeedableRng};
use storage::SqliteStore;
use teloxide::{prelude::*, types::ChatAction, utils::command::BotCommands};
use timer::Timers;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type ChatQuiz = QuizStore<Arc<SqliteStore>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "start the quiz or pick up where you left off.")]
    Start,
    #[command(description = "go back one question.")]
    Back,
    #[command(description = "start the quiz over.")]
    Restart,
    #[command(description = "forget your answers.")]
    Cancel,
    #[command(description = "show this text.")]
    Help,
}

/// Shared by all handlers. Quiz state itself is loaded per update from `states`.
struct App {
    states: Arc<SqliteStore>,
    matcher: Matcher<JsonCatalog>,
    timers: Timers,
}

impl App {
    fn quiz(&self, chat_id: ChatId) -> ChatQuiz {
        QuizStore::open(
            self.states.clone(),
            format!("{}:{}", QUIZ_STATE_KEY, chat_id.0),
        )
    }

    /// Forgets the answers and stops a pending timer bell.
    fn reset(&self, chat_id: ChatId, quiz: &mut ChatQuiz) {
        self.timers.cancel(chat_id);
        quiz.reset();
    }
}

#[tokio::main]
async fn main() {
    // The environment may already carry everything, so a missing .env is fine
    dotenv().ok();

    pretty_env_logger::init();
    info!("Starting meditation quiz bot...");

    let config = Config::load().expect("Environment misconfigured");
    let bot = Bot::from_env();

    info!("Opening quiz storage at {}", config.db_path.display());
    let states = Arc::new(
        SqliteStore::open(&config.db_path).expect("Failed to open the quiz state database"),
    );

    info!("Loading the catalog from {}", config.catalog_path.display());
    let catalog = JsonCatalog::open(&config.catalog_path).expect("Failed to load the catalog");
    info!(
        "Catalog loaded: {} items, {} rules",
        catalog.content_count(),
        catalog.rule_count()
    );

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register the command list: {}", e);
    }

    let app = Arc::new(App {
        states,
        matcher: Matcher::new(catalog, config.match_policy),
        timers: Timers::default(),
    });

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command),
        )
        .branch(Update::filter_message().endpoint(free_text))
        .branch(Update::filter_callback_query().endpoint(button_pressed));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

const GREETING_TEXT: &str = "Hi! A few quick questions and I'll pick a practice that suits you right now.";
const GOODBYE_TEXT: &str = "Your answers are gone. Send /start whenever you want to practice.";
const USE_BUTTONS_TEXT: &str = "Please pick one of the options with the buttons. /help lists what else I can do.";
const OUTDATED_BUTTON_TEXT: &str = "That question has already moved on, here is where we are now.";

async fn command(bot: Bot, msg: Message, cmd: Command, app: Arc<App>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let mut quiz = app.quiz(chat_id);

    match cmd {
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string())
                .await?;
        }
        Command::Start => {
            bot.send_message(chat_id, GREETING_TEXT).await?;
            send_step(&bot, chat_id, &app, &quiz).await?;
        }
        Command::Back => {
            quiz.go_back();
            send_step(&bot, chat_id, &app, &quiz).await?;
        }
        Command::Restart => {
            app.reset(chat_id, &mut quiz);
            send_step(&bot, chat_id, &app, &quiz).await?;
        }
        Command::Cancel => {
            app.reset(chat_id, &mut quiz);
            bot.send_message(chat_id, GOODBYE_TEXT).await?;
        }
    }
    Ok(())
}

async fn free_text(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, USE_BUTTONS_TEXT).await?;
    Ok(())
}

async fn button_pressed(bot: Bot, q: CallbackQuery, app: Arc<App>) -> HandlerResult {
    // Only stops the spinner on the button, so a failure here doesn't matter
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(chat_id) = q.message.as_ref().map(|m| m.chat.id) else {
        return Ok(());
    };
    let action = match q.data.as_deref().unwrap_or_default().parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            warn!("Ignoring button press in chat {}: {}", chat_id.0, e);
            return Ok(());
        }
    };
    debug!("Chat {} pressed {}", chat_id.0, action);

    let mut quiz = app.quiz(chat_id);
    let answer = match action {
        CallbackAction::PracticeType(practice_type) => Some(Answer::PracticeType(practice_type)),
        CallbackAction::Duration(duration) => Some(Answer::Duration(duration)),
        CallbackAction::Goal(goal) => Some(Answer::Goal(goal)),
        CallbackAction::Approach(approach) => Some(Answer::Approach(approach)),
        CallbackAction::Object(object) => sequencer::self_meditation_answer(quiz.get(), object),
        CallbackAction::Next => {
            if sequencer::can_advance(quiz.get()) {
                quiz.go_next();
            } else {
                bot.send_message(chat_id, OUTDATED_BUTTON_TEXT).await?;
            }
            None
        }
        CallbackAction::Back => {
            quiz.go_back();
            None
        }
        CallbackAction::Restart => {
            app.reset(chat_id, &mut quiz);
            None
        }
        CallbackAction::Retry => None,
    };

    if let Some(answer) = answer {
        if sequencer::accepts(quiz.get(), &answer) {
            quiz.answer(answer);
        } else {
            bot.send_message(chat_id, OUTDATED_BUTTON_TEXT).await?;
        }
    }

    send_step(&bot, chat_id, &app, &quiz).await
}

/// Shows the question for the current step, or the outcome once the quiz is done.
async fn send_step(bot: &Bot, chat_id: ChatId, app: &Arc<App>, quiz: &ChatQuiz) -> HandlerResult {
    let state = quiz.get().clone();
    let question = sequencer::question_at(&state);
    if question != Question::Result {
        return send_prompt(bot, chat_id, prompt::question_prompt(question, &state)).await;
    }

    // Same as with the spinner: nice to have, fine to lose
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    // The search runs off the chat's update queue, so /back and /restart
    // are handled while the catalog is still answering
    let issued_at = quiz.generation();
    let (bot, app) = (bot.clone(), app.clone());
    tokio::spawn(async move {
        if let Err(e) = send_result(&bot, chat_id, &app, state, issued_at).await {
            warn!("Failed to send the result to chat {}: {}", chat_id.0, e);
        }
    });
    Ok(())
}

/// Runs the matcher and shows its outcome, unless the chat moved on meanwhile.
async fn send_result(
    bot: &Bot,
    chat_id: ChatId,
    app: &App,
    state: QuizState,
    issued_at: u64,
) -> HandlerResult {
    let mut rng = StdRng::from_entropy();
    let recommendation = app.matcher.recommend(&state, &mut rng).await;

    let mut quiz = app.quiz(chat_id);
    let prompt = match recommendation {
        Ok(Recommendation::Content(content)) => {
            if !quiz.answer_if_current(issued_at, Answer::Content(content.id.clone())) {
                return Ok(());
            }
            prompt::content_prompt(&content)
        }
        _ if !quiz.is_current(issued_at) => {
            debug!("Chat {} moved on, dropping its result", chat_id.0);
            return Ok(());
        }
        Ok(Recommendation::Timer(practice)) => {
            app.timers
                .start(chat_id, timer::bell(bot.clone(), chat_id, practice));
            prompt::timer_prompt(&practice)
        }
        Err(MatchError::NoMatch) | Err(MatchError::Incomplete) => prompt::no_match_prompt(),
        Err(e @ MatchError::Transport(_)) => {
            warn!("Search failed for chat {}: {}", chat_id.0, e);
            prompt::search_failed_prompt()
        }
    };
    send_prompt(bot, chat_id, prompt).await
}

async fn send_prompt(bot: &Bot, chat_id: ChatId, prompt: Prompt) -> HandlerResult {
    bot.send_message(chat_id, prompt.text)
        .reply_markup(prompt.keyboard)
        .await?;
    Ok(())
}
