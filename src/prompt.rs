//! Message texts and inline keyboards for each quiz step.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::callback::CallbackAction;
use crate::quiz::matcher::{ContentCandidate, TimerPractice};
use crate::quiz::sequencer::{self, Question};
use crate::quiz::{Approach, DurationRange, Goal, MeditationObject, PracticeType, QuizState};

pub struct Prompt {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

fn button(label: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, action.to_string())
}

pub fn question_prompt(question: Question, state: &QuizState) -> Prompt {
    let (text, options): (&str, Vec<InlineKeyboardButton>) = match question {
        Question::PracticeType => (
            "What would you like to practice today?",
            PracticeType::ALL
                .iter()
                .map(|p| button(p.label(), CallbackAction::PracticeType(*p)))
                .collect(),
        ),
        Question::Approach => (
            "How would you like to meditate?",
            Approach::ALL
                .iter()
                .map(|a| button(a.label(), CallbackAction::Approach(*a)))
                .collect(),
        ),
        Question::Duration => (
            "How much time do you have?",
            state
                .practice_type
                .map(|p| DurationRange::options_for(p, state.approach))
                .unwrap_or(&[])
                .iter()
                .map(|d| button(d.label(), CallbackAction::Duration(*d)))
                .collect(),
        ),
        Question::Goal => (
            "What do you want from this practice?",
            state
                .practice_type
                .map(Goal::options_for)
                .unwrap_or(&[])
                .iter()
                .map(|g| button(g.label(), CallbackAction::Goal(*g)))
                .collect(),
        ),
        Question::MeditationObject => (
            "What will you rest your attention on?",
            MeditationObject::ALL
                .iter()
                .map(|o| button(o.label(), CallbackAction::Object(*o)))
                .collect(),
        ),
        Question::Result => ("Looking for a practice for you...", Vec::new()),
    };

    let mut rows = options.into_iter().map(|b| vec![b]).collect::<Vec<_>>();
    let navigation = navigation_row(state);
    if !navigation.is_empty() {
        rows.push(navigation);
    }

    Prompt {
        text: text.to_string(),
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

fn navigation_row(state: &QuizState) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if state.step > 0 {
        row.push(button("◀ Back", CallbackAction::Back));
    }
    // Only revisited questions can be skipped forward
    if sequencer::can_advance(state) {
        row.push(button("Next ▶", CallbackAction::Next));
    }
    row
}

pub fn content_prompt(content: &ContentCandidate) -> Prompt {
    let mut text = format!(
        "Your practice: {}\n{} session, {} min",
        content.title,
        capitalize(content.kind.label()),
        minutes(content.duration)
    );
    if !content.description.is_empty() {
        text.push_str("\n\n");
        text.push_str(&content.description);
    }
    if let Some(thumbnail) = &content.thumbnail {
        text.push_str("\n\n");
        text.push_str(thumbnail);
    }

    Prompt {
        text,
        keyboard: InlineKeyboardMarkup::new(vec![vec![
            button("◀ Back", CallbackAction::Back),
            button("Take the quiz again", CallbackAction::Restart),
        ]]),
    }
}

pub fn timer_prompt(practice: &TimerPractice) -> Prompt {
    let focus = match practice.object {
        MeditationObject::Breath => "Follow your breath.",
        MeditationObject::Thought => "Watch your thoughts come and go.",
        MeditationObject::Body => "Scan through the sensations of your body.",
        MeditationObject::None => "Just sit, without holding on to anything.",
    };
    Prompt {
        text: format!(
            "Timer started: {} min.\n{}\nI'll let you know when the time is up.",
            minutes(practice.duration),
            focus
        ),
        keyboard: InlineKeyboardMarkup::new(vec![vec![button(
            "Take the quiz again",
            CallbackAction::Restart,
        )]]),
    }
}

pub fn no_match_prompt() -> Prompt {
    Prompt {
        text: "I couldn't find a practice for these answers. Try the quiz again with different choices."
            .to_string(),
        keyboard: InlineKeyboardMarkup::new(vec![vec![
            button("◀ Back", CallbackAction::Back),
            button("Take the quiz again", CallbackAction::Restart),
        ]]),
    }
}

pub fn search_failed_prompt() -> Prompt {
    Prompt {
        text: "I couldn't search the library right now.".to_string(),
        keyboard: InlineKeyboardMarkup::new(vec![vec![
            button("Try again", CallbackAction::Retry),
            button("Take the quiz again", CallbackAction::Restart),
        ]]),
    }
}

/// Rounded up, so a 30 second clip still reads as 1 min.
pub fn minutes(seconds: u32) -> u32 {
    seconds.div_ceil(60)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;
    use crate::quiz::matcher::ContentKind;
    use crate::quiz::{store::MemoryStore, store::QuizStore, Answer};

    fn payloads(prompt: &Prompt) -> Vec<String> {
        prompt
            .keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_question_has_no_navigation() {
        let state = QuizState::default();
        let prompt = question_prompt(Question::PracticeType, &state);
        assert_eq!(
            payloads(&prompt),
            vec!["pt:short", "pt:physical", "pt:breathing", "pt:meditation"]
        );
    }

    #[test]
    fn revisited_question_offers_next() {
        let backend = MemoryStore::default();
        let mut store = QuizStore::open(&backend, "test");
        store.answer(Answer::PracticeType(PracticeType::Physical));
        store.answer(Answer::Duration(DurationRange::new(0, 420)));
        store.go_back();

        let state = store.get();
        let prompt = question_prompt(sequencer::question_at(state), state);
        let data = payloads(&prompt);
        assert!(data.contains(&"dur:0-420".to_string()));
        assert!(data.contains(&"back".to_string()));
        assert!(data.contains(&"next".to_string()));
    }

    #[test]
    fn goal_options_follow_practice_type() {
        let backend = MemoryStore::default();
        let mut store = QuizStore::open(&backend, "test");
        store.answer(Answer::PracticeType(PracticeType::Short));

        let prompt = question_prompt(Question::Goal, store.get());
        let data = payloads(&prompt);
        assert_eq!(data[..3], ["goal:energize", "goal:focus", "goal:stress_relief"]);
        assert!(!data.contains(&"next".to_string()));
    }

    #[test]
    fn content_card_mentions_length_and_kind() {
        let content = ContentCandidate {
            id: "sunrise".to_string(),
            title: "Sunrise flow".to_string(),
            description: String::new(),
            thumbnail: None,
            duration: 630,
            kind: ContentKind::Video,
        };
        let prompt = content_prompt(&content);
        assert!(prompt.text.contains("Sunrise flow"));
        assert!(prompt.text.contains("Video session, 11 min"));
    }

    #[test]
    fn minutes_round_up() {
        assert_eq!(minutes(0), 0);
        assert_eq!(minutes(30), 1);
        assert_eq!(minutes(600), 10);
        assert_eq!(minutes(u32::MAX), u32::MAX / 60 + 1);
    }

    #[test]
    fn duration_left_over_from_the_other_approach_hides_next() {
        let backend = MemoryStore::default();
        let mut store = QuizStore::open(&backend, "test");
        store.answer(Answer::PracticeType(PracticeType::Meditation));
        store.answer(Answer::Approach(Approach::SelfGuided));
        store.answer(Answer::Duration(DurationRange::exact(600)));
        store.go_back();
        store.go_back();
        store.answer(Answer::Approach(Approach::Guided));

        let state = store.get();
        let prompt = question_prompt(Question::Duration, state);
        let data = payloads(&prompt);
        assert!(data.contains(&"back".to_string()));
        assert!(!data.contains(&"next".to_string()));
    }
}
