//! Step layout of the quiz and the pure transitions between steps.
//!
//! Step 0 always asks for the practice type. What follows depends on the
//! answers so far:
//!
//! | practice            | 1        | 2        | 3      | 4      |
//! |---------------------|----------|----------|--------|--------|
//! | short, breathing    | goal     | result   |        |        |
//! | physical            | duration | goal     | result |        |
//! | meditation, guided  | approach | duration | goal   | result |
//! | meditation, self    | approach | duration | object | timer  |

use log::debug;

use super::{
    Answer, Approach, DurationRange, Goal, MeditationObject, PracticeType, QuizPatch, QuizState,
    SelfMeditationSettings,
};

/// The question asked at a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Question {
    PracticeType,
    Approach,
    Duration,
    Goal,
    MeditationObject,
    /// Terminal step: either a catalog recommendation or a timer practice.
    Result,
}

pub fn compute_max_step(practice_type: Option<PracticeType>, approach: Option<Approach>) -> u32 {
    match (practice_type, approach) {
        (None, _) => 0,
        (Some(PracticeType::Short), _) => 2,
        (Some(PracticeType::Breathing), _) => 2,
        (Some(PracticeType::Physical), _) => 3,
        (Some(PracticeType::Meditation), None) => 2,
        (Some(PracticeType::Meditation), Some(_)) => 4,
    }
}

pub fn next_step(state: &QuizState) -> u32 {
    if state.step < state.max_step {
        state.step + 1
    } else {
        state.step
    }
}

pub fn previous_step(state: &QuizState) -> u32 {
    state.step.saturating_sub(1)
}

/// Merges `patch` into `state`, clearing dependent answers and recomputing
/// `max_step` in the same call. `step` never ends up above `max_step`.
pub fn apply(state: &mut QuizState, patch: QuizPatch) {
    if let Some(practice_type) = patch.practice_type {
        *state = QuizState {
            practice_type: Some(practice_type),
            step: 1,
            ..QuizState::default()
        };
    }
    if let Some(approach) = patch.approach {
        state.approach = Some(approach);
        state.goal = None;
        state.self_meditation_settings = None;
    }
    if let Some(duration) = patch.duration {
        state.duration = Some(duration);
        state.goal = None;
    }
    if let Some(goal) = patch.goal {
        state.goal = Some(goal);
    }
    if let Some(settings) = patch.self_meditation_settings {
        state.self_meditation_settings = Some(settings);
    }
    if let Some(content_id) = patch.content_id {
        state.content_id = Some(content_id);
    }

    state.max_step = compute_max_step(state.practice_type, state.approach);
    if let Some(step) = patch.step {
        state.step = step;
    }
    state.step = state.step.min(state.max_step);
}

/// Builds the patch for an answer. Choosing a practice type restarts at step 1,
/// every other answer moves one step forward.
pub fn answer_patch(state: &QuizState, answer: Answer) -> QuizPatch {
    let advanced = Some(state.step + 1);
    match answer {
        Answer::PracticeType(practice_type) => QuizPatch {
            practice_type: Some(practice_type),
            ..QuizPatch::default()
        },
        Answer::Duration(duration) => QuizPatch {
            duration: Some(duration),
            step: advanced,
            ..QuizPatch::default()
        },
        Answer::Goal(goal) => QuizPatch {
            goal: Some(goal),
            step: advanced,
            ..QuizPatch::default()
        },
        Answer::Approach(approach) => QuizPatch {
            approach: Some(approach),
            step: advanced,
            ..QuizPatch::default()
        },
        Answer::SelfMeditation(settings) => QuizPatch {
            self_meditation_settings: Some(settings),
            step: advanced,
            ..QuizPatch::default()
        },
        Answer::Content(content_id) => QuizPatch {
            content_id: Some(content_id),
            step: advanced,
            ..QuizPatch::default()
        },
    }
}

pub fn question_at(state: &QuizState) -> Question {
    let Some(practice_type) = state.practice_type else {
        return Question::PracticeType;
    };

    match (practice_type, state.step) {
        (_, 0) => Question::PracticeType,
        (PracticeType::Short | PracticeType::Breathing, 1) => Question::Goal,
        (PracticeType::Physical, 1) => Question::Duration,
        (PracticeType::Physical, 2) => Question::Goal,
        (PracticeType::Meditation, step) => match (state.approach, step) {
            (None, _) | (_, 1) => Question::Approach,
            (Some(_), 2) => Question::Duration,
            (Some(Approach::SelfGuided), 3) => Question::MeditationObject,
            (Some(Approach::Guided), 3) => Question::Goal,
            _ => Question::Result,
        },
        _ => Question::Result,
    }
}

/// Whether `question` holds an answer that is still among the options offered
/// for it. A duration picked under the other approach doesn't count.
pub fn is_answered(question: Question, state: &QuizState) -> bool {
    match question {
        Question::PracticeType => state.practice_type.is_some(),
        Question::Approach => state.approach.is_some(),
        Question::Duration => match (state.practice_type, state.duration) {
            (Some(p), Some(duration)) => {
                DurationRange::options_for(p, state.approach).contains(&duration)
            }
            _ => false,
        },
        Question::Goal => match (state.practice_type, state.goal) {
            (Some(p), Some(goal)) => Goal::options_for(p).contains(&goal),
            _ => false,
        },
        Question::MeditationObject => state.self_meditation_settings.is_some(),
        Question::Result => false,
    }
}

/// "Next" only skips past a question that is already answered.
pub fn can_advance(state: &QuizState) -> bool {
    state.step < state.max_step && is_answered(question_at(state), state)
}

/// Whether `answer` responds to the question currently on screen with one of
/// the options offered for it. Buttons of older messages fail this check.
pub fn accepts(state: &QuizState, answer: &Answer) -> bool {
    let question = question_at(state);
    match (question, answer) {
        (Question::PracticeType, Answer::PracticeType(_)) => true,
        (Question::Approach, Answer::Approach(_)) => true,
        (Question::Duration, Answer::Duration(duration)) => state
            .practice_type
            .map(|p| DurationRange::options_for(p, state.approach).contains(duration))
            .unwrap_or(false),
        (Question::Goal, Answer::Goal(goal)) => state
            .practice_type
            .map(|p| Goal::options_for(p).contains(goal))
            .unwrap_or(false),
        (Question::MeditationObject, Answer::SelfMeditation(settings)) => {
            state.duration.map(|d| d.max) == Some(settings.duration)
        }
        (Question::Result, Answer::Content(_)) => true,
        _ => {
            debug!("Answer {:?} doesn't fit question {:?}", answer, question);
            false
        }
    }
}

/// Self-guided sessions pick their length first; the object answer completes
/// the settings with that length.
pub fn self_meditation_answer(state: &QuizState, object: MeditationObject) -> Option<Answer> {
    let duration = state.duration?.max;
    Some(Answer::SelfMeditation(SelfMeditationSettings { duration, object }))
}
