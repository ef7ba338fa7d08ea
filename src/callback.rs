//! Inline button payloads. Telegram hands them back as plain strings, so this
//! is where they get narrowed into typed answers.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseOptionError;
use crate::quiz::{Approach, DurationRange, Goal, MeditationObject, PracticeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    PracticeType(PracticeType),
    Duration(DurationRange),
    Goal(Goal),
    Approach(Approach),
    Object(MeditationObject),
    Next,
    Back,
    Restart,
    Retry,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::PracticeType(p) => write!(f, "pt:{}", p.as_str()),
            CallbackAction::Duration(d) => write!(f, "dur:{}", d),
            CallbackAction::Goal(g) => write!(f, "goal:{}", g.as_str()),
            CallbackAction::Approach(a) => write!(f, "ap:{}", a.as_str()),
            CallbackAction::Object(o) => write!(f, "obj:{}", o.as_str()),
            CallbackAction::Next => f.write_str("next"),
            CallbackAction::Back => f.write_str("back"),
            CallbackAction::Restart => f.write_str("restart"),
            CallbackAction::Retry => f.write_str("retry"),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => return Ok(CallbackAction::Next),
            "back" => return Ok(CallbackAction::Back),
            "restart" => return Ok(CallbackAction::Restart),
            "retry" => return Ok(CallbackAction::Retry),
            _ => {}
        }

        let (tag, value) = s
            .split_once(':')
            .ok_or_else(|| ParseOptionError::new("button", s))?;
        match tag {
            "pt" => value.parse().map(CallbackAction::PracticeType),
            "dur" => value.parse().map(CallbackAction::Duration),
            "goal" => value.parse().map(CallbackAction::Goal),
            "ap" => value.parse().map(CallbackAction::Approach),
            "obj" => value.parse().map(CallbackAction::Object),
            _ => Err(ParseOptionError::new("button", s)),
        }
    }
}
