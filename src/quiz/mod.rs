pub mod catalog;
pub mod matcher;
pub mod sequencer;
pub mod store;

use std::fmt;
use std::str::FromStr;

use crate::error::ParseOptionError;

pub type ContentId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeType {
    Short,
    Physical,
    Breathing,
    Meditation,
}

impl PracticeType {
    pub const ALL: [PracticeType; 4] = [
        PracticeType::Short,
        PracticeType::Physical,
        PracticeType::Breathing,
        PracticeType::Meditation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeType::Short => "short",
            PracticeType::Physical => "physical",
            PracticeType::Breathing => "breathing",
            PracticeType::Meditation => "meditation",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PracticeType::Short => "Quick reset",
            PracticeType::Physical => "Yoga & movement",
            PracticeType::Breathing => "Breathing",
            PracticeType::Meditation => "Meditation",
        }
    }
}

impl FromStr for PracticeType {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PracticeType::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseOptionError::new("practice type", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Energize,
    Relax,
    Focus,
    Sleep,
    Flexibility,
    StressRelief,
}

impl Goal {
    pub const ALL: [Goal; 6] = [
        Goal::Energize,
        Goal::Relax,
        Goal::Focus,
        Goal::Sleep,
        Goal::Flexibility,
        Goal::StressRelief,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::Energize => "energize",
            Goal::Relax => "relax",
            Goal::Focus => "focus",
            Goal::Sleep => "sleep",
            Goal::Flexibility => "flexibility",
            Goal::StressRelief => "stress_relief",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Goal::Energize => "Get energized",
            Goal::Relax => "Relax",
            Goal::Focus => "Focus",
            Goal::Sleep => "Fall asleep",
            Goal::Flexibility => "Loosen up",
            Goal::StressRelief => "Let go of stress",
        }
    }

    /// Goals offered for a practice type. Each practice has its own subset.
    pub fn options_for(practice_type: PracticeType) -> &'static [Goal] {
        match practice_type {
            PracticeType::Short => &[Goal::Energize, Goal::Focus, Goal::StressRelief],
            PracticeType::Physical => &[Goal::Energize, Goal::Flexibility, Goal::Relax],
            PracticeType::Breathing => &[
                Goal::Energize,
                Goal::Relax,
                Goal::Sleep,
                Goal::StressRelief,
            ],
            PracticeType::Meditation => {
                &[Goal::Relax, Goal::Focus, Goal::Sleep, Goal::StressRelief]
            }
        }
    }
}

impl FromStr for Goal {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Goal::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ParseOptionError::new("goal", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approach {
    #[serde(rename = "self")]
    SelfGuided,
    Guided,
}

impl Approach {
    pub const ALL: [Approach; 2] = [Approach::SelfGuided, Approach::Guided];

    pub fn as_str(&self) -> &'static str {
        match self {
            Approach::SelfGuided => "self",
            Approach::Guided => "guided",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Approach::SelfGuided => "On my own, with a timer",
            Approach::Guided => "With a guide",
        }
    }
}

impl FromStr for Approach {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Approach::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseOptionError::new("approach", s))
    }
}

/// What a self-guided meditation rests attention on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeditationObject {
    Breath,
    Thought,
    Body,
    None,
}

impl MeditationObject {
    pub const ALL: [MeditationObject; 4] = [
        MeditationObject::Breath,
        MeditationObject::Thought,
        MeditationObject::Body,
        MeditationObject::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeditationObject::Breath => "breath",
            MeditationObject::Thought => "thought",
            MeditationObject::Body => "body",
            MeditationObject::None => "none",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeditationObject::Breath => "The breath",
            MeditationObject::Thought => "Thoughts",
            MeditationObject::Body => "Body sensations",
            MeditationObject::None => "Nothing in particular",
        }
    }
}

impl FromStr for MeditationObject {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeditationObject::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| ParseOptionError::new("meditation object", s))
    }
}

/// Inclusive length range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DurationRange {
    pub min: u32,
    pub max: u32,
}

impl DurationRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// A range pinned to one length, used for self-guided sessions.
    pub const fn exact(seconds: u32) -> Self {
        Self {
            min: seconds,
            max: seconds,
        }
    }

    pub fn overlaps(&self, min: u32, max: u32) -> bool {
        max >= self.min && min <= self.max
    }

    /// Lengths offered for a practice. Practices without a duration question get none.
    pub fn options_for(practice_type: PracticeType, approach: Option<Approach>) -> &'static [DurationRange] {
        match (practice_type, approach) {
            (PracticeType::Physical, _) => &PHYSICAL_DURATIONS,
            (PracticeType::Meditation, Some(Approach::Guided)) => &GUIDED_DURATIONS,
            (PracticeType::Meditation, Some(Approach::SelfGuided)) => &SELF_GUIDED_DURATIONS,
            _ => &[],
        }
    }

    pub fn label(&self) -> String {
        let (min, max) = (self.min / 60, self.max / 60);
        if self.min == self.max {
            format!("{} min", max)
        } else if self.min == 0 {
            format!("Up to {} min", max)
        } else {
            format!("{}-{} min", min, max)
        }
    }
}

const PHYSICAL_DURATIONS: [DurationRange; 4] = [
    DurationRange::new(0, 420),
    DurationRange::new(420, 900),
    DurationRange::new(900, 1800),
    DurationRange::new(1800, 3600),
];

const GUIDED_DURATIONS: [DurationRange; 4] = [
    DurationRange::new(0, 300),
    DurationRange::new(300, 900),
    DurationRange::new(900, 1800),
    DurationRange::new(1800, 3600),
];

const SELF_GUIDED_DURATIONS: [DurationRange; 5] = [
    DurationRange::exact(300),
    DurationRange::exact(600),
    DurationRange::exact(900),
    DurationRange::exact(1200),
    DurationRange::exact(1800),
];

impl fmt::Display for DurationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl FromStr for DurationRange {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| ParseOptionError::new("duration", s))?;
        let min = min.parse().map_err(|_| ParseOptionError::new("duration", s))?;
        let max = max.parse().map_err(|_| ParseOptionError::new("duration", s))?;
        if min > max {
            return Err(ParseOptionError::new("duration", s));
        }
        Ok(Self { min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SelfMeditationSettings {
    /// Seconds.
    pub duration: u32,
    pub object: MeditationObject,
}

/// The in-progress answers of one quiz run.
///
/// Only ever handed out by reference from [`store::QuizStore`]; all writes go
/// through [`sequencer::apply`] so the field invariants hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizState {
    pub practice_type: Option<PracticeType>,
    pub duration: Option<DurationRange>,
    pub goal: Option<Goal>,
    pub approach: Option<Approach>,
    pub self_meditation_settings: Option<SelfMeditationSettings>,
    pub content_id: Option<ContentId>,
    pub step: u32,
    pub max_step: u32,
}

/// A shallow update of [`QuizState`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizPatch {
    pub practice_type: Option<PracticeType>,
    pub duration: Option<DurationRange>,
    pub goal: Option<Goal>,
    pub approach: Option<Approach>,
    pub self_meditation_settings: Option<SelfMeditationSettings>,
    pub content_id: Option<ContentId>,
    pub step: Option<u32>,
}

/// One user answer to the question at the current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    PracticeType(PracticeType),
    Duration(DurationRange),
    Goal(Goal),
    Approach(Approach),
    SelfMeditation(SelfMeditationSettings),
    Content(ContentId),
}
