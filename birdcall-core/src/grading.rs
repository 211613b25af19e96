//! Turning a similarity score into a pass/fail verdict with player feedback.
//!
//! A round passes when the score beats the threshold. From the fifth attempt
//! on, a handicap of `(attempts - 3) × 0.05` is added to the score so a
//! persistent player eventually gets through.

use serde::{Deserialize, Serialize};

/// Attempts after which the handicap can carry a round.
pub const HANDICAP_MIN_ATTEMPTS: u32 = 5;
/// Handicap granted per attempt beyond the third.
pub const HANDICAP_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feedback {
    Perfect,
    Success,
    /// Passed only thanks to the retry handicap.
    GoodEnough,
    AlmostThere,
    NotQuite,
    ListenCarefully,
    TryAgain,
}

impl Feedback {
    pub fn label(self) -> &'static str {
        match self {
            Feedback::Perfect => "Perfect!",
            Feedback::Success => "Success",
            Feedback::GoodEnough => "Good enough",
            Feedback::AlmostThere => "Almost there!",
            Feedback::NotQuite => "Not quite",
            Feedback::ListenCarefully => "Listen carefully",
            Feedback::TryAgain => "Try again",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub score: f32,
    pub threshold: f32,
    pub passed: bool,
    pub feedback: Feedback,
}

impl Verdict {
    /// Score as a whole percentage for display.
    pub fn score_percent(&self) -> i32 {
        (self.score * 100.0).round() as i32
    }

    pub fn threshold_percent(&self) -> i32 {
        (self.threshold * 100.0).round() as i32
    }
}

/// Grade `score` against `threshold`. `attempts` counts this attempt too.
pub fn grade(score: f32, threshold: f32, attempts: u32) -> Verdict {
    let handicap = (attempts as f32 - 3.0) * HANDICAP_STEP;
    let clean_pass = score > threshold;
    let passed =
        clean_pass || (attempts >= HANDICAP_MIN_ATTEMPTS && score + handicap > threshold);

    let feedback = if passed && !clean_pass {
        Feedback::GoodEnough
    } else if score - 0.05 > threshold {
        Feedback::Perfect
    } else if clean_pass {
        Feedback::Success
    } else if score + 0.05 > threshold {
        Feedback::AlmostThere
    } else if score + 0.10 > threshold {
        Feedback::NotQuite
    } else if score + 0.15 > threshold {
        Feedback::ListenCarefully
    } else {
        Feedback::TryAgain
    };

    Verdict {
        score,
        threshold,
        passed,
        feedback,
    }
}
