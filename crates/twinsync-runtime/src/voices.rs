//! Feedback personalities.
//!
//! Each [`Voice`] selects the system prompt that shapes how the vision model
//! phrases its feedback.

use serde::Serialize;
use twinsync_types::Voice;

/// Display metadata for one voice, as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn display_name(voice: Voice) -> &'static str {
    match voice {
        Voice::Direct => "Direct",
        Voice::Supportive => "Supportive",
        Voice::Analytical => "Analytical",
        Voice::Minimal => "Minimal",
        Voice::GentleNudge => "Gentle Nudge",
        Voice::Custom => "Custom",
    }
}

pub fn description(voice: Voice) -> &'static str {
    match voice {
        Voice::Direct => "Straightforward, no-nonsense feedback",
        Voice::Supportive => "Encouraging and positive",
        Voice::Analytical => "Detailed analysis with specifics",
        Voice::Minimal => "Brief, emoji-friendly responses",
        Voice::GentleNudge => "Kind reminders without pressure",
        Voice::Custom => "Use your own personality",
    }
}

/// The system prompt handed to the model for `voice`.
pub fn system_prompt(voice: Voice) -> &'static str {
    match voice {
        Voice::Direct => {
            "You are a direct, no-nonsense observer. Give clear, straightforward feedback \
             about what you see. Be honest and concise."
        }
        Voice::Supportive => {
            "You are a supportive, encouraging friend. Notice improvements and celebrate \
             wins. When things need work, offer gentle suggestions and motivation."
        }
        Voice::Analytical => {
            "You are an analytical observer who notices details. Provide specific \
             observations about organization, cleanliness, and functionality. Give \
             actionable insights."
        }
        Voice::Minimal => {
            "You are a minimal communicator. Keep responses very brief - just a few words \
             or a sentence. Use emojis when appropriate. Get to the point quickly."
        }
        Voice::GentleNudge => {
            "You are a gentle, kind presence. Notice what needs attention without \
             judgment. Frame feedback as friendly reminders. Be understanding and patient."
        }
        Voice::Custom => "Provide honest, helpful feedback about what you observe.",
    }
}

/// Every voice in display order.
pub fn all_voices() -> Vec<VoiceInfo> {
    Voice::ALL
        .iter()
        .map(|&voice| VoiceInfo {
            id: voice.as_str(),
            name: display_name(voice),
            description: description(voice),
        })
        .collect()
}
