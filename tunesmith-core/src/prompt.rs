//! Fixed instructions sent to the inference service on every turn.
//!
//! The block ids named in `USER_INSTRUCTION` (`keywords`, `songs`, `music_data`) are
//! the wire contract with [`crate::extract`].

use serde::{Deserialize, Serialize};

pub const SYSTEM_INSTRUCTION: &str = "As an expert, your task is to respond to user queries effectively.
If uncertain, ask the user for clarification or state the uncertainty.
Approach each response methodically, considering the context and potential impact.
Never share harmful or inappropriate content.";

pub const USER_INSTRUCTION: &str = r#"You are an expert in lyrics and music. Generate lyrics and a
melody based on the user's input, step by step.
1. Summarize the information in the user's input and share insights.
2. List keywords or symbols that resonate with the user's input in this format:
<div id="keywords">
    <li>Keyword 1</li>
    <li>Keyword 2</li>
    <li>Keyword 3</li>
</div>
3. Suggest existing songs that match the keywords, themes and mood in this format:
<div id="songs">
    <li>Song 1</li>
    <li>Song 2</li>
    <li>Song 3</li>
</div>
4. Compose a short melody inspired by the keywords and the suggested songs.
Notation rules:
- A note is a name (C, D, E, F, G, A, B with optional # or b) followed by an integer
  octave, for example C4, G#4, Gb4. Chord names such as "Am" are not allowed.
- A duration is a number measured in bars (0.25 is a quarter note).
- bpm is an integer tempo in beats per minute.
- The note list and the duration list must have the same length.
Output the melody as strict JSON in this format:
<div id="music_data">
{
    "note": LIST_OF_NOTES,
    "duration": LIST_OF_DURATIONS,
    "bpm": BPM_VALUE
}
</div>
5. Write lyrics that fit the melody and the user's input.
6. Suggest a song title and an idea for a music video.
Ignore parts of the user's input that are not relevant to this task."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

pub fn safety_settings() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category: category.into(),
        threshold: "BLOCK_NONE".into(),
    })
    .collect()
}
