//! Songwriting prompts.

use serde::{Deserialize, Serialize};

use crate::error::{GiftGenError, Result};

/// System instruction for the lyrics model. Output is lyrics only, sections labeled.
pub const LYRICS_SYSTEM_PROMPT: &str = "You are a professional songwriter. Generate only the song lyrics based on the user's requirements. Do not include any explanations, just the lyrics with verses, chorus, and bridge clearly labeled.";

/// Structured description of a personalised birthday song.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongBrief {
    pub friend_name: String,
    pub relationship: String,
    pub description: String,
    pub vibe: String,
    pub genre: String,
}

impl SongBrief {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("friend_name", &self.friend_name),
            ("relationship", &self.relationship),
            ("description", &self.description),
            ("vibe", &self.vibe),
            ("genre", &self.genre),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(GiftGenError::InvalidRequest(format!(
                "missing brief fields: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Render the songwriter prompt sent to the lyrics stage.
    pub fn render(&self) -> String {
        format!(
            "You are a professional songwriter who writes catchy, personalized birthday songs.
You always follow the structure requested by the user and adapt tone, style, rhythm, and rhyme patterns to the chosen genre.
Keep lyrics clean, joyful, and easy to sing.
Make the song feel genuinely personal by using all provided user details in a natural, creative way.

Write a personalized birthday song.

Friend's Name: {name}
Your Relationship: {relationship}
About Them: {about}
Song Vibe: {vibe}
Genre: {genre}

Song Requirements:
- 2 verses, 1 catchy chorus, and an optional bridge.
- Make the chorus easy to sing along to.
- Use the relationship context and personal details to make the song authentic and meaningful.
- Match the tone and energy to the specified vibe.
- Follow the rhythm and style of the chosen genre.
- Keep it warm, memorable, and fun.

Now write the full song.",
            name = self.friend_name.trim(),
            relationship = self.relationship.trim(),
            about = self.description.trim(),
            vibe = self.vibe.trim(),
            genre = self.genre.trim(),
        )
    }
}

/// Pick the prompt out of a request carrying either free text or a brief.
pub fn resolve_prompt(prompt: Option<&str>, brief: Option<&SongBrief>) -> Result<String> {
    match (prompt, brief) {
        (Some(_), Some(_)) => Err(GiftGenError::InvalidRequest(
            "provide either 'prompt' or 'brief', not both".into(),
        )),
        (Some(p), None) if p.trim().is_empty() => {
            Err(GiftGenError::InvalidRequest("prompt must not be empty".into()))
        }
        (Some(p), None) => Ok(p.to_string()),
        (None, Some(b)) => {
            b.validate()?;
            Ok(b.render())
        }
        (None, None) => Err(GiftGenError::InvalidRequest(
            "one of 'prompt' or 'brief' is required".into(),
        )),
    }
}
