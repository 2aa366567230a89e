use crate::config::Persona;
use crate::types::Post;

fn interests(persona: &Persona) -> String {
    if persona.interests.is_empty() {
        "anything".to_string()
    } else {
        persona.interests.join(", ")
    }
}

/// Asks whether `post` deserves a reply; the model must lead with YES or NO
pub fn gate_prompt(persona: &Persona, post: &Post) -> String {
    format!(
        "You decide whether a post on a social network is worth replying to.\n\
         Worthwhile posts touch on newsworthy topics, carry ideas that can be built on, \
         and matter to {name}, who cares about {interests}.\n\
         \n\
         Post: \"{text}\"\n\
         \n\
         Should we reply to this post? Answer YES or NO, then one short reason.",
        name = persona.name,
        interests = interests(persona),
        text = post.text,
    )
}

/// Asks for the reply text itself, in the persona's voice
pub fn reply_prompt(persona: &Persona, post: &Post, max_chars: usize) -> String {
    format!(
        "You are {name}, {description}.\n\
         Your tone: {tone}\n\
         You care about: {interests}\n\
         \n\
         Someone posted: \"{text}\"\n\
         \n\
         Write a reply that adds something to the conversation and sounds like you. \
         Stay under {max_chars} characters.\n\
         \n\
         Your reply:",
        name = persona.name,
        description = persona.description,
        tone = persona.tone,
        interests = interests(persona),
        text = post.text,
        max_chars = max_chars,
    )
}
