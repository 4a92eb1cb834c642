//! Prompts sent to the description and image models.
//!
//! Everything here is a pure function of its inputs: the clock and the random
//! number generator are passed in by the caller.

use crate::weather::Weather;
use chrono::{NaiveDateTime, Timelike};
use rand::{seq::SliceRandom, RngCore};

/// At or below this battery level, pictures are about running out of power.
pub const LOW_BATTERY_LEVEL: f32 = 0.2;

pub const STYLES: [&str; 8] = [
    "Line Art, filled with flat, vibrant colors, clean lines, minimal shading.",
    "Ink Drawing, bright colors, clean lines, minimal shading.",
    "Comic Book style, bold colors, high contrast, strong use of negative space.",
    "Pixel Art, colorful, sharp, stylized, retro video game feel.",
    "Stippling portrait, smooth, colorfully, inked outlines with gentle stipple-style shading.",
    "Vector Art style, hard-edged shapes and limited color palette, no gradients, no shading bold colors, geometric.",
    "Gouache style, deep midtones, high saturation, soft gradients, gentle blending, minimal outlines.",
    "Retro Risograph, grain textures, high contrast colors, duotone feel.",
];

pub fn default_styles() -> Vec<String> {
    STYLES.iter().copied().map(String::from).collect()
}

const DESCRIPTION_INSTRUCTIONS: &str = "You generate ridiculous image descriptions for a text-to-image generator.

Requirements
- Be extremely detailed about the setting and subject.
- Descriptions must be hilarious.
- The day of the week cannot be directly represented visually, but abstract is fine.
- Exclude quotes, exclamations, or other sayings as they will not be reflected in the image.
- Nudity is strictly forbidden.
- Do not mention real people.

Use the following context to tailor your descriptions
- morning/afternoon/evening/night scenes based on the time
- incorporate current weather conditions
- holiday themes on known holidays";

/// What the frame knows about its surroundings when a cycle starts.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    /// Between 0.0 and 1.0.
    pub battery_level: f32,
    pub weather: Option<Weather>,
    /// Recent descriptions, oldest first.
    pub history: Vec<String>,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            battery_level: 1.0,
            weather: None,
            history: Vec::new(),
        }
    }
}

/// Steer the topic with the device state. Low battery wins over happy hour.
pub fn themed_topic(topic: &str, battery_level: f32, hour: u32, evening_hour: u32) -> String {
    if battery_level <= LOW_BATTERY_LEVEL {
        format!("{} and drained batteries", topic)
    } else if hour >= evening_hour {
        format!("{} at happy hour", topic)
    } else {
        topic.to_owned()
    }
}

fn context_block(context: &PromptContext, now: NaiveDateTime) -> String {
    let mut lines = vec![
        format!("- Date: {}", now.format("%A, %B %d, %Y")),
        format!("- Time: {}", now.format("%I:%M %p")),
    ];
    if let Some(weather) = &context.weather {
        let mut line = format!("- Current Weather: {:.0}°F", weather.temperature);
        if let Some(description) = &weather.description {
            line.push(' ');
            line.push_str(description);
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn history_block(history: &[String]) -> Option<String> {
    if history.is_empty() {
        return None;
    }
    let mut block =
        String::from("Do not repeat concepts. Here are some recent descriptions you've generated:");
    for description in history {
        block.push_str("\n- ");
        block.push_str(description);
    }
    Some(block)
}

pub fn image_description_prompt(
    context: &PromptContext,
    topic: &str,
    now: NaiveDateTime,
    evening_hour: u32,
) -> String {
    let topic = themed_topic(topic, context.battery_level, now.hour(), evening_hour);
    let mut sections = vec![
        DESCRIPTION_INSTRUCTIONS.to_owned(),
        context_block(context, now),
    ];
    sections.extend(history_block(&context.history));
    sections.push(format!("Write a description about {}.", topic));
    sections.push("Respond only with the image description in plain text.".to_owned());
    sections.join("\n\n") + "\n"
}

pub fn image_title_prompt(description: &str) -> String {
    format!(
        "You generate artsy-fartsy artwork titles given an image description.

Titles should be succinct, mildly cryptic, but capture the overall vibes of the description.

Image description:
{}

Limit titles to 10 words or fewer.
Respond only with the title in plain text.
",
        description
    )
}

/// The description, closed with a period, followed by a random style.
pub fn image_generation_prompt(description: &str, styles: &[String], rng: &mut dyn RngCore) -> String {
    let mut prompt = description.to_owned();
    if !prompt.ends_with('.') {
        prompt.push('.');
    }
    if let Some(style) = styles.choose(&mut *rng) {
        prompt.push(' ');
        prompt.push_str(style);
    }
    prompt
}
