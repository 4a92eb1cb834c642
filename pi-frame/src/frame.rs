//! One refresh of the frame, from waking up to scheduling the next wake up.

use crate::{
    config::Config,
    hardware::{Display, Power},
    history::History,
    imaging::{self, DISPLAY_HEIGHT, DISPLAY_WIDTH},
    models::Message,
    prompts::{self, PromptContext},
    registry::Components,
    schedule::WakePolicy,
    telemetry::{self, BatteryLog, GenerationLog, BATTERY_LOG, GENERATION_LOG},
    weather::WeatherSource,
    Result,
};
use chrono::{DateTime, Local, NaiveDateTime};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use log::{info, warn};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

const JPEG_QUALITY: u8 = 99;

/// What a completed cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub topic: String,
    pub description: String,
    pub title: Option<String>,
    pub image_prompt: String,
    pub image_path: PathBuf,
    pub next_wake: NaiveDateTime,
}

pub struct Frame {
    pub power: Power,
    pub display: Display,
    pub weather: Box<dyn WeatherSource>,
    pub components: Components,
}

impl Frame {
    pub fn new(
        power: Power,
        display: Display,
        weather: Box<dyn WeatherSource>,
        components: Components,
    ) -> Self {
        Self {
            power,
            display,
            weather,
            components,
        }
    }

    pub async fn run_cycle(&mut self, config: &Config) -> Result<Outcome> {
        self.run_cycle_at(config, Local::now(), &mut StdRng::from_entropy())
            .await
    }

    /// Run a cycle as if it started at `now`.
    pub async fn run_cycle_at<R: RngCore>(
        &mut self,
        config: &Config,
        now: DateTime<Local>,
        rng: &mut R,
    ) -> Result<Outcome> {
        let components = &self.components;
        let description_model = components
            .description_models
            .resolve(&config.description_model, &components.injections)?;
        let image_model = components
            .image_models
            .resolve(&config.image_model, &components.injections)?;
        let topic_strategy = components
            .topic_strategies
            .resolve(&config.topic_strategy, &components.injections)?;
        let wake_policy = WakePolicy::new(config.schedule.as_deref(), config.active_hours)?;
        info!(
            "Using {} and {}",
            description_model.model_id(),
            image_model.model_id()
        );

        fs::create_dir_all(&config.artifact_directory)?;
        let local_now = now.naive_local();
        let timestamp = local_now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();

        info!("Enabling display");
        self.power.enable_display_power();
        self.power.set_current_time(local_now);

        let history = History::load(config.history_path())?;
        let battery_level = match self.power.battery_info() {
            Some(battery) => {
                info!("Battery: {:?}", battery);
                telemetry::write_log(
                    &config.artifact_directory,
                    BATTERY_LOG,
                    &BatteryLog::new(timestamp.clone(), &battery)?,
                )?;
                battery.charge_level
            }
            None => 1.0,
        };
        let context = PromptContext {
            battery_level,
            weather: self.weather.current_weather().await,
            history: history.to_vec(),
        };

        let topic = topic_strategy.get_topic(&context, rng);
        let description_prompt =
            prompts::image_description_prompt(&context, &topic, local_now, config.evening_hour);
        info!("Description prompt:\n{}", description_prompt);
        let description = description_model
            .invoke(&[Message::user(description_prompt)])
            .await?
            .trim()
            .to_owned();
        info!("Description: {}", description);

        let title = if config.generate_title {
            let title = description_model
                .invoke(&[Message::user(prompts::image_title_prompt(&description))])
                .await?
                .trim()
                .to_owned();
            info!("Title: {}", title);
            Some(title)
        } else {
            None
        };

        let image_prompt = prompts::image_generation_prompt(&description, &config.styles, rng);
        info!("Image prompt: {}", image_prompt);
        let image = image_model
            .invoke(&[Message::user(image_prompt.clone())])
            .await?;

        let mut display_image = imaging::scale_and_crop(&image, DISPLAY_WIDTH, DISPLAY_HEIGHT)?;
        match imaging::load_font(config.font_path()) {
            Ok(font) => {
                let caption = title.as_deref().unwrap_or(&description);
                display_image = imaging::overlay_prompt(&display_image, caption, &font);
            }
            Err(e) => warn!("No caption: {}", e),
        }
        self.display.render(&display_image)?;

        let image_path = save_image(&image, &config.images_directory(), &timestamp)?;
        info!("Saved {}", image_path.display());

        telemetry::write_log(
            &config.artifact_directory,
            GENERATION_LOG,
            &GenerationLog {
                timestamp: timestamp.clone(),
                description_model_id: description_model.model_id().to_owned(),
                title: title.clone(),
                description: description.clone(),
                image_model_id: image_model.model_id().to_owned(),
                image_prompt: image_prompt.clone(),
            },
        )?;
        History::append(config.history_path(), &timestamp, &description)?;

        let next_wake = wake_policy.next_wake(&now)?;
        info!("Next wake up at {}", next_wake);
        self.power.set_alarm(next_wake);

        Ok(Outcome {
            topic,
            description,
            title,
            image_prompt,
            image_path,
            next_wake,
        })
    }
}

fn save_image(image: &DynamicImage, directory: &Path, timestamp: &str) -> Result<PathBuf> {
    fs::create_dir_all(directory)?;
    let path = directory.join(format!("{}.jpg", timestamp));
    let mut writer = BufWriter::new(File::create(&path)?);
    image
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))?;
    writer.flush()?;
    Ok(path)
}
