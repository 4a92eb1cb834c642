use clap::Parser;
use log::info;
use pi_frame::{
    config,
    frame::Frame,
    hardware::{Display, Power},
    models::bedrock::Bedrock,
    registry::{Components, Injection, Injections, Requirement},
    weather::OpenMeteo,
};
use simplelog::{LevelFilter::Info, SimpleLogger};
use std::{env, path::PathBuf, sync::Arc};

const API_KEY_VARIABLE: &str = "STABILITY_API_KEY";

#[derive(Parser, Debug)]
struct Opt {
    /// Configuration file
    #[arg(short, long, default_value = "config.json")]
    config_path: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> anyhow::Result<()> {
    SimpleLogger::init(Info, Default::default())?;

    let Opt { config_path } = Parser::parse();
    let config = config::load(&config_path)?;

    let mut injections = Injections::default();
    injections.insert(
        Requirement::GatewayClient,
        Injection::Gateway(Arc::new(Bedrock::from_env().await)),
    );
    if let Ok(api_key) = env::var(API_KEY_VARIABLE) {
        injections.insert(
            Requirement::ApiCredential,
            Injection::Argument {
                name: "api_key".into(),
                value: api_key.into(),
            },
        );
    }

    let mut frame = Frame::new(
        Power::probe(),
        Display::probe(),
        Box::new(OpenMeteo::new(config.location)),
        Components::builtin(injections),
    );
    let outcome = frame.run_cycle(&config).await?;
    info!("Showing {}", outcome.image_path.display());

    if frame.power.is_battery_powered() {
        info!("On battery, powering off until {}", outcome.next_wake);
        frame.power.shutdown();
    }
    Ok(())
}
