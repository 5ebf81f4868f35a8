use lifeview::{
    config::LifeConfig,
    logging::{init_logging, LoggingConfig},
    LifeApp,
};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = LifeConfig::from_env()?;
    LifeApp::new(config)?.run()
}
