use handrate::{config::Config, server::App};

fn main() -> anyhow::Result<()> {
    handrate::init_logger!();

    let config = Config::from_env()?;
    log::debug!("configuration: {:?}", config);

    App::new(config)?.run()
}
