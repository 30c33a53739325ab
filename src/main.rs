#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = vista::ViewerConfig::new().with_args(std::env::args().skip(1));
    log::info!(
        "environment: {}, model: {}",
        config.environment_path,
        config.model_path
    );
    vista::run(config)
}

#[cfg(target_arch = "wasm32")]
fn main() {}
