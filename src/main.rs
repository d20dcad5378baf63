mod app;
mod body;
mod config;
mod debug;
mod engine;
mod flame;
mod gaze;
mod mood;
mod noise;
mod render;

fn main() {
    env_logger::init();
    log::info!("emberpet starting up");

    if let Err(e) = app::run() {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
