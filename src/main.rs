//! `glow-quad-demo`: open a window and draw the textured quad.
//!
//! Set `GLOW_QUAD_DEMO_CONFIG` to a TOML file to override the defaults and
//! `RUST_LOG` to change log verbosity.

use glow_quad_demo::DemoConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = DemoConfig::from_env().and_then(glow_quad_demo::app::run);
    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
