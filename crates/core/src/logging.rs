// Platform logger bootstrap

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Log tag used by the Android logger
pub const LOG_TAG: &str = "Ghosten";

/// Install the platform logger once per process.
///
/// Android routes `log` records to logcat; every other target uses
/// `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag(LOG_TAG),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("info"),
            )
            .try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("logger initialised twice without panicking");
    }
}
