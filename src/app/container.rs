use std::sync::Arc;

use tracing::debug;

use crate::adapters::{JsonFormatCatalog, LoggingContinuation};
use crate::adapters::toml_config::AppConfig;
use crate::app::encode_interactor::{EncodeInteractor, EncoderTools};
use crate::error::EncodeResult;
use crate::ports::{ContinuationSignal, FormatCatalog};

pub trait AppContainer: Send + Sync {
    fn encode_interactor(&self) -> Arc<EncodeInteractor>;
}

pub struct DefaultAppContainer {
    encode_interactor: Arc<EncodeInteractor>,
}

impl DefaultAppContainer {
    /// Wire the default adapters from a resolved configuration
    ///
    /// ffmpeg must be locatable; gifski is only looked up here and reported
    /// when a chained format actually needs it.
    pub fn new(config: &AppConfig) -> EncodeResult<Self> {
        let catalog = Arc::new(JsonFormatCatalog::new(config.formats_dir()));
        let signal = Arc::new(LoggingContinuation::new());
        let gifski = match config.gifski_program() {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("gifski unavailable: {}", e);
                None
            }
        };
        let tools = EncoderTools {
            ffmpeg: config.ffmpeg_program()?,
            gifski,
            temp_dir: config.temp_dir(),
        };

        let encode_interactor = Arc::new(EncodeInteractor::new(
            catalog as Arc<dyn FormatCatalog>,
            signal as Arc<dyn ContinuationSignal>,
            tools,
        ));

        Ok(Self { encode_interactor })
    }
}

impl AppContainer for DefaultAppContainer {
    fn encode_interactor(&self) -> Arc<EncodeInteractor> {
        Arc::clone(&self.encode_interactor)
    }
}
