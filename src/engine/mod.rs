//! Encoder process engine
//!
//! Launches encoder subprocesses and streams raw frames into them.

pub mod chained;
pub mod metadata;
pub mod prepass;
pub mod process;
pub mod session;

pub use chained::{ChainedEncoder, SecondaryStage};
pub use prepass::run_pre_pass;
pub use process::{EncoderProcess, OutputMode, ProcessOutput};
pub use session::{EncodeSession, SessionConfig};
