pub mod api;
pub mod gpio;
pub mod metrics;
pub mod protocol;

pub use api::{route, ApiConfig, ApiError, ApiReply, ApiServer};
pub use gpio::{GpioActuator, GpioConfig, GpioError};
pub use metrics::{init_metrics, record_snapshot, serve_metrics};
pub use protocol::{AcceptedMsg, ErrorsMsg, StateMsg, TrainState};
