mod service;

pub use service::{
    TelemetryError, TelemetryReceiver, TelemetrySender, TelemetryService, Timestamped,
};
