/// Contains engine-wide settings supplied by the host at creation time.
///
/// Per-context overrides layer on top of these through each context's
/// configuration overlay.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum number of request body bytes captured into the transaction's
    /// body buffer by the built-in `raw` stream processor. Bytes past the
    /// limit still flow through the processor chain unchanged.
    pub request_body_log_limit: usize,
    /// Maximum number of response body bytes captured into the
    /// transaction's body buffer.
    pub response_body_log_limit: usize,
    /// Whether transactions enforce blocks by default. When off, blocks are
    /// recorded on the transaction but not applied through the server
    /// interface.
    pub blocking_mode: bool,
    /// Identifier of the sensor this engine instance reports as.
    pub sensor_id: String,
    /// Human-readable name of the sensor.
    pub sensor_name: String,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_body_log_limit: 4096,
            response_body_log_limit: 4096,
            blocking_mode: false,
            sensor_id: "00000000-0000-0000-0000-000000000000".to_string(),
            sensor_name: "hornet".to_string(),
        }
    }
}
