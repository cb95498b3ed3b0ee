//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use vdock_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .socket_path(tmp.path().join("vdockd.sock"))
///     .client_timeout_ms(50)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.daemon.socket_path = path.as_ref().to_path_buf();
        self
    }

    pub fn client_timeout_ms(mut self, ms: u64) -> Self {
        self.config.daemon.client_timeout_ms = ms;
        self
    }

    pub fn device_name(mut self, name: &str) -> Self {
        self.config.device.name = name.to_string();
        self
    }

    pub fn vendor(mut self, vendor: u16) -> Self {
        self.config.device.vendor = vendor;
        self
    }

    pub fn product(mut self, product: u16) -> Self {
        self.config.device.product = product;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
