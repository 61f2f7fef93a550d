//! Shared plugin configuration.
//!
//! Format-agnostic metadata the factory reports to the host. Format-specific
//! configuration (class ids, cache bounds) lives in `vessel-vst3`.
//!
//! # Example
//!
//! ```
//! use vessel_core::PluginConfig;
//!
//! pub static CONFIG: PluginConfig = PluginConfig::new("My Plugin")
//!     .with_vendor("My Company")
//!     .with_version("1.0.0")
//!     .with_sub_categories("Fx|Dynamics");
//! ```

/// Format-agnostic plugin configuration.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Plugin name displayed in the DAW.
    pub name: &'static str,

    /// Vendor/company name.
    pub vendor: &'static str,

    /// Vendor URL.
    pub url: &'static str,

    /// Vendor email.
    pub email: &'static str,

    /// Plugin version string.
    pub version: &'static str,

    /// Class category reported by the factory.
    pub category: &'static str,

    /// Pipe-separated sub-categories, e.g. `"Fx|Dynamics"`.
    pub sub_categories: &'static str,
}

impl PluginConfig {
    /// Create a configuration with default metadata.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            vendor: "Unknown Vendor",
            url: "",
            email: "",
            version: "1.0.0",
            category: "Audio Module Class",
            sub_categories: "Fx",
        }
    }

    /// Set the vendor name.
    pub const fn with_vendor(mut self, vendor: &'static str) -> Self {
        self.vendor = vendor;
        self
    }

    /// Set the vendor URL.
    pub const fn with_url(mut self, url: &'static str) -> Self {
        self.url = url;
        self
    }

    /// Set the vendor email.
    pub const fn with_email(mut self, email: &'static str) -> Self {
        self.email = email;
        self
    }

    /// Set the version string.
    pub const fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Set the sub-categories.
    pub const fn with_sub_categories(mut self, sub_categories: &'static str) -> Self {
        self.sub_categories = sub_categories;
        self
    }
}
