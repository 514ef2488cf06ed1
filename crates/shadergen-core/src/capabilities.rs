//! Render-system capability queries used to pick code-generation branches.

use std::collections::BTreeSet;

/// GPU vendor as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuVendor {
    #[default]
    Unknown,
    Nvidia,
    Amd,
    Intel,
    Apple,
    Qualcomm,
    Arm,
    Imagination,
    Mesa,
}

impl GpuVendor {
    /// Classify a `GL_VENDOR`-style string.
    ///
    /// Vendor names are matched as whole words, so `"Arm"` does not match
    /// inside `"Charm"`.
    pub fn from_vendor_string(vendor: &str) -> Self {
        const TABLE: &[(&[&str], GpuVendor)] = &[
            (&["nvidia"], GpuVendor::Nvidia),
            (&["ati", "technologies"], GpuVendor::Amd),
            (&["advanced", "micro", "devices"], GpuVendor::Amd),
            (&["amd"], GpuVendor::Amd),
            (&["intel"], GpuVendor::Intel),
            (&["apple"], GpuVendor::Apple),
            (&["qualcomm"], GpuVendor::Qualcomm),
            (&["arm"], GpuVendor::Arm),
            (&["imagination"], GpuVendor::Imagination),
            (&["mesa"], GpuVendor::Mesa),
            (&["x.org"], GpuVendor::Mesa),
        ];

        let vendor = vendor.to_ascii_lowercase();
        let words: Vec<&str> = vendor
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
            .map(|w| w.trim_end_matches('.'))
            .filter(|w| !w.is_empty())
            .collect();
        TABLE
            .iter()
            .find(|(name, _)| words.windows(name.len()).any(|window| window == *name))
            .map(|&(_, v)| v)
            .unwrap_or(GpuVendor::Unknown)
    }
}

/// What the active render system can do.
pub trait Capabilities {
    /// Whether a shader profile/syntax code (`"glsl440"`, `"vs_4_0"`) compiles.
    fn is_syntax_supported(&self, syntax: &str) -> bool;

    fn has_min_version(&self, major: u32, minor: u32) -> bool;

    fn check_extension(&self, name: &str) -> bool;

    fn vendor(&self) -> GpuVendor;
}

/// Plain-value capability set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderCapabilities {
    pub version: (u32, u32),
    pub syntaxes: BTreeSet<String>,
    pub extensions: BTreeSet<String>,
    pub vendor: GpuVendor,
}

impl RenderCapabilities {
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            version: (major, minor),
            ..Default::default()
        }
    }

    pub fn with_syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntaxes.insert(syntax.into());
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.insert(name.into());
        self
    }

    pub fn with_vendor(mut self, vendor: GpuVendor) -> Self {
        self.vendor = vendor;
        self
    }
}

impl Capabilities for RenderCapabilities {
    fn is_syntax_supported(&self, syntax: &str) -> bool {
        self.syntaxes.contains(syntax)
    }

    fn has_min_version(&self, major: u32, minor: u32) -> bool {
        self.version >= (major, minor)
    }

    fn check_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    fn vendor(&self) -> GpuVendor {
        self.vendor
    }
}
