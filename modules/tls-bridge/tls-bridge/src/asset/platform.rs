/// Host facts that decide which engine artifact to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Lowercase OS name as Rust reports it (`linux`, `macos`, `windows`, ...).
    pub os: String,
    /// Machine architecture (`x86_64`, `aarch64`, ...).
    pub arch: String,
    pub pointer_width: u32,
    /// Linux distribution id (`ubuntu`, `fedora`, ...), if known.
    pub distro: Option<String>,
}

impl Platform {
    /// The platform this process runs on.
    #[must_use]
    pub fn current() -> Self {
        let os = std::env::consts::OS.to_owned();
        let distro = (os == "linux")
            .then(sysinfo::System::distribution_id)
            .filter(|id| !id.is_empty());
        Self {
            os,
            arch: std::env::consts::ARCH.to_owned(),
            pointer_width: usize::BITS,
            distro,
        }
    }

    /// `{component}-{os}-{arch}-{version}{extension}`.
    ///
    /// Only the version segment depends on `version`.
    #[must_use]
    pub fn asset_name(&self, component: &str, version: &str) -> String {
        format!(
            "{component}-{}-{}-{version}{}",
            self.asset_os(),
            self.asset_arch(),
            self.extension()
        )
    }

    fn is_darwin(&self) -> bool {
        matches!(self.os.as_str(), "macos" | "darwin")
    }

    fn asset_os(&self) -> String {
        if self.is_darwin() {
            return "darwin".to_owned();
        }
        if self.os == "linux"
            && matches!(self.distro.as_deref(), Some("ubuntu" | "debian"))
        {
            return "linux-ubuntu".to_owned();
        }
        self.os.to_ascii_lowercase()
    }

    fn asset_arch(&self) -> &'static str {
        if self.os == "windows" {
            return if self.pointer_width == 64 { "64" } else { "32" };
        }
        match self.arch.as_str() {
            "aarch64" | "arm64" => "arm64",
            _ => "amd64",
        }
    }

    fn extension(&self) -> &'static str {
        if self.is_darwin() {
            ".dylib"
        } else if self.os == "windows" {
            ".dll"
        } else {
            ".so"
        }
    }
}
