use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Set of operating systems a GIR element is available on.
    ///
    /// GIR files are generated per platform; when several platform variants
    /// of a repository are merged into one tree, each node carries the mask
    /// of platforms it appeared on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Platforms: u8 {
        /// Available on Linux
        const LINUX = 1;
        /// Available on Windows
        const WINDOWS = 1 << 1;
        /// Available on macOS
        const MACOS = 1 << 2;
    }
}

impl Platforms {
    /// Determine the platform this process is running on.
    #[must_use]
    pub fn runtime() -> Platforms {
        if cfg!(target_os = "windows") {
            Platforms::WINDOWS
        } else if cfg!(target_os = "linux") {
            Platforms::LINUX
        } else {
            Platforms::MACOS
        }
    }
}

impl Default for Platforms {
    fn default() -> Self {
        Platforms::all()
    }
}

impl fmt::Display for Platforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Platforms::all() {
            return write!(f, "linux, windows or macos");
        }

        let mut names = Vec::new();
        if self.contains(Platforms::LINUX) {
            names.push("linux");
        }
        if self.contains(Platforms::WINDOWS) {
            names.push("windows");
        }
        if self.contains(Platforms::MACOS) {
            names.push("macos");
        }
        write!(f, "{}", names.join(" or "))
    }
}
